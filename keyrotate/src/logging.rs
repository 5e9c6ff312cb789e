//! Tracing subscriber setup for hosts embedding the rotator

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Install a global subscriber. `RUST_LOG` wins over the configured level.
///
/// Fails if a global subscriber is already set.
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => configured_filter(config)?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    if config.json {
        registry.with(fmt::layer().json()).try_init()?;
    } else {
        registry.with(fmt::layer().with_target(false)).try_init()?;
    }
    Ok(())
}

fn configured_filter(config: &LoggingConfig) -> anyhow::Result<EnvFilter> {
    Ok(EnvFilter::try_new(&config.level)?)
}
