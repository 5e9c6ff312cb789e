//! Configuration management

use serde::Deserialize;

use crate::record::FieldNames;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// JSON key names of the rotated secret
    #[serde(default)]
    pub fields: FieldNames,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from `keyrotate.toml` (if present) and
    /// `KEYROTATE_*` environment variables
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from("keyrotate")
    }

    /// Like [`Config::load`] with a different file name (extension optional)
    pub fn load_from(name: &str) -> anyhow::Result<Self> {
        Self::load_with_env(name, Self::environment())
    }

    /// `KEYROTATE_LOGGING__LEVEL` sets `logging.level`
    fn environment() -> config::Environment {
        config::Environment::with_prefix("KEYROTATE")
            .prefix_separator("_")
            .separator("__")
    }

    fn load_with_env(name: &str, env: config::Environment) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(name).required(false))
            .add_source(env)
            .build()?;

        Ok(config.try_deserialize::<Config>()?)
    }

    /// Parse configuration embedded as TOML
    pub fn from_toml_str(source: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(source)?)
    }
}
