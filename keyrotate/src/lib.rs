//! keyrotate - access key rotation for managed secrets
//!
//! Rotates the access key pair stored in a secret that looks like
//!
//! ```json
//! {"aws_access_key_id": "AKIA...", "aws_secret_access_key": "...", "iam_user": "svc-a"}
//! ```
//!
//! in two independently invocable phases:
//!
//! - [`Rotator::rotate_secret`] creates a new key for the identity, stores
//!   it as the `AWSPENDING` version and deactivates the old key.
//! - [`Rotator::set_secret`] reads the pending version back and proves it
//!   works with a read-only storage call before promotion.
//!
//! The secret store, identity provider and storage client are injected
//! through the traits in [`keyrotate_core`].

pub mod accessor;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod log;
pub mod logging;
pub mod record;
pub mod state;

#[cfg(test)]
mod testing;

pub use accessor::{get_current_secret, get_secret, get_secret_with_fields};
pub use config::{Config, LoggingConfig};
pub use coordinator::{RotationOutcome, Rotator};
pub use error::{ErrorKind, Result, RotationError};
pub use log::{MemoryLog, RotationEvent, RotationLog, TracingLog};
pub use record::{CredentialRecord, CurrentRecord, FieldNames};
pub use state::RotationState;

pub use keyrotate_core::{
    AccessKey, ClientFactory, Credentials, IdentityProvider, KeyStatus, ProbeClient, SecretStore,
    ServiceError, VersionStage,
};
