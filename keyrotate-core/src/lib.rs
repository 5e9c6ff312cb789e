//! Core types and traits for keyrotate
//!
//! This crate provides the collaborator contracts shared by the rotation
//! core and the in-process service emulations.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{ErrorCode, ErrorKind, ServiceError};
pub use traits::{ClientFactory, IdentityProvider, ProbeClient, SecretStore};
pub use types::{AccessKey, Credentials, KeyStatus, SecretValue, VersionStage};
