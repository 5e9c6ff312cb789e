//! Rotation error types

use keyrotate_core::ServiceError;
use thiserror::Error;

/// Errors surfaced by the accessor and the rotation phases
#[derive(Debug, Error)]
pub enum RotationError {
    /// The secret payload is malformed or lacks a required field
    #[error("{0}")]
    InvalidSecret(String),

    /// The pending credential failed its live probe
    #[error("Failed to validate pending secret for {secret_id}: {source}")]
    ValidationFailed {
        secret_id: String,
        #[source]
        source: ServiceError,
    },

    /// A collaborator call failed; passed through untouched
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// What kind of failure a [`RotationError`] represents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    AccessDenied,
    Service,
}

impl RotationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidSecret(_) | Self::ValidationFailed { .. } => ErrorKind::Validation,
            Self::Service(err) => match err.kind() {
                keyrotate_core::ErrorKind::NotFound => ErrorKind::NotFound,
                keyrotate_core::ErrorKind::AccessDenied => ErrorKind::AccessDenied,
                keyrotate_core::ErrorKind::Other => ErrorKind::Service,
            },
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}

pub type Result<T, E = RotationError> = std::result::Result<T, E>;
