//! Collaborator error types

use std::fmt;
use thiserror::Error;

/// Error codes returned by the secret store, identity provider and
/// storage service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Common
    AccessDenied,
    InvalidAccessKeyId,
    SignatureDoesNotMatch,

    // Secrets Manager specific
    ResourceNotFound,
    ResourceExists,
    InvalidParameter,

    // IAM specific
    NoSuchEntity,
    EntityAlreadyExists,
    LimitExceeded,
    ValidationError,

    // S3 specific
    BucketAlreadyExists,
    InvalidBucketName,
}

/// Coarse classification used by callers that only care whether a
/// collaborator said "missing", "forbidden" or something else
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AccessDenied,
    Other,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessDenied => "AccessDenied",
            Self::InvalidAccessKeyId => "InvalidAccessKeyId",
            Self::SignatureDoesNotMatch => "SignatureDoesNotMatch",
            Self::ResourceNotFound => "ResourceNotFoundException",
            Self::ResourceExists => "ResourceExistsException",
            Self::InvalidParameter => "InvalidParameterException",
            Self::NoSuchEntity => "NoSuchEntity",
            Self::EntityAlreadyExists => "EntityAlreadyExists",
            Self::LimitExceeded => "LimitExceeded",
            Self::ValidationError => "ValidationError",
            Self::BucketAlreadyExists => "BucketAlreadyExists",
            Self::InvalidBucketName => "InvalidBucketName",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ResourceNotFound | Self::NoSuchEntity => ErrorKind::NotFound,
            Self::AccessDenied | Self::InvalidAccessKeyId | Self::SignatureDoesNotMatch => {
                ErrorKind::AccessDenied
            }
            _ => ErrorKind::Other,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised by any collaborator call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ServiceError {
    pub code: ErrorCode,
    pub message: String,
    pub resource: Option<String>,
}

impl ServiceError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            resource: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ResourceNotFound, message)
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AccessDenied, message)
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }
}
