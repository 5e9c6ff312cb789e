//! In-memory bucket registry with authenticated listing

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use keyrotate_auth::{verify_request, HttpRequest, SecretKeyResolver, SigV4Error};
use keyrotate_core::{ErrorCode, ServiceError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

static BUCKET_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$").expect("valid bucket name pattern")
});

/// Errors from S3 operations
#[derive(Debug, Error)]
pub enum S3Error {
    #[error("Bucket already exists: {0}")]
    BucketAlreadyExists(String),

    #[error("Invalid bucket name: {0}")]
    InvalidBucketName(String),

    #[error("Unsupported request: {0}")]
    UnsupportedRequest(String),

    #[error(transparent)]
    Auth(#[from] SigV4Error),
}

impl From<S3Error> for ServiceError {
    fn from(err: S3Error) -> Self {
        match err {
            S3Error::Auth(auth) => auth.into(),
            S3Error::BucketAlreadyExists(name) => ServiceError::new(
                ErrorCode::BucketAlreadyExists,
                "The requested bucket name is not available",
            )
            .with_resource(name),
            S3Error::InvalidBucketName(name) => ServiceError::new(
                ErrorCode::InvalidBucketName,
                "The specified bucket is not valid",
            )
            .with_resource(name),
            S3Error::UnsupportedRequest(message) => {
                ServiceError::new(ErrorCode::InvalidParameter, message)
            }
        }
    }
}

/// A bucket in a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSummary {
    pub name: String,
    pub creation_date: DateTime<Utc>,
}

/// S3 bucket registry whose listing requires a valid signature
pub struct S3Service {
    buckets: DashMap<String, DateTime<Utc>>,
    resolver: Arc<dyn SecretKeyResolver>,
}

impl S3Service {
    pub fn new(resolver: Arc<dyn SecretKeyResolver>) -> Self {
        Self {
            buckets: DashMap::new(),
            resolver,
        }
    }

    /// Create a bucket
    pub fn create_bucket(&self, bucket: &str) -> Result<(), S3Error> {
        if !BUCKET_NAME_PATTERN.is_match(bucket) || bucket.contains("..") {
            return Err(S3Error::InvalidBucketName(bucket.to_string()));
        }
        if self.buckets.contains_key(bucket) {
            return Err(S3Error::BucketAlreadyExists(bucket.to_string()));
        }
        self.buckets.insert(bucket.to_string(), Utc::now());
        Ok(())
    }

    /// Handle a signed `GET /` (ListBuckets)
    pub fn list_buckets(&self, request: &HttpRequest) -> Result<Vec<BucketSummary>, S3Error> {
        if request.method != "GET" || request.path != "/" {
            return Err(S3Error::UnsupportedRequest(format!(
                "{} {}",
                request.method, request.path
            )));
        }

        let access_key_id = match verify_request(request, self.resolver.as_ref(), Utc::now()) {
            Ok(access_key_id) => access_key_id,
            Err(err) => {
                warn!(error = %err, "Rejected ListBuckets request");
                return Err(err.into());
            }
        };
        debug!(access_key_id = %access_key_id, "ListBuckets");

        let mut buckets: Vec<BucketSummary> = self
            .buckets
            .iter()
            .map(|r| BucketSummary {
                name: r.key().clone(),
                creation_date: *r.value(),
            })
            .collect();
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }
}
