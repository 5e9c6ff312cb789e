//! Signing S3 client used as a credential probe

use chrono::Utc;
use keyrotate_auth::{sign_request, HttpRequest};
use keyrotate_core::{ClientFactory, Credentials, ErrorCode, ProbeClient, ServiceError};
use std::sync::Arc;

use crate::service::{BucketSummary, S3Service};

pub const DEFAULT_REGION: &str = "us-east-1";
const SIGNING_SERVICE: &str = "s3";

/// S3 client authenticated with a single key pair
pub struct S3Client {
    credentials: Credentials,
    region: String,
    service: Arc<S3Service>,
}

impl S3Client {
    pub fn new(
        credentials: Credentials,
        region: impl Into<String>,
        service: Arc<S3Service>,
    ) -> Self {
        Self {
            credentials,
            region: region.into(),
            service,
        }
    }

    fn host(&self) -> String {
        format!("s3.{}.amazonaws.com", self.region)
    }

    /// Signed ListBuckets call
    pub fn list_buckets(&self) -> Result<Vec<BucketSummary>, ServiceError> {
        let mut request = HttpRequest::new("GET", &self.host(), "/");
        sign_request(
            &mut request,
            &self.credentials,
            &self.region,
            SIGNING_SERVICE,
            Utc::now(),
        );
        Ok(self.service.list_buckets(&request)?)
    }
}

impl ProbeClient for S3Client {
    fn list_resources(&self) -> Result<Vec<String>, ServiceError> {
        Ok(self.list_buckets()?.into_iter().map(|b| b.name).collect())
    }
}

/// Builds [`S3Client`]s against one service instance
#[derive(Clone)]
pub struct S3ClientFactory {
    service: Arc<S3Service>,
    region: String,
}

impl S3ClientFactory {
    pub fn new(service: Arc<S3Service>) -> Self {
        Self::with_region(service, DEFAULT_REGION)
    }

    pub fn with_region(service: Arc<S3Service>, region: impl Into<String>) -> Self {
        Self {
            service,
            region: region.into(),
        }
    }
}

impl ClientFactory for S3ClientFactory {
    fn make_storage_client(
        &self,
        credentials: &Credentials,
    ) -> Result<Box<dyn ProbeClient>, ServiceError> {
        if credentials.access_key_id.is_empty() || credentials.secret_access_key.is_empty() {
            return Err(ServiceError::new(
                ErrorCode::InvalidAccessKeyId,
                "Credentials must include an access key id and a secret access key",
            ));
        }
        Ok(Box::new(S3Client::new(
            credentials.clone(),
            self.region.clone(),
            Arc::clone(&self.service),
        )))
    }
}
