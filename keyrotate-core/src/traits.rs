//! Collaborator traits consumed by the rotation core

use crate::error::ServiceError;
use crate::types::{AccessKey, Credentials, KeyStatus, SecretValue, VersionStage};

/// Versioned secret store with staging labels
pub trait SecretStore: Send + Sync {
    /// Get the value labelled `stage`, pinned to `version_id` when given
    fn get_value(
        &self,
        secret_id: &str,
        stage: VersionStage,
        version_id: Option<&str>,
    ) -> Result<SecretValue, ServiceError>;

    /// Store `value` as a new version identified by `version_id`
    fn put_value(
        &self,
        secret_id: &str,
        value: &str,
        version_id: &str,
        stages: &[VersionStage],
    ) -> Result<(), ServiceError>;
}

/// Issues and retires access keys for an identity
pub trait IdentityProvider: Send + Sync {
    /// Create a new active access key
    fn create_key(&self, identity_ref: &str) -> Result<AccessKey, ServiceError>;

    /// Activate or deactivate an existing key
    fn set_key_status(
        &self,
        identity_ref: &str,
        access_key_id: &str,
        status: KeyStatus,
    ) -> Result<(), ServiceError>;
}

/// A read-only call used to prove a key pair is live and authorized
pub trait ProbeClient {
    /// List the resources visible to the credentials
    fn list_resources(&self) -> Result<Vec<String>, ServiceError>;
}

/// Builds storage-service clients from raw key material
pub trait ClientFactory: Send + Sync {
    fn make_storage_client(
        &self,
        credentials: &Credentials,
    ) -> Result<Box<dyn ProbeClient>, ServiceError>;
}

impl<T: SecretStore + ?Sized> SecretStore for std::sync::Arc<T> {
    fn get_value(
        &self,
        secret_id: &str,
        stage: VersionStage,
        version_id: Option<&str>,
    ) -> Result<SecretValue, ServiceError> {
        (**self).get_value(secret_id, stage, version_id)
    }

    fn put_value(
        &self,
        secret_id: &str,
        value: &str,
        version_id: &str,
        stages: &[VersionStage],
    ) -> Result<(), ServiceError> {
        (**self).put_value(secret_id, value, version_id, stages)
    }
}

impl<T: IdentityProvider + ?Sized> IdentityProvider for std::sync::Arc<T> {
    fn create_key(&self, identity_ref: &str) -> Result<AccessKey, ServiceError> {
        (**self).create_key(identity_ref)
    }

    fn set_key_status(
        &self,
        identity_ref: &str,
        access_key_id: &str,
        status: KeyStatus,
    ) -> Result<(), ServiceError> {
        (**self).set_key_status(identity_ref, access_key_id, status)
    }
}

impl<T: ClientFactory + ?Sized> ClientFactory for std::sync::Arc<T> {
    fn make_storage_client(
        &self,
        credentials: &Credentials,
    ) -> Result<Box<dyn ProbeClient>, ServiceError> {
        (**self).make_storage_client(credentials)
    }
}
