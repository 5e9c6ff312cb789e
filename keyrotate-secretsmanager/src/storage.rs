//! Secrets Manager in-memory storage

use dashmap::DashMap;
use keyrotate_core::{ErrorCode, SecretStore, SecretValue, ServiceError, VersionStage};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;
use uuid::Uuid;

pub const AWSCURRENT: &str = "AWSCURRENT";
pub const AWSPENDING: &str = "AWSPENDING";
pub const AWSPREVIOUS: &str = "AWSPREVIOUS";

const ACCOUNT_ID: &str = "000000000000";
const REGION: &str = "us-east-1";
const MAX_NAME_LEN: usize = 512;
const MAX_TOKEN_LEN: usize = 64;

/// A named secret and every version written to it
#[derive(Debug, Clone)]
pub struct Secret {
    pub arn: String,
    pub name: String,
    pub description: Option<String>,
    /// Keyed by version id
    pub versions: HashMap<String, SecretVersion>,
}

/// One immutable value of a secret
#[derive(Debug, Clone)]
pub struct SecretVersion {
    /// The client request token that created it
    pub version_id: String,
    pub secret_string: String,
    /// Staging labels such as AWSCURRENT or AWSPENDING
    pub version_stages: Vec<String>,
}

impl SecretVersion {
    pub fn has_stage(&self, stage: &str) -> bool {
        self.version_stages.iter().any(|s| s == stage)
    }
}

impl Secret {
    /// The version currently carrying `stage`, if any
    pub fn version_for_stage(&self, stage: &str) -> Option<&SecretVersion> {
        self.versions.values().find(|v| v.has_stage(stage))
    }

    /// Version id to staging labels, omitting unlabelled versions
    pub fn version_ids_to_stages(&self) -> BTreeMap<String, Vec<String>> {
        self.versions
            .values()
            .filter(|v| !v.version_stages.is_empty())
            .map(|v| (v.version_id.clone(), v.version_stages.clone()))
            .collect()
    }

    /// Remove `stage` from whichever version holds it
    fn detach_stage(&mut self, stage: &str) -> Option<String> {
        let mut holder = None;
        for version in self.versions.values_mut() {
            if version.has_stage(stage) {
                version.version_stages.retain(|s| s != stage);
                holder = Some(version.version_id.clone());
            }
        }
        holder
    }

    /// Attach `stage` to `version_id`. Labels are unique per secret, and
    /// moving AWSCURRENT leaves the displaced version labelled AWSPREVIOUS.
    fn attach_stage(&mut self, stage: &str, version_id: &str) {
        let displaced = self.detach_stage(stage);

        if stage == AWSCURRENT {
            if let Some(old) = displaced.filter(|old| old != version_id) {
                self.detach_stage(AWSPREVIOUS);
                if let Some(version) = self.versions.get_mut(&old) {
                    version.version_stages.push(AWSPREVIOUS.to_string());
                }
            }
        }

        if let Some(version) = self.versions.get_mut(version_id) {
            version.version_stages.push(stage.to_string());
        }
    }
}

/// Secrets kept in memory, addressable by name or ARN
#[derive(Debug, Default)]
pub struct SecretsManagerStorage {
    /// Secrets indexed by name
    secrets: DashMap<String, Secret>,
}

impl SecretsManagerStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a secret name or ARN to the storage key
    fn resolve_name(&self, secret_id: &str) -> Result<String, SecretsManagerError> {
        if self.secrets.contains_key(secret_id) {
            return Ok(secret_id.to_string());
        }
        self.secrets
            .iter()
            .find(|entry| entry.value().arn == secret_id)
            .map(|entry| entry.key().clone())
            .ok_or_else(|| SecretsManagerError::ResourceNotFound(secret_id.to_string()))
    }

    /// Create a secret, optionally with an initial AWSCURRENT value
    pub fn create_secret(
        &self,
        name: &str,
        description: Option<String>,
        secret_string: Option<String>,
        client_request_token: Option<String>,
    ) -> Result<Secret, SecretsManagerError> {
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(SecretsManagerError::InvalidParameter(format!(
                "Invalid secret name: {:?}",
                name
            )));
        }
        if self.secrets.contains_key(name) {
            return Err(SecretsManagerError::ResourceExists(name.to_string()));
        }

        let arn = format!(
            "arn:aws:secretsmanager:{}:{}:secret:{}-{}",
            REGION,
            ACCOUNT_ID,
            name,
            &Uuid::new_v4().simple().to_string()[..6]
        );

        let mut versions = HashMap::new();
        if let Some(secret_string) = secret_string {
            let version_id = match client_request_token {
                Some(token) => validate_token(token)?,
                None => Uuid::new_v4().to_string(),
            };
            versions.insert(
                version_id.clone(),
                SecretVersion {
                    version_id,
                    secret_string,
                    version_stages: vec![AWSCURRENT.to_string()],
                },
            );
        }

        let secret = Secret {
            arn,
            name: name.to_string(),
            description,
            versions,
        };

        self.secrets.insert(name.to_string(), secret.clone());
        Ok(secret)
    }

    /// Get secret value
    ///
    /// With neither a version id nor a stage, the AWSCURRENT version is
    /// returned. When both are given they must agree.
    pub fn get_secret_value(
        &self,
        secret_id: &str,
        version_id: Option<&str>,
        version_stage: Option<&str>,
    ) -> Result<(Secret, SecretVersion), SecretsManagerError> {
        let secret = self.describe_secret(secret_id)?;

        let version = match version_id {
            Some(vid) => {
                let version = secret.versions.get(vid).ok_or_else(|| {
                    SecretsManagerError::ResourceNotFound(format!(
                        "Secrets Manager can't find the specified secret value for VersionId: {}",
                        vid
                    ))
                })?;
                if let Some(stage) = version_stage {
                    if !version.has_stage(stage) {
                        return Err(SecretsManagerError::ResourceNotFound(format!(
                            "Version {} does not carry staging label {}",
                            vid, stage
                        )));
                    }
                }
                version.clone()
            }
            None => {
                let stage = version_stage.unwrap_or(AWSCURRENT);
                secret.version_for_stage(stage).cloned().ok_or_else(|| {
                    SecretsManagerError::ResourceNotFound(format!(
                        "Secrets Manager can't find a version with staging label: {}",
                        stage
                    ))
                })?
            }
        };

        Ok((secret, version))
    }

    /// Put a new secret value
    ///
    /// Without explicit stages the new version becomes AWSCURRENT. Reusing
    /// a token with the same value is a no-op; with a different value it
    /// fails, since versions are immutable.
    pub fn put_secret_value(
        &self,
        secret_id: &str,
        client_request_token: Option<&str>,
        secret_string: &str,
        version_stages: Option<&[String]>,
    ) -> Result<(Secret, SecretVersion), SecretsManagerError> {
        let name = self.resolve_name(secret_id)?;
        let mut secret = self
            .secrets
            .get_mut(&name)
            .ok_or_else(|| SecretsManagerError::ResourceNotFound(secret_id.to_string()))?;

        let version_id = match client_request_token {
            Some(token) => validate_token(token.to_string())?,
            None => Uuid::new_v4().to_string(),
        };

        if let Some(existing) = secret.versions.get(&version_id) {
            if existing.secret_string == secret_string {
                return Ok((secret.clone(), existing.clone()));
            }
            return Err(SecretsManagerError::ResourceExists(format!(
                "You can't modify an existing version, you can only create a new version: {}",
                version_id
            )));
        }

        let stages: Vec<String> = version_stages
            .map(<[String]>::to_vec)
            .unwrap_or_else(|| vec![AWSCURRENT.to_string()]);

        secret.versions.insert(
            version_id.clone(),
            SecretVersion {
                version_id: version_id.clone(),
                secret_string: secret_string.to_string(),
                version_stages: Vec::new(),
            },
        );
        for stage in &stages {
            secret.attach_stage(stage, &version_id);
        }

        debug!(
            secret = %name,
            version_id = %version_id,
            stages = ?stages,
            "Stored secret version"
        );

        let version = secret.versions[&version_id].clone();
        Ok((secret.clone(), version))
    }

    /// Move a staging label between versions
    ///
    /// If the label is attached to a different version, that version must
    /// be named in `remove_from_version_id`. AWSCURRENT can only be moved,
    /// never simply removed.
    pub fn update_secret_version_stage(
        &self,
        secret_id: &str,
        version_stage: &str,
        move_to_version_id: Option<&str>,
        remove_from_version_id: Option<&str>,
    ) -> Result<Secret, SecretsManagerError> {
        let name = self.resolve_name(secret_id)?;
        let mut secret = self
            .secrets
            .get_mut(&name)
            .ok_or_else(|| SecretsManagerError::ResourceNotFound(secret_id.to_string()))?;

        let holder = secret
            .version_for_stage(version_stage)
            .map(|v| v.version_id.clone());

        if let Some(from) = remove_from_version_id {
            if holder.as_deref() != Some(from) {
                return Err(SecretsManagerError::InvalidParameter(format!(
                    "The staging label {} is not attached to version {}",
                    version_stage, from
                )));
            }
        }

        match move_to_version_id {
            Some(to) => {
                if !secret.versions.contains_key(to) {
                    return Err(SecretsManagerError::ResourceNotFound(format!(
                        "Version {} not found",
                        to
                    )));
                }
                if let Some(current) = holder.as_deref() {
                    if current != to && remove_from_version_id != Some(current) {
                        return Err(SecretsManagerError::InvalidParameter(format!(
                            "Staging label {} is on version {}; name it in RemoveFromVersionId",
                            version_stage, current
                        )));
                    }
                }
                secret.attach_stage(version_stage, to);
            }
            None => {
                if version_stage == AWSCURRENT {
                    return Err(SecretsManagerError::InvalidParameter(
                        "You can only move AWSCURRENT to another version".to_string(),
                    ));
                }
                if remove_from_version_id.is_none() {
                    return Err(SecretsManagerError::InvalidParameter(
                        "MoveToVersionId or RemoveFromVersionId is required".to_string(),
                    ));
                }
                secret.detach_stage(version_stage);
            }
        }

        Ok(secret.clone())
    }

    /// Describe a secret by name or ARN
    pub fn describe_secret(&self, secret_id: &str) -> Result<Secret, SecretsManagerError> {
        let name = self.resolve_name(secret_id)?;
        self.secrets
            .get(&name)
            .map(|s| s.clone())
            .ok_or_else(|| SecretsManagerError::ResourceNotFound(secret_id.to_string()))
    }
}

fn validate_token(token: String) -> Result<String, SecretsManagerError> {
    if token.is_empty() || token.len() > MAX_TOKEN_LEN {
        return Err(SecretsManagerError::InvalidParameter(format!(
            "ClientRequestToken must be 1-{} characters",
            MAX_TOKEN_LEN
        )));
    }
    Ok(token)
}

impl SecretStore for SecretsManagerStorage {
    fn get_value(
        &self,
        secret_id: &str,
        stage: VersionStage,
        version_id: Option<&str>,
    ) -> Result<SecretValue, ServiceError> {
        let (secret, version) = self.get_secret_value(secret_id, version_id, Some(stage.as_str()))?;
        Ok(SecretValue {
            arn: secret.arn,
            name: secret.name,
            version_id: version.version_id,
            secret_string: Some(version.secret_string),
            version_stages: version.version_stages,
        })
    }

    fn put_value(
        &self,
        secret_id: &str,
        value: &str,
        version_id: &str,
        stages: &[VersionStage],
    ) -> Result<(), ServiceError> {
        let labels: Vec<String> = stages.iter().map(|s| s.as_str().to_string()).collect();
        self.put_secret_value(secret_id, Some(version_id), value, Some(&labels))?;
        Ok(())
    }
}

/// Secrets Manager errors
#[derive(Debug, thiserror::Error)]
pub enum SecretsManagerError {
    #[error("Secret already exists: {0}")]
    ResourceExists(String),

    #[error("Secret not found: {0}")]
    ResourceNotFound(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl From<SecretsManagerError> for ServiceError {
    fn from(err: SecretsManagerError) -> Self {
        let code = match err {
            SecretsManagerError::ResourceExists(_) => ErrorCode::ResourceExists,
            SecretsManagerError::ResourceNotFound(_) => ErrorCode::ResourceNotFound,
            SecretsManagerError::InvalidParameter(_) => ErrorCode::InvalidParameter,
        };
        ServiceError::new(code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_with(value: &str) -> SecretsManagerStorage {
        let storage = SecretsManagerStorage::new();
        storage
            .create_secret(
                "my-secret",
                None,
                Some(value.to_string()),
                Some("v1".to_string()),
            )
            .unwrap();
        storage
    }

    fn pending() -> Vec<String> {
        vec![AWSPENDING.to_string()]
    }

    #[test]
    fn test_create_and_get_secret() {
        let storage = SecretsManagerStorage::new();

        let secret = storage
            .create_secret(
                "my-secret",
                Some("Test secret".to_string()),
                Some("secret-value".to_string()),
                None,
            )
            .unwrap();

        assert_eq!(secret.name, "my-secret");
        assert!(secret.arn.starts_with("arn:aws:secretsmanager:us-east-1:"));
        assert!(secret.version_for_stage(AWSCURRENT).is_some());

        let (retrieved, version) = storage.get_secret_value("my-secret", None, None).unwrap();

        assert_eq!(retrieved.description.as_deref(), Some("Test secret"));
        assert_eq!(version.secret_string, "secret-value");
    }

    #[test]
    fn test_get_by_arn() {
        let storage = storage_with("value");
        let arn = storage.describe_secret("my-secret").unwrap().arn;

        let (_, version) = storage.get_secret_value(&arn, None, None).unwrap();
        assert_eq!(version.secret_string, "value");
    }

    #[test]
    fn test_put_secret_value_rotates_versions() {
        let storage = storage_with("value-1");

        storage
            .put_secret_value("my-secret", None, "value-2", None)
            .unwrap();

        let (_, current) = storage
            .get_secret_value("my-secret", None, Some(AWSCURRENT))
            .unwrap();
        assert_eq!(current.secret_string, "value-2");

        let (_, previous) = storage
            .get_secret_value("my-secret", None, Some(AWSPREVIOUS))
            .unwrap();
        assert_eq!(previous.secret_string, "value-1");
    }

    #[test]
    fn test_put_pending_leaves_current_alone() {
        let storage = storage_with("value-1");

        storage
            .put_secret_value("my-secret", Some("v2"), "value-2", Some(&pending()))
            .unwrap();

        let (_, current) = storage.get_secret_value("my-secret", None, None).unwrap();
        assert_eq!(current.version_id, "v1");

        let (_, staged) = storage
            .get_secret_value("my-secret", Some("v2"), Some(AWSPENDING))
            .unwrap();
        assert_eq!(staged.secret_string, "value-2");
        assert_eq!(staged.version_stages, vec![AWSPENDING.to_string()]);
    }

    #[test]
    fn test_pending_label_moves_to_newest_put() {
        let storage = storage_with("value-1");

        storage
            .put_secret_value("my-secret", Some("v2"), "value-2", Some(&pending()))
            .unwrap();
        storage
            .put_secret_value("my-secret", Some("v3"), "value-3", Some(&pending()))
            .unwrap();

        let secret = storage.describe_secret("my-secret").unwrap();
        let stages = secret.version_ids_to_stages();
        assert_eq!(stages.get("v3"), Some(&pending()));
        assert!(!stages.contains_key("v2"));

        let result = storage.get_secret_value("my-secret", Some("v2"), Some(AWSPENDING));
        assert!(matches!(result, Err(SecretsManagerError::ResourceNotFound(_))));
    }

    #[test]
    fn test_token_reuse() {
        let storage = storage_with("value-1");

        storage
            .put_secret_value("my-secret", Some("v2"), "value-2", Some(&pending()))
            .unwrap();
        let (_, again) = storage
            .put_secret_value("my-secret", Some("v2"), "value-2", Some(&pending()))
            .unwrap();
        assert_eq!(again.version_id, "v2");

        let result = storage.put_secret_value("my-secret", Some("v2"), "other", Some(&pending()));
        assert!(matches!(result, Err(SecretsManagerError::ResourceExists(_))));
    }

    #[test]
    fn test_token_length_is_checked() {
        let storage = storage_with("value-1");
        let long = "t".repeat(MAX_TOKEN_LEN + 1);

        let result = storage.put_secret_value("my-secret", Some(&long), "value-2", None);
        assert!(matches!(result, Err(SecretsManagerError::InvalidParameter(_))));
    }

    #[test]
    fn test_version_and_stage_must_agree() {
        let storage = storage_with("value-1");

        let result = storage.get_secret_value("my-secret", Some("v1"), Some(AWSPENDING));
        assert!(matches!(result, Err(SecretsManagerError::ResourceNotFound(_))));
    }

    #[test]
    fn test_finish_rotation_promotes_pending() {
        let storage = storage_with("value-1");
        storage
            .put_secret_value("my-secret", Some("v2"), "value-2", Some(&pending()))
            .unwrap();

        storage
            .update_secret_version_stage("my-secret", AWSCURRENT, Some("v2"), Some("v1"))
            .unwrap();
        storage
            .update_secret_version_stage("my-secret", AWSPENDING, None, Some("v2"))
            .unwrap();

        let stages = storage
            .describe_secret("my-secret")
            .unwrap()
            .version_ids_to_stages();
        assert_eq!(stages.get("v2"), Some(&vec![AWSCURRENT.to_string()]));
        assert_eq!(stages.get("v1"), Some(&vec![AWSPREVIOUS.to_string()]));
    }

    #[test]
    fn test_move_requires_remove_from() {
        let storage = storage_with("value-1");
        storage
            .put_secret_value("my-secret", Some("v2"), "value-2", Some(&pending()))
            .unwrap();

        let result = storage.update_secret_version_stage("my-secret", AWSCURRENT, Some("v2"), None);
        assert!(matches!(result, Err(SecretsManagerError::InvalidParameter(_))));

        let result = storage.update_secret_version_stage("my-secret", AWSCURRENT, None, Some("v1"));
        assert!(matches!(result, Err(SecretsManagerError::InvalidParameter(_))));
    }

    #[test]
    fn test_duplicate_secret_fails() {
        let storage = SecretsManagerStorage::new();

        storage
            .create_secret("my-secret", None, None, None)
            .unwrap();

        let result = storage.create_secret("my-secret", None, None, None);
        assert!(matches!(result, Err(SecretsManagerError::ResourceExists(_))));
    }

    #[test]
    fn test_get_nonexistent_secret_fails() {
        let storage = SecretsManagerStorage::new();

        let result = storage.get_secret_value("nonexistent", None, None);
        assert!(matches!(result, Err(SecretsManagerError::ResourceNotFound(_))));
    }

    #[test]
    fn test_secret_store_errors_map_to_codes() {
        let storage = storage_with("value");

        let err = storage
            .get_value("my-secret", VersionStage::Pending, None)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ResourceNotFound);
    }
}
