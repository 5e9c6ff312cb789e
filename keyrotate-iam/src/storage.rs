//! IAM in-memory storage for users and access keys

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use keyrotate_auth::SecretKeyResolver;
use keyrotate_core::{AccessKey, ErrorCode, IdentityProvider, KeyStatus, ServiceError};
use once_cell::sync::Lazy;
use rand::distributions::{Alphanumeric, DistString};
use regex::Regex;
use tracing::{debug, info};
use uuid::Uuid;

/// IAM refuses to issue more keys than this per user
pub const MAX_ACCESS_KEYS_PER_USER: usize = 2;

const SECRET_ACCESS_KEY_LEN: usize = 40;

static USER_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w+=,.@-]{1,64}$").expect("valid user name pattern"));

/// An IAM user
#[derive(Debug, Clone)]
pub struct User {
    pub user_name: String,
    pub create_date: DateTime<Utc>,
    /// Access key IDs owned by the user, oldest first
    pub access_key_ids: Vec<String>,
}

/// In-memory IAM storage
#[derive(Debug, Default)]
pub struct IamStorage {
    /// Users indexed by name
    users: DashMap<String, User>,
    /// Access keys indexed by access key ID
    access_keys: DashMap<String, AccessKey>,
}

fn generate_key_id() -> String {
    format!(
        "AKIA{}",
        &Uuid::new_v4().simple().to_string()[..16].to_uppercase()
    )
}

impl IamStorage {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            access_keys: DashMap::new(),
        }
    }

    /// Create a user
    pub fn create_user(&self, user_name: &str) -> Result<User, IamError> {
        if !USER_NAME_PATTERN.is_match(user_name) {
            return Err(IamError::InvalidInput(format!(
                "Invalid user name: {}",
                user_name
            )));
        }
        if self.users.contains_key(user_name) {
            return Err(IamError::EntityAlreadyExists(user_name.to_string()));
        }

        let user = User {
            user_name: user_name.to_string(),
            create_date: Utc::now(),
            access_key_ids: Vec::new(),
        };

        self.users.insert(user_name.to_string(), user.clone());
        Ok(user)
    }

    /// Get a user
    pub fn get_user(&self, user_name: &str) -> Result<User, IamError> {
        self.users
            .get(user_name)
            .map(|u| u.clone())
            .ok_or_else(|| IamError::NoSuchEntity(user_name.to_string()))
    }

    /// Create an active access key for a user
    pub fn create_access_key(&self, user_name: &str) -> Result<AccessKey, IamError> {
        // Holding the user entry serializes key creation per user
        let mut user = self
            .users
            .get_mut(user_name)
            .ok_or_else(|| IamError::NoSuchEntity(user_name.to_string()))?;

        if user.access_key_ids.len() >= MAX_ACCESS_KEYS_PER_USER {
            return Err(IamError::LimitExceeded(format!(
                "Cannot exceed quota for AccessKeysPerUser: {}",
                MAX_ACCESS_KEYS_PER_USER
            )));
        }

        let key = AccessKey {
            user_name: user_name.to_string(),
            access_key_id: generate_key_id(),
            secret_access_key: Alphanumeric
                .sample_string(&mut rand::thread_rng(), SECRET_ACCESS_KEY_LEN),
            status: KeyStatus::Active,
            create_date: Utc::now(),
        };

        user.access_key_ids.push(key.access_key_id.clone());
        self.access_keys
            .insert(key.access_key_id.clone(), key.clone());

        info!(user = %user_name, access_key_id = %key.access_key_id, "Created access key");
        Ok(key)
    }

    /// Look up a key, checking it belongs to `user_name`
    pub fn get_access_key(
        &self,
        user_name: &str,
        access_key_id: &str,
    ) -> Result<AccessKey, IamError> {
        self.access_keys
            .get(access_key_id)
            .filter(|k| k.user_name == user_name)
            .map(|k| k.clone())
            .ok_or_else(|| {
                IamError::NoSuchEntity(format!(
                    "The Access Key with id {} cannot be found",
                    access_key_id
                ))
            })
    }

    /// Change a key's status
    pub fn update_access_key(
        &self,
        user_name: &str,
        access_key_id: &str,
        status: KeyStatus,
    ) -> Result<(), IamError> {
        let mut key = self
            .access_keys
            .get_mut(access_key_id)
            .filter(|k| k.user_name == user_name)
            .ok_or_else(|| {
                IamError::NoSuchEntity(format!(
                    "The Access Key with id {} cannot be found",
                    access_key_id
                ))
            })?;

        key.status = status;
        debug!(
            user = %user_name,
            access_key_id = %access_key_id,
            status = %status,
            "Updated access key"
        );
        Ok(())
    }

    /// Delete a key
    pub fn delete_access_key(&self, user_name: &str, access_key_id: &str) -> Result<(), IamError> {
        self.get_access_key(user_name, access_key_id)?;

        if let Some(mut user) = self.users.get_mut(user_name) {
            user.access_key_ids.retain(|id| id != access_key_id);
        }
        self.access_keys.remove(access_key_id);
        Ok(())
    }

    /// List a user's keys, oldest first
    pub fn list_access_keys(&self, user_name: &str) -> Result<Vec<AccessKey>, IamError> {
        let user = self.get_user(user_name)?;
        Ok(user
            .access_key_ids
            .iter()
            .filter_map(|id| self.access_keys.get(id).map(|k| k.clone()))
            .collect())
    }
}

impl IdentityProvider for IamStorage {
    fn create_key(&self, identity_ref: &str) -> Result<AccessKey, ServiceError> {
        Ok(self.create_access_key(identity_ref)?)
    }

    fn set_key_status(
        &self,
        identity_ref: &str,
        access_key_id: &str,
        status: KeyStatus,
    ) -> Result<(), ServiceError> {
        Ok(self.update_access_key(identity_ref, access_key_id, status)?)
    }
}

impl SecretKeyResolver for IamStorage {
    fn resolve_secret(&self, access_key_id: &str) -> Option<String> {
        self.access_keys
            .get(access_key_id)
            .filter(|k| k.status == KeyStatus::Active)
            .map(|k| k.secret_access_key.clone())
    }
}

/// IAM errors
#[derive(Debug, thiserror::Error)]
pub enum IamError {
    #[error("Entity already exists: {0}")]
    EntityAlreadyExists(String),

    #[error("No such entity: {0}")]
    NoSuchEntity(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),
}

impl From<IamError> for ServiceError {
    fn from(err: IamError) -> Self {
        let code = match err {
            IamError::EntityAlreadyExists(_) => ErrorCode::EntityAlreadyExists,
            IamError::NoSuchEntity(_) => ErrorCode::NoSuchEntity,
            IamError::InvalidInput(_) => ErrorCode::ValidationError,
            IamError::LimitExceeded(_) => ErrorCode::LimitExceeded,
        };
        ServiceError::new(code, err.to_string())
    }
}
