//! Recording collaborator doubles shared by the unit tests

use chrono::Utc;
use keyrotate_core::{
    AccessKey, ClientFactory, Credentials, IdentityProvider, KeyStatus, ProbeClient, SecretStore,
    SecretValue, ServiceError, VersionStage,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::coordinator::Rotator;
use crate::log::MemoryLog;

pub const NEW_KEY_ID: &str = "AKIANEW";
pub const NEW_SECRET: &str = "newsecret";

/// One collaborator call, as observed by the doubles
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetValue {
        stage: VersionStage,
        token: Option<String>,
    },
    PutValue {
        value: String,
        token: String,
        stages: Vec<VersionStage>,
    },
    CreateKey {
        identity_ref: String,
    },
    SetKeyStatus {
        identity_ref: String,
        access_key_id: String,
        status: KeyStatus,
    },
    MakeClient {
        access_key_id: String,
    },
    ListResources,
}

pub type Calls = Arc<Mutex<Vec<Call>>>;

pub struct MockStore {
    calls: Calls,
    current: Option<String>,
    pending: Mutex<HashMap<String, String>>,
    put_error: Mutex<Option<ServiceError>>,
}

impl MockStore {
    pub fn with_current(current: &str) -> Self {
        Self::with_calls(Calls::default(), Some(current))
    }

    pub fn with_calls(calls: Calls, current: Option<&str>) -> Self {
        Self {
            calls,
            current: current.map(str::to_string),
            pending: Mutex::new(HashMap::new()),
            put_error: Mutex::new(None),
        }
    }

    pub fn insert_pending(&self, token: &str, value: &str) {
        self.pending
            .lock()
            .insert(token.to_string(), value.to_string());
    }

    pub fn pending(&self, token: &str) -> Option<String> {
        self.pending.lock().get(token).cloned()
    }

    pub fn fail_puts(&self, err: ServiceError) {
        *self.put_error.lock() = Some(err);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }
}

impl SecretStore for MockStore {
    fn get_value(
        &self,
        secret_id: &str,
        stage: VersionStage,
        version_id: Option<&str>,
    ) -> Result<SecretValue, ServiceError> {
        self.calls.lock().push(Call::GetValue {
            stage,
            token: version_id.map(str::to_string),
        });

        let value = match (stage, version_id) {
            (VersionStage::Current, _) => self.current.clone(),
            (VersionStage::Pending, Some(token)) => self.pending(token),
            (VersionStage::Pending, None) => self.pending.lock().values().next().cloned(),
        };

        value
            .map(|v| SecretValue {
                arn: format!(
                    "arn:aws:secretsmanager:us-east-1:000000000000:secret:{}",
                    secret_id
                ),
                name: secret_id.to_string(),
                version_id: version_id.unwrap_or("current").to_string(),
                secret_string: Some(v),
                version_stages: vec![stage.as_str().to_string()],
            })
            .ok_or_else(|| {
                ServiceError::not_found(format!(
                    "Secrets Manager can't find the specified secret value for staging label: {}",
                    stage
                ))
            })
    }

    fn put_value(
        &self,
        _secret_id: &str,
        value: &str,
        version_id: &str,
        stages: &[VersionStage],
    ) -> Result<(), ServiceError> {
        self.calls.lock().push(Call::PutValue {
            value: value.to_string(),
            token: version_id.to_string(),
            stages: stages.to_vec(),
        });

        if let Some(err) = self.put_error.lock().clone() {
            return Err(err);
        }
        if stages.contains(&VersionStage::Pending) {
            self.insert_pending(version_id, value);
        }
        Ok(())
    }
}

pub struct MockIdentity {
    calls: Calls,
    create_error: Mutex<Option<ServiceError>>,
    status_error: Mutex<Option<ServiceError>>,
}

impl MockIdentity {
    pub fn new(calls: Calls) -> Self {
        Self {
            calls,
            create_error: Mutex::new(None),
            status_error: Mutex::new(None),
        }
    }

    pub fn fail_create(&self, err: ServiceError) {
        *self.create_error.lock() = Some(err);
    }

    pub fn fail_status_updates(&self, err: ServiceError) {
        *self.status_error.lock() = Some(err);
    }
}

impl IdentityProvider for MockIdentity {
    fn create_key(&self, identity_ref: &str) -> Result<AccessKey, ServiceError> {
        self.calls.lock().push(Call::CreateKey {
            identity_ref: identity_ref.to_string(),
        });

        if let Some(err) = self.create_error.lock().clone() {
            return Err(err);
        }
        Ok(AccessKey {
            user_name: identity_ref.to_string(),
            access_key_id: NEW_KEY_ID.to_string(),
            secret_access_key: NEW_SECRET.to_string(),
            status: KeyStatus::Active,
            create_date: Utc::now(),
        })
    }

    fn set_key_status(
        &self,
        identity_ref: &str,
        access_key_id: &str,
        status: KeyStatus,
    ) -> Result<(), ServiceError> {
        self.calls.lock().push(Call::SetKeyStatus {
            identity_ref: identity_ref.to_string(),
            access_key_id: access_key_id.to_string(),
            status,
        });

        match self.status_error.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub struct MockClients {
    calls: Calls,
    construction_error: Mutex<Option<ServiceError>>,
    probe_error: Mutex<Option<ServiceError>>,
}

impl MockClients {
    pub fn new(calls: Calls) -> Self {
        Self {
            calls,
            construction_error: Mutex::new(None),
            probe_error: Mutex::new(None),
        }
    }

    /// Make `make_storage_client` itself fail
    pub fn fail_construction(&self, err: ServiceError) {
        *self.construction_error.lock() = Some(err);
    }

    pub fn fail_probes(&self, err: ServiceError) {
        *self.probe_error.lock() = Some(err);
    }
}

struct MockProbe {
    calls: Calls,
    error: Option<ServiceError>,
}

impl ProbeClient for MockProbe {
    fn list_resources(&self) -> Result<Vec<String>, ServiceError> {
        self.calls.lock().push(Call::ListResources);
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(vec!["reports".to_string()]),
        }
    }
}

impl ClientFactory for MockClients {
    fn make_storage_client(
        &self,
        credentials: &Credentials,
    ) -> Result<Box<dyn ProbeClient>, ServiceError> {
        self.calls.lock().push(Call::MakeClient {
            access_key_id: credentials.access_key_id.clone(),
        });

        if let Some(err) = self.construction_error.lock().clone() {
            return Err(err);
        }
        Ok(Box::new(MockProbe {
            calls: Arc::clone(&self.calls),
            error: self.probe_error.lock().clone(),
        }))
    }
}

/// All three doubles sharing one call log
pub struct Harness {
    pub calls: Calls,
    pub store: Arc<MockStore>,
    pub identity: Arc<MockIdentity>,
    pub clients: Arc<MockClients>,
    pub log: Arc<MemoryLog>,
}

impl Harness {
    pub fn new(current: Option<&str>) -> Self {
        let calls = Calls::default();
        Self {
            store: Arc::new(MockStore::with_calls(Arc::clone(&calls), current)),
            identity: Arc::new(MockIdentity::new(Arc::clone(&calls))),
            clients: Arc::new(MockClients::new(Arc::clone(&calls))),
            log: Arc::new(MemoryLog::new()),
            calls,
        }
    }

    pub fn rotator(&self) -> Rotator {
        Rotator::new(
            self.store.clone(),
            self.identity.clone(),
            self.clients.clone(),
        )
        .with_log(self.log.clone())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }
}
