//! Rotation coordinator: create-and-stage, then validate

use keyrotate_core::{ClientFactory, IdentityProvider, KeyStatus, SecretStore, VersionStage};
use std::sync::Arc;
use tracing::debug;

use crate::accessor::{get_current_secret, get_secret_with_fields};
use crate::config::Config;
use crate::error::{Result, RotationError};
use crate::log::{RotationEvent, RotationLog, TracingLog};
use crate::record::{CredentialRecord, CurrentRecord, FieldNames};
use crate::state::RotationState;

/// Where a phase left the rotation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationOutcome {
    pub secret_id: String,
    pub token: String,
    pub state: RotationState,
    /// Key carried by the pending version
    pub access_key_id: String,
    /// Key carried by the current version
    pub replaced_key_id: String,
}

/// Drives the rotation phases against injected collaborators
///
/// Holds no state between calls. Two rotations of the same secret must
/// not run at the same time; nothing here prevents it.
pub struct Rotator {
    store: Arc<dyn SecretStore>,
    identity: Arc<dyn IdentityProvider>,
    clients: Arc<dyn ClientFactory>,
    log: Arc<dyn RotationLog>,
    fields: FieldNames,
}

impl Rotator {
    pub fn new(
        store: Arc<dyn SecretStore>,
        identity: Arc<dyn IdentityProvider>,
        clients: Arc<dyn ClientFactory>,
    ) -> Self {
        Self {
            store,
            identity,
            clients,
            log: Arc::new(TracingLog),
            fields: FieldNames::default(),
        }
    }

    pub fn with_log(mut self, log: Arc<dyn RotationLog>) -> Self {
        self.log = log;
        self
    }

    pub fn with_fields(mut self, fields: FieldNames) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_config(self, config: &Config) -> Self {
        self.with_fields(config.fields.clone())
    }

    fn read_current(&self, secret_id: &str) -> Result<CurrentRecord> {
        get_current_secret(self.store.as_ref(), secret_id, &self.fields)
    }

    fn read_pending(&self, secret_id: &str, token: &str) -> Result<CredentialRecord> {
        get_secret_with_fields(
            self.store.as_ref(),
            secret_id,
            VersionStage::Pending,
            Some(token),
            &self.fields,
        )
    }

    /// Log a milestone and move `state` to the one it reaches
    fn advance(&self, state: &mut RotationState, event: RotationEvent) {
        if let Some(next) = event.state() {
            debug_assert!(state.can_advance_to(next), "{} -> {}", state, next);
            *state = next;
        }
        self.log.record(&event);
    }

    /// Create a new access key, store it as AWSPENDING under `token`, then
    /// deactivate the key it replaces
    ///
    /// The old key is only touched once the new one is durably stored. If
    /// storing fails the new key stays active and unreferenced; it is
    /// reported through the log and the store error is returned as is.
    /// Nothing checks whether `token` already has a pending version, so a
    /// re-run creates another key.
    pub fn rotate_secret(&self, secret_id: &str, token: &str) -> Result<RotationOutcome> {
        let current = self.read_current(secret_id)?;
        let identity_ref = current.identity_ref;
        let mut state = RotationState::NoPending;

        let new_key = self.identity.create_key(&identity_ref)?;
        self.advance(
            &mut state,
            RotationEvent::KeyCreated {
                secret_id: secret_id.to_string(),
                identity_ref: identity_ref.clone(),
                access_key_id: new_key.access_key_id.clone(),
            },
        );

        let pending = CredentialRecord::new(
            new_key.access_key_id,
            new_key.secret_access_key,
            Some(identity_ref.clone()),
        );
        if let Err(err) = self.store.put_value(
            secret_id,
            &pending.to_json(&self.fields),
            token,
            &[VersionStage::Pending],
        ) {
            self.advance(
                &mut state,
                RotationEvent::KeyOrphaned {
                    secret_id: secret_id.to_string(),
                    identity_ref,
                    access_key_id: pending.access_key_id,
                    cause: err.to_string(),
                },
            );
            return Err(err.into());
        }
        self.advance(
            &mut state,
            RotationEvent::PendingStored {
                secret_id: secret_id.to_string(),
                token: token.to_string(),
                access_key_id: pending.access_key_id.clone(),
            },
        );

        self.identity
            .set_key_status(&identity_ref, &current.access_key_id, KeyStatus::Inactive)?;
        self.advance(
            &mut state,
            RotationEvent::OldKeyDeactivated {
                secret_id: secret_id.to_string(),
                identity_ref,
                access_key_id: current.access_key_id.clone(),
            },
        );

        Ok(RotationOutcome {
            secret_id: secret_id.to_string(),
            token: token.to_string(),
            state,
            access_key_id: pending.access_key_id,
            replaced_key_id: current.access_key_id,
        })
    }

    /// Prove the AWSPENDING credential under `token` works by listing
    /// storage resources with it
    ///
    /// Any failure to build the client or run the probe is a hard stop:
    /// the pending version must not be promoted.
    pub fn set_secret(&self, secret_id: &str, token: &str) -> Result<RotationOutcome> {
        let current = self.read_current(secret_id)?;
        let pending = self.read_pending(secret_id, token)?;
        let mut state = RotationState::OldDeactivated;

        if let Some(pending_identity) = &pending.identity_ref {
            if *pending_identity != current.identity_ref {
                return Err(RotationError::InvalidSecret(format!(
                    "Attempting to modify identity {} other than current identity {}",
                    pending_identity, current.identity_ref
                )));
            }
        }

        debug!(
            secret_id = %secret_id,
            pending_key = %pending.access_key_id,
            current_key = %current.access_key_id,
            "Probing pending credentials"
        );

        let probe = self
            .clients
            .make_storage_client(&pending.credentials())
            .and_then(|client| client.list_resources());

        match probe {
            Ok(resources) => {
                debug!(secret_id = %secret_id, visible = resources.len(), "Probe succeeded");
                self.advance(
                    &mut state,
                    RotationEvent::PendingValidated {
                        secret_id: secret_id.to_string(),
                        token: token.to_string(),
                    },
                );
                Ok(RotationOutcome {
                    secret_id: secret_id.to_string(),
                    token: token.to_string(),
                    state,
                    access_key_id: pending.access_key_id,
                    replaced_key_id: current.access_key_id,
                })
            }
            Err(cause) => {
                self.advance(
                    &mut state,
                    RotationEvent::ValidationFailed {
                        secret_id: secret_id.to_string(),
                        token: token.to_string(),
                        cause: cause.to_string(),
                    },
                );
                Err(RotationError::ValidationFailed {
                    secret_id: secret_id.to_string(),
                    source: cause,
                })
            }
        }
    }
}
