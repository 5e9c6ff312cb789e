//! Injected logging capability for rotation milestones

use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::state::RotationState;

/// A milestone reached (or missed) during a rotation phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationEvent {
    KeyCreated {
        secret_id: String,
        identity_ref: String,
        access_key_id: String,
    },
    PendingStored {
        secret_id: String,
        token: String,
        access_key_id: String,
    },
    OldKeyDeactivated {
        secret_id: String,
        identity_ref: String,
        access_key_id: String,
    },
    /// A created key could not be persisted and is left active
    KeyOrphaned {
        secret_id: String,
        identity_ref: String,
        access_key_id: String,
        cause: String,
    },
    PendingValidated {
        secret_id: String,
        token: String,
    },
    ValidationFailed {
        secret_id: String,
        token: String,
        cause: String,
    },
}

impl RotationEvent {
    /// The state this event moves the attempt into, if any
    pub fn state(&self) -> Option<RotationState> {
        match self {
            Self::KeyCreated { .. } => Some(RotationState::KeyCreated),
            Self::PendingStored { .. } => Some(RotationState::PendingStored),
            Self::OldKeyDeactivated { .. } => Some(RotationState::OldDeactivated),
            Self::PendingValidated { .. } => Some(RotationState::Validated),
            Self::ValidationFailed { .. } => Some(RotationState::ValidationFailed),
            Self::KeyOrphaned { .. } => None,
        }
    }
}

/// Sink for rotation milestones
pub trait RotationLog: Send + Sync {
    fn record(&self, event: &RotationEvent);
}

/// Emits milestones as `tracing` events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl RotationLog for TracingLog {
    fn record(&self, event: &RotationEvent) {
        match event {
            RotationEvent::KeyCreated {
                secret_id,
                identity_ref,
                access_key_id,
            } => info!(
                secret_id = %secret_id,
                identity = %identity_ref,
                access_key_id = %access_key_id,
                state = %RotationState::KeyCreated,
                "rotate_secret: created new access key"
            ),
            RotationEvent::PendingStored {
                secret_id,
                token,
                access_key_id,
            } => info!(
                secret_id = %secret_id,
                token = %token,
                access_key_id = %access_key_id,
                state = %RotationState::PendingStored,
                "rotate_secret: stored new access key as AWSPENDING"
            ),
            RotationEvent::OldKeyDeactivated {
                secret_id,
                identity_ref,
                access_key_id,
            } => info!(
                secret_id = %secret_id,
                identity = %identity_ref,
                access_key_id = %access_key_id,
                state = %RotationState::OldDeactivated,
                "rotate_secret: deactivated old access key"
            ),
            RotationEvent::KeyOrphaned {
                secret_id,
                identity_ref,
                access_key_id,
                cause,
            } => warn!(
                secret_id = %secret_id,
                identity = %identity_ref,
                access_key_id = %access_key_id,
                cause = %cause,
                "rotate_secret: new access key was not stored and remains active"
            ),
            RotationEvent::PendingValidated { secret_id, token } => info!(
                secret_id = %secret_id,
                token = %token,
                state = %RotationState::Validated,
                "set_secret: validated pending secret"
            ),
            RotationEvent::ValidationFailed {
                secret_id,
                token,
                cause,
            } => error!(
                secret_id = %secret_id,
                token = %token,
                cause = %cause,
                state = %RotationState::ValidationFailed,
                "set_secret: failed to validate pending secret"
            ),
        }
    }
}

/// Keeps milestones in memory, in order
#[derive(Debug, Default)]
pub struct MemoryLog {
    events: Mutex<Vec<RotationEvent>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RotationEvent> {
        self.events.lock().clone()
    }

    /// States reached so far, in order
    pub fn states(&self) -> Vec<RotationState> {
        self.events
            .lock()
            .iter()
            .filter_map(RotationEvent::state)
            .collect()
    }
}

impl RotationLog for MemoryLog {
    fn record(&self, event: &RotationEvent) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_log_keeps_order() {
        let log = MemoryLog::new();
        log.record(&RotationEvent::KeyCreated {
            secret_id: "s".into(),
            identity_ref: "svc-a".into(),
            access_key_id: "AKIANEW".into(),
        });
        log.record(&RotationEvent::PendingStored {
            secret_id: "s".into(),
            token: "t".into(),
            access_key_id: "AKIANEW".into(),
        });

        assert_eq!(log.events().len(), 2);
        assert_eq!(
            log.states(),
            vec![RotationState::KeyCreated, RotationState::PendingStored]
        );
    }

    #[test]
    fn test_orphaned_key_has_no_state() {
        let event = RotationEvent::KeyOrphaned {
            secret_id: "s".into(),
            identity_ref: "svc-a".into(),
            access_key_id: "AKIANEW".into(),
            cause: "AccessDenied".into(),
        };
        assert_eq!(event.state(), None);
    }

    #[test]
    fn test_tracing_log_accepts_every_event() {
        let log = TracingLog;
        log.record(&RotationEvent::PendingValidated {
            secret_id: "s".into(),
            token: "t".into(),
        });
        log.record(&RotationEvent::ValidationFailed {
            secret_id: "s".into(),
            token: "t".into(),
            cause: "SignatureDoesNotMatch".into(),
        });
    }
}
