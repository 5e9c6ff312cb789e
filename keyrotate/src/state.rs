//! Per-attempt rotation state

use std::fmt;

/// Progress of one rotation attempt, keyed by its token
///
/// `Validated` and `ValidationFailed` end the attempt. A failed attempt
/// needs outside remediation: the old key stays deactivated and the
/// pending version is never promoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationState {
    NoPending,
    KeyCreated,
    PendingStored,
    OldDeactivated,
    Validated,
    ValidationFailed,
}

impl RotationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoPending => "NO_PENDING",
            Self::KeyCreated => "KEY_CREATED",
            Self::PendingStored => "PENDING_STORED",
            Self::OldDeactivated => "OLD_DEACTIVATED",
            Self::Validated => "VALIDATED",
            Self::ValidationFailed => "VALIDATION_FAILED",
        }
    }

    /// Whether `next` directly follows `self`
    pub fn can_advance_to(&self, next: RotationState) -> bool {
        matches!(
            (self, next),
            (Self::NoPending, Self::KeyCreated)
                | (Self::KeyCreated, Self::PendingStored)
                | (Self::PendingStored, Self::OldDeactivated)
                | (Self::OldDeactivated, Self::Validated | Self::ValidationFailed)
        )
    }
}

impl fmt::Display for RotationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
