//! Reading credential records out of the secret store

use keyrotate_core::{SecretStore, VersionStage};
use tracing::debug;

use crate::error::{Result, RotationError};
use crate::record::{CredentialRecord, CurrentRecord, FieldNames};

/// Read the secret labelled `stage` and parse it as a credential record
///
/// When `token` is given the read is pinned to that version, and the
/// version must also carry `stage`. Store errors such as a missing
/// version are returned unchanged.
pub fn get_secret(
    store: &dyn SecretStore,
    secret_id: &str,
    stage: VersionStage,
    token: Option<&str>,
) -> Result<CredentialRecord> {
    get_secret_with_fields(store, secret_id, stage, token, &FieldNames::default())
}

/// [`get_secret`] with non-default JSON key names
pub fn get_secret_with_fields(
    store: &dyn SecretStore,
    secret_id: &str,
    stage: VersionStage,
    token: Option<&str>,
    fields: &FieldNames,
) -> Result<CredentialRecord> {
    let payload = fetch_payload(store, secret_id, stage, token)?;
    CredentialRecord::parse(&payload, stage, fields)
}

/// Read AWSCURRENT as a [`CurrentRecord`], which always has its identity
pub fn get_current_secret(
    store: &dyn SecretStore,
    secret_id: &str,
    fields: &FieldNames,
) -> Result<CurrentRecord> {
    let payload = fetch_payload(store, secret_id, VersionStage::Current, None)?;
    CurrentRecord::parse(&payload, fields)
}

fn fetch_payload(
    store: &dyn SecretStore,
    secret_id: &str,
    stage: VersionStage,
    token: Option<&str>,
) -> Result<String> {
    let value = store.get_value(secret_id, stage, token)?;
    debug!(
        secret_id = %secret_id,
        stage = %stage,
        version_id = %value.version_id,
        "Fetched secret value"
    );

    value.secret_string.ok_or_else(|| {
        RotationError::InvalidSecret(format!(
            "Secret {} has no string value at {}.",
            secret_id, stage
        ))
    })
}
