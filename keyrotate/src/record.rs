//! The credential record stored in a rotated secret

use keyrotate_core::{Credentials, VersionStage};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{Result, RotationError};

/// Accepted on read when the canonical key is absent
const ACCESS_KEY_ID_ALIAS: &str = "access_key_id";
const SECRET_ACCESS_KEY_ALIAS: &str = "secret_access_key";

/// JSON keys of the secret shape
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FieldNames {
    #[serde(default = "default_access_key_id")]
    pub access_key_id: String,

    #[serde(default = "default_secret_access_key")]
    pub secret_access_key: String,

    #[serde(default = "default_identity_ref")]
    pub identity_ref: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            access_key_id: default_access_key_id(),
            secret_access_key: default_secret_access_key(),
            identity_ref: default_identity_ref(),
        }
    }
}

fn default_access_key_id() -> String {
    "aws_access_key_id".to_string()
}

fn default_secret_access_key() -> String {
    "aws_secret_access_key".to_string()
}

fn default_identity_ref() -> String {
    "iam_user".to_string()
}

/// An access key pair plus the identity that owns it
///
/// `identity_ref` is mandatory on AWSCURRENT records and optional on
/// AWSPENDING ones.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub identity_ref: Option<String>,
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("identity_ref", &self.identity_ref)
            .finish()
    }
}

impl CredentialRecord {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        identity_ref: Option<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            identity_ref,
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.access_key_id, &self.secret_access_key)
    }

    /// Decode a secret string and pull out the fields `stage` requires
    pub fn parse(payload: &str, stage: VersionStage, fields: &FieldNames) -> Result<Self> {
        Self::from_document(&decode(payload)?, stage, fields)
    }

    /// Build a record from a decoded secret, enforcing the stage's role
    pub fn from_document(
        document: &Map<String, Value>,
        stage: VersionStage,
        fields: &FieldNames,
    ) -> Result<Self> {
        if stage == VersionStage::Current {
            return CurrentRecord::from_document(document, fields).map(Self::from);
        }

        let (access_key_id, secret_access_key) = key_pair(document, stage, fields)?;
        let identity_ref = optional(document, &fields.identity_ref, None, stage)?;
        Ok(Self {
            access_key_id,
            secret_access_key,
            identity_ref,
        })
    }

    /// Serialize with the canonical key names
    pub fn to_json(&self, fields: &FieldNames) -> String {
        let mut document = Map::new();
        document.insert(
            fields.access_key_id.clone(),
            Value::String(self.access_key_id.clone()),
        );
        document.insert(
            fields.secret_access_key.clone(),
            Value::String(self.secret_access_key.clone()),
        );
        if let Some(identity_ref) = &self.identity_ref {
            document.insert(
                fields.identity_ref.clone(),
                Value::String(identity_ref.clone()),
            );
        }
        Value::Object(document).to_string()
    }
}

/// An AWSCURRENT record, which always names the identity owning the key
#[derive(Clone, PartialEq, Eq)]
pub struct CurrentRecord {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub identity_ref: String,
}

impl fmt::Debug for CurrentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurrentRecord")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("identity_ref", &self.identity_ref)
            .finish()
    }
}

impl CurrentRecord {
    pub fn parse(payload: &str, fields: &FieldNames) -> Result<Self> {
        Self::from_document(&decode(payload)?, fields)
    }

    pub fn from_document(document: &Map<String, Value>, fields: &FieldNames) -> Result<Self> {
        let stage = VersionStage::Current;
        let (access_key_id, secret_access_key) = key_pair(document, stage, fields)?;
        let identity_ref = required(document, &fields.identity_ref, None, stage)?;
        Ok(Self {
            access_key_id,
            secret_access_key,
            identity_ref,
        })
    }
}

impl From<CurrentRecord> for CredentialRecord {
    fn from(current: CurrentRecord) -> Self {
        Self::new(
            current.access_key_id,
            current.secret_access_key,
            Some(current.identity_ref),
        )
    }
}

fn decode(payload: &str) -> Result<Map<String, Value>> {
    let value: Value = serde_json::from_str(payload)
        .map_err(|_| RotationError::InvalidSecret("Secret is not valid JSON.".to_string()))?;
    match value {
        Value::Object(document) => Ok(document),
        _ => Err(RotationError::InvalidSecret(
            "Secret JSON must be an object.".to_string(),
        )),
    }
}

fn key_pair(
    document: &Map<String, Value>,
    stage: VersionStage,
    fields: &FieldNames,
) -> Result<(String, String)> {
    let access_key_id = required(
        document,
        &fields.access_key_id,
        Some(ACCESS_KEY_ID_ALIAS),
        stage,
    )?;
    let secret_access_key = required(
        document,
        &fields.secret_access_key,
        Some(SECRET_ACCESS_KEY_ALIAS),
        stage,
    )?;
    Ok((access_key_id, secret_access_key))
}

fn optional(
    document: &Map<String, Value>,
    key: &str,
    alias: Option<&str>,
    stage: VersionStage,
) -> Result<Option<String>> {
    let value = document
        .get(key)
        .or_else(|| alias.and_then(|a| document.get(a)));
    match value {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(RotationError::InvalidSecret(format!(
            "Key '{}' in {} secret must be a string.",
            key, stage
        ))),
    }
}

fn required(
    document: &Map<String, Value>,
    key: &str,
    alias: Option<&str>,
    stage: VersionStage,
) -> Result<String> {
    optional(document, key, alias, stage)?.ok_or_else(|| {
        RotationError::InvalidSecret(format!(
            "Missing required key '{}' in {} secret.",
            key, stage
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> FieldNames {
        FieldNames::default()
    }

    #[test]
    fn test_parse_current_record() {
        let record = CredentialRecord::parse(
            r#"{"aws_access_key_id":"AKIAOLD","aws_secret_access_key":"old","iam_user":"svc-a"}"#,
            VersionStage::Current,
            &fields(),
        )
        .unwrap();

        assert_eq!(
            record,
            CredentialRecord::new("AKIAOLD", "old", Some("svc-a".to_string()))
        );
    }

    #[test]
    fn test_short_aliases_accepted() {
        let record = CredentialRecord::parse(
            r#"{"access_key_id":"AKIANEW","secret_access_key":"badsecret"}"#,
            VersionStage::Pending,
            &fields(),
        )
        .unwrap();

        assert_eq!(record.access_key_id, "AKIANEW");
        assert_eq!(record.secret_access_key, "badsecret");
        assert_eq!(record.identity_ref, None);
    }

    #[test]
    fn test_current_requires_identity() {
        let err = CredentialRecord::parse(
            r#"{"aws_access_key_id":"AKIAOLD","aws_secret_access_key":"old"}"#,
            VersionStage::Current,
            &fields(),
        )
        .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Missing required key 'iam_user' in AWSCURRENT secret."
        );
    }

    #[test]
    fn test_missing_fields_reported_in_order() {
        let err = CredentialRecord::parse("{}", VersionStage::Pending, &fields()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required key 'aws_access_key_id' in AWSPENDING secret."
        );

        let err = CredentialRecord::parse(
            r#"{"aws_access_key_id":"AKIANEW"}"#,
            VersionStage::Pending,
            &fields(),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required key 'aws_secret_access_key' in AWSPENDING secret."
        );
    }

    #[test]
    fn test_invalid_json() {
        let err =
            CredentialRecord::parse("{not json", VersionStage::Current, &fields()).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "Secret is not valid JSON.");
    }

    #[test]
    fn test_non_object_and_non_string_values() {
        let err = CredentialRecord::parse("[1, 2]", VersionStage::Current, &fields()).unwrap_err();
        assert!(err.is_validation());

        let err = CredentialRecord::parse(
            r#"{"aws_access_key_id":42,"aws_secret_access_key":"s"}"#,
            VersionStage::Pending,
            &fields(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("must be a string"));
    }

    #[test]
    fn test_custom_field_names() {
        let fields = FieldNames {
            access_key_id: "key".to_string(),
            secret_access_key: "secret".to_string(),
            identity_ref: "user".to_string(),
        };
        let record = CredentialRecord::new("AKIA1", "s1", Some("svc".to_string()));

        let json = record.to_json(&fields);
        assert_eq!(json, r#"{"key":"AKIA1","secret":"s1","user":"svc"}"#);

        let parsed = CredentialRecord::parse(&json, VersionStage::Current, &fields).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_current_record_owns_its_identity() {
        let current = CurrentRecord::parse(
            r#"{"access_key_id":"AKIAOLD","secret_access_key":"old","iam_user":"svc-a"}"#,
            &fields(),
        )
        .unwrap();
        assert_eq!(current.identity_ref, "svc-a");
        assert_eq!(current.access_key_id, "AKIAOLD");
        assert!(!format!("{:?}", current).contains("\"old\""));

        let err = CurrentRecord::parse(
            r#"{"aws_access_key_id":"AKIAOLD","aws_secret_access_key":"old"}"#,
            &fields(),
        )
        .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "Missing required key 'iam_user' in AWSCURRENT secret."
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let record = CredentialRecord::new("AKIA1", "topsecret", None);
        assert!(!format!("{:?}", record).contains("topsecret"));
    }
}
