//! AWS Signature Version 4 implementation

use chrono::{DateTime, NaiveDateTime, Utc};
use hmac::{Hmac, Mac};
use keyrotate_core::{Credentials, ErrorCode, ServiceError};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const AMZ_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const SCOPE_DATE_FORMAT: &str = "%Y%m%d";
const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";
const MAX_CLOCK_SKEW_MINUTES: i64 = 15;

/// Everything except RFC 3986 unreserved characters gets encoded
const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Errors during signing or signature verification
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SigV4Error {
    #[error("Missing authorization header")]
    MissingAuthHeader,

    #[error("Invalid authorization header format")]
    InvalidAuthFormat,

    #[error("Unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Missing credential")]
    MissingCredential,

    #[error("Invalid credential format")]
    InvalidCredentialFormat,

    #[error("Missing signed headers")]
    MissingSignedHeaders,

    #[error("Missing signature")]
    MissingSignature,

    #[error("Missing x-amz-date header")]
    MissingDate,

    #[error("Invalid x-amz-date: {0}")]
    InvalidDate(String),

    #[error("Request time too skewed")]
    RequestTimeTooSkewed,

    #[error("The AWS Access Key Id you provided does not exist in our records: {0}")]
    InvalidAccessKeyId(String),

    #[error("The provided x-amz-content-sha256 header does not match the payload")]
    ContentHashMismatch,

    #[error("Signature mismatch")]
    SignatureMismatch,
}

impl From<SigV4Error> for ServiceError {
    fn from(err: SigV4Error) -> Self {
        let code = match err {
            SigV4Error::InvalidAccessKeyId(_) => ErrorCode::InvalidAccessKeyId,
            SigV4Error::SignatureMismatch | SigV4Error::ContentHashMismatch => {
                ErrorCode::SignatureDoesNotMatch
            }
            _ => ErrorCode::AccessDenied,
        };
        ServiceError::new(code, err.to_string())
    }
}

/// Looks up the secret half of an access key
///
/// Implementations return `None` for unknown keys and for keys that may
/// not currently authenticate.
pub trait SecretKeyResolver: Send + Sync {
    fn resolve_secret(&self, access_key_id: &str) -> Option<String>;
}

/// Minimal HTTP request representation that can be signed and verified
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, host: &str, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            query: Vec::new(),
            headers: vec![("host".to_string(), host.to_string())],
            body: Vec::new(),
        }
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.remove_header(name);
        self.headers.push((name.to_lowercase(), value.into()));
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }
}

/// Parsed SigV4 authorization header
#[derive(Debug)]
pub struct AuthorizationHeader {
    pub algorithm: String,
    pub access_key: String,
    pub date: String,
    pub region: String,
    pub service: String,
    pub signed_headers: Vec<String>,
    pub signature: String,
}

/// Parse an AWS SigV4 authorization header
///
/// Format: AWS4-HMAC-SHA256 Credential=AKID/DATE/REGION/SERVICE/aws4_request,
///         SignedHeaders=host;x-amz-date, Signature=HEX
pub fn parse_authorization_header(header: &str) -> Result<AuthorizationHeader, SigV4Error> {
    let (algorithm, components) = header
        .split_once(' ')
        .ok_or(SigV4Error::InvalidAuthFormat)?;

    let mut credential = None;
    let mut signed_headers = None;
    let mut signature = None;

    for component in components.split(',').map(str::trim) {
        let Some((key, value)) = component.split_once('=') else {
            continue;
        };

        match key {
            "Credential" => credential = Some(value),
            "SignedHeaders" => signed_headers = Some(value),
            "Signature" => signature = Some(value),
            _ => {}
        }
    }

    let credential = credential.ok_or(SigV4Error::MissingCredential)?;
    let credential_parts: Vec<&str> = credential.split('/').collect();
    if credential_parts.len() != 5 || credential_parts[4] != "aws4_request" {
        return Err(SigV4Error::InvalidCredentialFormat);
    }

    let signed_headers = signed_headers.ok_or(SigV4Error::MissingSignedHeaders)?;
    let signature = signature.ok_or(SigV4Error::MissingSignature)?;

    Ok(AuthorizationHeader {
        algorithm: algorithm.to_string(),
        access_key: credential_parts[0].to_string(),
        date: credential_parts[1].to_string(),
        region: credential_parts[2].to_string(),
        service: credential_parts[3].to_string(),
        signed_headers: signed_headers.split(';').map(String::from).collect(),
        signature: signature.to_string(),
    })
}

/// Sign a string using HMAC-SHA256
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Derive the signing key
fn derive_signing_key(secret_key: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{}", secret_key).as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

fn canonical_uri(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/')
        .map(|segment| utf8_percent_encode(segment, URI_ENCODE_SET).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn canonical_query_string(query: &[(String, String)]) -> String {
    let mut pairs: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| {
            (
                utf8_percent_encode(k, URI_ENCODE_SET).to_string(),
                utf8_percent_encode(v, URI_ENCODE_SET).to_string(),
            )
        })
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Create the canonical request string
fn create_canonical_request(
    request: &HttpRequest,
    signed_headers: &[String],
    payload_hash: &str,
) -> String {
    let canonical_headers: String = signed_headers
        .iter()
        .filter_map(|h| {
            request
                .header(h)
                .map(|v| format!("{}:{}\n", h.to_lowercase(), v.trim()))
        })
        .collect();

    format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        request.method,
        canonical_uri(&request.path),
        canonical_query_string(&request.query),
        canonical_headers,
        signed_headers.join(";"),
        payload_hash
    )
}

/// Create the string to sign
fn create_string_to_sign(timestamp: &str, scope: &str, canonical_request: &str) -> String {
    let canonical_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));
    format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM, timestamp, scope, canonical_hash
    )
}

/// Sign `request` in place, adding the date, payload hash and
/// authorization headers
pub fn sign_request(
    request: &mut HttpRequest,
    credentials: &Credentials,
    region: &str,
    service: &str,
    timestamp: DateTime<Utc>,
) {
    let amz_date = timestamp.format(AMZ_DATE_FORMAT).to_string();
    let date = timestamp.format(SCOPE_DATE_FORMAT).to_string();
    let payload_hash = hex::encode(Sha256::digest(&request.body));

    request.remove_header("authorization");
    request.set_header("x-amz-date", amz_date.as_str());
    request.set_header("x-amz-content-sha256", payload_hash.as_str());

    let mut signed_headers: Vec<String> = request
        .headers
        .iter()
        .map(|(k, _)| k.to_lowercase())
        .collect();
    signed_headers.sort();
    signed_headers.dedup();

    let canonical_request = create_canonical_request(request, &signed_headers, &payload_hash);
    let scope = format!("{}/{}/{}/aws4_request", date, region, service);
    let string_to_sign = create_string_to_sign(&amz_date, &scope, &canonical_request);
    let signing_key = derive_signing_key(&credentials.secret_access_key, &date, region, service);
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

    request.set_header(
        "authorization",
        format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM,
            credentials.access_key_id,
            scope,
            signed_headers.join(";"),
            signature
        ),
    );
}

/// Verify the SigV4 signature on `request`
///
/// Returns the access key id the request was signed with.
pub fn verify_request(
    request: &HttpRequest,
    resolver: &dyn SecretKeyResolver,
    now: DateTime<Utc>,
) -> Result<String, SigV4Error> {
    let header = request
        .header("authorization")
        .ok_or(SigV4Error::MissingAuthHeader)?;
    let auth = parse_authorization_header(header)?;

    if auth.algorithm != ALGORITHM {
        return Err(SigV4Error::UnsupportedAlgorithm(auth.algorithm));
    }
    if !auth.signed_headers.iter().any(|h| h == "host") {
        return Err(SigV4Error::InvalidAuthFormat);
    }

    let amz_date = request.header("x-amz-date").ok_or(SigV4Error::MissingDate)?;
    let timestamp = NaiveDateTime::parse_from_str(amz_date, AMZ_DATE_FORMAT)
        .map_err(|_| SigV4Error::InvalidDate(amz_date.to_string()))?
        .and_utc();
    if (now - timestamp).num_minutes().abs() > MAX_CLOCK_SKEW_MINUTES {
        return Err(SigV4Error::RequestTimeTooSkewed);
    }
    if !amz_date.starts_with(&auth.date) {
        return Err(SigV4Error::InvalidCredentialFormat);
    }

    let secret_key = resolver
        .resolve_secret(&auth.access_key)
        .ok_or_else(|| SigV4Error::InvalidAccessKeyId(auth.access_key.clone()))?;

    let body_hash = hex::encode(Sha256::digest(&request.body));
    let payload_hash = match request.header("x-amz-content-sha256") {
        Some(UNSIGNED_PAYLOAD) => UNSIGNED_PAYLOAD.to_string(),
        Some(claimed) if claimed == body_hash => body_hash,
        Some(_) => return Err(SigV4Error::ContentHashMismatch),
        None => body_hash,
    };

    let canonical_request = create_canonical_request(request, &auth.signed_headers, &payload_hash);
    let scope = format!(
        "{}/{}/{}/aws4_request",
        auth.date, auth.region, auth.service
    );
    let string_to_sign = create_string_to_sign(amz_date, &scope, &canonical_request);
    let signing_key = derive_signing_key(&secret_key, &auth.date, &auth.region, &auth.service);

    let provided = hex::decode(&auth.signature).map_err(|_| SigV4Error::SignatureMismatch)?;
    let mut mac = HmacSha256::new_from_slice(&signing_key).expect("HMAC can take key of any size");
    mac.update(string_to_sign.as_bytes());
    mac.verify_slice(&provided).map_err(|_| {
        debug!(access_key_id = %auth.access_key, "Signature mismatch");
        SigV4Error::SignatureMismatch
    })?;

    Ok(auth.access_key)
}
