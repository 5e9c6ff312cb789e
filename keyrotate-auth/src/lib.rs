//! AWS authentication for keyrotate
//!
//! Implements AWS Signature Version 4 signing for outgoing probe requests
//! and verification on the emulated storage service.

pub mod sigv4;

pub use sigv4::{sign_request, verify_request, HttpRequest, SecretKeyResolver, SigV4Error};
