//! AWS IAM emulation for keyrotate
//!
//! Provides users and access keys: key creation, activation/deactivation,
//! deletion and lookup. Active keys can authenticate signed requests
//! against the emulated storage service.

mod storage;

pub use storage::{IamError, IamStorage, User, MAX_ACCESS_KEYS_PER_USER};
