//! AWS Secrets Manager emulation for keyrotate
//!
//! Provides in-memory secrets storage with support for:
//! - CreateSecret, GetSecretValue, PutSecretValue
//! - UpdateSecretVersionStage, DescribeSecret
//! - Staging labels (AWSCURRENT, AWSPENDING, AWSPREVIOUS)

mod storage;

pub use storage::{
    Secret, SecretVersion, SecretsManagerError, SecretsManagerStorage, AWSCURRENT, AWSPENDING,
    AWSPREVIOUS,
};
