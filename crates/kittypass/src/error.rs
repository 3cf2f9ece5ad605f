//! Vault error types

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, VaultError>;

/// What kind of record an error is about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Vault,
    Login,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Entity::Vault => write!(f, "vault"),
            Entity::Login => write!(f, "login"),
        }
    }
}

/// Errors produced by vault and login operations
#[derive(Error, Debug)]
pub enum VaultError {
    /// Unique constraint collision on a vault name or a login name
    #[error("a {kind} named '{name}' already exists")]
    DuplicateName { kind: Entity, name: String },

    #[error("{kind} not found: {name}")]
    NotFound { kind: Entity, name: String },

    /// The master password does not match the stored verifier
    #[error("incorrect password")]
    IncorrectPassword,

    /// Authentication tag mismatch: tampered blob or wrong key
    #[error("failed to decrypt")]
    DecryptionFailed,

    #[error("invalid encryption key length {0}, expected 32")]
    InvalidKeyLength(usize),

    #[error("data for {0} is malformed, could not be processed")]
    MalformedData(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A transaction was rolled back, nothing was written
    #[error("update aborted, changes were not saved: {0}")]
    PartialUpdateAborted(String),

    #[error("invalid password length {got}, expected between {min} and {max}")]
    InvalidLength { min: usize, max: usize, got: usize },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl VaultError {
    pub(crate) fn vault_not_found(name: &str) -> Self {
        VaultError::NotFound {
            kind: Entity::Vault,
            name: name.to_string(),
        }
    }

    pub(crate) fn login_not_found(name: &str) -> Self {
        VaultError::NotFound {
            kind: Entity::Login,
            name: name.to_string(),
        }
    }

    pub(crate) fn duplicate(kind: Entity, name: &str) -> Self {
        VaultError::DuplicateName {
            kind,
            name: name.to_string(),
        }
    }

    pub(crate) fn malformed(what: impl Into<String>) -> Self {
        VaultError::MalformedData(what.into())
    }
}
