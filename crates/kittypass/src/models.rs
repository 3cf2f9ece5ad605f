//! Typed records exchanged with storage

use chrono::{DateTime, Utc};
use serde::Serialize;
use zeroize::Zeroizing;

use crate::cipher::Ciphertext;
use crate::kdf::{KdfParams, Salt};
use crate::verifier::VerifierHash;

/// Opaque vault identifier (UUID v4)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct VaultId(String);

impl VaultId {
    pub(crate) fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Login identifier, unique per (vault, name)
    pub fn login_id(&self, login_name: &str) -> String {
        format!("{}_{}", self.0, login_name)
    }
}

impl std::fmt::Display for VaultId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A vault row as persisted
#[derive(Debug, Clone, PartialEq)]
pub struct VaultRecord {
    pub id: VaultId,
    pub name: String,
    pub description: String,
    pub verifier: VerifierHash,
    pub salt: Salt,
    pub kdf: KdfParams,
    pub created_at: DateTime<Utc>,
}

/// Vault metadata for listings
#[derive(Debug, Clone, Serialize)]
pub struct VaultSummary {
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A login row as persisted (secret still encrypted)
#[derive(Debug, Clone, PartialEq)]
pub struct StoredLogin {
    pub name: String,
    pub username: String,
    pub ciphertext: Ciphertext,
    pub created_at: DateTime<Utc>,
}

/// Login metadata for listings
#[derive(Debug, Clone, Serialize)]
pub struct LoginSummary {
    pub vault_name: String,
    pub name: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// A decrypted login
pub struct Login {
    pub name: String,
    pub username: String,
    pub secret: Zeroizing<String>,
}

impl std::fmt::Debug for Login {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Login")
            .field("name", &self.name)
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Metadata changes to a login
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginChanges {
    pub name: Option<String>,
    pub username: Option<String>,
}

impl LoginChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.username.is_none()
    }
}

/// A login secret re-encrypted under a new key
#[derive(Debug, Clone)]
pub struct ReencryptedLogin {
    pub name: String,
    pub ciphertext: Ciphertext,
}

/// Everything a re-key replaces, applied as one unit
#[derive(Debug, Clone)]
pub struct RekeyMaterial {
    pub verifier: VerifierHash,
    pub salt: Salt,
    pub kdf: KdfParams,
    pub logins: Vec<ReencryptedLogin>,
}

/// Changes to a vault row
#[derive(Debug, Clone, Default)]
pub struct VaultChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub rekey: Option<RekeyMaterial>,
}

impl VaultChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.rekey.is_none()
    }
}

/// Row counts touched by a vault update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    pub updated_logins: usize,
    pub updated_vaults: usize,
}

/// Row counts removed by a vault deletion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub deleted_logins: usize,
    pub deleted_vaults: usize,
}
