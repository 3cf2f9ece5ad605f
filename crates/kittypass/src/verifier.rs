//! Master password verifier.
//!
//! An Argon2id PHC string with its own salt. It is only ever compared
//! against, never used to derive anything.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{rngs::OsRng, RngCore};

use crate::error::{Result, VaultError};
use crate::kdf::{KdfParams, SALT_LEN};

/// Stored PHC string of the master password
#[derive(Clone, PartialEq, Eq)]
pub struct VerifierHash(String);

impl VerifierHash {
    pub fn from_phc(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for VerifierHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VerifierHash(..)")
    }
}

/// Hash a master password for storage
pub fn hash_password(password: &str, params: &KdfParams) -> Result<VerifierHash> {
    let mut raw = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut raw);
    let salt = SaltString::encode_b64(&raw)
        .map_err(|e| VaultError::malformed(format!("verifier salt ({e})")))?;

    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        params.to_argon2()?,
    );
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| VaultError::malformed(format!("master password hash ({e})")))?;

    Ok(VerifierHash(hash.to_string()))
}

/// Check a master password against its stored hash
///
/// Algorithm, version and costs come from the PHC string itself.
pub fn verify_password(password: &str, verifier: &VerifierHash) -> Result<bool> {
    let parsed = PasswordHash::new(verifier.as_str())
        .map_err(|_| VaultError::malformed("hashed master password"))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(VaultError::malformed(format!("hashed master password ({e})"))),
    }
}
