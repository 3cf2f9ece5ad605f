//! Argon2id key derivation for master password -> vault key.

use argon2::Argon2;
use kittypass_core::Argon2Cost;
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};

/// Length of a freshly generated salt
pub const SALT_LEN: usize = 16;

/// Length of a derived key
pub const KEY_LEN: usize = 32;

/// Argon2id parameters persisted alongside each vault salt.
///
/// Defaults live in [`kittypass_core::Config`]; this is the validated
/// runtime form of an [`Argon2Cost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub m_cost: u32,
    /// Number of iterations
    pub t_cost: u32,
    /// Degree of parallelism
    pub p_cost: u32,
}

impl From<Argon2Cost> for KdfParams {
    fn from(cost: Argon2Cost) -> Self {
        Self {
            m_cost: cost.m_cost,
            t_cost: cost.t_cost,
            p_cost: cost.p_cost,
        }
    }
}

impl KdfParams {
    pub(crate) fn to_argon2(self) -> Result<argon2::Params> {
        argon2::Params::new(self.m_cost, self.t_cost, self.p_cost, Some(KEY_LEN))
            .map_err(|e| VaultError::malformed(format!("argon2 parameters ({e})")))
    }
}

/// Costs used when new secrets material is produced (vault creation, re-key).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CryptoParams {
    /// Derivation key cost, stored with the vault
    pub kdf: KdfParams,
    /// Verifier hash cost, embedded in the PHC string
    pub verifier: KdfParams,
}

impl From<&kittypass_core::Config> for CryptoParams {
    fn from(config: &kittypass_core::Config) -> Self {
        Self {
            kdf: config.kdf.into(),
            verifier: config.verifier.into(),
        }
    }
}

impl Default for CryptoParams {
    fn default() -> Self {
        Self::from(&kittypass_core::Config::default())
    }
}

#[cfg(test)]
impl CryptoParams {
    /// Low costs so the test suite stays fast
    pub(crate) fn for_tests() -> Self {
        let cheap = KdfParams {
            m_cost: 256,
            t_cost: 1,
            p_cost: 1,
        };
        Self {
            kdf: cheap,
            verifier: cheap,
        }
    }
}

/// Random per-vault salt
#[derive(Clone, PartialEq, Eq)]
pub struct Salt(Vec<u8>);

impl Salt {
    /// Draw a new salt from the OS CSPRNG
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; SALT_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        hex::decode(s)
            .map(Self)
            .map_err(|_| VaultError::malformed("hex salt"))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for Salt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Salt({})", self.to_hex())
    }
}

/// Derive a 256-bit key from a password and salt using Argon2id.
pub fn derive_key(password: &[u8], salt: &Salt, params: &KdfParams) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    if salt.as_bytes().len() < SALT_LEN {
        return Err(VaultError::malformed(format!(
            "salt ({} bytes, need at least {})",
            salt.as_bytes().len(),
            SALT_LEN
        )));
    }

    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        params.to_argon2()?,
    );

    let mut output = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(password, salt.as_bytes(), &mut output[..])
        .map_err(|e| VaultError::malformed(format!("key derivation input ({e})")))?;

    Ok(output)
}
