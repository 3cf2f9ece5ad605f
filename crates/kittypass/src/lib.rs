//! kittypass - Password vaults for the terminal
//!
//! Each vault derives its own key from a master password (Argon2id over a
//! per-vault salt) and uses it to seal every login secret with
//! XChaCha20-Poly1305. The master password itself is never stored, only an
//! Argon2id verifier hash.
//!
//! Changing a master password re-encrypts the whole vault in a single
//! SQLite transaction: either every login moves to the new key or none do.

pub mod cipher;
pub mod error;
pub mod generator;
pub mod kdf;
pub mod login;
pub mod models;
pub mod storage;
pub mod vault;
pub mod verifier;

pub use cipher::{Cipher, Ciphertext, XChaCha20Poly1305Cipher};
pub use error::{Entity, Result, VaultError};
pub use generator::PasswordGenerator;
pub use kdf::{CryptoParams, KdfParams, Salt};
pub use models::{
    DeleteReport, Login, LoginChanges, LoginSummary, UpdateReport, VaultId, VaultSummary,
};
pub use storage::Storage;
pub use vault::{LockedVault, OpenVault, VaultRef};
