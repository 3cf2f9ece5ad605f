//! Authenticated encryption of login secrets.
//!
//! [`Cipher`] keeps the backend swappable; [`XChaCha20Poly1305Cipher`] is
//! the one vaults use. Blob layout: `[nonce: 24 bytes][ciphertext][tag: 16 bytes]`.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    Key, XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};
use crate::kdf::KEY_LEN;

/// Nonce size for XChaCha20-Poly1305 (24 bytes)
const NONCE_LEN: usize = 24;

/// Poly1305 tag size
const TAG_LEN: usize = 16;

/// Authenticated encryption backend.
pub trait Cipher: Send + Sync {
    /// Encrypt `plaintext`, returning a self-contained blob.
    fn encrypt(&self, key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt a blob produced by [`encrypt`](Self::encrypt).
    ///
    /// Fails with [`VaultError::DecryptionFailed`] on any tag mismatch.
    fn decrypt(&self, key: &[u8], blob: &[u8]) -> Result<Vec<u8>>;
}

/// XChaCha20-Poly1305 AEAD cipher.
#[derive(Debug, Default, Clone, Copy)]
pub struct XChaCha20Poly1305Cipher;

fn check_key(key: &[u8]) -> Result<&Key> {
    if key.len() != KEY_LEN {
        return Err(VaultError::InvalidKeyLength(key.len()));
    }
    Ok(Key::from_slice(key))
}

impl Cipher for XChaCha20Poly1305Cipher {
    fn encrypt(&self, key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = XChaCha20Poly1305::new(check_key(key)?);

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = XNonce::from_slice(&nonce_bytes);

        let sealed = cipher.encrypt(nonce, plaintext).map_err(|e| {
            tracing::error!("encryption failed: {e}");
            VaultError::malformed("plaintext secret")
        })?;

        let mut blob = Vec::with_capacity(NONCE_LEN + sealed.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&sealed);
        Ok(blob)
    }

    fn decrypt(&self, key: &[u8], blob: &[u8]) -> Result<Vec<u8>> {
        let cipher = XChaCha20Poly1305::new(check_key(key)?);

        if blob.len() < NONCE_LEN + TAG_LEN {
            return Err(VaultError::DecryptionFailed);
        }

        let (nonce_bytes, sealed) = blob.split_at(NONCE_LEN);
        cipher
            .decrypt(XNonce::from_slice(nonce_bytes), sealed)
            .map_err(|_| VaultError::DecryptionFailed)
    }
}

/// An encrypted login secret as stored
#[derive(Clone, PartialEq, Eq)]
pub struct Ciphertext(Vec<u8>);

impl Ciphertext {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        hex::decode(s)
            .map(Self)
            .map_err(|_| VaultError::malformed("hex encrypted password"))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for Ciphertext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ciphertext({} bytes)", self.0.len())
    }
}

/// Encrypt a secret string
pub fn seal_secret(cipher: &dyn Cipher, key: &[u8], secret: &str) -> Result<Ciphertext> {
    cipher.encrypt(key, secret.as_bytes()).map(Ciphertext)
}

/// Decrypt a stored secret back into a string
pub fn open_secret(cipher: &dyn Cipher, key: &[u8], ciphertext: &Ciphertext) -> Result<Zeroizing<String>> {
    let bytes = Zeroizing::new(cipher.decrypt(key, ciphertext.as_bytes())?);
    let text = std::str::from_utf8(&bytes).map_err(|_| VaultError::malformed("decrypted password"))?;
    Ok(Zeroizing::new(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = [0x42; 32];

    #[test]
    fn test_round_trip() {
        let cipher = XChaCha20Poly1305Cipher;
        let encrypted = cipher.encrypt(&KEY, b"hello vault").unwrap();
        let decrypted = cipher.decrypt(&KEY, &encrypted).unwrap();
        assert_eq!(decrypted, b"hello vault");
    }

    #[test]
    fn test_empty_and_unicode_round_trip() {
        let cipher = XChaCha20Poly1305Cipher;
        let long = "x".repeat(4096);
        for secret in ["", "pässwörd-🐱", long.as_str()] {
            let sealed = seal_secret(&cipher, &KEY, secret).unwrap();
            let opened = open_secret(&cipher, &KEY, &sealed).unwrap();
            assert_eq!(opened.as_str(), secret);
        }
    }

    #[test]
    fn test_wrong_key_fails() {
        let cipher = XChaCha20Poly1305Cipher;
        let encrypted = cipher.encrypt(&KEY, b"secret").unwrap();
        let result = cipher.decrypt(&[0x43; 32], &encrypted);
        assert!(matches!(result, Err(VaultError::DecryptionFailed)));
    }

    #[test]
    fn test_every_bit_flip_fails() {
        let cipher = XChaCha20Poly1305Cipher;
        let encrypted = cipher.encrypt(&KEY, b"hunter2").unwrap();

        for byte in 0..encrypted.len() {
            for bit in 0..8 {
                let mut tampered = encrypted.clone();
                tampered[byte] ^= 1 << bit;
                assert!(
                    matches!(cipher.decrypt(&KEY, &tampered), Err(VaultError::DecryptionFailed)),
                    "flip of bit {bit} in byte {byte} was not detected"
                );
            }
        }
    }

    #[test]
    fn test_truncated_blob_fails() {
        let cipher = XChaCha20Poly1305Cipher;
        let result = cipher.decrypt(&KEY, &[0u8; 30]);
        assert!(matches!(result, Err(VaultError::DecryptionFailed)));
    }

    #[test]
    fn test_invalid_key_length() {
        let cipher = XChaCha20Poly1305Cipher;
        assert!(matches!(
            cipher.encrypt(&[0u8; 16], b"secret"),
            Err(VaultError::InvalidKeyLength(16))
        ));
        assert!(matches!(
            cipher.decrypt(&[0u8; 33], &[0u8; 64]),
            Err(VaultError::InvalidKeyLength(33))
        ));
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let cipher = XChaCha20Poly1305Cipher;
        let enc1 = cipher.encrypt(&KEY, b"same input").unwrap();
        let enc2 = cipher.encrypt(&KEY, b"same input").unwrap();
        assert_ne!(enc1, enc2);
        assert_eq!(enc1.len(), NONCE_LEN + b"same input".len() + TAG_LEN);
    }

    #[test]
    fn test_non_utf8_plaintext_is_malformed() {
        let cipher = XChaCha20Poly1305Cipher;
        let blob = Ciphertext::from_bytes(cipher.encrypt(&KEY, &[0xff, 0xfe]).unwrap());
        assert!(matches!(
            open_secret(&cipher, &KEY, &blob),
            Err(VaultError::MalformedData(_))
        ));
    }

    #[test]
    fn test_ciphertext_hex() {
        let ct = Ciphertext::from_bytes(vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(ct.to_hex(), "deadbeef");
        assert_eq!(Ciphertext::from_hex("deadbeef").unwrap(), ct);
        assert!(Ciphertext::from_hex("not hex").is_err());
    }
}
