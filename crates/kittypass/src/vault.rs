//! Vault lifecycle
//!
//! A vault moves through two handle types:
//!
//! - [`LockedVault`]: loaded from storage, master password not yet checked.
//! - [`OpenVault`]: password verified, derivation key held in memory.
//!
//! Locking or dropping an [`OpenVault`] wipes the key.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::cipher::{open_secret, seal_secret, Cipher, XChaCha20Poly1305Cipher};
use crate::error::{Result, VaultError};
use crate::kdf::{derive_key, CryptoParams, KdfParams, Salt, KEY_LEN};
use crate::models::{
    DeleteReport, ReencryptedLogin, RekeyMaterial, UpdateReport, VaultChanges, VaultId,
    VaultRecord, VaultSummary,
};
use crate::storage::Storage;
use crate::verifier::{hash_password, verify_password};

/// Anything that names a stored vault, locked or not
pub trait VaultRef {
    fn vault_id(&self) -> &VaultId;
    fn vault_name(&self) -> &str;
}

/// A vault whose master password has not been checked
#[derive(Debug, Clone)]
pub struct LockedVault {
    record: VaultRecord,
}

/// A verified vault holding its derivation key
pub struct OpenVault {
    record: VaultRecord,
    key: Zeroizing<[u8; KEY_LEN]>,
    cipher: Arc<dyn Cipher>,
}

/// Create and persist a new vault, returning it already open
pub fn create(
    store: &Storage,
    name: &str,
    description: &str,
    master: &str,
    params: &CryptoParams,
) -> Result<OpenVault> {
    let salt = Salt::generate();
    let key = derive_key(master.as_bytes(), &salt, &params.kdf)?;
    let verifier = hash_password(master, &params.verifier)?;

    let id = store.save_vault(name, description, &verifier, &salt, &params.kdf)?;
    let record = store.get_vault(name)?;
    info!("created vault {} ({})", name, id);

    Ok(OpenVault {
        record,
        key,
        cipher: Arc::new(XChaCha20Poly1305Cipher),
    })
}

/// Load a vault by name without unlocking it
pub fn open(store: &Storage, name: &str) -> Result<LockedVault> {
    let record = store.get_vault(name)?;
    debug!("loaded vault {}", name);
    Ok(LockedVault { record })
}

/// Vault metadata, optionally filtered by name substring
pub fn list(store: &Storage, name_filter: Option<&str>) -> Result<Vec<VaultSummary>> {
    store.list_vaults(name_filter)
}

impl LockedVault {
    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn description(&self) -> &str {
        &self.record.description
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.record.created_at
    }

    /// Verify the master password and derive the vault key
    pub fn unlock(&self, master: &str) -> Result<OpenVault> {
        self.unlock_with(master, Arc::new(XChaCha20Poly1305Cipher))
    }

    /// Like [`unlock`](Self::unlock), with an explicit cipher backend
    pub fn unlock_with(&self, master: &str, cipher: Arc<dyn Cipher>) -> Result<OpenVault> {
        if !verify_password(master, &self.record.verifier)? {
            debug!("incorrect master password for vault {}", self.record.name);
            return Err(VaultError::IncorrectPassword);
        }

        let key = derive_key(master.as_bytes(), &self.record.salt, &self.record.kdf)?;
        debug!("unlocked vault {}", self.record.name);

        Ok(OpenVault {
            record: self.record.clone(),
            key,
            cipher,
        })
    }
}

impl OpenVault {
    pub fn id(&self) -> &VaultId {
        &self.record.id
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn description(&self) -> &str {
        &self.record.description
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.record.created_at
    }

    /// Cost parameters the current key was derived with
    pub fn kdf(&self) -> KdfParams {
        self.record.kdf
    }

    pub(crate) fn key(&self) -> &[u8] {
        &self.key[..]
    }

    pub(crate) fn cipher(&self) -> &dyn Cipher {
        self.cipher.as_ref()
    }

    /// Drop the key, keeping the vault metadata
    pub fn lock(self) -> LockedVault {
        debug!("locked vault {}", self.record.name);
        LockedVault {
            record: self.record,
        }
    }

    /// Rename and/or re-describe the vault
    pub fn update(
        &mut self,
        store: &mut Storage,
        new_name: Option<&str>,
        new_description: Option<&str>,
    ) -> Result<UpdateReport> {
        let changes = VaultChanges {
            name: new_name.map(str::to_string),
            description: new_description.map(str::to_string),
            rekey: None,
        };
        self.apply(store, changes, None)
    }

    /// Change the master password, re-encrypting every login
    ///
    /// Every secret is decrypted and re-sealed in memory first; only then is
    /// the new material written, in one transaction. On any error the stored
    /// vault and this handle are left exactly as they were.
    pub fn rekey(
        &mut self,
        store: &mut Storage,
        new_master: &str,
        params: &CryptoParams,
    ) -> Result<UpdateReport> {
        self.update_and_rekey(store, None, None, new_master, params)
    }

    /// Rename and/or re-describe the vault and change its master password
    /// in the same transaction
    pub fn update_and_rekey(
        &mut self,
        store: &mut Storage,
        new_name: Option<&str>,
        new_description: Option<&str>,
        new_master: &str,
        params: &CryptoParams,
    ) -> Result<UpdateReport> {
        let (material, key) = self.reencrypt_all(store, new_master, params)?;
        let changes = VaultChanges {
            name: new_name.map(str::to_string),
            description: new_description.map(str::to_string),
            rekey: Some(material),
        };
        let report = self.apply(store, changes, Some(key))?;

        info!(
            "re-keyed vault {} ({} logins)",
            self.record.name, report.updated_logins
        );
        Ok(report)
    }

    /// Build the replacement salt, verifier and ciphertexts without writing anything
    fn reencrypt_all(
        &self,
        store: &Storage,
        new_master: &str,
        params: &CryptoParams,
    ) -> Result<(RekeyMaterial, Zeroizing<[u8; KEY_LEN]>)> {
        let stored = store.read_all_logins(&self.record.id)?;

        let salt = Salt::generate();
        let key = derive_key(new_master.as_bytes(), &salt, &params.kdf)?;
        let verifier = hash_password(new_master, &params.verifier)?;

        let mut logins = Vec::with_capacity(stored.len());
        for login in &stored {
            let secret = open_secret(self.cipher(), self.key(), &login.ciphertext)?;
            let ciphertext = seal_secret(self.cipher(), &key[..], &secret)?;
            logins.push(ReencryptedLogin {
                name: login.name.clone(),
                ciphertext,
            });
        }

        let material = RekeyMaterial {
            verifier,
            salt,
            kdf: params.kdf,
            logins,
        };
        Ok((material, key))
    }

    /// Persist `changes`, then bring this handle in line with what was stored
    fn apply(
        &mut self,
        store: &mut Storage,
        changes: VaultChanges,
        new_key: Option<Zeroizing<[u8; KEY_LEN]>>,
    ) -> Result<UpdateReport> {
        let report = store.update_vault(&self.record.id, &changes)?;

        if let Some(name) = changes.name {
            info!("renamed vault {} to {}", self.record.name, name);
            self.record.name = name;
        }
        if let Some(description) = changes.description {
            self.record.description = description;
        }
        if let Some(material) = changes.rekey {
            self.record.verifier = material.verifier;
            self.record.salt = material.salt;
            self.record.kdf = material.kdf;
        }
        if let Some(key) = new_key {
            self.key = key;
        }
        Ok(report)
    }

    /// Delete the vault and all its logins
    pub fn delete(self, store: &mut Storage) -> Result<DeleteReport> {
        let report = store.delete_vault(&self.record.name, &self.record.id)?;
        info!(
            "deleted vault {} ({} logins)",
            self.record.name, report.deleted_logins
        );
        Ok(report)
    }
}

impl std::fmt::Debug for OpenVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenVault")
            .field("record", &self.record)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl VaultRef for LockedVault {
    fn vault_id(&self) -> &VaultId {
        &self.record.id
    }

    fn vault_name(&self) -> &str {
        &self.record.name
    }
}

impl VaultRef for OpenVault {
    fn vault_id(&self) -> &VaultId {
        &self.record.id
    }

    fn vault_name(&self) -> &str {
        &self.record.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Entity;
    use crate::models::LoginChanges;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const MASTER: &str = "Tr0ub4dor&3";

    fn params() -> CryptoParams {
        CryptoParams::for_tests()
    }

    /// Delegates to the real cipher but fails the nth encryption
    struct FailingCipher {
        fail_at: usize,
        encrypts: AtomicUsize,
    }

    impl FailingCipher {
        fn new(fail_at: usize) -> Self {
            Self {
                fail_at,
                encrypts: AtomicUsize::new(0),
            }
        }
    }

    impl Cipher for FailingCipher {
        fn encrypt(&self, key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
            if self.encrypts.fetch_add(1, Ordering::SeqCst) == self.fail_at {
                return Err(VaultError::malformed("injected failure"));
            }
            XChaCha20Poly1305Cipher.encrypt(key, plaintext)
        }

        fn decrypt(&self, key: &[u8], blob: &[u8]) -> Result<Vec<u8>> {
            XChaCha20Poly1305Cipher.decrypt(key, blob)
        }
    }

    #[test]
    fn test_create_and_unlock() {
        let store = Storage::open_in_memory().unwrap();
        let created = create(&store, "work", "job", MASTER, &params()).unwrap();
        assert_eq!(created.name(), "work");
        let created_key = created.key().to_vec();
        drop(created);

        let locked = open(&store, "work").unwrap();
        assert_eq!(locked.description(), "job");
        let unlocked = locked.unlock(MASTER).unwrap();
        assert_eq!(unlocked.key(), created_key.as_slice());
        assert_eq!(unlocked.kdf(), params().kdf);
    }

    #[test]
    fn test_duplicate_vault_keeps_first() {
        let store = Storage::open_in_memory().unwrap();
        create(&store, "work", "first", MASTER, &params()).unwrap();

        let err = create(&store, "work", "second", "other", &params()).unwrap_err();
        assert!(matches!(err, VaultError::DuplicateName { kind: Entity::Vault, .. }));

        let locked = open(&store, "work").unwrap();
        assert_eq!(locked.description(), "first");
        assert!(locked.unlock(MASTER).is_ok());
    }

    #[test]
    fn test_wrong_password() {
        let store = Storage::open_in_memory().unwrap();
        create(&store, "work", "", MASTER, &params()).unwrap();

        let locked = open(&store, "work").unwrap();
        assert!(matches!(locked.unlock("wrong"), Err(VaultError::IncorrectPassword)));
        // The locked handle stays usable
        assert!(locked.unlock(MASTER).is_ok());
    }

    #[test]
    fn test_open_missing_vault() {
        let store = Storage::open_in_memory().unwrap();
        assert!(matches!(
            open(&store, "nope"),
            Err(VaultError::NotFound { kind: Entity::Vault, .. })
        ));
    }

    #[test]
    fn test_lock_returns_locked_handle() {
        let store = Storage::open_in_memory().unwrap();
        let vault = create(&store, "work", "", MASTER, &params()).unwrap();
        let locked = vault.lock();
        assert_eq!(locked.name(), "work");
        assert!(locked.unlock(MASTER).is_ok());
    }

    #[test]
    fn test_update_name_and_description() {
        let mut store = Storage::open_in_memory().unwrap();
        let mut vault = create(&store, "work", "old", MASTER, &params()).unwrap();
        create(&store, "home", "", MASTER, &params()).unwrap();

        let report = vault.update(&mut store, Some("job"), Some("new")).unwrap();
        assert_eq!(report.updated_vaults, 1);
        assert_eq!(vault.name(), "job");
        assert_eq!(open(&store, "job").unwrap().description(), "new");
        assert!(open(&store, "work").is_err());

        let err = vault.update(&mut store, Some("home"), None).unwrap_err();
        assert!(matches!(err, VaultError::DuplicateName { .. }));
        assert_eq!(vault.name(), "job");
    }

    #[test]
    fn test_rekey_round_trip() {
        let mut store = Storage::open_in_memory().unwrap();
        let mut vault = create(&store, "work", "", MASTER, &params()).unwrap();
        vault.add_login(&store, "email", "a@b.com", "hunter2").unwrap();
        vault.add_login(&store, "bank", "me", "s3cret").unwrap();
        let old_salt = store.get_vault("work").unwrap().salt;

        let report = vault.rekey(&mut store, "n3w-master", &params()).unwrap();
        assert_eq!(report, UpdateReport { updated_logins: 2, updated_vaults: 1 });
        assert_ne!(store.get_vault("work").unwrap().salt, old_salt);

        // The live handle already uses the new key
        assert_eq!(vault.get_login(&store, "bank").unwrap().secret.as_str(), "s3cret");

        let locked = open(&store, "work").unwrap();
        assert!(matches!(locked.unlock(MASTER), Err(VaultError::IncorrectPassword)));
        let reopened = locked.unlock("n3w-master").unwrap();
        assert_eq!(reopened.get_login(&store, "email").unwrap().secret.as_str(), "hunter2");
        assert_eq!(reopened.get_login(&store, "bank").unwrap().secret.as_str(), "s3cret");
    }

    #[test]
    fn test_rekey_empty_vault_replaces_salt_and_verifier() {
        let mut store = Storage::open_in_memory().unwrap();
        let mut vault = create(&store, "work", "", MASTER, &params()).unwrap();
        let before = store.get_vault("work").unwrap();

        let report = vault.rekey(&mut store, "other", &params()).unwrap();
        assert_eq!(report, UpdateReport { updated_logins: 0, updated_vaults: 1 });

        let after = store.get_vault("work").unwrap();
        assert_ne!(after.salt, before.salt);
        assert_ne!(after.verifier, before.verifier);
        assert!(open(&store, "work").unwrap().unlock("other").is_ok());
    }

    #[test]
    fn test_rekey_persists_new_costs() {
        let mut store = Storage::open_in_memory().unwrap();
        let mut vault = create(&store, "work", "", MASTER, &params()).unwrap();
        vault.add_login(&store, "email", "a", "pw").unwrap();

        let mut stronger = params();
        stronger.kdf.t_cost = 3;
        vault.rekey(&mut store, "next", &stronger).unwrap();
        assert_eq!(vault.kdf().t_cost, 3);

        let reopened = open(&store, "work").unwrap().unlock("next").unwrap();
        assert_eq!(reopened.kdf().t_cost, 3);
        assert_eq!(reopened.get_login(&store, "email").unwrap().secret.as_str(), "pw");
    }

    #[test]
    fn test_rekey_failure_midway_changes_nothing() {
        let mut store = Storage::open_in_memory().unwrap();
        let vault = create(&store, "work", "", MASTER, &params()).unwrap();
        for i in 0..4 {
            vault
                .add_login(&store, &format!("login{i}"), "user", &format!("secret{i}"))
                .unwrap();
        }
        drop(vault);

        let id = store.get_vault("work").unwrap().id;
        let vault_before = store.get_vault("work").unwrap();
        let logins_before = store.read_all_logins(&id).unwrap();

        // Fail on the third of four re-encryptions
        let locked = open(&store, "work").unwrap();
        let mut vault = locked
            .unlock_with(MASTER, Arc::new(FailingCipher::new(2)))
            .unwrap();
        let err = vault.rekey(&mut store, "n3w", &params()).unwrap_err();
        assert!(matches!(err, VaultError::MalformedData(_)));

        assert_eq!(store.get_vault("work").unwrap(), vault_before);
        assert_eq!(store.read_all_logins(&id).unwrap(), logins_before);

        // Handle still holds the old key
        assert_eq!(vault.get_login(&store, "login3").unwrap().secret.as_str(), "secret3");
        assert!(open(&store, "work").unwrap().unlock(MASTER).is_ok());
    }

    #[test]
    fn test_rekey_with_corrupt_login_changes_nothing() {
        let mut store = Storage::open_in_memory().unwrap();
        let mut vault = create(&store, "work", "", MASTER, &params()).unwrap();
        for i in 0..3 {
            vault
                .add_login(&store, &format!("login{i}"), "user", &format!("secret{i}"))
                .unwrap();
        }

        let stored = store.read_login(vault.id(), "login1").unwrap();
        let mut bytes = stored.ciphertext.as_bytes().to_vec();
        bytes[30] ^= 0x80;
        let corrupt = crate::cipher::Ciphertext::from_bytes(bytes);
        store
            .update_login(vault.id(), "login1", &LoginChanges::default(), Some(&corrupt))
            .unwrap();

        let vault_before = store.get_vault("work").unwrap();
        let logins_before = store.read_all_logins(vault.id()).unwrap();

        let err = vault.rekey(&mut store, "n3w", &params()).unwrap_err();
        assert!(matches!(err, VaultError::DecryptionFailed));

        assert_eq!(store.get_vault("work").unwrap(), vault_before);
        assert_eq!(store.read_all_logins(vault.id()).unwrap(), logins_before);
        assert_eq!(vault.kdf(), vault_before.kdf);
        assert_eq!(vault.get_login(&store, "login2").unwrap().secret.as_str(), "secret2");
    }

    #[test]
    fn test_rename_and_rekey_together() {
        let mut store = Storage::open_in_memory().unwrap();
        let mut vault = create(&store, "work", "old", MASTER, &params()).unwrap();
        vault.add_login(&store, "email", "a@b.com", "hunter2").unwrap();

        let report = vault
            .update_and_rekey(&mut store, Some("job"), Some("new"), "n3w", &params())
            .unwrap();
        assert_eq!(report, UpdateReport { updated_logins: 1, updated_vaults: 1 });
        assert_eq!(vault.name(), "job");
        assert_eq!(vault.description(), "new");

        assert!(open(&store, "work").is_err());
        let reopened = open(&store, "job").unwrap().unlock("n3w").unwrap();
        assert_eq!(reopened.description(), "new");
        assert_eq!(reopened.get_login(&store, "email").unwrap().secret.as_str(), "hunter2");
    }

    #[test]
    fn test_rename_with_failing_rekey_keeps_old_name() {
        let mut store = Storage::open_in_memory().unwrap();
        let vault = create(&store, "work", "old", MASTER, &params()).unwrap();
        vault.add_login(&store, "a", "u", "one").unwrap();
        vault.add_login(&store, "b", "u", "two").unwrap();
        drop(vault);
        let vault_before = store.get_vault("work").unwrap();
        let logins_before = store.read_all_logins(&vault_before.id).unwrap();

        // Second re-encryption fails
        let mut vault = open(&store, "work")
            .unwrap()
            .unlock_with(MASTER, Arc::new(FailingCipher::new(1)))
            .unwrap();
        let err = vault
            .update_and_rekey(&mut store, Some("job"), Some("new"), "n3w", &params())
            .unwrap_err();
        assert!(matches!(err, VaultError::MalformedData(_)));

        assert_eq!(vault.name(), "work");
        assert_eq!(vault.description(), "old");
        assert!(matches!(
            open(&store, "job"),
            Err(VaultError::NotFound { kind: Entity::Vault, .. })
        ));
        assert_eq!(store.get_vault("work").unwrap(), vault_before);
        assert_eq!(store.read_all_logins(&vault_before.id).unwrap(), logins_before);
    }

    #[test]
    fn test_rename_collision_aborts_rekey() {
        let mut store = Storage::open_in_memory().unwrap();
        let mut vault = create(&store, "work", "", MASTER, &params()).unwrap();
        vault.add_login(&store, "a", "u", "one").unwrap();
        create(&store, "home", "", MASTER, &params()).unwrap();
        let vault_before = store.get_vault("work").unwrap();

        let err = vault
            .update_and_rekey(&mut store, Some("home"), None, "n3w", &params())
            .unwrap_err();
        assert!(matches!(err, VaultError::DuplicateName { kind: Entity::Vault, .. }));

        assert_eq!(store.get_vault("work").unwrap(), vault_before);
        assert!(open(&store, "work").unwrap().unlock(MASTER).is_ok());
        assert_eq!(vault.get_login(&store, "a").unwrap().secret.as_str(), "one");
    }

    #[test]
    fn test_delete_cascades() -> Result<()> {
        let tmp = TempDir::new().map_err(|e| VaultError::StorageUnavailable(e.to_string()))?;
        let mut store = Storage::open(&tmp.path().join("kittypass.db"))?;

        let vault = create(&store, "work", "", MASTER, &params())?;
        vault.add_login(&store, "email", "a@b.com", "hunter2")?;

        let report = vault.delete(&mut store)?;
        assert_eq!(report, DeleteReport { deleted_logins: 1, deleted_vaults: 1 });
        assert!(matches!(
            open(&store, "work"),
            Err(VaultError::NotFound { kind: Entity::Vault, .. })
        ));
        Ok(())
    }

    #[test]
    fn test_list_vaults() {
        let store = Storage::open_in_memory().unwrap();
        create(&store, "work", "a", MASTER, &params()).unwrap();
        create(&store, "home", "b", MASTER, &params()).unwrap();

        let names: Vec<_> = list(&store, None).unwrap().into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["home", "work"]);
        assert_eq!(list(&store, Some("wor")).unwrap().len(), 1);
    }

    #[test]
    fn test_debug_hides_key() {
        let store = Storage::open_in_memory().unwrap();
        let vault = create(&store, "work", "", MASTER, &params()).unwrap();
        let rendered = format!("{vault:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains(&hex::encode(vault.key())));
    }
}
