//! Logins stored inside a vault
//!
//! Reading or writing a secret needs an [`OpenVault`]. Metadata-only
//! operations (listing, renaming, deleting) work from any [`VaultRef`].

use tracing::{debug, info};

use crate::cipher::{open_secret, seal_secret};
use crate::error::{Result, VaultError};
use crate::models::{Login, LoginChanges, LoginSummary, VaultId};
use crate::storage::Storage;
use crate::vault::{OpenVault, VaultRef};

impl OpenVault {
    /// Encrypt and store a new login
    pub fn add_login(&self, store: &Storage, name: &str, username: &str, secret: &str) -> Result<String> {
        let ciphertext = seal_secret(self.cipher(), self.key(), secret)?;
        let login_id = store.save_login(self.id(), name, username, &ciphertext)?;
        info!("added login {} to vault {}", name, self.name());
        Ok(login_id)
    }

    /// Fetch and decrypt one login
    pub fn get_login(&self, store: &Storage, name: &str) -> Result<Login> {
        let stored = store.read_login(self.id(), name)?;
        let secret = open_secret(self.cipher(), self.key(), &stored.ciphertext)?;
        debug!("decrypted login {} from vault {}", name, self.name());

        Ok(Login {
            name: stored.name,
            username: stored.username,
            secret,
        })
    }

    /// Update a login, re-encrypting `new_secret` under the current key
    pub fn update_login(
        &self,
        store: &Storage,
        target: &str,
        changes: &LoginChanges,
        new_secret: Option<&str>,
    ) -> Result<usize> {
        let ciphertext = new_secret
            .map(|secret| seal_secret(self.cipher(), self.key(), secret))
            .transpose()?;

        let affected = store.update_login(self.id(), target, changes, ciphertext.as_ref())?;
        if affected == 0 {
            return Err(VaultError::login_not_found(target));
        }
        info!("updated login {} in vault {}", target, self.name());
        Ok(affected)
    }
}

/// Search login metadata without decrypting anything
pub fn list(
    store: &Storage,
    vault_id: Option<&VaultId>,
    name_filter: Option<&str>,
    username_filter: Option<&str>,
) -> Result<Vec<LoginSummary>> {
    store.list_logins(vault_id, name_filter, username_filter)
}

/// Rename a login and/or change its username
pub fn update(store: &Storage, vault: &impl VaultRef, target: &str, changes: &LoginChanges) -> Result<usize> {
    let affected = store.update_login(vault.vault_id(), target, changes, None)?;
    if affected == 0 {
        return Err(VaultError::login_not_found(target));
    }
    info!("updated login {} in vault {}", target, vault.vault_name());
    Ok(affected)
}

/// Delete a login
pub fn delete(store: &Storage, vault: &impl VaultRef, name: &str) -> Result<usize> {
    let affected = store.delete_login(vault.vault_id(), name)?;
    info!("deleted login {} from vault {}", name, vault.vault_name());
    Ok(affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Entity;
    use crate::kdf::CryptoParams;
    use crate::vault;
    use tempfile::TempDir;

    const MASTER: &str = "Tr0ub4dor&3";

    fn setup() -> (Storage, OpenVault) {
        let store = Storage::open_in_memory().unwrap();
        let vault = vault::create(&store, "work", "", MASTER, &CryptoParams::for_tests()).unwrap();
        (store, vault)
    }

    #[test]
    fn test_add_then_get_after_reopen() -> Result<()> {
        let tmp = TempDir::new().map_err(|e| VaultError::StorageUnavailable(e.to_string()))?;
        let path = tmp.path().join("kittypass.db");

        {
            let store = Storage::open(&path)?;
            let vault = vault::create(&store, "work", "", MASTER, &CryptoParams::for_tests())?;
            vault.add_login(&store, "email", "a@b.com", "hunter2")?;
        }

        let store = Storage::open(&path)?;
        let vault = vault::open(&store, "work")?.unlock(MASTER)?;
        let login = vault.get_login(&store, "email")?;
        assert_eq!(login.name, "email");
        assert_eq!(login.username, "a@b.com");
        assert_eq!(login.secret.as_str(), "hunter2");
        Ok(())
    }

    #[test]
    fn test_secret_not_stored_in_clear() {
        let (store, vault) = setup();
        vault.add_login(&store, "email", "a@b.com", "hunter2").unwrap();

        let stored = store.read_login(vault.id(), "email").unwrap();
        assert!(!stored.ciphertext.to_hex().contains(&hex::encode("hunter2")));
    }

    #[test]
    fn test_duplicate_login() {
        let (store, vault) = setup();
        vault.add_login(&store, "email", "a", "one").unwrap();
        assert!(matches!(
            vault.add_login(&store, "email", "b", "two"),
            Err(VaultError::DuplicateName { kind: Entity::Login, .. })
        ));
        assert_eq!(vault.get_login(&store, "email").unwrap().secret.as_str(), "one");
    }

    #[test]
    fn test_get_missing_login() {
        let (store, vault) = setup();
        assert!(matches!(
            vault.get_login(&store, "nope"),
            Err(VaultError::NotFound { kind: Entity::Login, .. })
        ));
    }

    #[test]
    fn test_update_login_secret_and_name() {
        let (store, vault) = setup();
        vault.add_login(&store, "email", "a@b.com", "hunter2").unwrap();

        let changes = LoginChanges {
            name: Some("mail".to_string()),
            username: Some("c@d.com".to_string()),
        };
        assert_eq!(vault.update_login(&store, "email", &changes, Some("hunter3")).unwrap(), 1);

        let login = vault.get_login(&store, "mail").unwrap();
        assert_eq!(login.username, "c@d.com");
        assert_eq!(login.secret.as_str(), "hunter3");
        assert!(vault.get_login(&store, "email").is_err());
    }

    #[test]
    fn test_update_missing_login() {
        let (store, vault) = setup();
        let changes = LoginChanges {
            username: Some("x".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            vault.update_login(&store, "nope", &changes, Some("pw")),
            Err(VaultError::NotFound { kind: Entity::Login, .. })
        ));
        assert!(matches!(
            update(&store, &vault, "nope", &changes),
            Err(VaultError::NotFound { kind: Entity::Login, .. })
        ));
    }

    #[test]
    fn test_metadata_update_from_locked_vault() {
        let (store, vault) = setup();
        vault.add_login(&store, "email", "a@b.com", "hunter2").unwrap();
        vault.add_login(&store, "bank", "me", "pw").unwrap();
        let locked = vault.lock();

        let rename = LoginChanges {
            name: Some("inbox".to_string()),
            ..Default::default()
        };
        assert_eq!(update(&store, &locked, "email", &rename).unwrap(), 1);

        let collide = LoginChanges {
            name: Some("bank".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            update(&store, &locked, "inbox", &collide),
            Err(VaultError::DuplicateName { .. })
        ));

        // Secret still decrypts after a metadata-only rename
        let vault = locked.unlock(MASTER).unwrap();
        assert_eq!(vault.get_login(&store, "inbox").unwrap().secret.as_str(), "hunter2");
    }

    #[test]
    fn test_list_and_delete() {
        let (store, vault) = setup();
        let home = vault::create(&store, "home", "", MASTER, &CryptoParams::for_tests()).unwrap();
        vault.add_login(&store, "email", "alice@work.com", "1").unwrap();
        home.add_login(&store, "email", "alice@home.net", "2").unwrap();

        let all = list(&store, None, None, None).unwrap();
        assert_eq!(all.len(), 2);
        let work_only = list(&store, Some(vault.id()), None, None).unwrap();
        assert_eq!(work_only.len(), 1);
        assert_eq!(work_only[0].vault_name, "work");

        assert_eq!(delete(&store, &vault, "email").unwrap(), 1);
        assert!(matches!(
            delete(&store, &vault, "email"),
            Err(VaultError::NotFound { kind: Entity::Login, .. })
        ));
        assert_eq!(home.get_login(&store, "email").unwrap().secret.as_str(), "2");
    }

    #[test]
    fn test_tampered_ciphertext_fails_closed() {
        let (store, vault) = setup();
        vault.add_login(&store, "email", "a", "hunter2").unwrap();

        let stored = store.read_login(vault.id(), "email").unwrap();
        let mut bytes = stored.ciphertext.as_bytes().to_vec();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = crate::cipher::Ciphertext::from_bytes(bytes);
        store
            .update_login(vault.id(), "email", &LoginChanges::default(), Some(&tampered))
            .unwrap();

        assert!(matches!(
            vault.get_login(&store, "email"),
            Err(VaultError::DecryptionFailed)
        ));
    }
}
