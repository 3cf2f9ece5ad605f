//! SQLite storage for vaults and logins
//!
//! One file-backed database. Salts and ciphertexts are stored as hex
//! text, timestamps as RFC 3339. Multi-row writes (re-key, cascade
//! delete) each run inside a single transaction.

use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{ffi, params, params_from_iter, Connection, OptionalExtension, Transaction};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::cipher::Ciphertext;
use crate::error::{Entity, Result, VaultError};
use crate::kdf::{KdfParams, Salt};
use crate::models::{
    DeleteReport, LoginChanges, LoginSummary, StoredLogin, UpdateReport, VaultChanges, VaultId,
    VaultRecord, VaultSummary,
};
use crate::verifier::VerifierHash;

/// Persistence boundary for vaults and logins
pub struct Storage {
    conn: Connection,
}

/// Vault columns before hex decoding
struct RawVault {
    id: String,
    name: String,
    description: String,
    verifier_hash: String,
    salt: String,
    kdf: KdfParams,
    created_at: DateTime<Utc>,
}

impl RawVault {
    fn into_record(self) -> Result<VaultRecord> {
        Ok(VaultRecord {
            id: VaultId::from_string(self.id),
            name: self.name,
            description: self.description,
            verifier: VerifierHash::from_phc(self.verifier_hash),
            salt: Salt::from_hex(&self.salt)?,
            kdf: self.kdf,
            created_at: self.created_at,
        })
    }
}

/// Login columns before hex decoding
struct RawLogin {
    name: String,
    username: String,
    ciphertext: String,
    created_at: DateTime<Utc>,
}

impl RawLogin {
    fn into_stored(self) -> Result<StoredLogin> {
        Ok(StoredLogin {
            ciphertext: Ciphertext::from_hex(&self.ciphertext)?,
            name: self.name,
            username: self.username,
            created_at: self.created_at,
        })
    }
}

fn parse_time(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn constraint_code(err: &rusqlite::Error) -> Option<i32> {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
            Some(e.extended_code)
        }
        _ => None,
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        constraint_code(err),
        Some(ffi::SQLITE_CONSTRAINT_UNIQUE) | Some(ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}

fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    constraint_code(err) == Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY)
}

/// Wrap a user search term for `LIKE ... ESCAPE '\'`
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Roll back explicitly and turn low-level failures into an abort
fn finish<T>(tx: Transaction<'_>, outcome: Result<T>) -> Result<T> {
    match outcome {
        Ok(value) => {
            tx.commit()
                .map_err(|e| VaultError::PartialUpdateAborted(format!("commit failed: {e}")))?;
            Ok(value)
        }
        Err(err) => {
            debug!("rolling back transaction: {err}");
            if let Err(rollback) = tx.rollback() {
                warn!("rollback failed: {rollback}");
            }
            Err(match err {
                VaultError::Database(e) => VaultError::PartialUpdateAborted(e.to_string()),
                other => other,
            })
        }
    }
}

impl Storage {
    /// Open (or create) the database file
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                VaultError::StorageUnavailable(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let conn = Connection::open(path).map_err(|e| {
            VaultError::StorageUnavailable(format!("cannot open {}: {e}", path.display()))
        })?;
        debug!("opened database at {}", path.display());
        Self::from_connection(conn)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| VaultError::StorageUnavailable(e.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let storage = Self { conn };
        storage
            .init_schema()
            .map_err(|e| VaultError::StorageUnavailable(format!("failed to initialize storage: {e}")))?;
        Ok(storage)
    }

    /// Initialize database schema
    fn init_schema(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS vaults (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL,
                verifier_hash TEXT NOT NULL,
                salt TEXT NOT NULL,
                kdf_m_cost INTEGER NOT NULL,
                kdf_t_cost INTEGER NOT NULL,
                kdf_p_cost INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS logins (
                id TEXT PRIMARY KEY,
                vault_id TEXT NOT NULL REFERENCES vaults(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                username TEXT NOT NULL,
                ciphertext TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(vault_id, name)
            );

            CREATE INDEX IF NOT EXISTS idx_logins_vault ON logins(vault_id);
            "#,
        )
    }

    // Vault operations

    /// Persist a new vault
    pub fn save_vault(
        &self,
        name: &str,
        description: &str,
        verifier: &VerifierHash,
        salt: &Salt,
        kdf: &KdfParams,
    ) -> Result<VaultId> {
        let id = VaultId::generate();

        self.conn
            .execute(
                r#"
                INSERT INTO vaults
                (id, name, description, verifier_hash, salt, kdf_m_cost, kdf_t_cost, kdf_p_cost, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
                params![
                    id.as_str(),
                    name,
                    description,
                    verifier.as_str(),
                    salt.to_hex(),
                    kdf.m_cost,
                    kdf.t_cost,
                    kdf.p_cost,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    VaultError::duplicate(Entity::Vault, name)
                } else {
                    e.into()
                }
            })?;

        debug!("saved vault {}", id);
        Ok(id)
    }

    /// Load a vault by name
    pub fn get_vault(&self, name: &str) -> Result<VaultRecord> {
        let raw = self
            .conn
            .query_row(
                "SELECT id, name, description, verifier_hash, salt, kdf_m_cost, kdf_t_cost, kdf_p_cost, created_at
                 FROM vaults WHERE name = ?",
                params![name],
                |row| {
                    Ok(RawVault {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                        verifier_hash: row.get(3)?,
                        salt: row.get(4)?,
                        kdf: KdfParams {
                            m_cost: row.get(5)?,
                            t_cost: row.get(6)?,
                            p_cost: row.get(7)?,
                        },
                        created_at: parse_time(8, row.get(8)?)?,
                    })
                },
            )
            .optional()?;

        raw.ok_or_else(|| VaultError::vault_not_found(name))?
            .into_record()
    }

    /// List vaults, optionally filtered by a name substring
    pub fn list_vaults(&self, name_filter: Option<&str>) -> Result<Vec<VaultSummary>> {
        let mut sql = String::from("SELECT name, description, created_at FROM vaults");
        let mut args: Vec<Value> = Vec::new();
        if let Some(term) = name_filter.filter(|t| !t.is_empty()) {
            sql.push_str(" WHERE name LIKE ? ESCAPE '\\'");
            args.push(Value::Text(like_pattern(term)));
        }
        sql.push_str(" ORDER BY name");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
            Ok(VaultSummary {
                name: row.get(0)?,
                description: row.get(1)?,
                created_at: parse_time(2, row.get(2)?)?,
            })
        })?;

        let mut vaults = Vec::new();
        for row in rows {
            vaults.push(row?);
        }
        Ok(vaults)
    }

    /// Apply vault changes, including a full re-key, as one transaction
    pub fn update_vault(&mut self, id: &VaultId, changes: &VaultChanges) -> Result<UpdateReport> {
        if changes.is_empty() {
            return Ok(UpdateReport::default());
        }

        let tx = self.conn.transaction()?;
        let outcome = apply_vault_changes(&tx, id, changes);
        let report = finish(tx, outcome)?;
        debug!(
            "updated vault {}: {} logins, {} vaults",
            id, report.updated_logins, report.updated_vaults
        );
        Ok(report)
    }

    /// Delete a vault and every login it owns as one transaction
    pub fn delete_vault(&mut self, name: &str, id: &VaultId) -> Result<DeleteReport> {
        let tx = self.conn.transaction()?;
        let outcome = delete_vault_rows(&tx, name, id);
        let report = finish(tx, outcome)?;
        debug!(
            "deleted vault {}: {} logins, {} vaults",
            id, report.deleted_logins, report.deleted_vaults
        );
        Ok(report)
    }

    // Login operations

    /// Persist a new login, returning its identifier
    pub fn save_login(
        &self,
        vault_id: &VaultId,
        name: &str,
        username: &str,
        ciphertext: &Ciphertext,
    ) -> Result<String> {
        let login_id = vault_id.login_id(name);

        self.conn
            .execute(
                "INSERT INTO logins (id, vault_id, name, username, ciphertext, created_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    login_id,
                    vault_id.as_str(),
                    name,
                    username,
                    ciphertext.to_hex(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    VaultError::duplicate(Entity::Login, name)
                } else if is_foreign_key_violation(&e) {
                    VaultError::vault_not_found(vault_id.as_str())
                } else {
                    e.into()
                }
            })?;

        debug!("saved login {} in vault {}", name, vault_id);
        Ok(login_id)
    }

    /// Read one login of a vault
    pub fn read_login(&self, vault_id: &VaultId, name: &str) -> Result<StoredLogin> {
        let raw = self
            .conn
            .query_row(
                "SELECT name, username, ciphertext, created_at FROM logins WHERE vault_id = ? AND name = ?",
                params![vault_id.as_str(), name],
                raw_login,
            )
            .optional()?;

        raw.ok_or_else(|| VaultError::login_not_found(name))?
            .into_stored()
    }

    /// Read every login of a vault, ciphertexts included
    pub fn read_all_logins(&self, vault_id: &VaultId) -> Result<Vec<StoredLogin>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, username, ciphertext, created_at FROM logins WHERE vault_id = ? ORDER BY name",
        )?;
        let rows = stmt.query_map(params![vault_id.as_str()], raw_login)?;

        let mut logins = Vec::new();
        for row in rows {
            logins.push(row?.into_stored()?);
        }
        Ok(logins)
    }

    /// Search login metadata across vaults
    pub fn list_logins(
        &self,
        vault_id: Option<&VaultId>,
        name_filter: Option<&str>,
        username_filter: Option<&str>,
    ) -> Result<Vec<LoginSummary>> {
        let mut sql = String::from(
            "SELECT v.name, l.name, l.username, l.created_at
             FROM logins l INNER JOIN vaults v ON l.vault_id = v.id",
        );
        let mut conditions: Vec<&str> = Vec::new();
        let mut args: Vec<Value> = Vec::new();

        if let Some(id) = vault_id {
            conditions.push("l.vault_id = ?");
            args.push(Value::Text(id.to_string()));
        }
        if let Some(term) = name_filter.filter(|t| !t.is_empty()) {
            conditions.push("l.name LIKE ? ESCAPE '\\'");
            args.push(Value::Text(like_pattern(term)));
        }
        if let Some(term) = username_filter.filter(|t| !t.is_empty()) {
            conditions.push("l.username LIKE ? ESCAPE '\\'");
            args.push(Value::Text(like_pattern(term)));
        }

        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY v.name, l.name");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
            Ok(LoginSummary {
                vault_name: row.get(0)?,
                name: row.get(1)?,
                username: row.get(2)?,
                created_at: parse_time(3, row.get(3)?)?,
            })
        })?;

        let mut logins = Vec::new();
        for row in rows {
            logins.push(row?);
        }
        Ok(logins)
    }

    /// Update a login's metadata and/or ciphertext, returning matched rows
    pub fn update_login(
        &self,
        vault_id: &VaultId,
        target: &str,
        changes: &LoginChanges,
        ciphertext: Option<&Ciphertext>,
    ) -> Result<usize> {
        let mut sets: Vec<&str> = Vec::new();
        let mut args: Vec<Value> = Vec::new();

        if let Some(name) = &changes.name {
            sets.push("name = ?");
            args.push(Value::Text(name.clone()));
            sets.push("id = ?");
            args.push(Value::Text(vault_id.login_id(name)));
        }
        if let Some(username) = &changes.username {
            sets.push("username = ?");
            args.push(Value::Text(username.clone()));
        }
        if let Some(ct) = ciphertext {
            sets.push("ciphertext = ?");
            args.push(Value::Text(ct.to_hex()));
        }

        if sets.is_empty() {
            let count: i64 = self.conn.query_row(
                "SELECT COUNT(*) FROM logins WHERE vault_id = ? AND name = ?",
                params![vault_id.as_str(), target],
                |row| row.get(0),
            )?;
            return Ok(count as usize);
        }

        args.push(Value::Text(vault_id.to_string()));
        args.push(Value::Text(target.to_string()));
        let sql = format!(
            "UPDATE logins SET {} WHERE vault_id = ? AND name = ?",
            sets.join(", ")
        );

        let affected = self
            .conn
            .execute(&sql, params_from_iter(args.iter()))
            .map_err(|e| match (&changes.name, is_unique_violation(&e)) {
                (Some(new_name), true) => VaultError::duplicate(Entity::Login, new_name),
                _ => e.into(),
            })?;

        debug!("updated login {} in vault {}: {} rows", target, vault_id, affected);
        Ok(affected)
    }

    /// Delete one login
    pub fn delete_login(&self, vault_id: &VaultId, name: &str) -> Result<usize> {
        let affected = self.conn.execute(
            "DELETE FROM logins WHERE vault_id = ? AND name = ?",
            params![vault_id.as_str(), name],
        )?;

        if affected == 0 {
            return Err(VaultError::login_not_found(name));
        }
        debug!("deleted login {} from vault {}", name, vault_id);
        Ok(affected)
    }
}

fn raw_login(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawLogin> {
    Ok(RawLogin {
        name: row.get(0)?,
        username: row.get(1)?,
        ciphertext: row.get(2)?,
        created_at: parse_time(3, row.get(3)?)?,
    })
}

fn apply_vault_changes(tx: &Transaction<'_>, id: &VaultId, changes: &VaultChanges) -> Result<UpdateReport> {
    let mut report = UpdateReport::default();
    let mut sets: Vec<&str> = Vec::new();
    let mut args: Vec<Value> = Vec::new();

    if let Some(rekey) = &changes.rekey {
        for login in &rekey.logins {
            let affected = tx.execute(
                "UPDATE logins SET ciphertext = ? WHERE vault_id = ? AND name = ?",
                params![login.ciphertext.to_hex(), id.as_str(), login.name],
            )?;
            if affected != 1 {
                return Err(VaultError::PartialUpdateAborted(format!(
                    "login '{}' matched {} rows",
                    login.name, affected
                )));
            }
            report.updated_logins += affected;
        }

        // A login that was not re-encrypted would be stranded under the old key
        let total: i64 = tx.query_row(
            "SELECT COUNT(*) FROM logins WHERE vault_id = ?",
            params![id.as_str()],
            |row| row.get(0),
        )?;
        if total as usize != report.updated_logins {
            return Err(VaultError::PartialUpdateAborted(format!(
                "vault holds {} logins but {} were re-encrypted",
                total, report.updated_logins
            )));
        }

        sets.extend(["verifier_hash = ?", "salt = ?", "kdf_m_cost = ?", "kdf_t_cost = ?", "kdf_p_cost = ?"]);
        args.push(Value::Text(rekey.verifier.as_str().to_string()));
        args.push(Value::Text(rekey.salt.to_hex()));
        args.push(Value::Integer(rekey.kdf.m_cost.into()));
        args.push(Value::Integer(rekey.kdf.t_cost.into()));
        args.push(Value::Integer(rekey.kdf.p_cost.into()));
    }

    if let Some(name) = &changes.name {
        sets.push("name = ?");
        args.push(Value::Text(name.clone()));
    }
    if let Some(description) = &changes.description {
        sets.push("description = ?");
        args.push(Value::Text(description.clone()));
    }

    args.push(Value::Text(id.to_string()));
    let sql = format!("UPDATE vaults SET {} WHERE id = ?", sets.join(", "));

    let affected = tx
        .execute(&sql, params_from_iter(args.iter()))
        .map_err(|e| match (&changes.name, is_unique_violation(&e)) {
            (Some(new_name), true) => VaultError::duplicate(Entity::Vault, new_name),
            _ => e.into(),
        })?;
    if affected != 1 {
        return Err(VaultError::vault_not_found(id.as_str()));
    }
    report.updated_vaults = affected;

    Ok(report)
}

fn delete_vault_rows(tx: &Transaction<'_>, name: &str, id: &VaultId) -> Result<DeleteReport> {
    let deleted_logins = tx.execute(
        "DELETE FROM logins WHERE vault_id = (SELECT id FROM vaults WHERE name = ? AND id = ?)",
        params![name, id.as_str()],
    )?;

    let deleted_vaults = tx.execute(
        "DELETE FROM vaults WHERE name = ? AND id = ?",
        params![name, id.as_str()],
    )?;

    if deleted_vaults == 0 {
        return Err(VaultError::vault_not_found(name));
    }

    Ok(DeleteReport {
        deleted_logins,
        deleted_vaults,
    })
}
