//! Configuration management for kittypass
//!
//! Read from ~/.config/kittypass/config.json. A missing file means
//! defaults. `KTPS_DATABASE` overrides the database location.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::paths::Paths;

/// Environment variable overriding `database_path`
pub const DATABASE_ENV: &str = "KTPS_DATABASE";

/// Argon2 cost parameters as written in the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argon2Cost {
    /// Memory cost in KiB
    pub m_cost: u32,
    /// Number of passes
    pub t_cost: u32,
    /// Degree of parallelism
    pub p_cost: u32,
}

/// Global kittypass configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database file (defaults to the data directory)
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[serde(default)]
    pub log_path: Option<PathBuf>,

    /// Default tracing filter when RUST_LOG is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Cost of the key derivation for new salts
    #[serde(default = "default_kdf_cost")]
    pub kdf: Argon2Cost,

    /// Cost of the master password verifier hash
    #[serde(default = "default_verifier_cost")]
    pub verifier: Argon2Cost,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            log_path: None,
            log_filter: default_log_filter(),
            kdf: default_kdf_cost(),
            verifier: default_verifier_cost(),
        }
    }
}

fn default_log_filter() -> String {
    "warn".to_string()
}

fn default_kdf_cost() -> Argon2Cost {
    Argon2Cost {
        m_cost: 64 * 1024,
        t_cost: 1,
        p_cost: 4,
    }
}

fn default_verifier_cost() -> Argon2Cost {
    Argon2Cost {
        m_cost: 19 * 1024,
        t_cost: 2,
        p_cost: 1,
    }
}

impl Config {
    /// Load config from file
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db) = lookup(DATABASE_ENV).filter(|v| !v.trim().is_empty()) {
            self.database_path = Some(PathBuf::from(db));
        }
    }

    /// Database location, falling back to the standard data directory
    pub fn database_path(&self, paths: &Paths) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| paths.database())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() -> Result<()> {
        let tmp = TempDir::new()?;
        let config = Config::load(&tmp.path().join("nope.json"))?;
        assert_eq!(config.log_filter, "warn");
        assert_eq!(config.kdf.m_cost, 65536);
        assert_eq!(config.kdf.p_cost, 4);
        assert!(config.database_path.is_none());
        Ok(())
    }

    #[test]
    fn test_save_and_reload() -> Result<()> {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.log_filter = "debug".to_string();
        config.kdf.t_cost = 3;
        config.save(&path)?;

        let loaded = Config::load(&path)?;
        assert_eq!(loaded.log_filter, "debug");
        assert_eq!(loaded.kdf.t_cost, 3);
        assert_eq!(loaded.verifier, config.verifier);
        Ok(())
    }

    #[test]
    fn test_partial_file_fills_defaults() -> Result<()> {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"database_path": "/tmp/vaults.db"}"#)?;

        let config = Config::load(&path)?;
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/vaults.db")));
        assert_eq!(config.kdf, default_kdf_cost());
        Ok(())
    }

    #[test]
    fn test_env_override() {
        let mut config = Config::default();
        config.apply_env_from(|key| (key == DATABASE_ENV).then(|| "/srv/kp.db".to_string()));
        assert_eq!(config.database_path, Some(PathBuf::from("/srv/kp.db")));

        let paths = Paths::rooted(Path::new("/home/x"));
        assert_eq!(config.database_path(&paths), PathBuf::from("/srv/kp.db"));
    }

    #[test]
    fn test_blank_env_is_ignored() {
        let mut config = Config::default();
        config.apply_env_from(|_| Some("  ".to_string()));
        assert!(config.database_path.is_none());
    }
}
