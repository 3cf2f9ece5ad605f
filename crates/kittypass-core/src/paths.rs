//! Standard paths used by kittypass

use std::path::PathBuf;

/// Standard kittypass paths
pub struct Paths {
    /// Data directory (~/.local/share/kittypass)
    pub data: PathBuf,
    /// Config directory (~/.config/kittypass)
    pub config: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    pub fn new() -> Self {
        let data = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("kittypass");

        let config = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("kittypass");

        Self { data, config }
    }

    /// Build paths rooted somewhere else (tests, portable installs)
    pub fn rooted(root: &std::path::Path) -> Self {
        Self {
            data: root.join("data"),
            config: root.join("config"),
        }
    }

    /// Default SQLite database file
    pub fn database(&self) -> PathBuf {
        self.data.join("kittypass.db")
    }

    /// Default configuration file
    pub fn config_file(&self) -> PathBuf {
        self.config.join("config.json")
    }

    /// Default log file
    pub fn log_file(&self) -> PathBuf {
        self.data.join("logs").join("kittypass.log")
    }
}
