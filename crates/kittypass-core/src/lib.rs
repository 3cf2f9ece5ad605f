//! Kittypass Core - Shared functionality for the kittypass tools
//!
//! Standard paths, the configuration file and display helpers. Nothing
//! in here touches key material.

pub mod config;
pub mod format;
pub mod paths;

pub use config::{Argon2Cost, Config};
pub use paths::Paths;
