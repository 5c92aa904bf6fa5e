//! Storage configuration.

use crate::persist::keys;
use std::path::PathBuf;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "TRPG_DATA_DIR";

/// Environment variable overriding the key prefix.
pub const KEY_PREFIX_ENV: &str = "TRPG_KEY_PREFIX";

/// Where and under which keys the persisted collections live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Directory used by the file backend.
    pub data_dir: PathBuf,

    /// Prefix prepended to every collection key.
    pub key_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageConfig {
    /// Create a config with the platform data directory and default prefix.
    pub fn new() -> Self {
        let data_dir = dirs::data_dir()
            .map(|d| d.join("trpg"))
            .unwrap_or_else(|| PathBuf::from("./trpg-data"));

        Self {
            data_dir,
            key_prefix: keys::DEFAULT_PREFIX.to_string(),
        }
    }

    /// Create a config from `TRPG_DATA_DIR` / `TRPG_KEY_PREFIX`, falling back
    /// to the defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::new();
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }
        if let Ok(prefix) = std::env::var(KEY_PREFIX_ENV) {
            config.key_prefix = prefix;
        }
        config
    }

    /// Set the data directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Set the key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Full storage key for a collection base name.
    pub fn key(&self, collection: &str) -> String {
        format!("{}{}", self.key_prefix, collection)
    }
}
