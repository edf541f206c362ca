//! Weave configuration file handling

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use weave_core::StoreConfig;

/// Name of the configuration file looked up in a directory
pub const CONFIG_FILE: &str = "weave.toml";

/// Top-level Weave configuration (weave.toml)
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct WeaveConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// Where snapshots are kept
#[derive(Debug, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Snapshot directory, relative to the config file
    #[serde(default = "default_dir")]
    pub dir: String,
}

fn default_dir() -> String {
    ".weave".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { dir: default_dir() }
    }
}

impl WeaveConfig {
    /// Path of the config file for `path`, which may be the file or its directory
    pub fn config_path(path: &Path) -> PathBuf {
        if path.is_file() {
            path.to_path_buf()
        } else {
            path.join(CONFIG_FILE)
        }
    }

    /// Load configuration from a directory or file; a missing file yields defaults
    pub fn load_from_dir(path: &Path) -> Result<Self> {
        let config_path = Self::config_path(path);
        if !config_path.exists() {
            debug!(path = %config_path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: WeaveConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(config)
    }

    /// Snapshot directory resolved against the directory holding the config
    pub fn data_dir(&self, base: &Path) -> PathBuf {
        let base = if base.is_file() {
            base.parent().unwrap_or(Path::new("."))
        } else {
            base
        };
        base.join(&self.storage.dir)
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = WeaveConfig::load_from_dir(dir.path()).unwrap();
        assert_eq!(config.storage.dir, ".weave");
        assert_eq!(config.store.storage_key, "weave-todos");
        assert_eq!(config.data_dir(dir.path()), dir.path().join(".weave"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "[store]\nstorage_key = \"counter\"\n\n[storage]\ndir = \"state\"\n",
        )
        .unwrap();

        let config = WeaveConfig::load_from_dir(dir.path()).unwrap();
        assert_eq!(config.store.storage_key, "counter");
        assert_eq!(config.store.add_action, "ADD_TODO");

        let file = dir.path().join(CONFIG_FILE);
        assert_eq!(config.data_dir(&file), dir.path().join("state"));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let text = WeaveConfig::default().to_toml().unwrap();
        let parsed: WeaveConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.store.persisted_fields, vec!["todos", "filter", "nextId"]);
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "[store\n").unwrap();
        let err = WeaveConfig::load_from_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }
}
