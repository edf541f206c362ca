//! Command implementations
//!
//! Each command opens a file-backed store, does its work and returns the text
//! to print, so the binary stays a thin shell around these functions.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::info;

use weave_core::{FileStorage, Store, DEFAULT_ACTION};

use crate::config::{WeaveConfig, CONFIG_FILE};

/// Open the store described by `config`, persisting under `data_dir`
pub fn open_store(config: &WeaveConfig, data_dir: &Path) -> Result<Store> {
    let storage = FileStorage::open(data_dir)
        .with_context(|| format!("Failed to open storage at {}", data_dir.display()))?;
    Ok(Store::new(config.store.clone(), storage))
}

/// Write a default weave.toml into `dir`
pub fn init(dir: &Path, force: bool) -> Result<String> {
    let path = dir.join(CONFIG_FILE);
    if path.exists() && !force {
        bail!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        );
    }

    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    fs::write(&path, WeaveConfig::default().to_toml()?)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!(path = %path.display(), "wrote default config");
    Ok(format!("Created {}", path.display()))
}

/// Print the whole state, or the value at a dot path
pub fn get(store: &Store, path: Option<&str>) -> Result<String> {
    let value = match path {
        Some(path) => store
            .get_state_at(path)
            .with_context(|| format!("No value at `{path}`"))?,
        None => Value::Object((*store.get_state()).clone()),
    };
    Ok(serde_json::to_string_pretty(&value)?)
}

/// Deep-merge a JSON patch into the state
pub fn set(store: &Store, patch: &str, action: Option<&str>) -> Result<String> {
    let patch: Value = serde_json::from_str(patch).context("Patch is not valid JSON")?;
    let action = action.unwrap_or(DEFAULT_ACTION);
    let next = store.set_state(patch, action)?;

    info!(action, "state updated");
    Ok(serde_json::to_string_pretty(&Value::Object((*next).clone()))?)
}

/// Restore the configured initial state
pub fn reset(store: &Store) -> Result<String> {
    let next = store.reset();
    Ok(serde_json::to_string_pretty(&Value::Object((*next).clone()))?)
}

pub fn stats(store: &Store) -> Result<String> {
    Ok(serde_json::to_string_pretty(&store.stats())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_in(dir: &Path) -> Store {
        open_store(&WeaveConfig::default(), &dir.join(".weave")).unwrap()
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        init(dir.path(), false).unwrap();
        assert!(dir.path().join(CONFIG_FILE).exists());
        assert!(init(dir.path(), false).is_err());
        assert!(init(dir.path(), true).is_ok());
    }

    #[test]
    fn test_set_persists_across_runs() {
        let dir = tempfile::tempdir().unwrap();

        let store = store_in(dir.path());
        set(
            &store,
            r#"{"todos": {"1": {"id": 1, "title": "Ship", "completed": true}}}"#,
            Some("ADD_TODO"),
        )
        .unwrap();
        drop(store);

        let store = store_in(dir.path());
        let title: Value = serde_json::from_str(&get(&store, Some("todos.1.title")).unwrap()).unwrap();
        assert_eq!(title, json!("Ship"));

        let stats: Value = serde_json::from_str(&stats(&store).unwrap()).unwrap();
        assert_eq!(stats["item_count"], json!(1));
        assert_eq!(stats["completed_count"], json!(1));
        assert_eq!(stats["current_filter"], json!("all"));
        assert_eq!(stats["next_id"], json!(1));
    }

    #[test]
    fn test_bad_input_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        assert!(set(&store, "not json", None).is_err());
        assert!(set(&store, "[1, 2]", None).is_err());
        assert!(get(&store, Some("todos.missing")).is_err());
    }

    #[test]
    fn test_reset_restores_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        set(&store, r#"{"filter": "completed"}"#, None).unwrap();

        let state: Value = serde_json::from_str(&reset(&store).unwrap()).unwrap();
        assert_eq!(state["filter"], json!("all"));
    }
}
