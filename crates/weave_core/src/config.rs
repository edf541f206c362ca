//! Store configuration
//!
//! Everything application-shaped about the store lives here rather than in
//! the store itself: the default state, which fields get persisted, which
//! fields are collections, and which action label counts as "add".
//!
//! ```toml
//! storage_key = "weave-todos"
//! persisted_fields = ["todos", "filter", "nextId"]
//! collections = ["todos"]
//! tracked_collection = "todos"
//! add_action = "ADD_TODO"
//! filter_field = "filter"
//! next_id_field = "nextId"
//!
//! [initial_state]
//! filter = "all"
//! nextId = 1
//!
//! [initial_state.todos]
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

/// Action label used when the caller does not supply one
pub const DEFAULT_ACTION: &str = "SET_STATE";

/// Action label reported to subscribers by `Store::reset`
pub const RESET_ACTION: &str = "RESET";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Key the snapshot is stored under
    pub storage_key: String,
    /// State used on first start and by `reset`
    pub initial_state: Map<String, Value>,
    /// Top-level fields written to storage; empty means the whole state
    pub persisted_fields: Vec<String>,
    /// Fields that must be objects for a loaded snapshot to be accepted
    pub collections: Vec<String>,
    /// Collection whose newly added keys are recorded
    pub tracked_collection: Option<String>,
    /// Action label that triggers added-key tracking
    pub add_action: String,
    /// Boolean field marking an item of the tracked collection as done
    pub completed_field: String,
    /// Top-level string field reported as the current filter by `Store::stats`
    pub filter_field: Option<String>,
    /// Top-level counter reported as the next id by `Store::stats`
    pub next_id_field: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let mut initial_state = Map::new();
        initial_state.insert("todos".to_string(), Value::Object(Map::new()));
        initial_state.insert("filter".to_string(), Value::from("all"));
        initial_state.insert("nextId".to_string(), Value::from(1));

        Self {
            storage_key: "weave-todos".to_string(),
            initial_state,
            persisted_fields: vec![
                "todos".to_string(),
                "filter".to_string(),
                "nextId".to_string(),
            ],
            collections: vec!["todos".to_string()],
            tracked_collection: Some("todos".to_string()),
            add_action: "ADD_TODO".to_string(),
            completed_field: "completed".to_string(),
            filter_field: Some("filter".to_string()),
            next_id_field: Some("nextId".to_string()),
        }
    }
}

impl StoreConfig {
    /// Parse a configuration from TOML text; missing keys take defaults
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Serialize to a TOML string
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Set the storage key
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Replace the initial state
    pub fn with_initial_state(mut self, state: Map<String, Value>) -> Self {
        self.initial_state = state;
        self
    }

    /// Replace the persisted field list
    pub fn with_persisted_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.persisted_fields = fields.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.storage_key, "weave-todos");
        assert_eq!(config.initial_state.get("filter"), Some(&Value::from("all")));
        assert_eq!(config.tracked_collection.as_deref(), Some("todos"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = StoreConfig::from_toml_str(
            r#"
            storage_key = "counter-app"
            persisted_fields = ["count"]

            [initial_state]
            count = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.storage_key, "counter-app");
        assert_eq!(config.persisted_fields, vec!["count"]);
        assert_eq!(config.initial_state.get("count"), Some(&Value::from(0)));
        assert_eq!(config.add_action, "ADD_TODO");
        assert_eq!(config.next_id_field.as_deref(), Some("nextId"));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = StoreConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(StoreConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            StoreConfig::from_toml_str("storage_key = ["),
            Err(ConfigError::Parse(_))
        ));
    }
}
