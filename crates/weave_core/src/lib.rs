//! Weave Core Runtime
//!
//! This crate provides the state half of the Weave reactive core:
//!
//! - **Store**: one immutable application state, deep-merged on update,
//!   persisted on every commit, broadcast to subscribers in order
//! - **Storage**: pluggable synchronous key-value backends for snapshots
//! - **Callback isolation**: failing subscribers and handlers are logged,
//!   never propagated
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use weave_core::{MemoryStorage, StateUpdate, Store, StoreConfig};
//!
//! let storage = MemoryStorage::new();
//! let store = Store::new(StoreConfig::default(), storage.clone());
//!
//! store
//!     .set_state(json!({"todos": {"1": {"id": 1, "title": "x", "completed": false}}}), "ADD_TODO")
//!     .unwrap();
//!
//! // A fresh store over the same storage sees the persisted snapshot
//! let reloaded = Store::new(StoreConfig::default(), storage);
//! assert_eq!(reloaded.get_state_at("todos.1.title"), Some(json!("x")));
//!
//! // Whole-state replacement goes through a function
//! store
//!     .set_state(
//!         StateUpdate::replace_with(|state| {
//!             let mut next = state.clone();
//!             next.insert("filter".into(), json!("completed"));
//!             Ok::<_, anyhow::Error>(next)
//!         }),
//!         "SET_FILTER",
//!     )
//!     .unwrap();
//! ```

pub mod callback;
pub mod config;
pub mod error;
pub mod merge;
pub mod storage;
pub mod store;

pub use callback::{run_isolated, CallbackFailure, CallbackResult, IntoCallbackResult};
pub use config::{StoreConfig, DEFAULT_ACTION, RESET_ACTION};
pub use error::{ConfigError, StorageError, StoreError};
pub use merge::{deep_merge, value_at};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use store::{State, StateUpdate, Store, StoreStats, SubscriberId, Subscription, Updater};
