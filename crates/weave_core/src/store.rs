//! Centralized immutable state store
//!
//! The store owns exactly one state value. Every committed change produces a
//! new immutable snapshot (`Rc<State>`), is persisted best-effort, and is
//! broadcast to subscribers in registration order before `set_state`
//! returns.
//!
//! ```rust
//! use serde_json::json;
//! use weave_core::{MemoryStorage, Store, StoreConfig};
//!
//! let store = Store::new(StoreConfig::default(), MemoryStorage::new());
//!
//! let sub = store.subscribe(|state, _prev, action| {
//!     println!("{action}: {:?}", state.get("filter"));
//! });
//!
//! store.set_state(json!({"filter": "active"}), "SET_FILTER").unwrap();
//! assert_eq!(store.get_state_at("filter"), Some(json!("active")));
//!
//! sub.unsubscribe();
//! ```
//!
//! Handles are cheap `Rc` clones and the store is `!Send`: it is meant to be
//! driven from one UI thread. No internal borrow is held while updaters or
//! subscribers run, so callbacks may call back into the store.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, error, warn};

use crate::callback::{run_isolated, CallbackResult, IntoCallbackResult};
use crate::config::{StoreConfig, DEFAULT_ACTION, RESET_ACTION};
use crate::error::{Result, StorageError, StoreError};
use crate::merge::{deep_merge, value_at};
use crate::storage::Storage;

/// The application state: a JSON object
pub type State = Map<String, Value>;

/// Replacement function for [`StateUpdate::ReplaceWith`]
pub type Updater = Box<dyn FnOnce(&State) -> anyhow::Result<State>>;

type Subscriber = Rc<dyn Fn(&State, &State, &str) -> CallbackResult>;

/// A requested state change
pub enum StateUpdate {
    /// Deep-merge this value into the current state; must be an object
    MergePatch(Value),
    /// Replace the whole state with the function's result
    ReplaceWith(Updater),
}

impl StateUpdate {
    pub fn merge(patch: impl Into<Value>) -> Self {
        StateUpdate::MergePatch(patch.into())
    }

    /// Build a replacement update from a fallible function
    pub fn replace_with<F, E>(updater: F) -> Self
    where
        F: FnOnce(&State) -> std::result::Result<State, E> + 'static,
        E: Into<anyhow::Error>,
    {
        StateUpdate::ReplaceWith(Box::new(move |state| updater(state).map_err(Into::into)))
    }
}

impl From<Value> for StateUpdate {
    fn from(patch: Value) -> Self {
        StateUpdate::MergePatch(patch)
    }
}

impl From<State> for StateUpdate {
    fn from(patch: State) -> Self {
        StateUpdate::MergePatch(Value::Object(patch))
    }
}

impl fmt::Debug for StateUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateUpdate::MergePatch(patch) => f.debug_tuple("MergePatch").field(patch).finish(),
            StateUpdate::ReplaceWith(_) => f.write_str("ReplaceWith(..)"),
        }
    }
}

/// Identifies one registered subscriber
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

/// Handle returned by [`Store::subscribe`]
///
/// Dropping the handle does not unsubscribe; call
/// [`unsubscribe`](Subscription::unsubscribe). The handle holds the store
/// weakly.
pub struct Subscription {
    id: SubscriberId,
    store: Weak<RefCell<StoreInner>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Stop notifications to this subscriber; later calls are no-ops
    pub fn unsubscribe(&self) {
        if let Some(inner) = self.store.upgrade() {
            inner.borrow_mut().subscribers.shift_remove(&self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Counters derived from the current state
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Entries in the tracked collection
    pub item_count: usize,
    /// Entries whose completion field is not `true`
    pub active_count: usize,
    /// Entries whose completion field is `true`
    pub completed_count: usize,
    pub subscriber_count: usize,
    pub last_action: Option<String>,
    /// String value of the configured filter field
    pub current_filter: Option<String>,
    /// Unsigned integer value of the configured next-id field
    pub next_id: Option<u64>,
}

struct StoreInner {
    config: StoreConfig,
    state: Rc<State>,
    storage: Box<dyn Storage>,
    subscribers: IndexMap<SubscriberId, Subscriber>,
    next_subscriber: u64,
    last_action: Option<String>,
    last_added_key: Option<String>,
}

impl StoreInner {
    /// Projection of the state that goes to storage
    fn snapshot(&self) -> State {
        if self.config.persisted_fields.is_empty() {
            return (*self.state).clone();
        }
        self.config
            .persisted_fields
            .iter()
            .filter_map(|field| {
                self.state
                    .get(field)
                    .map(|value| (field.clone(), value.clone()))
            })
            .collect()
    }

    fn persist(&self) -> std::result::Result<(), StorageError> {
        if !self.storage.is_available() {
            return Err(StorageError::Unavailable(
                "storage probe failed".to_string(),
            ));
        }
        let serialized = serde_json::to_string(&self.snapshot())?;
        self.storage.set_item(&self.config.storage_key, &serialized)
    }
}

/// Shared handle to the application state store
#[derive(Clone)]
pub struct Store {
    inner: Rc<RefCell<StoreInner>>,
}

impl Store {
    /// Create a store, loading any persisted snapshot over the defaults
    pub fn new(config: StoreConfig, storage: impl Storage + 'static) -> Self {
        let defaults = config.initial_state.clone();
        let state = match load_snapshot(&config, &storage) {
            Some(snapshot) => {
                debug!(key = %config.storage_key, "loaded persisted state");
                deep_merge(&defaults, &snapshot)
            }
            None => defaults,
        };

        Self {
            inner: Rc::new(RefCell::new(StoreInner {
                config,
                state: Rc::new(state),
                storage: Box::new(storage),
                subscribers: IndexMap::new(),
                next_subscriber: 0,
                last_action: None,
                last_added_key: None,
            })),
        }
    }

    /// Current state snapshot
    ///
    /// The snapshot is immutable; later commits produce new snapshots and
    /// never alter one already handed out.
    pub fn get_state(&self) -> Rc<State> {
        Rc::clone(&self.inner.borrow().state)
    }

    /// Value at a dot-separated path, or `None` if any segment is missing
    pub fn get_state_at(&self, path: &str) -> Option<Value> {
        let state = self.get_state();
        value_at(&state, path).cloned()
    }

    /// Apply an update and commit it
    ///
    /// On success the new state has been persisted (best-effort) and every
    /// subscriber has been notified. On error nothing was committed.
    pub fn set_state(&self, update: impl Into<StateUpdate>, action: &str) -> Result<Rc<State>> {
        let prev = self.get_state();

        let (next, added) = match update.into() {
            StateUpdate::MergePatch(Value::Object(patch)) => {
                let added = self.added_key(&prev, &patch, action);
                (deep_merge(&prev, &patch), added)
            }
            StateUpdate::MergePatch(other) => {
                return Err(StoreError::InvalidArgument(format!(
                    "set_state requires an object patch, got {}",
                    json_kind(&other)
                )));
            }
            StateUpdate::ReplaceWith(updater) => match updater(&prev) {
                Ok(next) => (next, None),
                Err(err) => {
                    error!(action, error = %format!("{err:#}"), "state update function failed");
                    return Err(StoreError::UpdateFunction(err));
                }
            },
        };

        Ok(self.commit(prev, next, action, added))
    }

    /// Merge a patch with the default action label
    pub fn set(&self, patch: Value) -> Result<Rc<State>> {
        self.set_state(patch, DEFAULT_ACTION)
    }

    /// Replace the state with the result of `updater`
    pub fn update<F, E>(&self, updater: F, action: &str) -> Result<Rc<State>>
    where
        F: FnOnce(&State) -> std::result::Result<State, E> + 'static,
        E: Into<anyhow::Error>,
    {
        self.set_state(StateUpdate::replace_with(updater), action)
    }

    /// Register a callback run after every committed change
    ///
    /// The callback receives `(new_state, prev_state, action)` and may return
    /// `()` or a `Result`; errors and panics are logged and never reach the
    /// caller of `set_state`.
    pub fn subscribe<F, R>(&self, callback: F) -> Subscription
    where
        F: Fn(&State, &State, &str) -> R + 'static,
        R: IntoCallbackResult,
    {
        let mut inner = self.inner.borrow_mut();
        let id = SubscriberId(inner.next_subscriber);
        inner.next_subscriber += 1;
        inner.subscribers.insert(
            id,
            Rc::new(move |state: &State, prev: &State, action: &str| {
                callback(state, prev, action).into_callback_result()
            }),
        );

        Subscription {
            id,
            store: Rc::downgrade(&self.inner),
        }
    }

    /// Remove a subscriber by id; returns whether it was registered
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.inner.borrow_mut().subscribers.shift_remove(&id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    /// Restore the initial state, persist it, and notify with an empty
    /// previous state and the `RESET` action
    pub fn reset(&self) -> Rc<State> {
        let initial = self.inner.borrow().config.initial_state.clone();
        self.commit(Rc::new(State::new()), initial, RESET_ACTION, None)
    }

    /// Label of the most recent committed action
    pub fn last_action(&self) -> Option<String> {
        self.inner.borrow().last_action.clone()
    }

    /// First key added to the tracked collection by the last "add" action
    pub fn last_added_key(&self) -> Option<String> {
        self.inner.borrow().last_added_key.clone()
    }

    pub fn config(&self) -> StoreConfig {
        self.inner.borrow().config.clone()
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.borrow();
        let mut stats = StoreStats {
            subscriber_count: inner.subscribers.len(),
            last_action: inner.last_action.clone(),
            current_filter: inner
                .config
                .filter_field
                .as_deref()
                .and_then(|name| inner.state.get(name))
                .and_then(Value::as_str)
                .map(str::to_string),
            next_id: inner
                .config
                .next_id_field
                .as_deref()
                .and_then(|name| inner.state.get(name))
                .and_then(Value::as_u64),
            ..StoreStats::default()
        };

        let items = inner
            .config
            .tracked_collection
            .as_deref()
            .and_then(|name| inner.state.get(name))
            .and_then(Value::as_object);
        if let Some(items) = items {
            stats.item_count = items.len();
            stats.completed_count = items
                .values()
                .filter(|item| {
                    item.get(&inner.config.completed_field)
                        .and_then(Value::as_bool)
                        .unwrap_or(false)
                })
                .count();
            stats.active_count = stats.item_count - stats.completed_count;
        }
        stats
    }

    fn added_key(&self, prev: &State, patch: &State, action: &str) -> Option<String> {
        let inner = self.inner.borrow();
        if action != inner.config.add_action {
            return None;
        }
        let collection = inner.config.tracked_collection.as_deref()?;
        let incoming = patch.get(collection)?.as_object()?;
        let existing = prev.get(collection).and_then(Value::as_object);
        incoming
            .keys()
            .find(|key| existing.map_or(true, |items| !items.contains_key(*key)))
            .cloned()
    }

    fn commit(
        &self,
        prev: Rc<State>,
        next: State,
        action: &str,
        added: Option<String>,
    ) -> Rc<State> {
        let next = Rc::new(next);

        let subscribers: Vec<(SubscriberId, Subscriber)> = {
            let mut inner = self.inner.borrow_mut();
            inner.state = Rc::clone(&next);
            inner.last_action = Some(action.to_string());
            if added.is_some() {
                inner.last_added_key = added;
            }
            if let Err(err) = inner.persist() {
                warn!(key = %inner.config.storage_key, error = %err, "failed to persist state");
            }
            inner
                .subscribers
                .iter()
                .map(|(id, subscriber)| (*id, Rc::clone(subscriber)))
                .collect()
        };

        for (id, subscriber) in &subscribers {
            if let Err(failure) = run_isolated(|| subscriber(&next, &prev, action)) {
                warn!(subscriber = id.0, action, error = %failure, "subscriber failed");
            }
        }

        next
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Store")
            .field("storage_key", &inner.config.storage_key)
            .field("state", &inner.state)
            .field("subscribers", &inner.subscribers.len())
            .field("last_action", &inner.last_action)
            .finish()
    }
}

/// Read and validate the persisted snapshot, discarding anything malformed
fn load_snapshot(config: &StoreConfig, storage: &dyn Storage) -> Option<State> {
    if !storage.is_available() {
        debug!("storage unavailable, starting from defaults");
        return None;
    }

    let raw = match storage.get_item(&config.storage_key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            warn!(key = %config.storage_key, error = %err, "failed to read persisted state");
            return None;
        }
    };

    let snapshot = match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(snapshot)) => snapshot,
        Ok(other) => {
            debug!(kind = json_kind(&other), "discarding non-object snapshot");
            return None;
        }
        Err(err) => {
            debug!(error = %err, "discarding unparseable snapshot");
            return None;
        }
    };

    let bad_collection = config
        .collections
        .iter()
        .find(|field| snapshot.get(*field).is_some_and(|value| !value.is_object()));
    if let Some(field) = bad_collection {
        debug!(field = %field, "discarding snapshot with malformed collection");
        return None;
    }

    Some(snapshot)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
