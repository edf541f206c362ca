//! Event objects, handler configs, and event-type normalization

use indexmap::IndexMap;
use std::fmt;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use weave_core::{CallbackResult, IntoCallbackResult, State, StateUpdate, Store, StoreError};

use crate::element::Element;

/// Native event types the framework expects to route
pub const KNOWN_EVENT_TYPES: &[&str] = &[
    "click",
    "dblclick",
    "input",
    "submit",
    "keydown",
    "keyup",
    "keypress",
    "change",
    "focus",
    "blur",
    "mouseenter",
    "mouseleave",
    "mousedown",
    "mouseup",
    "touchstart",
    "touchend",
];

/// Framework-level names mapped to the native event they mean
const EVENT_ALIASES: &[(&str, &str)] = &[
    ("doubleclick", "dblclick"),
    ("textinput", "input"),
    ("press", "click"),
];

fn alias_for(name: &str) -> Option<&'static str> {
    EVENT_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, native)| *native)
}

fn is_routable(name: &str) -> bool {
    KNOWN_EVENT_TYPES.contains(&name) || alias_for(name).is_some()
}

/// Normalize an event-type name to the native name handlers are stored under
///
/// Case is ignored everywhere. `-` and `_` are ignored, and an `on` prefix is
/// dropped, only when the result is a known event or alias; aliases resolve
/// to their native event. Any other name is kept trimmed and lowercased, so
/// custom events such as `todo-added` route under their own name.
///
/// ```rust
/// use weave_dom::normalize_event_type;
///
/// assert_eq!(normalize_event_type("onClick"), "click");
/// assert_eq!(normalize_event_type("key_down"), "keydown");
/// assert_eq!(normalize_event_type("doubleClick"), "dblclick");
/// assert_eq!(normalize_event_type("online"), "online");
/// assert_eq!(normalize_event_type("Todo-Added"), "todo-added");
/// ```
pub fn normalize_event_type(name: &str) -> String {
    let lowered = name.trim().to_ascii_lowercase();
    let folded: String = lowered
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .collect();

    let unprefixed = match folded.strip_prefix("on") {
        Some(rest) if is_routable(rest) => rest,
        _ => folded.as_str(),
    };

    match alias_for(unprefixed) {
        Some(native) => native.to_string(),
        None if KNOWN_EVENT_TYPES.contains(&unprefixed) => unprefixed.to_string(),
        None => lowered,
    }
}

/// Milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Event-specific data
#[derive(Clone, Debug, Default, PartialEq)]
pub enum EventData {
    Pointer {
        x: f32,
        y: f32,
        button: u8,
    },
    Key {
        /// Key name, e.g. `Enter`, `Escape`, `a`
        key: String,
        repeat: bool,
    },
    /// Value of the input after the change
    Input {
        value: String,
    },
    #[default]
    None,
}

/// A UI event travelling through the router
pub struct DomEvent {
    pub event_type: String,
    /// Element the event was dispatched at
    pub target: Element,
    /// Element whose handlers are currently running
    pub current_target: Option<Element>,
    pub data: EventData,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    pub propagation_stopped: bool,
    pub default_prevented: bool,
    store: Option<Store>,
}

impl DomEvent {
    pub fn new(event_type: impl Into<String>, target: Element, data: EventData) -> Self {
        Self {
            event_type: event_type.into(),
            target,
            current_target: None,
            data,
            timestamp: now_millis(),
            propagation_stopped: false,
            default_prevented: false,
            store: None,
        }
    }

    /// Stop the ancestor walk once the current element's handlers finish
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    /// Key name for keyboard events
    pub fn key(&self) -> Option<&str> {
        match &self.data {
            EventData::Key { key, .. } => Some(key.as_str()),
            _ => None,
        }
    }

    /// Input value for input/change events
    pub fn value(&self) -> Option<&str> {
        match &self.data {
            EventData::Input { value } => Some(value.as_str()),
            _ => None,
        }
    }

    /// Store attached to the router that dispatched this event
    pub fn store(&self) -> Option<&Store> {
        self.store.as_ref()
    }

    pub(crate) fn attach_store(&mut self, store: Store) {
        self.store = Some(store);
    }

    /// Apply a state update through the attached store
    pub fn update_state(
        &self,
        update: impl Into<StateUpdate>,
        action: &str,
    ) -> Result<Rc<State>, StoreError> {
        match &self.store {
            Some(store) => store.set_state(update, action),
            None => Err(StoreError::InvalidArgument(
                "no store attached to the event router".to_string(),
            )),
        }
    }
}

impl fmt::Debug for DomEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomEvent")
            .field("event_type", &self.event_type)
            .field("target", &self.target)
            .field("current_target", &self.current_target)
            .field("data", &self.data)
            .field("timestamp", &self.timestamp)
            .field("propagation_stopped", &self.propagation_stopped)
            .finish()
    }
}

/// Wrapped event handler
pub type Handler = Rc<dyn Fn(&mut DomEvent) -> CallbackResult>;

/// Wrap a handler returning `()` or `Result<(), E>`
pub fn wrap_handler<F, R>(handler: F) -> Handler
where
    F: Fn(&mut DomEvent) -> R + 'static,
    R: IntoCallbackResult,
{
    Rc::new(move |event: &mut DomEvent| handler(event).into_callback_result())
}

/// Mapping from event-type name to handler
///
/// ```rust
/// use weave_dom::EventConfig;
///
/// let config = EventConfig::new()
///     .on("click", |_event| ())
///     .on("keydown", |event| {
///         if event.key() == Some("Enter") {
///             event.stop_propagation();
///         }
///     });
/// assert_eq!(config.len(), 2);
/// ```
#[derive(Clone, Default)]
pub struct EventConfig {
    handlers: IndexMap<String, Handler>,
}

impl EventConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the handler for `event_type`, replacing any previous one
    pub fn on<F, R>(mut self, event_type: &str, handler: F) -> Self
    where
        F: Fn(&mut DomEvent) -> R + 'static,
        R: IntoCallbackResult,
    {
        self.handlers
            .insert(event_type.to_string(), wrap_handler(handler));
        self
    }

    /// Copy every entry of `other` over this config
    pub fn assign(&mut self, other: EventConfig) {
        self.handlers.extend(other.handlers);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn event_types(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn get(&self, event_type: &str) -> Option<&Handler> {
        self.handlers.get(event_type)
    }
}

impl IntoIterator for EventConfig {
    type Item = (String, Handler);
    type IntoIter = indexmap::map::IntoIter<String, Handler>;

    fn into_iter(self) -> Self::IntoIter {
        self.handlers.into_iter()
    }
}

impl fmt::Debug for EventConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_event_type("click"), "click");
        assert_eq!(normalize_event_type(" CLICK "), "click");
        assert_eq!(normalize_event_type("onKeyDown"), "keydown");
        assert_eq!(normalize_event_type("on_double_click"), "dblclick");
        assert_eq!(normalize_event_type("press"), "click");
    }

    #[test]
    fn test_normalize_keeps_custom_names() {
        assert_eq!(normalize_event_type("custom-thing"), "custom-thing");
        assert_eq!(normalize_event_type(" Todo_Added "), "todo_added");
        assert_eq!(normalize_event_type("onboarding"), "onboarding");
        assert_eq!(normalize_event_type("on-save"), "on-save");
    }

    #[test]
    fn test_assign_overwrites_per_type() {
        let mut config = EventConfig::new().on("click", |_| ());
        let first = Rc::clone(config.get("click").unwrap());

        config.assign(EventConfig::new().on("click", |_| ()).on("input", |_| ()));

        assert_eq!(config.len(), 2);
        assert!(!Rc::ptr_eq(&first, config.get("click").unwrap()));
    }

    #[test]
    fn test_event_accessors() {
        let target = Element::new("input");
        let key = DomEvent::new(
            "keydown",
            target.clone(),
            EventData::Key {
                key: "Enter".into(),
                repeat: false,
            },
        );
        assert_eq!(key.key(), Some("Enter"));
        assert_eq!(key.value(), None);

        let input = DomEvent::new("input", target, EventData::Input { value: "hi".into() });
        assert_eq!(input.value(), Some("hi"));
        assert!(input.timestamp > 0);
        assert!(input.update_state(StateUpdate::MergePatch(Default::default()), "X").is_err());
    }
}
