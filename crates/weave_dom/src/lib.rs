//! Weave Event Layer
//!
//! The event half of the Weave reactive core:
//!
//! - **Element tree**: reference-counted elements under a [`Document`] root
//! - **EventRouter**: one capture listener per event type on the document,
//!   ancestor-walk dispatch into an identity-keyed [`ElementRegistry`]
//! - **Delegation**: selector-scoped handlers on a container
//!
//! Handlers reach the store through the event, so an event, the state update
//! it causes, and the re-render that follows run as one synchronous turn.
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use weave_core::{MemoryStorage, Store, StoreConfig};
//! use weave_dom::{Document, EventData, EventDelegation, EventRouter};
//!
//! let store = Store::new(StoreConfig::default(), MemoryStorage::new());
//! let document = Document::new();
//! let router = EventRouter::new(&document).with_store(store.clone());
//! let delegation = EventDelegation::new(&router);
//!
//! let list = document.create_element("ul").with_class("todo-list");
//! document.root().append_child(&list).unwrap();
//!
//! delegation
//!     .delegate(&list, ".destroy", "click", |event| {
//!         event.update_state(json!({"filter": "active"}), "SET_FILTER").map(|_| ())
//!     })
//!     .unwrap();
//!
//! let button = document.create_element("button").with_class("destroy");
//! list.append_child(&button).unwrap();
//! document.dispatch_event(&button, "click", EventData::None);
//!
//! assert_eq!(store.get_state_at("filter"), Some(json!("active")));
//! ```

pub mod delegation;
pub mod document;
pub mod element;
pub mod error;
pub mod events;
pub mod registry;
pub mod router;
pub mod selector;
pub mod vnode;

pub use delegation::EventDelegation;
pub use document::{Document, ListenerId, NativeListener};
pub use element::{Ancestors, Element, ElementId, WeakElement, DOCUMENT_TAG};
pub use error::{DomError, SelectorError};
pub use events::{
    normalize_event_type, wrap_handler, DomEvent, EventConfig, EventData, Handler,
    KNOWN_EVENT_TYPES,
};
pub use registry::{ElementRegistry, HandlerList};
pub use router::{BindTarget, EventRouter};
pub use selector::{AttributeSelector, CompoundSelector, Selector};
pub use vnode::{VElement, VNode};
