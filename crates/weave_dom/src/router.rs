//! Event router
//!
//! Routes native events to handlers bound against individual elements without
//! attaching a listener per element. The router installs one capture listener
//! per event type on the document, the first time a handler for that type is
//! bound. When an event arrives it walks from the target up through its
//! ancestors, stopping below the document root, and runs the handlers each
//! node has for the event type.
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use weave_dom::{Document, EventConfig, EventData, EventRouter};
//!
//! let document = Document::new();
//! let router = EventRouter::new(&document);
//!
//! let list = document.create_element("ul");
//! let item = document.create_element("li");
//! document.root().append_child(&list).unwrap();
//! list.append_child(&item).unwrap();
//!
//! let clicks = Rc::new(Cell::new(0));
//! let counter = Rc::clone(&clicks);
//! router.bind(&list, EventConfig::new().on("onClick", move |_event| {
//!     counter.set(counter.get() + 1);
//! }));
//!
//! document.dispatch_event(&item, "click", EventData::None);
//! assert_eq!(clicks.get(), 1);
//! ```

use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, warn};

use weave_core::{run_isolated, Store};

use crate::document::{Document, ListenerId};
use crate::element::Element;
use crate::error::DomError;
use crate::events::{normalize_event_type, DomEvent, EventConfig, Handler};
use crate::registry::ElementRegistry;
use crate::vnode::{VElement, VNode};

/// What a handler config is bound to
pub enum BindTarget<'a> {
    /// A real element; handlers go into the registry
    Mounted(&'a Element),
    /// A virtual element; handlers wait on its `events` until mounted
    Virtual(&'a mut VElement),
}

impl<'a> From<&'a Element> for BindTarget<'a> {
    fn from(element: &'a Element) -> Self {
        BindTarget::Mounted(element)
    }
}

impl<'a> From<&'a mut VElement> for BindTarget<'a> {
    fn from(element: &'a mut VElement) -> Self {
        BindTarget::Virtual(element)
    }
}

struct RouterInner {
    document: Document,
    registry: ElementRegistry,
    /// Installed document listeners, by normalized event type
    listeners: IndexMap<String, ListenerId>,
    store: Option<Store>,
}

/// Shared handle to an event router
#[derive(Clone)]
pub struct EventRouter {
    inner: Rc<RefCell<RouterInner>>,
}

impl EventRouter {
    pub fn new(document: &Document) -> Self {
        Self {
            inner: Rc::new(RefCell::new(RouterInner {
                document: document.clone(),
                registry: ElementRegistry::new(),
                listeners: IndexMap::new(),
                store: None,
            })),
        }
    }

    /// Attach a store that handlers can reach through [`DomEvent::store`]
    pub fn with_store(self, store: Store) -> Self {
        self.set_store(Some(store));
        self
    }

    pub fn set_store(&self, store: Option<Store>) {
        self.inner.borrow_mut().store = store;
    }

    pub fn store(&self) -> Option<Store> {
        self.inner.borrow().store.clone()
    }

    pub fn document(&self) -> Document {
        self.inner.borrow().document.clone()
    }

    /// Bind every handler in `config` to `target`
    ///
    /// Event-type names are normalized. A virtual target keeps the config
    /// until [`mount`](Self::mount) creates the element.
    pub fn bind<'a>(&self, target: impl Into<BindTarget<'a>>, config: EventConfig) {
        match target.into() {
            BindTarget::Virtual(velement) => velement.events.assign(config),
            BindTarget::Mounted(element) => {
                for (event_type, handler) in config {
                    self.bind_handler(element, &event_type, handler);
                }
            }
        }
    }

    /// Bind one already-wrapped handler and return the type it was stored under
    pub fn bind_handler(&self, element: &Element, event_type: &str, handler: Handler) -> String {
        let event_type = normalize_event_type(event_type);
        self.ensure_listener(&event_type);
        self.inner
            .borrow_mut()
            .registry
            .register(element, &event_type, handler);
        event_type
    }

    /// Remove one handler previously bound with [`bind_handler`](Self::bind_handler)
    pub fn unbind_handler(&self, element: &Element, event_type: &str, handler: &Handler) -> bool {
        let event_type = normalize_event_type(event_type);
        self.inner
            .borrow_mut()
            .registry
            .unregister(element, &event_type, handler)
    }

    /// True if `handler` is still bound to `element` for `event_type`
    pub fn has_handler(&self, element: &Element, event_type: &str, handler: &Handler) -> bool {
        let event_type = normalize_event_type(event_type);
        self.inner
            .borrow()
            .registry
            .is_registered(element, &event_type, handler)
    }

    /// Remove every handler bound to `element`; returns false if it had none
    pub fn unbind(&self, element: &Element) -> bool {
        self.inner.borrow_mut().registry.remove(element)
    }

    /// [`unbind`](Self::unbind) the element, then reclaim entries of freed elements
    pub fn cleanup(&self, element: &Element) -> bool {
        let mut inner = self.inner.borrow_mut();
        let removed = inner.registry.remove(element);
        inner.registry.sweep();
        removed
    }

    /// Remove every document listener this router installed and forget all
    /// bindings and the attached store
    ///
    /// The router stays usable: a later bind installs listeners again.
    pub fn destroy(&self) {
        let mut inner = self.inner.borrow_mut();
        let listeners = std::mem::take(&mut inner.listeners);
        for (_, id) in &listeners {
            inner.document.remove_event_listener(*id);
        }
        inner.registry.clear();
        inner.store = None;
        debug!(listeners = listeners.len(), "event router destroyed");
    }

    /// Create the element tree described by `velement` under `parent`
    ///
    /// Handlers declared on virtual elements become real bindings.
    pub fn mount(&self, velement: &VElement, parent: &Element) -> Result<Element, DomError> {
        let element = self.materialize(velement)?;
        parent.append_child(&element)?;
        Ok(element)
    }

    fn materialize(&self, velement: &VElement) -> Result<Element, DomError> {
        let element = Element::new(&velement.tag);
        for (name, value) in &velement.attributes {
            element.set_attribute(name, value.as_str());
        }
        for child in &velement.children {
            match child {
                VNode::Element(child) => element.append_child(&self.materialize(child)?)?,
                VNode::Text(text) => element.push_text(text),
            }
        }
        self.bind(&element, velement.events.clone());
        Ok(element)
    }

    pub fn is_bound(&self, element: &Element) -> bool {
        self.inner.borrow().registry.contains(element)
    }

    pub fn handler_count(&self, element: &Element) -> usize {
        self.inner.borrow().registry.handler_count(element)
    }

    /// Event types the router has a document listener for, in install order
    pub fn listened_event_types(&self) -> Vec<String> {
        self.inner.borrow().listeners.keys().cloned().collect()
    }

    /// Registry entries, dead ones included until swept
    pub fn registry_len(&self) -> usize {
        self.inner.borrow().registry.len()
    }

    pub fn live_registry_len(&self) -> usize {
        self.inner.borrow().registry.live_len()
    }

    /// Reclaim registry entries of freed elements
    pub fn sweep(&self) -> usize {
        self.inner.borrow_mut().registry.sweep()
    }

    fn ensure_listener(&self, event_type: &str) {
        if self.inner.borrow().listeners.contains_key(event_type) {
            return;
        }

        let weak: Weak<RefCell<RouterInner>> = Rc::downgrade(&self.inner);
        let document = self.document();
        let id = document.add_event_listener(event_type, true, move |event| {
            if let Some(inner) = weak.upgrade() {
                route(&inner, event);
            }
        });
        self.inner
            .borrow_mut()
            .listeners
            .insert(event_type.to_string(), id);
        debug!(event_type, "installed document listener");
    }
}

/// Walk from the target to just below the document root, running handlers
fn route(inner: &Rc<RefCell<RouterInner>>, event: &mut DomEvent) {
    let (root, store) = {
        let inner = inner.borrow();
        (inner.document.root(), inner.store.clone())
    };
    if let Some(store) = store {
        event.attach_store(store);
    }

    let event_type = event.event_type.clone();
    for node in event.target.ancestors() {
        if node == root {
            break;
        }

        let handlers = inner.borrow().registry.handlers(&node, &event_type);
        if handlers.is_empty() {
            continue;
        }

        event.current_target = Some(node.clone());
        for handler in handlers {
            if let Err(failure) = run_isolated(|| handler(event)) {
                warn!(event_type = %event_type, element = ?node, "event handler failed: {failure}");
            }
        }
        if event.propagation_stopped {
            break;
        }
    }
    event.current_target = None;
}

impl fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("EventRouter")
            .field("listeners", &inner.listeners.keys().collect::<Vec<_>>())
            .field("registry", &inner.registry.len())
            .field("store", &inner.store.is_some())
            .finish()
    }
}
