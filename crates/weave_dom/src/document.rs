//! Document root and native listener table
//!
//! The document is the only place native listeners live. Dispatching an event
//! at an element runs the document's capture listeners, then its bubble
//! listeners; elements that are not connected to the document never reach
//! them, matching how detached nodes behave in a browser.

use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::trace;

use crate::element::Element;
use crate::events::{normalize_event_type, DomEvent, EventData};

new_key_type! {
    /// Identifier of a document-level native listener
    pub struct ListenerId;
}

/// Native listener callback
pub type NativeListener = Rc<dyn Fn(&mut DomEvent)>;

struct ListenerEntry {
    event_type: String,
    capture: bool,
    listener: NativeListener,
}

#[derive(Default)]
struct ListenerTable {
    entries: SlotMap<ListenerId, ListenerEntry>,
    /// Registration order per event type
    by_type: FxHashMap<String, SmallVec<[ListenerId; 2]>>,
}

struct DocumentInner {
    root: Element,
    listeners: RefCell<ListenerTable>,
}

/// Shared handle to a document
#[derive(Clone)]
pub struct Document {
    inner: Rc<DocumentInner>,
}

impl Document {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(DocumentInner {
                root: Element::document_root(),
                listeners: RefCell::new(ListenerTable::default()),
            }),
        }
    }

    /// The document node; attach content under it to make it reachable
    pub fn root(&self) -> Element {
        self.inner.root.clone()
    }

    pub fn create_element(&self, tag: &str) -> Element {
        Element::new(tag)
    }

    /// True if `element` is attached somewhere under the document root
    pub fn is_connected(&self, element: &Element) -> bool {
        self.inner.root.contains(element)
    }

    /// Register a native listener under the normalized form of `event_type`
    pub fn add_event_listener<F>(&self, event_type: &str, capture: bool, listener: F) -> ListenerId
    where
        F: Fn(&mut DomEvent) + 'static,
    {
        let event_type = normalize_event_type(event_type);
        let mut table = self.inner.listeners.borrow_mut();
        let id = table.entries.insert(ListenerEntry {
            event_type: event_type.clone(),
            capture,
            listener: Rc::new(listener),
        });
        table.by_type.entry(event_type).or_default().push(id);
        id
    }

    /// Remove a listener; returns false if it was already gone
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let mut table = self.inner.listeners.borrow_mut();
        let Some(entry) = table.entries.remove(id) else {
            return false;
        };
        if let Some(ids) = table.by_type.get_mut(&entry.event_type) {
            ids.retain(|other| *other != id);
            if ids.is_empty() {
                table.by_type.remove(&entry.event_type);
            }
        }
        true
    }

    /// Number of native listeners registered for `event_type`
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.inner
            .listeners
            .borrow()
            .by_type
            .get(&normalize_event_type(event_type))
            .map_or(0, |ids| ids.len())
    }

    /// Total number of native listeners
    pub fn total_listener_count(&self) -> usize {
        self.inner.listeners.borrow().entries.len()
    }

    /// Build and dispatch an event at `target`, returning it afterwards
    pub fn dispatch_event(&self, target: &Element, event_type: &str, data: EventData) -> DomEvent {
        let mut event = DomEvent::new(event_type, target.clone(), data);
        self.dispatch(&mut event);
        event
    }

    /// Dispatch an already-built event; its type is normalized first
    pub fn dispatch(&self, event: &mut DomEvent) {
        event.event_type = normalize_event_type(&event.event_type);
        if !self.is_connected(&event.target) {
            trace!(event_type = %event.event_type, "target not connected, event dropped");
            return;
        }

        let (capture, bubble): (Vec<_>, Vec<_>) = {
            let table = self.inner.listeners.borrow();
            table
                .by_type
                .get(&event.event_type)
                .into_iter()
                .flatten()
                .filter_map(|id| table.entries.get(*id))
                .map(|entry| (entry.capture, Rc::clone(&entry.listener)))
                .partition(|(capture, _)| *capture)
        };

        for (_, listener) in capture {
            listener(event);
        }
        if event.propagation_stopped {
            return;
        }
        for (_, listener) in bubble {
            listener(event);
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("root", &self.inner.root)
            .field("listeners", &self.total_listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_capture_runs_before_bubble() {
        let doc = Document::new();
        let button = doc.create_element("button");
        doc.root().append_child(&button).unwrap();

        let order = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&order);
        doc.add_event_listener("click", false, move |_| log.borrow_mut().push("bubble"));
        let log = Rc::clone(&order);
        doc.add_event_listener("click", true, move |_| log.borrow_mut().push("capture"));

        doc.dispatch_event(&button, "click", EventData::None);
        assert_eq!(*order.borrow(), vec!["capture", "bubble"]);
    }

    #[test]
    fn test_detached_targets_are_not_delivered() {
        let doc = Document::new();
        let hits = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&hits);
        doc.add_event_listener("click", true, move |_| *counter.borrow_mut() += 1);

        let detached = doc.create_element("div");
        doc.dispatch_event(&detached, "click", EventData::None);
        assert_eq!(*hits.borrow(), 0);
    }

    #[test]
    fn test_remove_listener() {
        let doc = Document::new();
        let id = doc.add_event_listener("input", true, |_| {});
        assert_eq!(doc.listener_count("input"), 1);
        assert!(doc.remove_event_listener(id));
        assert!(!doc.remove_event_listener(id));
        assert_eq!(doc.listener_count("input"), 0);
        assert_eq!(doc.total_listener_count(), 0);
    }

    #[test]
    fn test_dispatch_normalizes_event_type() {
        let doc = Document::new();
        let button = doc.create_element("button");
        doc.root().append_child(&button).unwrap();

        let hits = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&hits);
        doc.add_event_listener("click", true, move |_| *counter.borrow_mut() += 1);

        let event = doc.dispatch_event(&button, "Click", EventData::None);
        assert_eq!(event.event_type, "click");
        assert_eq!(*hits.borrow(), 1);
        assert_eq!(doc.listener_count("onClick"), 1);
    }
}
