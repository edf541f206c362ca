//! Identity-keyed element registry
//!
//! Maps an element to the handlers bound to it, keyed by [`ElementId`] and
//! holding the element only through a [`WeakElement`]. The registry never keeps
//! an element alive: once the tree and every outside handle let go of it, its
//! entry is dead and is reclaimed by the next sweep. Sweeps run lazily from
//! [`register`](ElementRegistry::register) whenever the table has doubled since
//! the last one, so reclamation cost stays amortized O(1) per bind.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::rc::Rc;
use tracing::trace;

use crate::element::{Element, ElementId, WeakElement};
use crate::events::Handler;

/// Smallest table size that triggers a sweep
const MIN_SWEEP_THRESHOLD: usize = 64;

/// Handlers of one element for one event type, in registration order
pub type HandlerList = SmallVec<[Handler; 2]>;

struct HandlerSet {
    element: WeakElement,
    events: IndexMap<String, HandlerList>,
}

pub struct ElementRegistry {
    entries: FxHashMap<ElementId, HandlerSet>,
    sweep_at: usize,
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
            sweep_at: MIN_SWEEP_THRESHOLD,
        }
    }

    /// Append `handler` to the element's list for `event_type`
    ///
    /// The entry is created on first use. `event_type` is expected to be
    /// normalized already.
    pub fn register(&mut self, element: &Element, event_type: &str, handler: Handler) {
        if self.entries.len() >= self.sweep_at {
            self.sweep();
            self.sweep_at = (self.entries.len() * 2).max(MIN_SWEEP_THRESHOLD);
        }

        self.entries
            .entry(element.id())
            .or_insert_with(|| HandlerSet {
                element: element.downgrade(),
                events: IndexMap::new(),
            })
            .events
            .entry(event_type.to_string())
            .or_default()
            .push(handler);
    }

    /// Remove one specific handler; returns false if it was not bound
    ///
    /// Empty lists and entries are dropped along with it.
    pub fn unregister(&mut self, element: &Element, event_type: &str, handler: &Handler) -> bool {
        let Some(set) = self.entries.get_mut(&element.id()) else {
            return false;
        };
        let Some(list) = set.events.get_mut(event_type) else {
            return false;
        };
        let before = list.len();
        list.retain(|bound| !Rc::ptr_eq(bound, handler));
        let removed = list.len() != before;

        if list.is_empty() {
            set.events.shift_remove(event_type);
        }
        if set.events.is_empty() {
            self.entries.remove(&element.id());
        }
        removed
    }

    /// Snapshot of the handlers bound to `element` for `event_type`
    pub fn handlers(&self, element: &Element, event_type: &str) -> HandlerList {
        self.entries
            .get(&element.id())
            .and_then(|set| set.events.get(event_type))
            .cloned()
            .unwrap_or_default()
    }

    /// Drop every handler bound to `element`; returns false if it had none
    pub fn remove(&mut self, element: &Element) -> bool {
        self.entries.remove(&element.id()).is_some()
    }

    pub fn contains(&self, element: &Element) -> bool {
        self.entries.contains_key(&element.id())
    }

    /// True if this exact handler is still bound to `element` for `event_type`
    pub fn is_registered(&self, element: &Element, event_type: &str, handler: &Handler) -> bool {
        self.entries
            .get(&element.id())
            .and_then(|set| set.events.get(event_type))
            .is_some_and(|list| list.iter().any(|bound| Rc::ptr_eq(bound, handler)))
    }

    /// Event types with at least one handler on `element`
    pub fn event_types(&self, element: &Element) -> Vec<String> {
        self.entries
            .get(&element.id())
            .map(|set| set.events.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn handler_count(&self, element: &Element) -> usize {
        self.entries
            .get(&element.id())
            .map_or(0, |set| set.events.values().map(|list| list.len()).sum())
    }

    /// Reclaim entries whose element has been freed; returns how many
    pub fn sweep(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, set| set.element.is_alive());
        let removed = before - self.entries.len();
        if removed > 0 {
            trace!(removed, remaining = self.entries.len(), "swept dead registry entries");
        }
        removed
    }

    /// Number of entries, dead ones included until the next sweep
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Number of entries whose element is still alive
    pub fn live_len(&self) -> usize {
        self.entries
            .values()
            .filter(|set| set.element.is_alive())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.sweep_at = MIN_SWEEP_THRESHOLD;
    }
}

impl Default for ElementRegistry {
    fn default() -> Self {
        Self::new()
    }
}
