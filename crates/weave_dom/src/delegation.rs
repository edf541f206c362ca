//! Selector-based delegation
//!
//! Binds one handler on a container that fires for events whose target sits
//! inside a descendant matching a selector, e.g. every `.destroy` button in a
//! todo list. Elements matching the selector can come and go freely; only the
//! container is bound.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::fmt;
use tracing::debug;

use weave_core::{CallbackResult, IntoCallbackResult};

use crate::element::{Element, ElementId, WeakElement};
use crate::error::SelectorError;
use crate::events::{normalize_event_type, wrap_handler, DomEvent, Handler};
use crate::router::EventRouter;
use crate::selector::Selector;

struct ContainerDelegations {
    container: WeakElement,
    /// Bound wrappers keyed by `selector-event_type`
    handlers: IndexMap<String, (String, Handler)>,
}

/// Delegation helper layered over an [`EventRouter`]
pub struct EventDelegation {
    router: EventRouter,
    delegated: RefCell<FxHashMap<ElementId, ContainerDelegations>>,
}

impl EventDelegation {
    pub fn new(router: &EventRouter) -> Self {
        Self {
            router: router.clone(),
            delegated: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    /// Run `handler` for `event_type` events inside descendants of
    /// `container` matching `selector`
    ///
    /// While the handler runs, `event.current_target` is the matched element.
    /// Delegating the same selector and event type again replaces the earlier
    /// handler.
    pub fn delegate<F, R>(
        &self,
        container: &Element,
        selector: &str,
        event_type: &str,
        handler: F,
    ) -> Result<(), SelectorError>
    where
        F: Fn(&mut DomEvent) -> R + 'static,
        R: IntoCallbackResult,
    {
        let selector = Selector::parse(selector)?;
        let event_type = normalize_event_type(event_type);
        let key = delegation_key(&selector, &event_type);

        self.undelegate_key(container, &key);

        let scope = container.downgrade();
        let inner = wrap_handler(handler);
        let matcher = selector.clone();
        let wrapper = wrap_handler(move |event: &mut DomEvent| -> CallbackResult {
            let Some(container) = scope.upgrade() else {
                return Ok(());
            };
            let Some(matched) = event.target.closest(&matcher) else {
                return Ok(());
            };
            if !container.contains(&matched) {
                return Ok(());
            }

            let previous = event.current_target.replace(matched);
            let result = inner(event);
            event.current_target = previous;
            result
        });

        self.router
            .bind_handler(container, &event_type, wrapper.clone());

        self.reconcile();
        self.delegated
            .borrow_mut()
            .entry(container.id())
            .or_insert_with(|| ContainerDelegations {
                container: container.downgrade(),
                handlers: IndexMap::new(),
            })
            .handlers
            .insert(key, (event_type, wrapper));

        debug!(selector = %selector, "delegated handler bound");
        Ok(())
    }

    /// Stop a delegation made with [`delegate`](Self::delegate)
    ///
    /// Returns false if there was none, including for selectors that do not
    /// parse.
    pub fn undelegate(&self, container: &Element, selector: &str, event_type: &str) -> bool {
        let Ok(selector) = Selector::parse(selector) else {
            return false;
        };
        let key = delegation_key(&selector, &normalize_event_type(event_type));
        self.undelegate_key(container, &key)
    }

    fn undelegate_key(&self, container: &Element, key: &str) -> bool {
        self.reconcile();
        let removed = {
            let mut delegated = self.delegated.borrow_mut();
            let Some(entry) = delegated.get_mut(&container.id()) else {
                return false;
            };
            let removed = entry.handlers.shift_remove(key);
            if entry.handlers.is_empty() {
                delegated.remove(&container.id());
            }
            removed
        };

        match removed {
            Some((event_type, wrapper)) => {
                self.router.unbind_handler(container, &event_type, &wrapper)
            }
            None => false,
        }
    }

    /// Forget delegations whose container is gone or whose wrapper the router
    /// no longer holds, e.g. after `unbind`, `cleanup` or `destroy`
    fn reconcile(&self) {
        let mut delegated = self.delegated.borrow_mut();
        delegated.retain(|_, entry| {
            let Some(container) = entry.container.upgrade() else {
                return false;
            };
            entry.handlers.retain(|_, (event_type, wrapper)| {
                self.router.has_handler(&container, event_type, wrapper)
            });
            !entry.handlers.is_empty()
        });
    }

    /// Number of active delegations on `container`
    pub fn delegated_count(&self, container: &Element) -> usize {
        self.reconcile();
        self.delegated
            .borrow()
            .get(&container.id())
            .map_or(0, |entry| entry.handlers.len())
    }
}

fn delegation_key(selector: &Selector, event_type: &str) -> String {
    format!("{}-{}", selector.source(), event_type)
}

impl fmt::Debug for EventDelegation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDelegation")
            .field("router", &self.router)
            .field("containers", &self.delegated.borrow().len())
            .finish()
    }
}
