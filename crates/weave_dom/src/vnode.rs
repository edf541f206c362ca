//! Virtual elements
//!
//! A [`VElement`] describes an element that does not exist yet. Handlers bound
//! to it are kept on its own [`EventConfig`] and become real bindings when the
//! router mounts it.

use indexmap::IndexMap;
use std::fmt;

use weave_core::IntoCallbackResult;

use crate::events::{DomEvent, EventConfig};

/// Description of an element to be created later
#[derive(Clone, Default)]
pub struct VElement {
    pub tag: String,
    pub attributes: IndexMap<String, String>,
    pub children: Vec<VNode>,
    /// Handlers to bind once mounted
    pub events: EventConfig,
}

impl VElement {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Default::default()
        }
    }

    pub fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    /// Append a class to the `class` attribute
    pub fn class(mut self, class: &str) -> Self {
        let list = self.attributes.entry("class".to_string()).or_default();
        if !list.split_whitespace().any(|c| c == class) {
            if !list.is_empty() {
                list.push(' ');
            }
            list.push_str(class);
        }
        self
    }

    pub fn child(mut self, child: impl Into<VNode>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.child(VNode::Text(text.into()))
    }

    /// Declare a handler directly on the virtual element
    pub fn on<F, R>(mut self, event_type: &str, handler: F) -> Self
    where
        F: Fn(&mut DomEvent) -> R + 'static,
        R: IntoCallbackResult,
    {
        self.events = self.events.on(event_type, handler);
        self
    }
}

impl fmt::Debug for VElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VElement")
            .field("tag", &self.tag)
            .field("attributes", &self.attributes)
            .field("children", &self.children)
            .field("events", &self.events)
            .finish()
    }
}

/// Node of a virtual tree
#[derive(Clone)]
pub enum VNode {
    Element(VElement),
    Text(String),
}

impl From<VElement> for VNode {
    fn from(element: VElement) -> Self {
        VNode::Element(element)
    }
}

impl From<&str> for VNode {
    fn from(text: &str) -> Self {
        VNode::Text(text.to_string())
    }
}

impl From<String> for VNode {
    fn from(text: String) -> Self {
        VNode::Text(text)
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VNode::Element(element) => element.fmt(f),
            VNode::Text(text) => write!(f, "{text:?}"),
        }
    }
}
