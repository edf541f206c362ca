//! Minimal element tree
//!
//! Elements are reference-counted nodes with a tag, ordered attributes, text,
//! a weak parent link and strong child links. A parent keeps its children
//! alive; nothing else does. Removing an element from the tree and dropping
//! the last outside handle frees it, which is what lets the event registry
//! forget it without an explicit unbind.
//!
//! Identity is by node, not content: two elements with identical tags and
//! attributes are different elements.

use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::DomError;
use crate::selector::Selector;

/// Tag of the document root node
pub const DOCUMENT_TAG: &str = "#document";

static NEXT_ELEMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of an element; never reused within a process
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

impl ElementId {
    fn next() -> Self {
        Self(NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn to_raw(self) -> u64 {
        self.0
    }
}

struct ElementNode {
    id: ElementId,
    tag: String,
    attributes: RefCell<IndexMap<String, String>>,
    text: RefCell<String>,
    parent: RefCell<Weak<ElementNode>>,
    children: RefCell<Vec<Element>>,
}

/// Shared handle to an element node
#[derive(Clone)]
pub struct Element {
    node: Rc<ElementNode>,
}

/// Non-owning handle to an element
#[derive(Clone, Default)]
pub struct WeakElement {
    node: Weak<ElementNode>,
}

impl WeakElement {
    pub fn upgrade(&self) -> Option<Element> {
        self.node.upgrade().map(|node| Element { node })
    }

    /// True while some strong handle (or a parent) keeps the element alive
    pub fn is_alive(&self) -> bool {
        self.node.strong_count() > 0
    }
}

impl fmt::Debug for WeakElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(element) => write!(f, "WeakElement({element:?})"),
            None => f.write_str("WeakElement(<dropped>)"),
        }
    }
}

impl Element {
    /// Create a detached element; the tag is lowercased
    pub fn new(tag: &str) -> Self {
        Self::with_tag(tag.to_ascii_lowercase())
    }

    pub(crate) fn document_root() -> Self {
        Self::with_tag(DOCUMENT_TAG.to_string())
    }

    fn with_tag(tag: String) -> Self {
        Self {
            node: Rc::new(ElementNode {
                id: ElementId::next(),
                tag,
                attributes: RefCell::new(IndexMap::new()),
                text: RefCell::new(String::new()),
                parent: RefCell::new(Weak::new()),
                children: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> ElementId {
        self.node.id
    }

    pub fn tag(&self) -> &str {
        &self.node.tag
    }

    pub fn downgrade(&self) -> WeakElement {
        WeakElement {
            node: Rc::downgrade(&self.node),
        }
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.node.attributes.borrow().get(name).cloned()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.node.attributes.borrow().contains_key(name)
    }

    pub fn set_attribute(&self, name: &str, value: impl Into<String>) {
        self.node
            .attributes
            .borrow_mut()
            .insert(name.to_string(), value.into());
    }

    pub fn remove_attribute(&self, name: &str) -> Option<String> {
        self.node.attributes.borrow_mut().shift_remove(name)
    }

    /// Builder form of [`set_attribute`](Self::set_attribute)
    pub fn with_attribute(self, name: &str, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// The `id` attribute
    pub fn dom_id(&self) -> Option<String> {
        self.attribute("id")
    }

    pub fn classes(&self) -> Vec<String> {
        self.attribute("class")
            .map(|list| list.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.node
            .attributes
            .borrow()
            .get("class")
            .is_some_and(|list| list.split_whitespace().any(|c| c == class))
    }

    pub fn add_class(&self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let mut classes = self.classes();
        classes.push(class.to_string());
        self.set_attribute("class", classes.join(" "));
    }

    pub fn remove_class(&self, class: &str) {
        let classes: Vec<String> = self.classes().into_iter().filter(|c| c != class).collect();
        self.set_attribute("class", classes.join(" "));
    }

    pub fn with_class(self, class: &str) -> Self {
        self.add_class(class);
        self
    }

    pub fn text(&self) -> String {
        self.node.text.borrow().clone()
    }

    pub fn set_text(&self, text: impl Into<String>) {
        *self.node.text.borrow_mut() = text.into();
    }

    pub(crate) fn push_text(&self, text: &str) {
        self.node.text.borrow_mut().push_str(text);
    }

    // =========================================================================
    // Tree structure
    // =========================================================================

    pub fn parent(&self) -> Option<Element> {
        self.node.parent.borrow().upgrade().map(|node| Element { node })
    }

    pub fn children(&self) -> Vec<Element> {
        self.node.children.borrow().clone()
    }

    /// Append `child` as the last child, moving it out of any previous parent
    pub fn append_child(&self, child: &Element) -> Result<(), DomError> {
        if child.contains(self) {
            return Err(DomError::HierarchyRequest {
                child: child.tag().to_string(),
            });
        }
        child.remove();
        *child.node.parent.borrow_mut() = Rc::downgrade(&self.node);
        self.node.children.borrow_mut().push(child.clone());
        Ok(())
    }

    /// Builder form of [`append_child`](Self::append_child)
    pub fn with_child(self, child: &Element) -> Result<Self, DomError> {
        self.append_child(child)?;
        Ok(self)
    }

    /// Detach from the parent, if any
    pub fn remove(&self) {
        if let Some(parent) = self.parent() {
            parent
                .node
                .children
                .borrow_mut()
                .retain(|sibling| sibling != self);
        }
        *self.node.parent.borrow_mut() = Weak::new();
    }

    /// This element followed by its ancestors up to the tree root
    pub fn ancestors(&self) -> Ancestors {
        Ancestors {
            next: Some(self.clone()),
        }
    }

    /// True if `other` is this element or one of its descendants
    pub fn contains(&self, other: &Element) -> bool {
        other.ancestors().any(|node| node == *self)
    }

    pub fn matches(&self, selector: &Selector) -> bool {
        selector.matches(self)
    }

    /// Nearest inclusive ancestor matching `selector`
    pub fn closest(&self, selector: &Selector) -> Option<Element> {
        self.ancestors().find(|node| selector.matches(node))
    }

    /// First descendant matching `selector`, in document order
    pub fn query_selector(&self, selector: &Selector) -> Option<Element> {
        for child in self.children() {
            if selector.matches(&child) {
                return Some(child);
            }
            if let Some(found) = child.query_selector(selector) {
                return Some(found);
            }
        }
        None
    }

    /// All descendants matching `selector`, in document order
    pub fn query_selector_all(&self, selector: &Selector) -> Vec<Element> {
        let mut found = Vec::new();
        self.collect_matching(selector, &mut found);
        found
    }

    fn collect_matching(&self, selector: &Selector, found: &mut Vec<Element>) {
        for child in self.children() {
            if selector.matches(&child) {
                found.push(child.clone());
            }
            child.collect_matching(selector, found);
        }
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }
}

impl Eq for Element {}

impl Hash for Element {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node.id.hash(state);
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.node.tag)?;
        for (name, value) in self.node.attributes.borrow().iter() {
            write!(f, " {name}=\"{value}\"")?;
        }
        write!(f, "> #{}", self.node.id.0)
    }
}

/// Iterator over an element and its ancestors
pub struct Ancestors {
    next: Option<Element>,
}

impl Iterator for Ancestors {
    type Item = Element;

    fn next(&mut self) -> Option<Element> {
        let current = self.next.take()?;
        self.next = current.parent();
        Some(current)
    }
}
