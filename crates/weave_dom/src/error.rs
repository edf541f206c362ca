//! Element tree and selector error types

use thiserror::Error;

/// Selector parse errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,

    /// Parsing stopped at `offset` bytes into the selector
    #[error("invalid selector `{selector}` at offset {offset}")]
    Invalid { selector: String, offset: usize },
}

/// Tree mutation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// The insertion would make an element its own ancestor
    #[error("cannot append <{child}> inside itself or one of its descendants")]
    HierarchyRequest { child: String },
}
