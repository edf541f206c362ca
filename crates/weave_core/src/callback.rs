//! Failure isolation for third-party callbacks
//!
//! Subscribers and event handlers are code the framework does not own. A
//! failing callback must never break delivery to its siblings, so every
//! invocation goes through [`run_isolated`], which turns both `Err` returns
//! and panics into a [`CallbackFailure`] the caller logs and drops.
//!
//! Callbacks may return `()` or any `Result<(), E>` whose error converts into
//! `anyhow::Error`:
//!
//! ```rust
//! use weave_core::callback::{run_isolated, IntoCallbackResult};
//!
//! let ok = run_isolated(|| ().into_callback_result());
//! assert!(ok.is_ok());
//!
//! let failed = run_isolated(|| Err::<(), _>(std::fmt::Error).into_callback_result());
//! assert!(failed.is_err());
//! ```

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Result type every wrapped callback produces
pub type CallbackResult = anyhow::Result<()>;

/// Conversion from a callback's return value into a [`CallbackResult`]
pub trait IntoCallbackResult {
    fn into_callback_result(self) -> CallbackResult;
}

impl IntoCallbackResult for () {
    fn into_callback_result(self) -> CallbackResult {
        Ok(())
    }
}

impl<E> IntoCallbackResult for Result<(), E>
where
    E: Into<anyhow::Error>,
{
    fn into_callback_result(self) -> CallbackResult {
        self.map_err(Into::into)
    }
}

/// Why an isolated callback did not complete
#[derive(Debug)]
pub enum CallbackFailure {
    /// The callback returned an error
    Error(anyhow::Error),
    /// The callback panicked
    Panic(String),
}

impl fmt::Display for CallbackFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackFailure::Error(err) => write!(f, "{err:#}"),
            CallbackFailure::Panic(msg) => write!(f, "panicked: {msg}"),
        }
    }
}

/// Run a callback, capturing both returned errors and panics
pub fn run_isolated<F>(callback: F) -> Result<(), CallbackFailure>
where
    F: FnOnce() -> CallbackResult,
{
    match catch_unwind(AssertUnwindSafe(callback)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(CallbackFailure::Error(err)),
        Err(payload) => Err(CallbackFailure::Panic(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_is_success() {
        assert!(run_isolated(|| ().into_callback_result()).is_ok());
    }

    #[test]
    fn test_error_is_captured() {
        let result = run_isolated(|| Err(anyhow::anyhow!("boom")));
        match result {
            Err(CallbackFailure::Error(err)) => assert_eq!(err.to_string(), "boom"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_panic_is_captured() {
        let result = run_isolated(|| panic!("handler exploded"));
        match result {
            Err(CallbackFailure::Panic(msg)) => assert_eq!(msg, "handler exploded"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
