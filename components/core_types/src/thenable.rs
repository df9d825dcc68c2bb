//! The thenable capability.
//!
//! Anything that can accept a pair of continuations and eventually call
//! exactly one of them is a thenable. Promises resolved with a thenable adopt
//! its outcome instead of fulfilling with the thenable itself.

use std::sync::Arc;

use crate::Value;

/// A one-shot continuation receiving a value or reason.
pub type Continuation = Box<dyn FnOnce(Value) + Send>;

/// Shared handle to a thenable, as stored in [`Value::Thenable`].
pub type ThenableRef = Arc<dyn Thenable>;

/// Minimal "then-shaped" capability.
///
/// Implementations must invoke at most one of the two continuations, at most
/// once. They may do so synchronously from within `subscribe`.
///
/// # Examples
///
/// ```
/// use core_types::{Continuation, Thenable, Value};
///
/// struct Ready(Value);
///
/// impl Thenable for Ready {
///     fn subscribe(&self, on_fulfilled: Continuation, _on_rejected: Continuation) {
///         on_fulfilled(self.0.clone());
///     }
/// }
///
/// let value = Value::thenable(Ready(Value::Smi(7)));
/// assert!(value.as_thenable().is_some());
/// ```
pub trait Thenable: Send + Sync {
    /// Attaches the fulfillment and rejection continuations.
    fn subscribe(&self, on_fulfilled: Continuation, on_rejected: Continuation);
}
