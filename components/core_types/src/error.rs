//! Error values used as rejection reasons.
//!
//! These mirror the built-in JavaScript error constructors that a promise
//! runtime raises on its own: type errors for chaining cycles, range errors
//! for invalid limits, and aggregate errors for `any`.

use std::fmt;

use thiserror::Error;

use crate::Value;

/// The kind of error value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Plain `Error`
    Error,
    /// Type error (e.g. a promise resolved with itself)
    TypeError,
    /// Value out of allowed range
    RangeError,
    /// Every input of an `any` combinator rejected
    AggregateError,
}

impl ErrorKind {
    /// Returns the constructor name of this kind.
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::AggregateError => "AggregateError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An error value with a message and, for aggregates, the individual reasons.
///
/// # Examples
///
/// ```
/// use core_types::{ErrorKind, JsError, Value};
///
/// let error = JsError::aggregate(
///     vec![Value::from("a"), Value::from("b")],
///     "All promises were rejected",
/// );
///
/// assert_eq!(error.kind, ErrorKind::AggregateError);
/// assert_eq!(error.errors, vec![Value::from("a"), Value::from("b")]);
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct JsError {
    /// The type of error
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Ordered individual reasons (non-empty only for aggregate errors)
    pub errors: Vec<Value>,
}

impl JsError {
    /// Creates an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            errors: Vec::new(),
        }
    }

    /// Creates a `TypeError`.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }

    /// Creates a `RangeError`.
    pub fn range_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RangeError, message)
    }

    /// Creates an `AggregateError` carrying every reason in input order.
    pub fn aggregate(errors: Vec<Value>, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::AggregateError,
            message: message.into(),
            errors,
        }
    }
}
