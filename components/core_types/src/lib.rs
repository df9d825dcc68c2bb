//! Core value types and error handling for the deferred runtime.
//!
//! This crate provides the foundational types shared by every component:
//! the dynamic value carried by promises, error values used as rejection
//! reasons, and the thenable capability that promise adoption relies on.
//!
//! # Overview
//!
//! - [`Value`] - Untyped result/reason carrier
//! - [`JsError`] - Error values (including aggregate failures)
//! - [`ErrorKind`] - Kinds of error values
//! - [`Thenable`] - The "attach two continuations" capability
//!
//! # Examples
//!
//! ```
//! use core_types::{ErrorKind, JsError, Value};
//!
//! let num = Value::Smi(42);
//! assert_eq!(num.to_string(), "42");
//!
//! let error = JsError::type_error("undefined is not a function");
//! assert_eq!(error.kind, ErrorKind::TypeError);
//! assert_eq!(Value::from(error).to_string(), "TypeError: undefined is not a function");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod thenable;
mod value;

pub use error::{ErrorKind, JsError};
pub use thenable::{Continuation, Thenable, ThenableRef};
pub use value::Value;
