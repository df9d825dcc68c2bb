//! Error types for the async runtime.

use core_types::Value;
use thiserror::Error;

use crate::reporter::UncaughtRejection;

/// Errors surfaced by the event loop and the microtask queue.
///
/// Ordinary rejections never show up here: they travel through promise
/// chains. Only conditions the host has to act on are reported.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// A promise rejected while nobody was listening
    #[error(transparent)]
    UncaughtRejection(#[from] UncaughtRejection),

    /// A macrotask failed
    #[error("task failed: {0}")]
    TaskFailed(Value),

    /// A single microtask checkpoint ran more jobs than allowed
    #[error("microtask budget of {budget} exceeded")]
    MicrotaskBudgetExceeded {
        /// The configured budget
        budget: usize,
    },

    /// Configuration could not be parsed or failed validation
    #[error("invalid runtime configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;
