//! Uncaught-rejection reporting.
//!
//! A promise that rejects while no rejection handler is attached produces an
//! [`UncaughtRejection`]. It is handed to the scheduler's
//! [`RejectionReporter`] once and then propagates out of the microtask
//! checkpoint as [`RuntimeError::UncaughtRejection`](crate::RuntimeError).
//! Attaching a handler afterwards still observes the reason but does not
//! retract the signal.

use std::sync::Arc;

use core_types::Value;
use parking_lot::Mutex;
use thiserror::Error;

/// Fatal signal for a rejection nobody listened to.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Uncaught (in promise) {reason}")]
pub struct UncaughtRejection {
    promise_id: u64,
    reason: Value,
}

impl UncaughtRejection {
    pub(crate) fn new(promise_id: u64, reason: Value) -> Self {
        Self { promise_id, reason }
    }

    /// Id of the promise that rejected.
    pub fn promise_id(&self) -> u64 {
        self.promise_id
    }

    /// The original rejection reason.
    pub fn reason(&self) -> &Value {
        &self.reason
    }
}

/// Process-level monitor for unobserved rejections.
pub trait RejectionReporter: Send + Sync {
    /// Called exactly once per unobserved rejection.
    fn report(&self, rejection: &UncaughtRejection);
}

/// Default reporter: emits an error event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl RejectionReporter for TracingReporter {
    fn report(&self, rejection: &UncaughtRejection) {
        tracing::error!(
            promise = rejection.promise_id(),
            reason = %rejection.reason(),
            "uncaught rejection (in promise)"
        );
    }
}

/// Reporter that keeps every signal it receives.
///
/// # Examples
///
/// ```
/// use async_runtime::{EventLoop, Promise, RejectionLog};
/// use core_types::Value;
///
/// let log = RejectionLog::new();
/// let mut event_loop = EventLoop::new().with_reporter(log.clone());
///
/// let _p = Promise::reject(&event_loop.scheduler(), Value::from("lost"));
/// assert!(event_loop.run_all_microtasks().is_err());
/// assert_eq!(log.len(), 1);
/// ```
#[derive(Debug, Default, Clone)]
pub struct RejectionLog {
    entries: Arc<Mutex<Vec<UncaughtRejection>>>,
}

impl RejectionLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded signals
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Returns a copy of every recorded signal.
    pub fn entries(&self) -> Vec<UncaughtRejection> {
        self.entries.lock().clone()
    }

    /// Removes and returns every recorded signal.
    pub fn take(&self) -> Vec<UncaughtRejection> {
        std::mem::take(&mut *self.entries.lock())
    }
}

impl RejectionReporter for RejectionLog {
    fn report(&self, rejection: &UncaughtRejection) {
        TracingReporter.report(rejection);
        self.entries.lock().push(rejection.clone());
    }
}
