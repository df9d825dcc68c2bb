//! The deferred-execution primitive promises are driven by.
//!
//! Promises never reach for an ambient queue. Each one holds a [`Scheduler`]
//! handle wrapping a host-supplied [`Schedule`] implementation, so the same
//! code runs on the bundled [`EventLoop`](crate::EventLoop), on a bare
//! [`MicrotaskQueue`](crate::MicrotaskQueue) flushed by hand, or on any host
//! queue that honours microtask ordering.

use std::fmt;
use std::sync::Arc;

use crate::config::RuntimeConfig;
use crate::error::RuntimeResult;
use crate::reporter::{RejectionReporter, TracingReporter};
use crate::task_queue::MicroTask;

/// Enqueues a closure to run after the current synchronous block and before
/// any lower-priority task.
///
/// Implementations must run microtasks in FIFO order.
pub trait Schedule: Send + Sync {
    /// Defers `microtask`.
    fn schedule(&self, microtask: MicroTask);
}

/// Cloneable handle shared by every promise of one runtime.
#[derive(Clone)]
pub struct Scheduler {
    queue: Arc<dyn Schedule>,
    reporter: Arc<dyn RejectionReporter>,
    config: RuntimeConfig,
}

impl Scheduler {
    /// Creates a scheduler over `queue` with the default configuration and a
    /// [`TracingReporter`].
    pub fn new<S>(queue: S) -> Self
    where
        S: Schedule + 'static,
    {
        Self {
            queue: Arc::new(queue),
            reporter: Arc::new(TracingReporter),
            config: RuntimeConfig::default(),
        }
    }

    /// Replaces the uncaught-rejection reporter
    pub fn with_reporter<R>(mut self, reporter: R) -> Self
    where
        R: RejectionReporter + 'static,
    {
        self.reporter = Arc::new(reporter);
        self
    }

    /// Replaces the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidConfig`](crate::RuntimeError) when
    /// `config` fails [`RuntimeConfig::validate`].
    pub fn with_config(mut self, config: RuntimeConfig) -> RuntimeResult<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Defers `microtask` on the underlying queue.
    pub fn schedule(&self, microtask: MicroTask) {
        self.queue.schedule(microtask);
    }

    /// The configuration promises consult.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub(crate) fn reporter(&self) -> &dyn RejectionReporter {
        self.reporter.as_ref()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
