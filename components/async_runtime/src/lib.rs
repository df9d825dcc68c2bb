//! Async runtime built around a deferred-value primitive.
//!
//! This crate provides:
//! - Event loop with task and microtask queues
//! - An injectable scheduling primitive, so promises run on any host queue
//! - Promises with chaining, thenable adoption and uncaught-rejection reporting
//! - Combinators: `all`, `all_settled`, `race`, `any`, `retry`,
//!   `concurrency_limit` and `immediate_task`
//!
//! # Overview
//!
//! - [`EventLoop`] - Main event loop coordinating task execution
//! - [`Scheduler`] - Handle every promise defers its work through
//! - [`Promise`] - The deferred value itself
//! - [`RejectionReporter`] - Monitor for rejections nobody handled
//!
//! # Examples
//!
//! ## Chaining
//!
//! ```
//! use async_runtime::{EventLoop, Handler, Promise};
//! use core_types::Value;
//!
//! let mut event_loop = EventLoop::new();
//! let scheduler = event_loop.scheduler();
//!
//! let greeting = Promise::resolve(&scheduler, "hello")
//!     .then(Some(Handler::new(|v| Ok(Value::from(format!("{v}, world"))))), None);
//!
//! event_loop.run_until_done().unwrap();
//! assert_eq!(greeting.result(), Some(Value::from("hello, world")));
//! ```
//!
//! ## Unhandled rejections
//!
//! ```
//! use async_runtime::{EventLoop, Promise, RuntimeError};
//! use core_types::Value;
//!
//! let mut event_loop = EventLoop::new();
//! let _lost = Promise::reject(&event_loop.scheduler(), Value::from("boom"));
//!
//! let err = event_loop.run_until_done().unwrap_err();
//! assert!(matches!(err, RuntimeError::UncaughtRejection(_)));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod combinators;
pub mod config;
pub mod error;
pub mod event_loop;
pub mod promise;
pub mod reporter;
pub mod scheduler;
pub mod task_queue;

// Re-export main types at crate root
pub use combinators::{ImmediateTasks, Input, Producer};
pub use config::RuntimeConfig;
pub use error::{RuntimeError, RuntimeResult};
pub use event_loop::EventLoop;
pub use promise::{Handler, Promise, PromiseState, Reject, Resolve};
pub use reporter::{RejectionLog, RejectionReporter, TracingReporter, UncaughtRejection};
pub use scheduler::{Schedule, Scheduler};
pub use task_queue::{MicroTask, MicrotaskQueue, Task, TaskQueue};
