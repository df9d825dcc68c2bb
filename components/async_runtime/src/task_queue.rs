//! Task and microtask queue management.
//!
//! This module provides the task and microtask queues used by the event loop.
//! Tasks are executed one at a time, with all microtasks draining after each task.
//! Both queues are cheap cloneable handles over shared storage so that running
//! jobs can enqueue further jobs.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{RuntimeError, RuntimeResult};
use crate::scheduler::Schedule;

type Job = Box<dyn FnOnce() -> RuntimeResult<()> + Send>;

/// A task to be executed by the event loop.
///
/// Tasks represent lower-priority work such as timer callbacks and I/O
/// completions. They only run once the microtask queue is empty.
pub struct Task {
    callback: Job,
}

impl Task {
    /// Creates a new Task from a closure.
    ///
    /// # Arguments
    ///
    /// * `f` - The function to execute when the task runs
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() -> RuntimeResult<()> + Send + 'static,
    {
        Self {
            callback: Box::new(f),
        }
    }

    /// Executes the task.
    pub fn run(self) -> RuntimeResult<()> {
        (self.callback)()
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Task {{ ... }}")
    }
}

/// A microtask to be executed by the event loop.
///
/// Promise settlements and reaction passes are microtasks. An error returned
/// by a microtask is a fatal signal for the checkpoint running it.
pub struct MicroTask {
    callback: Job,
}

impl MicroTask {
    /// Creates a new MicroTask from a closure.
    ///
    /// # Arguments
    ///
    /// * `f` - The function to execute when the microtask runs
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() -> RuntimeResult<()> + Send + 'static,
    {
        Self {
            callback: Box::new(f),
        }
    }

    /// Executes the microtask.
    pub fn run(self) -> RuntimeResult<()> {
        (self.callback)()
    }
}

impl std::fmt::Debug for MicroTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MicroTask {{ ... }}")
    }
}

/// A queue for tasks.
///
/// Tasks are processed in FIFO order, one at a time.
#[derive(Debug, Default, Clone)]
pub struct TaskQueue {
    queue: Arc<Mutex<VecDeque<Task>>>,
}

impl TaskQueue {
    /// Creates a new empty TaskQueue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a task to the end of the queue.
    pub fn enqueue(&self, task: Task) {
        self.queue.lock().push_back(task);
    }

    /// Removes and returns the next task from the queue.
    pub fn dequeue(&self) -> Option<Task> {
        self.queue.lock().pop_front()
    }

    /// Returns true if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Returns the number of tasks in the queue.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }
}

/// A queue for microtasks.
///
/// Microtasks are drained completely after each task. This is also the
/// default [`Schedule`] implementation, and [`MicrotaskQueue::run_all`] is the
/// synchronous flush used to drive promises without a real event loop.
///
/// # Examples
///
/// ```
/// use async_runtime::{MicrotaskQueue, Promise, Scheduler};
/// use core_types::Value;
///
/// let queue = MicrotaskQueue::new();
/// let scheduler = Scheduler::new(queue.clone());
///
/// let promise = Promise::resolve(&scheduler, Value::Smi(1));
/// assert!(!queue.is_empty());
///
/// queue.run_all().unwrap();
/// assert_eq!(promise.result(), Some(Value::Smi(1)));
/// ```
#[derive(Debug, Default, Clone)]
pub struct MicrotaskQueue {
    queue: Arc<Mutex<VecDeque<MicroTask>>>,
}

impl MicrotaskQueue {
    /// Creates a new empty MicrotaskQueue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a microtask to the end of the queue.
    pub fn enqueue(&self, microtask: MicroTask) {
        self.queue.lock().push_back(microtask);
    }

    /// Removes and returns the next microtask from the queue.
    pub fn dequeue(&self) -> Option<MicroTask> {
        self.queue.lock().pop_front()
    }

    /// Returns true if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Returns the number of microtasks in the queue.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Runs microtasks until the queue is empty, including the ones enqueued
    /// while draining.
    ///
    /// Stops at the first microtask that fails and returns its error; the
    /// rest of the queue is left for the next call.
    pub fn run_all(&self) -> RuntimeResult<()> {
        self.run_with_budget(None)
    }

    /// Like [`run_all`](Self::run_all), but gives up with
    /// [`RuntimeError::MicrotaskBudgetExceeded`] once `budget` microtasks
    /// have run and more are still pending.
    pub fn run_with_budget(&self, budget: Option<usize>) -> RuntimeResult<()> {
        let mut ran = 0usize;
        while let Some(microtask) = self.dequeue() {
            if let Some(budget) = budget {
                if ran >= budget {
                    // Put it back so the next checkpoint resumes here.
                    self.queue.lock().push_front(microtask);
                    return Err(RuntimeError::MicrotaskBudgetExceeded { budget });
                }
            }
            ran += 1;
            microtask.run()?;
        }
        tracing::trace!(ran, "microtask checkpoint drained");
        Ok(())
    }
}

impl Schedule for MicrotaskQueue {
    fn schedule(&self, microtask: MicroTask) {
        self.enqueue(microtask);
    }
}
