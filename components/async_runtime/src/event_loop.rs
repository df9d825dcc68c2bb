//! Event loop implementation.
//!
//! This module provides the main event loop that coordinates task and microtask
//! execution following the JavaScript event loop model.

use std::fmt;

use crate::config::RuntimeConfig;
use crate::error::RuntimeResult;
use crate::reporter::RejectionReporter;
use crate::scheduler::Scheduler;
use crate::task_queue::{MicroTask, MicrotaskQueue, Task, TaskQueue};

/// The event loop.
///
/// Each iteration (turn) of the loop:
/// 1. Takes the oldest task from the task queue and executes it
/// 2. Drains all microtasks in the microtask queue
/// 3. Repeats
///
/// Microtasks already pending when the loop starts run before the first task,
/// since the synchronous code that queued them has finished.
///
/// # Examples
///
/// ```
/// use async_runtime::{EventLoop, Promise, Task};
/// use core_types::Value;
///
/// let mut event_loop = EventLoop::new();
/// let scheduler = event_loop.scheduler();
///
/// let promise = Promise::resolve(&scheduler, Value::Smi(1));
/// event_loop.enqueue_task(Task::new(|| Ok(())));
/// event_loop.run_until_done().unwrap();
///
/// assert_eq!(promise.result(), Some(Value::Smi(1)));
/// ```
pub struct EventLoop {
    task_queue: TaskQueue,
    microtask_queue: MicrotaskQueue,
    scheduler: Scheduler,
    config: RuntimeConfig,
}

impl EventLoop {
    /// Creates a new EventLoop with empty queues and the default configuration.
    pub fn new() -> Self {
        let microtask_queue = MicrotaskQueue::new();
        Self {
            task_queue: TaskQueue::new(),
            scheduler: Scheduler::new(microtask_queue.clone()),
            microtask_queue,
            config: RuntimeConfig::default(),
        }
    }

    /// Uses `config` for this loop and every promise created on its scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidConfig`](crate::RuntimeError) when
    /// `config` fails [`RuntimeConfig::validate`]; a zero adoption depth or a
    /// zero microtask budget would stall every promise.
    pub fn with_config(mut self, config: RuntimeConfig) -> RuntimeResult<Self> {
        self.scheduler = self.scheduler.with_config(config)?;
        self.config = config;
        Ok(self)
    }

    /// Sends uncaught rejections to `reporter`.
    pub fn with_reporter<R>(mut self, reporter: R) -> Self
    where
        R: RejectionReporter + 'static,
    {
        self.scheduler = self.scheduler.with_reporter(reporter);
        self
    }

    /// Scheduler bound to this loop's microtask queue.
    ///
    /// Promises created before a later `with_config`/`with_reporter` call
    /// keep the scheduler they were created with.
    pub fn scheduler(&self) -> Scheduler {
        self.scheduler.clone()
    }

    /// Handle to the task queue, for tasks that enqueue further tasks.
    pub fn task_queue(&self) -> TaskQueue {
        self.task_queue.clone()
    }

    /// The active configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Runs the event loop until all tasks and microtasks are processed.
    ///
    /// # Returns
    ///
    /// `Ok(())` if everything completed, or the first fatal error. Work left
    /// in the queues after an error is processed by the next call.
    pub fn run_until_done(&mut self) -> RuntimeResult<()> {
        self.run_all_microtasks()?;
        while !self.task_queue.is_empty() || !self.microtask_queue.is_empty() {
            self.process_one_cycle()?;
        }
        Ok(())
    }

    /// Adds a task to the task queue.
    ///
    /// The task will be executed in the next available iteration of the event loop.
    pub fn enqueue_task(&mut self, task: Task) {
        self.task_queue.enqueue(task);
    }

    /// Adds a microtask to the microtask queue.
    ///
    /// The microtask will be executed after the current task completes.
    pub fn enqueue_microtask(&mut self, microtask: MicroTask) {
        self.microtask_queue.enqueue(microtask);
    }

    /// Returns true if the task queue is empty.
    pub fn is_task_queue_empty(&self) -> bool {
        self.task_queue.is_empty()
    }

    /// Returns true if the microtask queue is empty.
    pub fn is_microtask_queue_empty(&self) -> bool {
        self.microtask_queue.is_empty()
    }

    /// Runs all microtasks in the queue until empty.
    ///
    /// This drains the microtask queue completely, within the configured
    /// budget. New microtasks added during execution will also be processed
    /// before this method returns.
    pub fn run_all_microtasks(&mut self) -> RuntimeResult<()> {
        self.microtask_queue
            .run_with_budget(self.config.microtask_budget)
    }

    /// Runs all tasks in the queue (without processing microtasks between them).
    ///
    /// This is primarily for testing purposes.
    pub fn run_all_tasks(&mut self) -> RuntimeResult<()> {
        while let Some(task) = self.task_queue.dequeue() {
            task.run()?;
        }
        Ok(())
    }

    /// Processes one complete cycle: one task followed by all microtasks.
    ///
    /// This represents one iteration of the event loop.
    pub fn process_one_cycle(&mut self) -> RuntimeResult<()> {
        if let Some(task) = self.task_queue.dequeue() {
            task.run()?;
        }

        self.run_all_microtasks()
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("tasks", &self.task_queue.len())
            .field("microtasks", &self.microtask_queue.len())
            .field("config", &self.config)
            .finish()
    }
}
