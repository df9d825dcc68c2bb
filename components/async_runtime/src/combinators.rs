//! Combinators composing several promises into one.
//!
//! Every combinator returns a fresh [`Promise`] and reports failures only
//! through it. Inputs are subscribed to with raw reactions, so an input
//! consumed by a combinator never counts as an unhandled rejection.
//!
//! Results are always placed by input position, never by completion order.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use core_types::{JsError, Value};
use parking_lot::Mutex;

use crate::promise::{Promise, PromiseState, Reject, Resolve};
use crate::scheduler::Scheduler;

/// A zero-argument callable producing a value, a thenable, or a failure.
pub type Producer = Box<dyn FnOnce() -> Result<Value, Value> + Send>;

/// Message of the aggregate error `any` rejects with.
pub const ALL_REJECTED_MESSAGE: &str = "All promises were rejected";

/// One input of a combinator.
pub enum Input {
    /// A plain value or an already running promise/thenable
    Ready(Value),
    /// Work started by the combinator itself
    Producer(Producer),
}

impl Input {
    /// Wraps a closure as a lazily started input.
    pub fn producer<F>(f: F) -> Self
    where
        F: FnOnce() -> Result<Value, Value> + Send + 'static,
    {
        Input::Producer(Box::new(f))
    }

    fn start(self, scheduler: &Scheduler) -> Promise {
        match self {
            Input::Ready(value) => Promise::resolve(scheduler, value),
            Input::Producer(producer) => from_result(scheduler, producer()),
        }
    }
}

impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Input::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Input::Producer(_) => write!(f, "Producer(...)"),
        }
    }
}

impl From<Value> for Input {
    fn from(value: Value) -> Self {
        Input::Ready(value)
    }
}

impl From<Promise> for Input {
    fn from(promise: Promise) -> Self {
        Input::Ready(promise.into())
    }
}

impl From<&Promise> for Input {
    fn from(promise: &Promise) -> Self {
        Input::Ready(promise.into())
    }
}

fn from_result(scheduler: &Scheduler, result: Result<Value, Value>) -> Promise {
    match result {
        Ok(value) => Promise::resolve(scheduler, value),
        Err(reason) => Promise::reject(scheduler, reason),
    }
}

fn start_all<I>(scheduler: &Scheduler, inputs: I) -> Vec<Promise>
where
    I: IntoIterator,
    I::Item: Into<Input>,
{
    inputs
        .into_iter()
        .map(|input| input.into().start(scheduler))
        .collect()
}

/// Position-indexed result aggregate.
struct Slots {
    values: Vec<Option<Value>>,
    remaining: usize,
}

impl Slots {
    fn new(len: usize) -> Self {
        Self {
            values: vec![None; len],
            remaining: len,
        }
    }

    /// Stores `value` at `index`; returns the full list once every slot is filled.
    fn fill(&mut self, index: usize, value: Value) -> Option<Vec<Value>> {
        if self.values[index].is_none() {
            self.values[index] = Some(value);
            self.remaining -= 1;
        }
        if self.remaining > 0 {
            return None;
        }
        Some(
            std::mem::take(&mut self.values)
                .into_iter()
                .map(|v| v.unwrap_or(Value::Undefined))
                .collect(),
        )
    }
}

fn settled_record(state: PromiseState, value: Value) -> Value {
    let key = match state {
        PromiseState::Rejected => "reason",
        _ => "value",
    };
    Value::record([("status", Value::from(state.as_str())), (key, value)])
}

impl Promise {
    /// Fulfills with every result, in input order, or rejects with the first
    /// rejection.
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
    /// let all = Promise::all(&scheduler, vec![
    ///     Promise::resolve(&scheduler, 1),
    ///     Promise::resolve(&scheduler, 2),
    /// ]);
    /// queue.run_all().unwrap();
    /// assert_eq!(all.result(), Some(Value::Array(vec![Value::Smi(1), Value::Smi(2)])));
    /// ```
    pub fn all<I>(scheduler: &Scheduler, inputs: I) -> Promise
    where
        I: IntoIterator,
        I::Item: Into<Input>,
    {
        let promises = start_all(scheduler, inputs);
        let (output, resolve, reject) = Promise::with_resolvers(scheduler);
        if promises.is_empty() {
            resolve.call(Value::Array(Vec::new()));
            return output;
        }

        let slots = Arc::new(Mutex::new(Slots::new(promises.len())));
        for (index, promise) in promises.iter().enumerate() {
            let (slots, resolve, reject) = (slots.clone(), resolve.clone(), reject.clone());
            promise.react(
                move |value| {
                    let done = slots.lock().fill(index, value);
                    if let Some(values) = done {
                        resolve.call(Value::Array(values));
                    }
                },
                move |reason| reject.call(reason),
            );
        }
        output
    }

    /// Fulfills once every input settled, with one status record per input.
    /// Never rejects.
    pub fn all_settled<I>(scheduler: &Scheduler, inputs: I) -> Promise
    where
        I: IntoIterator,
        I::Item: Into<Input>,
    {
        let promises = start_all(scheduler, inputs);
        let (output, resolve, _) = Promise::with_resolvers(scheduler);
        if promises.is_empty() {
            resolve.call(Value::Array(Vec::new()));
            return output;
        }

        let slots = Arc::new(Mutex::new(Slots::new(promises.len())));
        for (index, promise) in promises.iter().enumerate() {
            let (slots, resolve) = (slots.clone(), resolve.clone());
            let record = Arc::new(move |state: PromiseState, value: Value| {
                let done = slots.lock().fill(index, settled_record(state, value));
                if let Some(values) = done {
                    resolve.call(Value::Array(values));
                }
            });
            let on_reject = record.clone();
            promise.react(
                move |value| record(PromiseState::Fulfilled, value),
                move |reason| on_reject(PromiseState::Rejected, reason),
            );
        }
        output
    }

    /// Settles like whichever input settles first.
    ///
    /// With no inputs the result stays pending forever.
    pub fn race<I>(scheduler: &Scheduler, inputs: I) -> Promise
    where
        I: IntoIterator,
        I::Item: Into<Input>,
    {
        let promises = start_all(scheduler, inputs);
        let (output, resolve, reject) = Promise::with_resolvers(scheduler);
        if promises.is_empty() {
            tracing::debug!(promise = output.id(), "race over no inputs never settles");
        }
        for promise in &promises {
            let (resolve, reject) = (resolve.clone(), reject.clone());
            promise.react(move |value| resolve.call(value), move |reason| reject.call(reason));
        }
        output
    }

    /// Fulfills with the first fulfillment; rejects with an `AggregateError`
    /// holding every reason, in input order, once all inputs rejected.
    ///
    /// With no inputs the result rejects immediately with an empty aggregate.
    pub fn any<I>(scheduler: &Scheduler, inputs: I) -> Promise
    where
        I: IntoIterator,
        I::Item: Into<Input>,
    {
        let promises = start_all(scheduler, inputs);
        let (output, resolve, reject) = Promise::with_resolvers(scheduler);
        if promises.is_empty() {
            reject.call(JsError::aggregate(Vec::new(), ALL_REJECTED_MESSAGE));
            return output;
        }

        let errors = Arc::new(Mutex::new(Slots::new(promises.len())));
        for (index, promise) in promises.iter().enumerate() {
            let (errors, resolve, reject) = (errors.clone(), resolve.clone(), reject.clone());
            promise.react(
                move |value| resolve.call(value),
                move |reason| {
                    let done = errors.lock().fill(index, reason);
                    if let Some(reasons) = done {
                        reject.call(JsError::aggregate(reasons, ALL_REJECTED_MESSAGE));
                    }
                },
            );
        }
        output
    }

    /// Calls `producer` until one attempt fulfills, at most `max_attempts`
    /// times, one attempt at a time.
    ///
    /// Rejects with the last attempt's reason. At least one attempt is always
    /// made.
    pub fn retry<F>(scheduler: &Scheduler, producer: F, max_attempts: usize) -> Promise
    where
        F: FnMut() -> Result<Value, Value> + Send + 'static,
    {
        let (output, resolve, reject) = Promise::with_resolvers(scheduler);
        let retry = Arc::new(Retry {
            scheduler: scheduler.clone(),
            producer: Mutex::new(producer),
            max_attempts: max_attempts.max(1),
            resolve,
            reject,
        });
        Retry::attempt(retry, 1);
        output
    }

    /// Runs the inputs with at most `limit` of them in flight.
    ///
    /// Fulfills with the results in input order. The first failure rejects
    /// the result and stops starting queued inputs; inputs already running
    /// are left alone.
    pub fn concurrency_limit<I>(scheduler: &Scheduler, inputs: I, limit: usize) -> Promise
    where
        I: IntoIterator,
        I::Item: Into<Input>,
    {
        let pending: VecDeque<(usize, Input)> =
            inputs.into_iter().map(Into::<Input>::into).enumerate().collect();
        let (output, resolve, reject) = Promise::with_resolvers(scheduler);
        if limit == 0 {
            reject.call(JsError::range_error("concurrency limit must be at least 1"));
            return output;
        }
        if pending.is_empty() {
            resolve.call(Value::Array(Vec::new()));
            return output;
        }

        let pool = Arc::new(Pool {
            scheduler: scheduler.clone(),
            limit,
            resolve,
            reject,
            state: Mutex::new(PoolState {
                results: Slots::new(pending.len()),
                pending,
                running: 0,
                failed: false,
            }),
        });
        Pool::pump(&pool);
        output
    }

    /// Creates a lane that starts appended tasks right away while fewer than
    /// `limit` are running, and queues the rest in FIFO order.
    pub fn immediate_task(scheduler: &Scheduler, limit: usize) -> ImmediateTasks {
        ImmediateTasks {
            lane: Arc::new(Lane {
                scheduler: scheduler.clone(),
                limit,
                state: Mutex::new(LaneState {
                    running: 0,
                    waiting: VecDeque::new(),
                }),
            }),
        }
    }
}

struct Retry<F> {
    scheduler: Scheduler,
    producer: Mutex<F>,
    max_attempts: usize,
    resolve: Resolve,
    reject: Reject,
}

impl<F> Retry<F>
where
    F: FnMut() -> Result<Value, Value> + Send + 'static,
{
    fn attempt(retry: Arc<Self>, number: usize) {
        let result = {
            let mut producer = retry.producer.lock();
            (*producer)()
        };
        let promise = from_result(&retry.scheduler, result);

        let next = retry.clone();
        promise.react(
            move |value| retry.resolve.call(value),
            move |reason| {
                if number < next.max_attempts {
                    tracing::debug!(attempt = number, max = next.max_attempts, "retrying");
                    Self::attempt(next, number + 1);
                } else {
                    next.reject.call(reason);
                }
            },
        );
    }
}

struct PoolState {
    pending: VecDeque<(usize, Input)>,
    running: usize,
    results: Slots,
    failed: bool,
}

struct Pool {
    scheduler: Scheduler,
    limit: usize,
    resolve: Resolve,
    reject: Reject,
    state: Mutex<PoolState>,
}

impl Pool {
    /// Starts queued inputs until the limit is reached or the queue is empty.
    fn pump(pool: &Arc<Pool>) {
        loop {
            let next = {
                let mut state = pool.state.lock();
                if state.failed || state.running >= pool.limit {
                    None
                } else {
                    let job = state.pending.pop_front();
                    if job.is_some() {
                        state.running += 1;
                    }
                    job
                }
            };
            let Some((index, input)) = next else {
                break;
            };

            let promise = input.start(&pool.scheduler);
            let (on_ok, on_err) = (pool.clone(), pool.clone());
            promise.react(
                move |value| {
                    let done = {
                        let mut state = on_ok.state.lock();
                        state.running -= 1;
                        state.results.fill(index, value)
                    };
                    match done {
                        Some(values) => on_ok.resolve.call(Value::Array(values)),
                        None => Pool::pump(&on_ok),
                    }
                },
                move |reason| {
                    {
                        let mut state = on_err.state.lock();
                        state.running -= 1;
                        state.failed = true;
                        state.pending.clear();
                    }
                    on_err.reject.call(reason);
                },
            );
        }
    }
}

type Job = Box<dyn FnOnce() + Send>;

struct LaneState {
    running: usize,
    waiting: VecDeque<Job>,
}

struct Lane {
    scheduler: Scheduler,
    limit: usize,
    state: Mutex<LaneState>,
}

impl Lane {
    fn finish(&self) {
        let next = {
            let mut state = self.state.lock();
            state.running -= 1;
            if state.running < self.limit {
                let job = state.waiting.pop_front();
                if job.is_some() {
                    state.running += 1;
                }
                job
            } else {
                None
            }
        };
        if let Some(job) = next {
            job();
        }
    }
}

/// Handle returned by [`Promise::immediate_task`].
///
/// Each [`append`](ImmediateTasks::append) gets its own result promise; a
/// failing task only rejects its own result.
#[derive(Clone)]
pub struct ImmediateTasks {
    lane: Arc<Lane>,
}

impl ImmediateTasks {
    /// Starts `task` now if a slot is free, otherwise queues it.
    pub fn append<F>(&self, task: F) -> Promise
    where
        F: FnOnce() -> Result<Value, Value> + Send + 'static,
    {
        let (output, resolve, reject) = Promise::with_resolvers(&self.lane.scheduler);
        if self.lane.limit == 0 {
            reject.call(JsError::range_error("concurrency limit must be at least 1"));
            return output;
        }

        let lane = self.lane.clone();
        let job: Job = Box::new(move || {
            let promise = from_result(&lane.scheduler, task());
            let (on_ok, on_err) = (lane.clone(), lane);
            promise.react(
                move |value| {
                    resolve.call(value);
                    on_ok.finish();
                },
                move |reason| {
                    reject.call(reason);
                    on_err.finish();
                },
            );
        });

        let start_now = {
            let mut state = self.lane.state.lock();
            if state.running < self.lane.limit {
                state.running += 1;
                Some(job)
            } else {
                state.waiting.push_back(job);
                None
            }
        };
        if let Some(job) = start_now {
            job();
        }
        output
    }

    /// Number of tasks currently running
    pub fn running(&self) -> usize {
        self.lane.state.lock().running
    }

    /// Number of tasks waiting for a slot
    pub fn waiting(&self) -> usize {
        self.lane.state.lock().waiting.len()
    }
}

impl fmt::Debug for ImmediateTasks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImmediateTasks")
            .field("limit", &self.lane.limit)
            .field("running", &self.running())
            .field("waiting", &self.waiting())
            .finish()
    }
}
