//! Promise implementation.
//!
//! A [`Promise`] is an opaque handle to a single asynchronous outcome. Every
//! state transition and every reaction runs from a microtask on the
//! promise's [`Scheduler`], so handlers never fire inside the call that
//! registered them.
//!
//! Settlement works as follows:
//! - the resolving functions schedule a settle job, first call only;
//! - the settle job either adopts a thenable (the promise stays pending
//!   and re-arms on the thenable's outcome) or moves the promise to its
//!   terminal state and runs the reaction pass;
//! - a rejection that finds no rejection reaction registered is reported as
//!   an [`UncaughtRejection`].

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use core_types::{Continuation, JsError, Thenable, ThenableRef, Value};
use parking_lot::Mutex;

use crate::error::RuntimeResult;
use crate::reporter::UncaughtRejection;
use crate::scheduler::Scheduler;
use crate::task_queue::MicroTask;

static NEXT_PROMISE_ID: AtomicU64 = AtomicU64::new(1);

/// The state of a Promise.
///
/// Once settled (Fulfilled or Rejected), a Promise cannot change state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseState {
    /// The initial state; the promise is neither fulfilled nor rejected.
    Pending,
    /// The promise has been resolved with a value.
    Fulfilled,
    /// The promise has been rejected with a reason.
    Rejected,
}

impl PromiseState {
    /// Lowercase name, as used in `all_settled` records.
    pub fn as_str(self) -> &'static str {
        match self {
            PromiseState::Pending => "pending",
            PromiseState::Fulfilled => "fulfilled",
            PromiseState::Rejected => "rejected",
        }
    }
}

/// A fulfillment or rejection handler passed to [`Promise::then`].
///
/// Returning `Err` is the equivalent of throwing from the handler: the
/// dependent promise rejects with that reason.
pub struct Handler {
    callback: Box<dyn FnOnce(Value) -> Result<Value, Value> + Send>,
}

impl Handler {
    /// Creates a new Handler from a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(Value) -> Result<Value, Value> + Send + 'static,
    {
        Self {
            callback: Box::new(f),
        }
    }

    /// Calls the handler with the settled value.
    pub fn call(self, value: Value) -> Result<Value, Value> {
        (self.callback)(value)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler {{ ... }}")
    }
}

#[derive(Debug, Clone)]
enum Outcome {
    Fulfilled(Value),
    Rejected(Value),
}

impl Outcome {
    fn value(&self) -> &Value {
        match self {
            Outcome::Fulfilled(value) | Outcome::Rejected(value) => value,
        }
    }
}

enum Step {
    Adopt(ThenableRef, usize),
    Settle(Outcome),
}

struct Slot {
    state: PromiseState,
    result: Option<Value>,
    fulfill_reactions: Vec<Continuation>,
    reject_reactions: Vec<Continuation>,
}

impl Slot {
    /// Empties both queues, handing back the one matching `state`.
    fn take_reactions(&mut self, state: PromiseState) -> Vec<Continuation> {
        let fulfill = std::mem::take(&mut self.fulfill_reactions);
        let reject = std::mem::take(&mut self.reject_reactions);
        match state {
            PromiseState::Pending => {
                self.fulfill_reactions = fulfill;
                self.reject_reactions = reject;
                Vec::new()
            }
            PromiseState::Fulfilled => fulfill,
            PromiseState::Rejected => reject,
        }
    }
}

struct PromiseCell {
    id: u64,
    scheduler: Scheduler,
    this: Weak<PromiseCell>,
    slot: Mutex<Slot>,
}

impl PromiseCell {
    fn new(scheduler: Scheduler) -> Arc<Self> {
        Arc::new_cyclic(|this| PromiseCell {
            id: NEXT_PROMISE_ID.fetch_add(1, Ordering::Relaxed),
            scheduler,
            this: this.clone(),
            slot: Mutex::new(Slot {
                state: PromiseState::Pending,
                result: None,
                fulfill_reactions: Vec::new(),
                reject_reactions: Vec::new(),
            }),
        })
    }

    fn state(&self) -> PromiseState {
        self.slot.lock().state
    }

    fn is_same(&self, thenable: &ThenableRef) -> bool {
        Arc::as_ptr(thenable) as *const () == self as *const PromiseCell as *const ()
    }

    fn schedule_settle(&self, outcome: Outcome, depth: usize) {
        let Some(this) = self.this.upgrade() else {
            return;
        };
        self.scheduler
            .schedule(MicroTask::new(move || this.settle(outcome, depth)));
    }

    fn settle(&self, outcome: Outcome, depth: usize) -> RuntimeResult<()> {
        if self.state() != PromiseState::Pending {
            tracing::trace!(promise = self.id, "already settled, dropping outcome");
            return Ok(());
        }

        match self.classify(outcome, depth) {
            Step::Adopt(thenable, depth) => {
                self.adopt(thenable, depth);
                Ok(())
            }
            Step::Settle(Outcome::Fulfilled(value)) => {
                self.complete(PromiseState::Fulfilled, value);
                Ok(())
            }
            Step::Settle(Outcome::Rejected(reason)) => {
                if !self.complete(PromiseState::Rejected, reason.clone()) {
                    return Ok(());
                }
                let signal = UncaughtRejection::new(self.id, reason);
                self.scheduler.reporter().report(&signal);
                Err(signal.into())
            }
        }
    }

    /// Decides whether `outcome` settles this promise or has to be adopted.
    fn classify(&self, outcome: Outcome, depth: usize) -> Step {
        let Some(thenable) = outcome.value().as_thenable().cloned() else {
            return Step::Settle(outcome);
        };
        if self.is_same(&thenable) {
            return Step::Settle(Outcome::Rejected(
                JsError::type_error("Chaining cycle detected for promise").into(),
            ));
        }
        let limit = self.scheduler.config().max_adoption_depth;
        if depth >= limit {
            tracing::debug!(promise = self.id, limit, "adoption depth exceeded");
            return Step::Settle(Outcome::Rejected(
                JsError::range_error(format!("thenable adoption exceeded {limit} levels")).into(),
            ));
        }
        Step::Adopt(thenable, depth + 1)
    }

    fn adopt(&self, thenable: ThenableRef, depth: usize) {
        let Some(this) = self.this.upgrade() else {
            return;
        };
        tracing::debug!(promise = self.id, depth, "adopting thenable");

        let resolution = Arc::new(Resolution::new(this, depth));
        let on_rejected = resolution.clone();
        thenable.subscribe(
            Box::new(move |value| resolution.settle_once(Outcome::Fulfilled(value))),
            Box::new(move |reason| on_rejected.settle_once(Outcome::Rejected(reason))),
        );
    }

    /// Moves to `state` and runs the matching reactions.
    ///
    /// Returns true when a rejection found no rejection reaction registered.
    fn complete(&self, state: PromiseState, value: Value) -> bool {
        let (reactions, unobserved) = {
            let mut slot = self.slot.lock();
            if slot.state != PromiseState::Pending {
                return false;
            }
            let unobserved = state == PromiseState::Rejected && slot.reject_reactions.is_empty();
            slot.state = state;
            slot.result = Some(value.clone());
            (slot.take_reactions(state), unobserved)
        };

        tracing::trace!(
            promise = self.id,
            state = state.as_str(),
            reactions = reactions.len(),
            "settled"
        );
        for reaction in reactions {
            reaction(value.clone());
        }
        unobserved
    }

    /// Run-callbacks pass for registrations made after settlement.
    fn run_reactions(&self) {
        let (reactions, value) = {
            let mut slot = self.slot.lock();
            let state = slot.state;
            if state == PromiseState::Pending {
                return;
            }
            let value = slot.result.clone().unwrap_or(Value::Undefined);
            (slot.take_reactions(state), value)
        };
        for reaction in reactions {
            reaction(value.clone());
        }
    }

    fn register(&self, on_fulfilled: Continuation, on_rejected: Continuation) {
        let settled = {
            let mut slot = self.slot.lock();
            slot.fulfill_reactions.push(on_fulfilled);
            slot.reject_reactions.push(on_rejected);
            slot.state != PromiseState::Pending
        };

        if settled {
            let Some(this) = self.this.upgrade() else {
                return;
            };
            self.scheduler.schedule(MicroTask::new(move || {
                this.run_reactions();
                Ok(())
            }));
        }
    }
}

impl Thenable for PromiseCell {
    fn subscribe(&self, on_fulfilled: Continuation, on_rejected: Continuation) {
        self.register(on_fulfilled, on_rejected);
    }
}

/// Shared state of one resolve/reject pair: the first call wins.
struct Resolution {
    target: Arc<PromiseCell>,
    already_resolved: AtomicBool,
    depth: usize,
}

impl Resolution {
    fn new(target: Arc<PromiseCell>, depth: usize) -> Self {
        Self {
            target,
            already_resolved: AtomicBool::new(false),
            depth,
        }
    }

    fn settle_once(&self, outcome: Outcome) {
        if self.already_resolved.swap(true, Ordering::AcqRel) {
            tracing::trace!(promise = self.target.id, "ignoring repeated resolution");
            return;
        }
        self.target.schedule_settle(outcome, self.depth);
    }
}

/// The `resolve` half of a promise's resolving functions.
#[derive(Clone)]
pub struct Resolve {
    resolution: Arc<Resolution>,
}

impl Resolve {
    /// Resolves the promise with `value`, adopting it if it is a thenable.
    ///
    /// Only the first call to either this or the paired [`Reject`] has an
    /// effect.
    pub fn call(&self, value: impl Into<Value>) {
        self.resolution.settle_once(Outcome::Fulfilled(value.into()));
    }
}

impl fmt::Debug for Resolve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolve")
            .field("promise", &self.resolution.target.id)
            .finish()
    }
}

/// The `reject` half of a promise's resolving functions.
#[derive(Clone)]
pub struct Reject {
    resolution: Arc<Resolution>,
}

impl Reject {
    /// Rejects the promise with `reason`.
    pub fn call(&self, reason: impl Into<Value>) {
        self.resolution.settle_once(Outcome::Rejected(reason.into()));
    }
}

impl fmt::Debug for Reject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reject")
            .field("promise", &self.resolution.target.id)
            .finish()
    }
}

/// A handle to an eventual value.
///
/// # Examples
///
/// ```
/// use async_runtime::{Handler, MicrotaskQueue, Promise, PromiseState, Scheduler};
/// use core_types::Value;
///
/// let queue = MicrotaskQueue::new();
/// let scheduler = Scheduler::new(queue.clone());
///
/// let promise = Promise::new(&scheduler, |resolve, _reject| {
///     resolve.call(20);
///     Ok(())
/// });
/// let doubled = promise.then(
///     Some(Handler::new(|v| match v {
///         Value::Smi(n) => Ok(Value::Smi(n * 2)),
///         other => Err(other),
///     })),
///     None,
/// );
///
/// // Nothing runs until the microtask queue is flushed.
/// assert_eq!(doubled.state(), PromiseState::Pending);
///
/// queue.run_all().unwrap();
/// assert_eq!(doubled.result(), Some(Value::Smi(40)));
/// ```
#[derive(Clone)]
pub struct Promise {
    cell: Arc<PromiseCell>,
}

impl Promise {
    /// Creates a promise and runs `producer` synchronously with its
    /// resolving functions.
    ///
    /// An `Err` returned by the producer rejects the promise, unless the
    /// producer already resolved or rejected it.
    pub fn new<F>(scheduler: &Scheduler, producer: F) -> Self
    where
        F: FnOnce(Resolve, Reject) -> Result<(), Value>,
    {
        let (promise, resolve, reject) = Self::with_resolvers(scheduler);
        if let Err(reason) = producer(resolve, reject.clone()) {
            tracing::trace!(promise = promise.id(), "producer failed synchronously");
            reject.call(reason);
        }
        promise
    }

    /// Creates a pending promise together with its resolving functions.
    pub fn with_resolvers(scheduler: &Scheduler) -> (Self, Resolve, Reject) {
        let cell = PromiseCell::new(scheduler.clone());
        let resolution = Arc::new(Resolution::new(cell.clone(), 0));
        (
            Promise { cell },
            Resolve {
                resolution: resolution.clone(),
            },
            Reject { resolution },
        )
    }

    /// Creates a promise resolving with `value` (adopting it if thenable).
    pub fn resolve(scheduler: &Scheduler, value: impl Into<Value>) -> Self {
        let (promise, resolve, _) = Self::with_resolvers(scheduler);
        resolve.call(value);
        promise
    }

    /// Creates a promise rejecting with `reason`.
    pub fn reject(scheduler: &Scheduler, reason: impl Into<Value>) -> Self {
        let (promise, _, reject) = Self::with_resolvers(scheduler);
        reject.call(reason);
        promise
    }

    /// Registers handlers and returns the dependent promise.
    ///
    /// A missing handler passes the value (or reason) through unchanged.
    pub fn then(&self, on_fulfilled: Option<Handler>, on_rejected: Option<Handler>) -> Promise {
        let (derived, resolve, reject) = Self::with_resolvers(&self.cell.scheduler);
        let (resolve_after_catch, reject_after_catch) = (resolve.clone(), reject.clone());

        self.cell.register(
            Box::new(move |value| match on_fulfilled {
                None => resolve.call(value),
                Some(handler) => match handler.call(value) {
                    Ok(result) => resolve.call(result),
                    Err(reason) => reject.call(reason),
                },
            }),
            Box::new(move |reason| match on_rejected {
                None => reject_after_catch.call(reason),
                Some(handler) => match handler.call(reason) {
                    Ok(result) => resolve_after_catch.call(result),
                    Err(reason) => reject_after_catch.call(reason),
                },
            }),
        );
        derived
    }

    /// Shorthand for `then(None, Some(on_rejected))`.
    pub fn catch<F>(&self, on_rejected: F) -> Promise
    where
        F: FnOnce(Value) -> Result<Value, Value> + Send + 'static,
    {
        self.then(None, Some(Handler::new(on_rejected)))
    }

    /// Runs `on_settled` on either path without changing the outcome.
    ///
    /// An `Err` from `on_settled` replaces the outcome with that rejection.
    pub fn finally<F>(&self, on_settled: F) -> Promise
    where
        F: FnOnce() -> Result<(), Value> + Send + 'static,
    {
        let callback = Arc::new(Mutex::new(Some(on_settled)));
        let on_reject_path = callback.clone();

        self.then(
            Some(Handler::new(move |value| {
                let f = callback.lock().take();
                if let Some(f) = f {
                    f()?;
                }
                Ok(value)
            })),
            Some(Handler::new(move |reason| {
                let f = on_reject_path.lock().take();
                if let Some(f) = f {
                    f()?;
                }
                Err(reason)
            })),
        )
    }

    /// Registers raw continuations without creating a dependent promise.
    pub(crate) fn react<F, R>(&self, on_fulfilled: F, on_rejected: R)
    where
        F: FnOnce(Value) + Send + 'static,
        R: FnOnce(Value) + Send + 'static,
    {
        self.cell
            .register(Box::new(on_fulfilled), Box::new(on_rejected));
    }

    /// Unique id of this promise
    pub fn id(&self) -> u64 {
        self.cell.id
    }

    /// Current state
    pub fn state(&self) -> PromiseState {
        self.cell.state()
    }

    /// The fulfillment value or rejection reason, once settled.
    pub fn result(&self) -> Option<Value> {
        self.cell.slot.lock().result.clone()
    }

    /// The scheduler this promise and its dependents run on.
    pub fn scheduler(&self) -> &Scheduler {
        &self.cell.scheduler
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}

impl From<Promise> for Value {
    fn from(promise: Promise) -> Self {
        let thenable: ThenableRef = promise.cell;
        Value::Thenable(thenable)
    }
}

impl From<&Promise> for Value {
    fn from(promise: &Promise) -> Self {
        Value::from(promise.clone())
    }
}
