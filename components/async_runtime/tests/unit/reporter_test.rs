//! Unit tests for uncaught-rejection reporting

use crate::support::setup;
use async_runtime::{
    Handler, MicroTask, Promise, PromiseState, RejectionLog, RuntimeError, Scheduler,
};
use core_types::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn logged() -> (async_runtime::MicrotaskQueue, Scheduler, RejectionLog) {
    let (queue, scheduler) = setup();
    let log = RejectionLog::new();
    (queue, scheduler.with_reporter(log.clone()), log)
}

#[test]
fn unhandled_rejection_is_reported_exactly_once() {
    let (queue, scheduler, log) = logged();
    let lost = Promise::reject(&scheduler, "boom");

    let err = queue.run_all().unwrap_err();
    match err {
        RuntimeError::UncaughtRejection(signal) => {
            assert_eq!(signal.promise_id(), lost.id());
            assert_eq!(signal.reason(), &Value::from("boom"));
        }
        other => panic!("expected uncaught rejection, got {:?}", other),
    }
    assert_eq!(lost.state(), PromiseState::Rejected);

    assert!(queue.run_all().is_ok());
    assert_eq!(log.len(), 1);
}

#[test]
fn handler_attached_before_rejection_prevents_signal() {
    let (queue, scheduler, log) = logged();
    let (promise, _, reject) = Promise::with_resolvers(&scheduler);
    let caught = promise.catch(Ok);

    reject.call("handled");
    assert!(queue.run_all().is_ok());
    assert!(log.is_empty());
    assert_eq!(caught.result(), Some(Value::from("handled")));
}

#[test]
fn late_handler_observes_reason_without_second_signal() {
    let (queue, scheduler, log) = logged();
    let promise = Promise::reject(&scheduler, "late");
    assert!(queue.run_all().is_err());

    let caught = promise.catch(Ok);
    assert!(queue.run_all().is_ok());
    assert_eq!(caught.result(), Some(Value::from("late")));
    assert_eq!(log.len(), 1);
}

#[test]
fn signal_names_the_end_of_an_unterminated_chain() {
    let (queue, scheduler, log) = logged();
    let source = Promise::reject(&scheduler, "deep");
    let tail = source.then(Some(Handler::new(Ok)), None);

    assert!(queue.run_all().is_err());
    assert!(queue.run_all().is_ok());

    let entries = log.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].promise_id(), tail.id());
    assert_eq!(entries[0].reason(), &Value::from("deep"));
}

#[test]
fn failing_handler_without_catch_is_reported() {
    let (queue, scheduler, log) = logged();
    let _tail = Promise::resolve(&scheduler, 1)
        .then(Some(Handler::new(|_| Err(Value::from("handler failed")))), None);

    assert!(queue.run_all().is_err());
    assert_eq!(log.len(), 1);
    assert_eq!(log.take()[0].reason(), &Value::from("handler failed"));
}

#[test]
fn flush_stops_at_signal_and_resumes_on_next_call() {
    let (queue, scheduler, _log) = logged();
    let _lost = Promise::reject(&scheduler, "stop");
    let ran = Arc::new(AtomicBool::new(false));
    let r = ran.clone();
    queue.enqueue(MicroTask::new(move || {
        r.store(true, Ordering::SeqCst);
        Ok(())
    }));

    assert!(queue.run_all().is_err());
    assert!(!ran.load(Ordering::SeqCst));
    assert!(!queue.is_empty());

    assert!(queue.run_all().is_ok());
    assert!(ran.load(Ordering::SeqCst));
}

#[test]
fn signal_displays_in_promise_marker() {
    let (queue, scheduler, _log) = logged();
    let _lost = Promise::reject(&scheduler, "shown");
    let err = queue.run_all().unwrap_err();
    assert_eq!(err.to_string(), "Uncaught (in promise) shown");
}
