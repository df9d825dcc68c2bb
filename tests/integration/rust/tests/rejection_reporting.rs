//! Uncaught-rejection handling and configuration across the event loop.

use async_runtime::{EventLoop, Promise, PromiseState, RejectionLog, RuntimeConfig, RuntimeError};
use core_types::{Continuation, ErrorKind, Thenable, Value};
use integration_tests::{fail_later, init_tracing, later};

#[test]
fn rejection_inside_a_task_stops_the_loop_once() {
    init_tracing();
    let log = RejectionLog::new();
    let mut event_loop = EventLoop::new().with_reporter(log.clone());
    let scheduler = event_loop.scheduler();
    let tasks = event_loop.task_queue();

    let lost = fail_later(&tasks, &scheduler, "disk full");
    let survivor = later(&tasks, &scheduler, "still runs");

    let err = event_loop.run_until_done().unwrap_err();
    assert!(matches!(err, RuntimeError::UncaughtRejection(_)));
    assert_eq!(lost.state(), PromiseState::Rejected);
    assert_eq!(survivor.state(), PromiseState::Pending);

    event_loop.run_until_done().unwrap();
    assert_eq!(survivor.result(), Some(Value::from("still runs")));

    let entries = log.take();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].promise_id(), lost.id());
    assert_eq!(entries[0].reason(), &Value::from("disk full"));
}

#[test]
fn handled_chain_completes_quietly() {
    init_tracing();
    let log = RejectionLog::new();
    let mut event_loop = EventLoop::new().with_reporter(log.clone());
    let scheduler = event_loop.scheduler();
    let tasks = event_loop.task_queue();

    let recovered = fail_later(&tasks, &scheduler, "transient")
        .then(None, None)
        .catch(|reason| Ok(Value::from(format!("recovered from {reason}"))))
        .finally(|| Ok(()));

    event_loop.run_until_done().unwrap();
    assert!(log.is_empty());
    assert_eq!(
        recovered.result(),
        Some(Value::from("recovered from transient"))
    );
}

/// Hands back another copy of itself every time it is subscribed to.
struct Mirror;

impl Thenable for Mirror {
    fn subscribe(&self, on_fulfilled: Continuation, _on_rejected: Continuation) {
        on_fulfilled(Value::thenable(Mirror));
    }
}

#[test]
fn json_config_bounds_adoption_depth() {
    init_tracing();
    let config = RuntimeConfig::from_json(r#"{ "max_adoption_depth": 16 }"#).unwrap();
    let mut event_loop = EventLoop::new().with_config(config).unwrap();

    let endless = Promise::resolve(&event_loop.scheduler(), Value::thenable(Mirror));
    let reason = endless.catch(Ok);

    event_loop.run_until_done().unwrap();
    assert_eq!(endless.state(), PromiseState::Rejected);
    match reason.result() {
        Some(Value::Error(e)) => assert_eq!(e.kind, ErrorKind::RangeError),
        other => panic!("expected RangeError, got {:?}", other),
    }
}

#[test]
fn invalid_json_config_is_rejected() {
    init_tracing();
    assert!(matches!(
        RuntimeConfig::from_json("{ not json"),
        Err(RuntimeError::InvalidConfig(_))
    ));
    assert!(matches!(
        RuntimeConfig::from_json(r#"{ "microtask_budget": 0 }"#),
        Err(RuntimeError::InvalidConfig(_))
    ));
}

#[test]
fn microtask_budget_catches_runaway_chains() {
    init_tracing();
    let config = RuntimeConfig::new().with_microtask_budget(Some(8));
    let mut event_loop = EventLoop::new().with_config(config).unwrap();

    let endless = Promise::resolve(&event_loop.scheduler(), Value::thenable(Mirror));
    let _reason = endless.catch(Ok);

    let err = event_loop.run_until_done().unwrap_err();
    assert_eq!(err, RuntimeError::MicrotaskBudgetExceeded { budget: 8 });
}
