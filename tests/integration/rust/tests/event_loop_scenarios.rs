//! End-to-end scenarios: promises settled by macrotasks on a real event loop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_runtime::{EventLoop, Handler, Input, Promise, PromiseState};
use core_types::{ErrorKind, Value};
use integration_tests::{fail_later, init_tracing, later};

fn smis(values: &[i32]) -> Value {
    Value::Array(values.iter().map(|&n| Value::Smi(n)).collect())
}

#[test]
fn chain_flattens_promises_settled_by_tasks() {
    init_tracing();
    let mut event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();
    let tasks = event_loop.task_queue();

    let (s, t) = (scheduler.clone(), tasks.clone());
    let result = later(&tasks, &scheduler, 1)
        .then(
            Some(Handler::new(move |v| match v {
                Value::Smi(n) => Ok(later(&t, &s, n + 1).into()),
                other => Err(other),
            })),
            None,
        )
        .then(
            Some(Handler::new(|v| Ok(Value::from(format!("got {v}"))))),
            None,
        );

    event_loop.run_until_done().unwrap();
    assert_eq!(result.result(), Some(Value::from("got 2")));
}

#[test]
fn all_collects_timer_results_in_input_order() {
    init_tracing();
    let mut event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();
    let tasks = event_loop.task_queue();

    let all = Promise::all(
        &scheduler,
        vec![
            Input::from(later(&tasks, &scheduler, 1)),
            Input::from(later(&tasks, &scheduler, 2)),
            Input::from(Value::Smi(3)),
        ],
    );

    event_loop.run_until_done().unwrap();
    assert_eq!(all.result(), Some(smis(&[1, 2, 3])));
}

#[test]
fn all_settled_reports_mixed_outcomes() {
    init_tracing();
    let mut event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();
    let tasks = event_loop.task_queue();

    let settled = Promise::all_settled(
        &scheduler,
        vec![
            fail_later(&tasks, &scheduler, "offline"),
            later(&tasks, &scheduler, "online"),
        ],
    );

    event_loop.run_until_done().unwrap();
    assert_eq!(
        settled.result(),
        Some(Value::Array(vec![
            Value::record([
                ("status", Value::from("rejected")),
                ("reason", Value::from("offline")),
            ]),
            Value::record([
                ("status", Value::from("fulfilled")),
                ("value", Value::from("online")),
            ]),
        ]))
    );
}

#[test]
fn race_settles_with_the_earliest_timer() {
    init_tracing();
    let mut event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();
    let tasks = event_loop.task_queue();

    let race = Promise::race(
        &scheduler,
        vec![
            later(&tasks, &scheduler, "first"),
            later(&tasks, &scheduler, "second"),
        ],
    );

    event_loop.run_until_done().unwrap();
    assert_eq!(race.result(), Some(Value::from("first")));
}

#[test]
fn any_aggregates_when_every_timer_fails() {
    init_tracing();
    let mut event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();
    let tasks = event_loop.task_queue();

    let any = Promise::any(
        &scheduler,
        vec![
            fail_later(&tasks, &scheduler, "a"),
            fail_later(&tasks, &scheduler, "b"),
        ],
    );
    let reason = any.catch(Ok);

    event_loop.run_until_done().unwrap();
    assert_eq!(any.state(), PromiseState::Rejected);
    match reason.result() {
        Some(Value::Error(e)) => {
            assert_eq!(e.kind, ErrorKind::AggregateError);
            assert_eq!(e.errors, vec![Value::from("a"), Value::from("b")]);
        }
        other => panic!("expected AggregateError, got {:?}", other),
    }
}

#[test]
fn retry_waits_for_each_failed_attempt() {
    init_tracing();
    let mut event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();
    let tasks = event_loop.task_queue();
    let calls = Arc::new(AtomicUsize::new(0));

    let (s, t, c) = (scheduler.clone(), tasks.clone(), calls.clone());
    let fetched = Promise::retry(
        &scheduler,
        move || {
            let n = c.fetch_add(1, Ordering::SeqCst) + 1;
            let attempt = if n < 3 {
                fail_later(&t, &s, format!("timeout {n}"))
            } else {
                later(&t, &s, "payload")
            };
            Ok(attempt.into())
        },
        3,
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(event_loop.task_queue().len(), 1);

    event_loop.run_until_done().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(fetched.result(), Some(Value::from("payload")));
}

#[test]
fn concurrency_limit_throttles_timer_backed_work() {
    init_tracing();
    let mut event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();
    let tasks = event_loop.task_queue();
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let inputs: Vec<Input> = (0..6)
        .map(|i| {
            let (s, t) = (scheduler.clone(), tasks.clone());
            let (active, peak) = (active.clone(), peak.clone());
            Input::producer(move || {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                let done = later(&t, &s, i * i).finally(move || {
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                });
                Ok(done.into())
            })
        })
        .collect();

    let limited = Promise::concurrency_limit(&scheduler, inputs, 2);
    event_loop.run_until_done().unwrap();

    assert_eq!(peak.load(Ordering::SeqCst), 2);
    assert_eq!(active.load(Ordering::SeqCst), 0);
    assert_eq!(limited.result(), Some(smis(&[0, 1, 4, 9, 16, 25])));
}

#[test]
fn immediate_task_lane_serializes_appended_work() {
    init_tracing();
    let mut event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();
    let tasks = event_loop.task_queue();
    let lane = Promise::immediate_task(&scheduler, 1);
    let started = Arc::new(Mutex::new(Vec::new()));

    let results: Vec<Promise> = ["a", "b", "c"]
        .into_iter()
        .map(|name| {
            let (s, t, started) = (scheduler.clone(), tasks.clone(), started.clone());
            lane.append(move || {
                started.lock().unwrap().push(name);
                Ok(later(&t, &s, name.to_uppercase()).into())
            })
        })
        .collect();

    assert_eq!(*started.lock().unwrap(), vec!["a"]);
    assert_eq!(lane.waiting(), 2);

    event_loop.run_until_done().unwrap();
    assert_eq!(*started.lock().unwrap(), vec!["a", "b", "c"]);
    let values: Vec<Option<Value>> = results.iter().map(Promise::result).collect();
    assert_eq!(
        values,
        vec![
            Some(Value::from("A")),
            Some(Value::from("B")),
            Some(Value::from("C")),
        ]
    );
}
