//! Unit tests for the Thenable capability

use core_types::{Continuation, Thenable, Value};
use std::sync::{Arc, Mutex};

/// Settles synchronously with a fixed outcome.
struct Settled {
    outcome: Result<Value, Value>,
}

impl Thenable for Settled {
    fn subscribe(&self, on_fulfilled: Continuation, on_rejected: Continuation) {
        match self.outcome.clone() {
            Ok(value) => on_fulfilled(value),
            Err(reason) => on_rejected(reason),
        }
    }
}

fn capture() -> (Arc<Mutex<Vec<String>>>, Continuation, Continuation) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let ok_log = log.clone();
    let err_log = log.clone();
    (
        log,
        Box::new(move |v| ok_log.lock().unwrap().push(format!("ok:{}", v))),
        Box::new(move |r| err_log.lock().unwrap().push(format!("err:{}", r))),
    )
}

#[cfg(test)]
mod thenable_tests {
    use super::*;

    #[test]
    fn test_subscribe_fulfilled() {
        let thenable = Settled {
            outcome: Ok(Value::Smi(5)),
        };
        let (log, on_ok, on_err) = capture();
        thenable.subscribe(on_ok, on_err);
        assert_eq!(*log.lock().unwrap(), vec!["ok:5".to_string()]);
    }

    #[test]
    fn test_subscribe_rejected() {
        let thenable = Settled {
            outcome: Err(Value::from("nope")),
        };
        let (log, on_ok, on_err) = capture();
        thenable.subscribe(on_ok, on_err);
        assert_eq!(*log.lock().unwrap(), vec!["err:nope".to_string()]);
    }

    #[test]
    fn test_value_wraps_thenable() {
        let value = Value::thenable(Settled {
            outcome: Ok(Value::Null),
        });
        let thenable = value.as_thenable().expect("thenable capability");
        let (log, on_ok, on_err) = capture();
        thenable.subscribe(on_ok, on_err);
        assert_eq!(*log.lock().unwrap(), vec!["ok:null".to_string()]);
        assert_eq!(value.to_string(), "[object Promise]");
    }
}
