//! Tests for the process-wide serial switch.
//!
//! These live in their own binary because the switch affects every call in
//! the process. Tests within this file take `SWITCH` so they don't observe
//! each other's setting.

use std::sync::Mutex;
use std::sync::PoisonError;
use std::thread;

use stride::{PoolConfig, Range, ThreadPool};

static SWITCH: Mutex<()> = Mutex::new(());

#[test]
fn serial_mode_runs_on_calling_thread_in_order() {
    let _lock = SWITCH.lock().unwrap_or_else(PoisonError::into_inner);
    let caller = thread::current().id();

    stride::set_parallel(false);
    assert!(!stride::is_parallel());

    let visited = Mutex::new(Vec::new());
    stride::for_each_chunked(0, 1000, 3, 1, |i| {
        assert_eq!(thread::current().id(), caller);
        visited.lock().unwrap().push(i);
    })
    .unwrap();

    let text = stride::reduce(12, |i| i.to_string(), |a, b| format!("({a}{b})")).unwrap();

    stride::set_parallel(true);

    let visited = visited.into_inner().unwrap();
    assert_eq!(visited, (0..1000).step_by(3).collect::<Vec<_>>());
    // A strictly left-to-right fold.
    assert_eq!(text, "(((((((((((01)2)3)4)5)6)7)8)9)10)11)");
}

#[test]
fn serial_mode_applies_to_every_pool() {
    let _lock = SWITCH.lock().unwrap_or_else(PoisonError::into_inner);
    let pool = ThreadPool::build(PoolConfig::default().num_threads(Some(2)));
    let caller = thread::current().id();

    let _serial = stride::serial();
    pool.for_each(Range::upto(500).unwrap(), |_| {
        assert_eq!(thread::current().id(), caller);
        assert!(!pool.current_thread_is_worker());
    })
    .unwrap();
}

#[test]
fn serial_guard_restores_previous_setting() {
    let _lock = SWITCH.lock().unwrap_or_else(PoisonError::into_inner);
    assert!(stride::is_parallel());
    {
        let _outer = stride::serial();
        assert!(!stride::is_parallel());
        {
            let _inner = stride::serial();
            assert!(!stride::is_parallel());
        }
        // The inner guard restores the outer guard's setting.
        assert!(!stride::is_parallel());
    }
    assert!(stride::is_parallel());
}

#[test]
fn serial_mode_still_reports_errors() {
    let _lock = SWITCH.lock().unwrap_or_else(PoisonError::into_inner);
    let _serial = stride::serial();

    let calls = Mutex::new(Vec::new());
    let result = stride::for_each_chunked(0, 10, 1, 1, |i| {
        calls.lock().unwrap().push(i);
        if i == 3 {
            panic!("stopped at {i}");
        }
    });
    let err = match result {
        Err(stride::Error::Computation(err)) => err,
        other => panic!("expected a computation error, got {other:?}"),
    };
    assert_eq!(err.message(), Some("stopped at 3"));
    // Sequential execution stops at the first panic.
    assert_eq!(calls.into_inner().unwrap_or_else(PoisonError::into_inner), [0, 1, 2, 3]);

    let result = stride::for_each_step(0, 10, 0, |_| {});
    assert!(matches!(result, Err(stride::Error::Argument(_))));
}

#[test]
fn parallel_mode_uses_workers_again() {
    let _lock = SWITCH.lock().unwrap_or_else(PoisonError::into_inner);
    {
        let _serial = stride::serial();
    }
    let pool = ThreadPool::build(PoolConfig::default().num_threads(Some(2)));
    pool.for_each(Range::upto(100).unwrap(), |_| assert!(pool.current_thread_is_worker()))
        .unwrap();
}
