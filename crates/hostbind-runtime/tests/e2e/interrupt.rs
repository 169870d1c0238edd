//! Interrupting running scripts from another thread

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::harness::*;
use hostbind_engine::InterruptHandle;

/// Interrupt the engine behind `handle` as soon as it starts running
fn interrupt_when_running(handle: InterruptHandle) -> thread::JoinHandle<bool> {
    thread::spawn(move || {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if handle.is_running() && handle.interrupt() {
                return true;
            }
            thread::yield_now();
        }
        false
    })
}

fn spin(scope: &ScriptScope) -> ScriptResult<ScriptValue> {
    let overloads = scope.global("Overloads")?;
    scope.invoke_method(&overloads, "Spin", &[])
}

#[test]
fn test_interrupt_stops_host_loop() {
    let host = TestHost::with_fixtures();
    let interrupter = interrupt_when_running(host.engine.interrupt_handle());

    let err = host.engine.with_scope(spin).unwrap_err();
    assert!(interrupter.join().unwrap());
    assert!(err.is_interrupt(), "unexpected error: {}", err);
    assert_eq!(host.engine.last_outcome(), SessionState::Interrupted);
    assert_eq!(host.engine.state(), SessionState::Idle);
}

#[test]
fn test_interrupt_stops_script_loop() {
    let host = TestHost::with_fixtures();
    let source = host.define(|scope| loop {
        scope.poll()?;
        thread::yield_now();
    });
    let interrupter = interrupt_when_running(host.engine.interrupt_handle());

    let err = host.engine.evaluate(&source).unwrap_err();
    assert!(interrupter.join().unwrap());
    assert!(err.is_interrupt());
    assert_eq!(host.engine.last_outcome(), SessionState::Interrupted);
}

#[test]
fn test_interrupt_is_not_catchable() {
    let host = TestHost::with_fixtures();
    let interrupter = interrupt_when_running(host.engine.interrupt_handle());

    let result = host.engine.with_scope(|scope| {
        scope.try_catch(spin, |_, _| Ok(s("caught")))
    });
    assert!(interrupter.join().unwrap());
    assert!(result.unwrap_err().is_interrupt());
}

#[test]
fn test_engine_recovers_after_interrupt() {
    let host = TestHost::with_fixtures();
    let interrupter = interrupt_when_running(host.engine.interrupt_handle());
    assert!(host.engine.with_scope(spin).is_err());
    assert!(interrupter.join().unwrap());

    assert_eq!(host.eval(|_| Ok(i(1))).unwrap(), HostValue::Int32(1));
    assert_eq!(host.engine.last_outcome(), SessionState::Idle);
}

#[test]
fn test_interrupt_when_idle() {
    let host = TestHost::with_fixtures();
    assert!(!host.engine.interrupt());
    assert!(!host.engine.interrupt_handle().is_running());

    assert_eq!(host.eval(|_| Ok(i(2))).unwrap(), HostValue::Int32(2));

    let handle = host.engine.interrupt_handle();
    drop(host);
    assert!(!handle.interrupt());
}

#[test]
fn test_interrupt_inside_call() {
    let host = TestHost::with_fixtures();
    let engine = host.engine.clone();

    let err = host
        .engine
        .with_scope(|scope| {
            assert_eq!(engine.state(), SessionState::Running);
            assert!(engine.interrupt());
            scope.poll()?;
            Ok(())
        })
        .unwrap_err();
    assert!(err.is_interrupt());
}

#[test]
fn test_foreign_interrupt_is_a_fault() {
    let host = TestHost::with_fixtures();
    let worker = TestHost::with_fixtures();
    let source = worker.define(spin);
    host.add("bridge", bridge(worker.engine.engine()));

    let interrupter = interrupt_when_running(worker.engine.interrupt_handle());
    let err = host
        .engine
        .with_scope(|scope| {
            let bridge = scope.global("bridge")?;
            scope.invoke_method(&bridge, "Run", &[s(&source)])
        })
        .unwrap_err();
    assert!(interrupter.join().unwrap());

    let err = err.script_error().cloned().unwrap();
    assert_eq!(err.name(), "ExecutionFault");
    assert!(err.to_string().contains("interrupted"));
    assert_eq!(worker.engine.last_outcome(), SessionState::Interrupted);
    assert_eq!(host.engine.last_outcome(), SessionState::Faulted);
}

#[test]
fn test_interrupt_after_nested_call_leaves_worker_idle() {
    let host = TestHost::with_fixtures();
    let worker = TestHost::with_fixtures();
    let source = worker.define(|scope| {
        scope.set_global("touched", i(1))?;
        Ok(i(7))
    });
    host.add("bridge", bridge(worker.engine.engine()));

    let returned = Arc::new(AtomicBool::new(false));
    let gate = Arc::clone(&returned);
    let handle = host.engine.interrupt_handle();
    let interrupter = thread::spawn(move || {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if gate.load(Ordering::SeqCst) && handle.interrupt() {
                return true;
            }
            thread::yield_now();
        }
        false
    });

    let err = host
        .engine
        .with_scope(|scope| {
            let bridge = scope.global("bridge")?;
            let result = scope.invoke_method(&bridge, "Run", &[s(&source)])?;
            assert_eq!(int(&result), 7);
            returned.store(true, Ordering::SeqCst);
            spin(scope)
        })
        .unwrap_err();
    assert!(interrupter.join().unwrap());

    assert!(err.is_interrupt(), "unexpected error: {}", err);
    assert_eq!(host.engine.last_outcome(), SessionState::Interrupted);
    assert_eq!(worker.engine.last_outcome(), SessionState::Idle);
    assert_eq!(worker.engine.state(), SessionState::Idle);
    assert_eq!(worker.engine.global("touched"), Some(HostValue::Int32(1)));
}
