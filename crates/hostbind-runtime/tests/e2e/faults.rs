//! Host exceptions, script errors and nested faults

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::harness::*;

#[test]
fn test_host_exception_becomes_execution_fault() {
    let host = TestHost::with_fixtures();
    host.add("counter", counter(1));

    let err = host
        .engine
        .with_scope(|scope| {
            let counter = scope.global("counter")?;
            scope.invoke_method(&counter, "Fail", &[])
        })
        .unwrap_err();
    let err = err.script_error().cloned().unwrap();
    assert_eq!(err.name(), "ExecutionFault");
    assert_eq!(err.innermost_message(), "boom");
    match &err {
        ScriptError::Execution(fault) => {
            assert_eq!(fault.depth(), 1);
            assert!(fault.host_error().is_some());
        }
        other => panic!("expected an execution fault, got {:?}", other),
    }
    assert_eq!(host.engine.last_outcome(), SessionState::Faulted);
}

#[test]
fn test_script_catches_host_fault() {
    let host = TestHost::with_fixtures();
    host.add("counter", counter(1));

    host.run(|scope| {
        let caught = scope.try_catch(
            |scope| {
                let counter = scope.global("counter")?;
                scope.invoke_method(&counter, "Fail", &[])
            },
            |_, caught| Ok(caught),
        )?;
        assert_eq!(text(&scope.get(&caught, "name")?), "ExecutionFault");
        assert_eq!(text(&scope.get(&caught, "message")?), "boom");
        Ok(())
    });
    assert_eq!(host.engine.last_outcome(), SessionState::Idle);
}

#[test]
fn test_script_catches_disposed_proxy_access() {
    let host = TestHost::with_fixtures();
    let worker = TestHost::with_fixtures();
    worker.add("counter", counter(1));
    let stale = worker.engine.with_scope(|scope| scope.global("counter")).unwrap();
    worker.engine.dispose();

    host.run(move |scope| {
        let caught = scope.try_catch(move |scope| scope.get(&stale, "Count"), |_, caught| Ok(caught))?;
        assert_eq!(text(&scope.get(&caught, "name")?), "ObjectDisposed");
        Ok(())
    });
    assert_eq!(host.engine.last_outcome(), SessionState::Idle);
}

#[test]
fn test_thrown_value_is_caught_unchanged() {
    let host = TestHost::with_fixtures();

    host.run(|scope| {
        let error = scope.new_object([("name", s("TypeError")), ("message", s("bad input"))]);
        let thrown = error.clone();
        let caught = scope.try_catch(move |scope| Err(scope.throw(thrown)), |_, caught| Ok(caught))?;
        assert!(scope.strict_equals(&caught, &error));

        let err = expect_error::<ScriptValue>(Err(scope.throw(s("plain"))), "Error");
        assert_eq!(err.innermost_message(), "plain");
        Ok(())
    });

    let source = host.define(|scope| {
        Err(scope.throw(scope.new_object([("name", s("TypeError")), ("message", s("bad input"))])))
    });
    let err = expect_runtime_error(host.engine.evaluate(&source), "TypeError");
    assert!(err.to_string().contains("bad input"));
}

#[test]
fn test_nested_engine_fault() {
    let host = TestHost::with_fixtures();
    let worker = TestHost::with_fixtures();
    worker.add("counter", counter(1));
    let failing = worker.define(|scope| {
        let counter = scope.global("counter")?;
        scope.invoke_method(&counter, "Fail", &[])
    });
    host.add("bridge", bridge(worker.engine.engine()));

    let err = host
        .engine
        .with_scope(|scope| {
            let bridge = scope.global("bridge")?;
            scope.invoke_method(&bridge, "Run", &[s(&failing)])
        })
        .unwrap_err();
    let err = err.script_error().cloned().unwrap();
    assert_eq!(err.name(), "ExecutionFault");
    assert_eq!(err.innermost_message(), "boom");
    match &err {
        ScriptError::Execution(fault) => assert_eq!(fault.depth(), 2),
        other => panic!("expected an execution fault, got {:?}", other),
    }
    assert_eq!(worker.engine.last_outcome(), SessionState::Faulted);
}

#[test]
fn test_call_depth_limit() {
    let host = TestHost::with_options(EngineOptions {
        max_nested_depth: 8,
        ..EngineOptions::default()
    });
    let calls = Arc::new(AtomicUsize::new(0));

    let counted = Arc::clone(&calls);
    let err = host
        .engine
        .with_scope(move |scope| {
            let recurse = scope.function("recurse", move |scope, _args| {
                counted.fetch_add(1, Ordering::SeqCst);
                let me = scope.global("recurse")?;
                scope.call(&me, &[])
            });
            scope.set_global("recurse", recurse.clone())?;
            scope.call(&recurse, &[])
        })
        .unwrap_err();
    let err = err.script_error().cloned().unwrap();
    assert_eq!(err.name(), "RangeError");
    assert_eq!(err.innermost_message(), "maximum call depth exceeded");
    assert_eq!(calls.load(Ordering::SeqCst), 7);

    assert_eq!(host.eval(|_| Ok(i(1))).unwrap(), HostValue::Int32(1));
}

#[test]
fn test_script_level_errors() {
    let host = TestHost::with_fixtures();

    expect_runtime_error(host.engine.evaluate("1 +"), "SyntaxError");
    let err = expect_runtime_error(host.engine.evaluate("missingGlobal"), "ReferenceError");
    assert!(err.to_string().contains("missingGlobal is not defined"));

    host.run(|scope| {
        expect_error(scope.get(&ScriptValue::Null, "x"), "TypeError");
        expect_error(scope.call(&i(1), &[]), "TypeError");
        Ok(())
    });
}

#[test]
fn test_invoke_global_function() {
    let host = TestHost::new();
    host.run(|scope| {
        let double = scope.function("double", |_, args| {
            let n = args.first().and_then(ScriptValue::as_i64).unwrap_or(0);
            Ok(i(n * 2))
        });
        scope.set_global("double", double)
    });

    assert_eq!(host.engine.invoke("double", &[HostValue::Int32(4)]).unwrap(), HostValue::Int32(8));
    expect_runtime_error(host.engine.invoke("triple", &[]), "MissingMember");
}
