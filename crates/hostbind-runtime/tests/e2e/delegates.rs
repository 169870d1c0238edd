//! Script functions as host delegates, and host events

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use crate::harness::*;
use hostbind_sdk::{FromHost, HostDelegate};

fn add_ten(scope: &ScriptScope) -> ScriptValue {
    scope.function("addTen", |_, args| {
        let n = args.first().and_then(ScriptValue::as_i64).unwrap_or(0);
        Ok(i(n + 10))
    })
}

#[test]
fn test_function_passed_as_delegate() {
    let host = TestHost::with_fixtures();

    host.run(|scope| {
        let overloads = scope.global("Overloads")?;
        let result = scope.invoke_method(&overloads, "Apply", &[add_ten(scope), i(5)])?;
        assert_eq!(int(&result), 15);

        expect_error(scope.invoke_method(&overloads, "Apply", &[i(1), i(5)]), "ArgumentConversion");
        Ok(())
    });
}

#[test]
fn test_delegate_construction() {
    let host = TestHost::with_fixtures();

    host.run(|scope| {
        let transform_type = scope.global("Transform")?;
        let transform = scope.construct(&transform_type, &[add_ten(scope)])?;
        assert!(transform.as_host_item().is_some());

        assert_eq!(int(&scope.call(&transform, &[i(1)])?), 11);
        assert_eq!(int(&scope.invoke_method(&transform, "Invoke", &[i(2)])?), 12);
        expect_error(scope.call(&transform, &[s("x")]), "ArgumentConversion");

        let overloads = scope.global("Overloads")?;
        assert_eq!(int(&scope.invoke_method(&overloads, "Apply", &[transform, i(3)])?), 13);

        expect_error(scope.construct(&transform_type, &[i(1)]), "ArgumentConversion");
        expect_error(scope.construct(&transform_type, &[]), "ArgumentConversion");
        Ok(())
    });
}

#[test]
fn test_host_delegate_called_from_script() {
    let host = TestHost::with_fixtures();
    let double = HostDelegate::from_fn(&TRANSFORM, |args| {
        let n = i32::from_host(&args[0])?;
        Ok(HostValue::Int32(n * 2))
    })
    .unwrap();
    host.engine
        .add_host_object("double", HostItemFlags::NONE, HostValue::Delegate(double))
        .unwrap();

    host.run(|scope| {
        let double = scope.global("double")?;
        assert_eq!(int(&scope.call(&double, &[i(21)])?), 42);
        Ok(())
    });
}

#[test]
fn test_delegate_field_round_trip() {
    let host = TestHost::with_fixtures();
    host.add("notifier", notifier());

    host.run(|scope| {
        let notifier = scope.global("notifier")?;
        assert!(matches!(scope.get(&notifier, "Callback")?, ScriptValue::Null));

        let callback = add_ten(scope);
        scope.set(&notifier, "Callback", callback.clone())?;
        assert_eq!(int(&scope.invoke_method(&notifier, "RunCallback", &[i(7)])?), 17);

        let read_back = scope.get(&notifier, "Callback")?;
        assert!(scope.strict_equals(&read_back, &callback));

        scope.set(&notifier, "Callback", ScriptValue::Null)?;
        let err = expect_error(scope.invoke_method(&notifier, "RunCallback", &[i(7)]), "ExecutionFault");
        assert!(err.to_string().contains("no callback"));
        Ok(())
    });
}

#[test]
fn test_by_ref_delegate_parameters() {
    fn bump_result(host: &TestHost) -> i64 {
        host.run(|scope| {
            let bump = scope.function("bump", |scope, args| {
                if let Some(cell) = args.first().filter(|a| a.as_host_item().is_some()) {
                    let value = int(&scope.get(cell, "value")?);
                    scope.set(cell, "value", i(value + 10))?;
                }
                Ok(ScriptValue::Undefined)
            });
            let overloads = scope.global("Overloads")?;
            scope
                .invoke_method(&overloads, "ApplyBump", &[bump, i(1)])
                .map(|v| int(&v))
        })
    }

    let auto = TestHost::with_options(EngineOptions {
        enable_auto_host_variables: true,
        ..EngineOptions::default()
    });
    auto.add_fixtures();
    assert_eq!(bump_result(&auto), 11);

    let plain = TestHost::with_fixtures();
    assert_eq!(bump_result(&plain), 1);
}

// ============================================================================
// Events
// ============================================================================

#[test]
fn test_event_connect_and_disconnect() {
    let host = TestHost::with_fixtures();
    let obj = notifier();
    host.add("notifier", obj.clone());

    let calls = Arc::new(AtomicUsize::new(0));
    let last = Arc::new(AtomicI64::new(0));
    let (seen_calls, seen_last) = (Arc::clone(&calls), Arc::clone(&last));

    host.run(move |scope| {
        let notifier = scope.global("notifier")?;
        let changed = scope.get(&notifier, "Changed")?;
        expect_error(scope.call(&changed, &[i(1)]), "NotSupported");

        let handler = scope.function("onChanged", move |_, args| {
            seen_calls.fetch_add(1, Ordering::SeqCst);
            seen_last.store(args.first().and_then(ScriptValue::as_i64).unwrap_or(-1), Ordering::SeqCst);
            Ok(ScriptValue::Undefined)
        });
        let connection = scope.invoke_method(&changed, "connect", &[handler])?;
        assert!(boolean(&scope.get(&connection, "connected")?));

        scope.invoke_method(&notifier, "Raise", &[i(5)])?;
        scope.invoke_method(&connection, "disconnect", &[])?;
        assert!(!boolean(&scope.get(&connection, "connected")?));
        scope.invoke_method(&connection, "disconnect", &[])?;

        scope.invoke_method(&notifier, "Raise", &[i(6)])?;
        Ok(())
    });

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(last.load(Ordering::SeqCst), 5);
    assert_eq!(handler_count(&obj), 0);
}

#[test]
fn test_connect_through_accessor() {
    let host = TestHost::with_fixtures();
    let obj = notifier();
    host.add("notifier", obj.clone());

    host.run(|scope| {
        let notifier = scope.global("notifier")?;
        let changed = scope.get(&notifier, "Changed")?;
        let connect = scope.get(&changed, "connect")?;
        let first = scope.call(&connect, &[add_ten(scope)])?;
        let second = scope.call(&connect, &[add_ten(scope)])?;
        assert!(!scope.strict_equals(&first, &second));

        expect_error(scope.call(&connect, &[i(1)]), "ArgumentConversion");
        expect_error(scope.call(&connect, &[]), "MissingMember");
        assert!(scope.get(&changed, "other")?.is_undefined());
        Ok(())
    });
    assert_eq!(handler_count(&obj), 2);
}

#[test]
fn test_handler_error_propagates_to_raise() {
    let host = TestHost::with_fixtures();
    host.add("notifier", notifier());

    host.run(|scope| {
        let notifier = scope.global("notifier")?;
        let changed = scope.get(&notifier, "Changed")?;
        let failing = scope.function("failing", |scope, _| Err(scope.throw(s("handler failed"))));
        scope.invoke_method(&changed, "connect", &[failing])?;

        let err = expect_error(scope.invoke_method(&notifier, "Raise", &[i(1)]), "ExecutionFault");
        assert_eq!(err.innermost_message(), "handler failed");
        Ok(())
    });
}
