//! Member access policy: annotations, engine defaults, private members

use crate::harness::*;

#[test]
fn test_blocked_member_is_invisible() {
    let host = TestHost::with_fixtures();
    host.add("counter", counter(1));

    host.run(|scope| {
        let counter = scope.global("counter")?;
        assert!(scope.get(&counter, "Secret")?.is_undefined());
        expect_error(scope.invoke_method(&counter, "Secret", &[]), "MissingMember");
        expect_error(scope.set(&counter, "Secret", s("x")), "MissingMember");

        let names = scope.member_names(&counter)?;
        assert!(names.iter().any(|n| n == "Count"));
        assert!(!names.iter().any(|n| n == "Secret"));
        Ok(())
    });
}

#[test]
fn test_blocked_overload_does_not_fall_back_to_getter() {
    let host = TestHost::with_fixtures();
    let obj = counter(0);
    host.add("counter", obj.clone());

    host.run(|scope| {
        let counter = scope.global("counter")?;
        expect_error(scope.invoke_method(&counter, "Tick", &[s("x")]), "MissingMember");
        expect_error(scope.invoke_method(&counter, "Reset", &[i(1)]), "MissingMember");
        expect_error(scope.set_invoke_member(&counter, "Fail", &[i(1)], i(2)), "NotSupported");
        Ok(())
    });
    assert_eq!(count_of(&obj), 0);

    host.run(|scope| {
        let counter = scope.global("counter")?;
        scope.invoke_method(&counter, "Tick", &[])?;
        Ok(())
    });
    assert_eq!(count_of(&obj), 1);
}

#[test]
fn test_renamed_member_uses_script_name() {
    let host = TestHost::with_fixtures();
    let obj = counter(1);
    host.add("counter", obj.clone());

    host.run(|scope| {
        let counter = scope.global("counter")?;
        assert_eq!(text(&scope.get(&counter, "label")?), "counter");
        assert!(scope.get(&counter, "Label")?.is_undefined());
        scope.set(&counter, "label", s("renamed"))?;
        Ok(())
    });
    let label = obj.with(|c: &CounterState| c.label.clone()).unwrap();
    assert_eq!(label, "renamed");
}

#[test]
fn test_read_only_member_rejects_writes() {
    let host = TestHost::with_fixtures();
    host.add("counter", counter(1));

    host.run(|scope| {
        let counter = scope.global("counter")?;
        assert_eq!(int(&scope.get(&counter, "Limit")?), 10);
        let err = expect_error(scope.set(&counter, "Limit", i(20)), "AccessDenied");
        assert!(err.to_string().contains("read-only"));
        assert_eq!(int(&scope.get(&counter, "Limit")?), 10);
        Ok(())
    });
}

#[test]
fn test_methods_and_unknown_members_reject_assignment() {
    let host = TestHost::with_fixtures();
    host.add("counter", counter(1));

    host.run(|scope| {
        let counter = scope.global("counter")?;
        expect_error(scope.set(&counter, "Reset", i(1)), "AccessDenied");
        expect_error(scope.set(&counter, "Missing", i(1)), "MissingMember");
        assert!(scope.get(&counter, "Missing")?.is_undefined());
        Ok(())
    });
}

#[test]
fn test_private_member_needs_access_context() {
    let host = TestHost::with_fixtures();
    host.add("counter", counter(1));

    host.run(|scope| {
        let counter = scope.global("counter")?;
        assert!(scope.get(&counter, "Hidden")?.is_undefined());
        Ok(())
    });

    host.engine.set_access_context(Some(COUNTER.clone()));
    host.run(|scope| {
        let counter = scope.global("counter")?;
        assert_eq!(int(&scope.get(&counter, "Hidden")?), 42);
        Ok(())
    });

    host.engine.set_access_context(Some(BAG.clone()));
    host.run(|scope| {
        let counter = scope.global("counter")?;
        assert!(scope.get(&counter, "Hidden")?.is_undefined());
        Ok(())
    });
}

#[test]
fn test_private_access_flag() {
    let host = TestHost::with_fixtures();
    host.engine
        .add_host_object("trusted", HostItemFlags::PRIVATE_ACCESS, counter(1).into())
        .unwrap();

    host.run(|scope| {
        let trusted = scope.global("trusted")?;
        assert_eq!(int(&scope.get(&trusted, "Hidden")?), 42);
        Ok(())
    });
}

#[test]
fn test_default_access_applies_to_next_access() {
    let host = TestHost::with_fixtures();
    host.add("counter", counter(1));

    host.engine.set_default_access(ScriptAccess::ReadOnly);
    host.run(|scope| {
        let counter = scope.global("counter")?;
        assert_eq!(int(&scope.get(&counter, "Count")?), 1);
        expect_error(scope.set(&counter, "Count", i(2)), "AccessDenied");
        Ok(())
    });

    host.engine.set_default_access(ScriptAccess::Full);
    host.run(|scope| {
        let counter = scope.global("counter")?;
        scope.set(&counter, "Count", i(2))?;
        assert_eq!(int(&scope.get(&counter, "Count")?), 2);
        Ok(())
    });
}

#[test]
fn test_member_handle_rechecks_policy() {
    let host = TestHost::with_fixtures();
    host.add("counter", counter(1));

    let engine = host.engine.clone();
    host.run(|scope| {
        let counter = scope.global("counter")?;
        let add = scope.get(&counter, "Add")?;
        assert_eq!(add.type_of(), "function");
        assert_eq!(text(&scope.call(&add, &[i(1)])?), "Int32");

        engine.set_default_access(ScriptAccess::None);
        expect_error(scope.call(&add, &[i(1)]), "MissingMember");
        assert!(scope.get(&counter, "Count")?.is_undefined());

        engine.set_default_access(ScriptAccess::Full);
        assert_eq!(int(&scope.get(&counter, "Count")?), 2);
        Ok(())
    });
}
