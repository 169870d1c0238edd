//! Module loading, records and re-import

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::harness::*;

#[test]
fn test_import_runs_module_once() {
    let host = TestHost::new();
    let runs = Arc::new(AtomicUsize::new(0));

    let util_runs = Arc::clone(&runs);
    let util = host.define(move |scope| {
        util_runs.fetch_add(1, Ordering::SeqCst);
        assert_eq!(scope.document().specifier.as_deref(), Some("lib/util.js"));
        scope.set_global("utilLoaded", ScriptValue::Bool(true))?;
        Ok(s("util"))
    });
    let main = host.define(|scope| {
        assert!(scope.document().is_module());
        let first = scope.import("./util.js")?;
        assert_eq!(text(&first), "util");
        let again = scope.import("../lib/util.js")?;
        assert!(again.is_undefined());
        Ok(i(1))
    });
    host.engine.set_module_loader(Arc::new(
        MemoryLoader::new()
            .with_module("lib/main.js", main)
            .with_module("lib/util.js", util),
    ));

    assert_eq!(host.engine.import("lib/main.js").unwrap(), HostValue::Int32(1));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(host.engine.global("utilLoaded"), Some(HostValue::Bool(true)));

    let engine = host.engine.engine();
    assert!(engine.is_module_evaluated("lib/main.js"));
    assert!(engine.is_module_evaluated("lib/util.js"));
    assert_eq!(engine.module_count(), 2);
    assert_eq!(host.runtime.heap_info().live_modules, 2);

    assert_eq!(host.engine.import("./lib/main.js").unwrap(), HostValue::Undefined);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(engine.module_count(), 2);
}

#[test]
fn test_cyclic_import_sees_undefined() {
    let host = TestHost::new();
    let a = host.define(|scope| {
        let b = scope.import("./b.js")?;
        assert_eq!(text(&b), "b");
        Ok(s("a"))
    });
    let b = host.define(|scope| {
        assert!(scope.import("./a.js")?.is_undefined());
        Ok(s("b"))
    });
    host.engine.set_module_loader(Arc::new(
        MemoryLoader::new().with_module("a.js", a).with_module("b.js", b),
    ));

    assert_eq!(host.engine.import("a.js").unwrap(), HostValue::string("a"));
    assert!(host.engine.engine().is_module_evaluated("b.js"));
}

#[test]
fn test_missing_module() {
    let host = TestHost::new();
    host.engine.set_module_loader(Arc::new(MemoryLoader::new()));

    let err = expect_runtime_error(host.engine.import("lib/nope.js"), "Error");
    assert!(err.to_string().contains("Cannot find module 'lib/nope.js'"));
    assert_eq!(host.engine.engine().module_count(), 0);

    let importer = host.define(|scope| {
        scope.try_catch(
            |scope| scope.import("./missing.js"),
            |scope, caught| scope.get(&caught, "message"),
        )
    });
    assert_eq!(
        host.engine.evaluate(&importer).unwrap(),
        HostValue::string("Cannot find module 'missing.js'")
    );
}

#[test]
fn test_import_without_loader() {
    let host = TestHost::new();
    expect_runtime_error(host.engine.import("main.js"), "NotSupported");

    let inline = host.define(|_| Ok(i(7)));
    assert_eq!(host.engine.evaluate_module("./inline.js", &inline).unwrap(), HostValue::Int32(7));
    assert!(host.engine.engine().is_module_evaluated("inline.js"));
    assert_eq!(host.engine.evaluate_module("inline.js", &inline).unwrap(), HostValue::Undefined);
}

#[test]
fn test_failed_module_is_retried() {
    let host = TestHost::new();
    let runs = Arc::new(AtomicUsize::new(0));

    let flaky_runs = Arc::clone(&runs);
    let flaky = host.define(move |scope| {
        if flaky_runs.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(scope.throw(s("first run fails")));
        }
        Ok(s("ok"))
    });
    host.engine.set_module_loader(Arc::new(MemoryLoader::new().with_module("flaky.js", flaky)));

    let err = expect_runtime_error(host.engine.import("flaky.js"), "Error");
    assert!(err.to_string().contains("first run fails"));
    assert!(!host.engine.engine().is_module_evaluated("flaky.js"));
    assert_eq!(host.engine.engine().module_count(), 0);
    assert_eq!(host.runtime.heap_info().live_modules, 0);

    assert_eq!(host.engine.import("flaky.js").unwrap(), HostValue::string("ok"));
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[test]
fn test_module_syntax_error_is_not_recorded() {
    let host = TestHost::new();
    host.engine.set_module_loader(Arc::new(MemoryLoader::new().with_module("bad.js", "this is not a scriptlet")));

    expect_runtime_error(host.engine.import("bad.js"), "SyntaxError");
    assert_eq!(host.engine.engine().module_count(), 0);
}

#[test]
fn test_dispose_releases_modules() {
    let host = TestHost::new();
    let body = host.define(|_| Ok(ScriptValue::Null));
    host.engine.evaluate_module("m.js", &body).unwrap();
    assert_eq!(host.runtime.heap_info().live_modules, 1);

    host.engine.dispose();
    assert_eq!(host.engine.engine().module_count(), 0);
    assert_eq!(host.runtime.heap_info().live_modules, 0);
}
