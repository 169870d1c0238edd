//! Test harness for end-to-end binding tests
//!
//! A [`TestHost`] owns a runtime, a scriptlet backend and one engine. Tests
//! either evaluate registered scriptlets through the engine, or run assertions
//! directly against a [`ScriptScope`] inside a top-level call.

#![allow(dead_code)]

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

pub use std::sync::Arc;

pub use hostbind_engine::{
    DocumentInfo, EngineOptions, HostItemFlags, MemoryLoader, NullExport, ScriptError, ScriptResult, ScriptScope,
    ScriptValue, SessionState,
};
pub use hostbind_runtime::{Runtime, RuntimeConfig, RuntimeError, RuntimeResult, ScriptEngine, ScriptletBackend};
pub use hostbind_sdk::{HostValue, ScriptAccess, TypeRef};

pub use super::fixtures::*;

static NEXT_SCRIPT: AtomicUsize = AtomicUsize::new(0);

/// A runtime with one engine over a scriptlet backend
pub struct TestHost {
    pub runtime: Runtime,
    pub backend: Arc<ScriptletBackend>,
    pub engine: ScriptEngine,
}

impl TestHost {
    /// Engine with default options
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    /// Engine with explicit options
    pub fn with_options(options: EngineOptions) -> Self {
        let runtime = Runtime::new();
        let backend = Arc::new(ScriptletBackend::new());
        let engine = runtime.create_engine_with("test", options, backend.clone());
        TestHost {
            runtime,
            backend,
            engine,
        }
    }

    /// Engine created from parsed configuration
    pub fn with_config(config: RuntimeConfig) -> Self {
        let runtime = Runtime::with_config(config);
        let backend = Arc::new(ScriptletBackend::new());
        let engine = runtime.create_engine("test", backend.clone());
        TestHost {
            runtime,
            backend,
            engine,
        }
    }

    /// Engine with every fixture type and the helper functions as globals
    pub fn with_fixtures() -> Self {
        let host = Self::new();
        host.add_fixtures();
        host
    }

    /// Expose the fixture types and `host` helpers
    pub fn add_fixtures(&self) {
        let engine = &self.engine;
        let types = [
            ("Counter", TypeRef::named(&COUNTER)),
            ("Overloads", TypeRef::named(&OVERLOADS)),
            ("Samples", TypeRef::named(&SAMPLES)),
            ("Bag", TypeRef::named(&BAG)),
            ("Color", TypeRef::named(&COLOR)),
            ("Perms", TypeRef::named(&PERMS)),
            ("Point", TypeRef::named(&POINT)),
            ("IShape", TypeRef::named(&ISHAPE)),
            ("Shapes", TypeRef::named(&SHAPES)),
            ("Transform", TypeRef::named(&TRANSFORM)),
            ("Changed", TypeRef::named(&CHANGED)),
            ("Int32", TypeRef::i32()),
            ("Int64", TypeRef::i64()),
            ("Byte", TypeRef::u8()),
            ("String", TypeRef::String),
        ];
        for (name, ty) in types {
            engine
                .add_host_type(name, HostItemFlags::NONE, ty)
                .unwrap_or_else(|e| panic!("failed to add type {}: {}", name, e));
        }
        engine
            .add_host_functions("host")
            .unwrap_or_else(|e| panic!("failed to add host functions: {}", e));
    }

    /// Register `body` as a script and return its source
    pub fn define<F>(&self, body: F) -> String
    where
        F: Fn(&ScriptScope) -> ScriptResult<ScriptValue> + Send + Sync + 'static,
    {
        let source = format!("script_{}()", NEXT_SCRIPT.fetch_add(1, Ordering::Relaxed));
        self.backend.define(&source, body);
        source
    }

    /// Register and evaluate `body`
    pub fn eval<F>(&self, body: F) -> RuntimeResult<HostValue>
    where
        F: Fn(&ScriptScope) -> ScriptResult<ScriptValue> + Send + Sync + 'static,
    {
        let source = self.define(body);
        self.engine.evaluate(&source)
    }

    /// Run `f` inside a top-level call, failing the test on any error
    pub fn run<R>(&self, f: impl FnOnce(&ScriptScope) -> ScriptResult<R>) -> R {
        match self.engine.with_scope(f) {
            Ok(value) => value,
            Err(e) => panic!("script failed: {}", e),
        }
    }

    /// Expose `value` as global `name`
    pub fn add(&self, name: &str, value: impl Into<HostValue>) {
        self.engine
            .add_host_object(name, HostItemFlags::NONE, value.into())
            .unwrap_or_else(|e| panic!("failed to add {}: {}", name, e));
    }
}

// ============================================================================
// Expectations
// ============================================================================

/// Expect a script error named `name`
pub fn expect_error<T: fmt::Debug>(result: ScriptResult<T>, name: &str) -> ScriptError {
    match result {
        Ok(value) => panic!("expected {} error, got {:?}", name, value),
        Err(err) => {
            assert_eq!(err.name(), name, "wrong error: {}", err);
            err
        }
    }
}

/// Expect a runtime call to fail with a script error named `name`
pub fn expect_runtime_error<T: fmt::Debug>(result: RuntimeResult<T>, name: &str) -> ScriptError {
    match result {
        Ok(value) => panic!("expected {} error, got {:?}", name, value),
        Err(RuntimeError::Script(err)) => {
            assert_eq!(err.name(), name, "wrong error: {}", err);
            err
        }
        Err(other) => panic!("expected a script error, got {}", other),
    }
}

/// Integer value of a script number
pub fn int(value: &ScriptValue) -> i64 {
    match value.as_i64() {
        Some(i) => i,
        None => panic!("expected an integer, got {:?}", value),
    }
}

/// Numeric value of a script number
pub fn number(value: &ScriptValue) -> f64 {
    match value.as_f64() {
        Some(d) => d,
        None => panic!("expected a number, got {:?}", value),
    }
}

/// Text of a script string
pub fn text(value: &ScriptValue) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => panic!("expected a string, got {:?}", value),
    }
}

/// Boolean value of a script boolean
pub fn boolean(value: &ScriptValue) -> bool {
    match value.as_bool() {
        Some(b) => b,
        None => panic!("expected a boolean, got {:?}", value),
    }
}

/// Script string argument
pub fn s(value: &str) -> ScriptValue {
    ScriptValue::string(value)
}

/// Script integer argument
pub fn i(value: i64) -> ScriptValue {
    ScriptValue::Int(value)
}
