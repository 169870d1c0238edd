//! Host-facing control surface of one engine
//!
//! [`ScriptEngine`] wraps an engine created by a [`Runtime`](crate::Runtime)
//! and reports failures as [`RuntimeError`]. The underlying
//! [`Engine`] handle stays reachable through [`ScriptEngine::engine`] for
//! script-side values and scopes.

use std::sync::Arc;

use hostbind_engine::{
    DocumentInfo, Engine, EngineOptions, HeapInfo, HostItemFlags, InterruptHandle, ModuleLoader, ScriptResult,
    ScriptScope, SessionState, SweepStats,
};
use hostbind_sdk::{HostType, HostValue, ScriptAccess, TypeRef};

use crate::error::RuntimeResult;

/// A script engine
#[derive(Clone, Debug)]
pub struct ScriptEngine {
    engine: Engine,
}

impl ScriptEngine {
    pub(crate) fn from_engine(engine: Engine) -> Self {
        ScriptEngine { engine }
    }

    /// Underlying engine handle
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Engine id
    pub fn id(&self) -> u64 {
        self.engine.id()
    }

    /// Engine name
    pub fn name(&self) -> &str {
        self.engine.name()
    }

    /// Options the engine was created with
    pub fn options(&self) -> &EngineOptions {
        self.engine.options()
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Evaluate a script and return its completion value
    pub fn evaluate(&self, code: &str) -> RuntimeResult<HostValue> {
        Ok(self.engine.evaluate(code)?)
    }

    /// Evaluate under an explicit document; module documents evaluate once
    pub fn evaluate_document(&self, document: DocumentInfo, code: &str) -> RuntimeResult<HostValue> {
        Ok(self.engine.evaluate_document(document, code)?)
    }

    /// Evaluate module source under `specifier`
    pub fn evaluate_module(&self, specifier: &str, code: &str) -> RuntimeResult<HostValue> {
        Ok(self.engine.evaluate_module(specifier, code)?)
    }

    /// Run a script for its side effects
    pub fn execute(&self, code: &str) -> RuntimeResult<()> {
        Ok(self.engine.execute(code)?)
    }

    /// Call the global script function `name`
    pub fn invoke(&self, name: &str, args: &[HostValue]) -> RuntimeResult<HostValue> {
        Ok(self.engine.invoke(name, args)?)
    }

    /// Import a module through the configured loader
    pub fn import(&self, specifier: &str) -> RuntimeResult<HostValue> {
        Ok(self.engine.import(specifier)?)
    }

    /// Run `f` against a scope of this engine
    pub fn with_scope<R>(&self, f: impl FnOnce(&ScriptScope) -> ScriptResult<R>) -> RuntimeResult<R> {
        Ok(self.engine.with_scope(f)?)
    }

    // ========================================================================
    // Host items
    // ========================================================================

    /// Expose a host object as global `name`
    pub fn add_host_object(&self, name: &str, flags: HostItemFlags, value: HostValue) -> RuntimeResult<()> {
        Ok(self.engine.add_host_object(name, flags, value)?)
    }

    /// Expose a host type as global `name`
    pub fn add_host_type(&self, name: &str, flags: HostItemFlags, ty: TypeRef) -> RuntimeResult<()> {
        Ok(self.engine.add_host_type(name, flags, ty)?)
    }

    /// Expose the script helper functions as global `name`
    pub fn add_host_functions(&self, name: &str) -> RuntimeResult<()> {
        Ok(self.engine.add_host_functions(name)?)
    }

    /// Host value of global `name`
    pub fn global(&self, name: &str) -> Option<HostValue> {
        self.engine.global(name)
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Install the module loader
    pub fn set_module_loader(&self, loader: Arc<dyn ModuleLoader>) {
        self.engine.set_module_loader(loader);
    }

    /// Change the access of unannotated members
    pub fn set_default_access(&self, access: ScriptAccess) {
        self.engine.set_default_access(access);
    }

    /// Change the type whose private members script may reach
    pub fn set_access_context(&self, ty: Option<Arc<HostType>>) {
        self.engine.set_access_context(ty);
    }

    // ========================================================================
    // Control
    // ========================================================================

    /// Interrupt the running call; false when idle
    pub fn interrupt(&self) -> bool {
        self.engine.interrupt()
    }

    /// Handle for interrupting from another thread
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.engine.interrupt_handle()
    }

    /// Collect garbage now, or defer it while a call is running
    pub fn collect_garbage(&self, exhaustive: bool) -> Option<SweepStats> {
        self.engine.collect_garbage(exhaustive)
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.engine.state()
    }

    /// Terminal state of the last top-level call
    pub fn last_outcome(&self) -> SessionState {
        self.engine.last_outcome()
    }

    /// Release every proxy, global and module record. Idempotent.
    pub fn dispose(&self) {
        self.engine.dispose();
    }

    /// Has the engine been disposed?
    pub fn is_disposed(&self) -> bool {
        self.engine.is_disposed()
    }

    /// Runtime heap counters
    pub fn heap_info(&self) -> HeapInfo {
        self.engine.heap_info()
    }
}
