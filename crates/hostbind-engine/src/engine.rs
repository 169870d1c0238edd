//! Engine core and handle
//!
//! [`EngineCore`] owns everything one script engine needs: options, the
//! access policy, the execution session, the proxy cache, globals and module
//! records. Its behavior is spread over the modules that implement each
//! concern (`binder`, `marshal`, `session`, `module`); this module holds the
//! state and the host-facing [`Engine`] handle.
//!
//! # Example
//!
//! ```ignore
//! let engine = Engine::new("main", EngineOptions::default(), backend, heap);
//! engine.add_host_object("list", HostItemFlags::NONE, list)?;
//! let count = engine.evaluate("list.Count")?;
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use hostbind_sdk::{HostType, HostValue, ScriptAccess, TypeRef};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::access::AccessPolicy;
use crate::backend::{DocumentInfo, ScriptBackend};
use crate::error::{ScriptError, ScriptResult};
use crate::heap::{HeapCounters, HeapInfo};
use crate::helpers::HOST_FUNCTIONS;
use crate::lifetime::{EngineToken, HostItem, ProxyCache, SweepStats};
use crate::module::{ModuleCache, ModuleLoader};
use crate::options::{EngineOptions, HostItemFlags};
use crate::scope::ScriptScope;
use crate::session::{FrameKind, Session, SessionState};
use crate::value::ScriptValue;

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// EngineCore
// ============================================================================

/// Shared state of one engine
pub struct EngineCore {
    pub(crate) id: u64,
    pub(crate) name: String,
    pub(crate) options: EngineOptions,
    pub(crate) policy: AccessPolicy,
    pub(crate) session: Session,
    pub(crate) cache: ProxyCache,
    pub(crate) globals: RwLock<FxHashMap<String, ScriptValue>>,
    pub(crate) global_members: RwLock<Vec<Arc<HostItem>>>,
    pub(crate) modules: ModuleCache,
    pub(crate) loader: RwLock<Option<Arc<dyn ModuleLoader>>>,
    pub(crate) backend: Arc<dyn ScriptBackend>,
    pub(crate) heap: Arc<HeapCounters>,
    documents: AtomicU64,
    this: Weak<EngineCore>,
}

impl EngineCore {
    fn new(
        name: String,
        options: EngineOptions,
        backend: Arc<dyn ScriptBackend>,
        heap: Arc<HeapCounters>,
    ) -> Arc<Self> {
        let id = NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed);
        let token = EngineToken::new(id, Arc::clone(&heap));
        heap.engine_created();
        tracing::debug!(engine = id, name = %name, backend = backend.name(), "created engine");
        Arc::new_cyclic(|this| EngineCore {
            id,
            policy: AccessPolicy::new(options.default_access, options.access_context.clone()),
            session: Session::new(options.max_nested_depth),
            cache: ProxyCache::new(token),
            globals: RwLock::new(FxHashMap::default()),
            global_members: RwLock::new(Vec::new()),
            modules: ModuleCache::default(),
            loader: RwLock::new(None),
            backend,
            heap,
            documents: AtomicU64::new(0),
            this: this.clone(),
            name,
            options,
        })
    }

    /// Engine id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Has the engine been disposed?
    pub fn is_disposed(&self) -> bool {
        self.cache.is_disposed()
    }

    pub(crate) fn heap(&self) -> &Arc<HeapCounters> {
        &self.heap
    }

    /// Owning `Arc`, while the engine is alive and not disposed
    pub(crate) fn arc(&self) -> ScriptResult<Arc<EngineCore>> {
        self.this
            .upgrade()
            .filter(|core| !core.is_disposed())
            .ok_or_else(|| ScriptError::ObjectDisposed(format!("engine '{}' has been disposed", self.name)))
    }

    /// Release roots of dropped proxies
    pub(crate) fn sweep(&self) -> SweepStats {
        self.cache.sweep()
    }

    fn next_document(&self) -> DocumentInfo {
        let n = self.documents.fetch_add(1, Ordering::Relaxed) + 1;
        DocumentInfo::script(format!("Script Document [{}]", n))
    }

    /// Run `code` as a classic script in a top-level frame
    pub(crate) fn run_document(&self, document: DocumentInfo, code: &str) -> ScriptResult<ScriptValue> {
        let core = self.arc()?;
        let document = Arc::new(document);
        self.run_frame(FrameKind::Script, || {
            let script = self.backend.compile(&document, code)?;
            script.run(&ScriptScope::new(core, Arc::clone(&document)))
        })
    }

    fn dispose(&self) {
        if self.is_disposed() {
            return;
        }
        self.cache.dispose();
        let globals = std::mem::take(&mut *self.globals.write());
        let members = std::mem::take(&mut *self.global_members.write());
        self.modules.clear();
        drop(globals);
        drop(members);
        tracing::debug!(engine = self.id, name = %self.name, "disposed engine");
    }
}

impl Drop for EngineCore {
    fn drop(&mut self) {
        self.dispose();
        self.heap.engine_released();
    }
}

impl fmt::Debug for EngineCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EngineCore({} #{})", self.name, self.id)
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Handle to a script engine. Clones share the engine.
#[derive(Clone)]
pub struct Engine {
    core: Arc<EngineCore>,
}

impl Engine {
    /// Create an engine on `backend`, accounted against `heap`
    pub fn new(
        name: impl Into<String>,
        options: EngineOptions,
        backend: Arc<dyn ScriptBackend>,
        heap: Arc<HeapCounters>,
    ) -> Self {
        Engine {
            core: EngineCore::new(name.into(), options, backend, heap),
        }
    }

    pub(crate) fn from_core(core: Arc<EngineCore>) -> Self {
        Engine { core }
    }

    /// Engine id
    pub fn id(&self) -> u64 {
        self.core.id
    }

    /// Engine name
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Options the engine was created with
    pub fn options(&self) -> &EngineOptions {
        &self.core.options
    }

    /// Same engine?
    pub fn ptr_eq(&self, other: &Engine) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }

    /// Handle that does not keep the engine alive
    pub fn downgrade(&self) -> WeakEngine {
        WeakEngine {
            core: Arc::downgrade(&self.core),
        }
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Evaluate a classic script and return its completion value
    pub fn evaluate(&self, code: &str) -> ScriptResult<HostValue> {
        let document = self.core.next_document();
        self.evaluate_document(document, code)
    }

    /// Evaluate a classic script under an explicit document
    pub fn evaluate_document(&self, document: DocumentInfo, code: &str) -> ScriptResult<HostValue> {
        if document.is_module() {
            let specifier = document.specifier.clone().unwrap_or_else(|| document.name.clone());
            return self.evaluate_module(&specifier, code);
        }
        let value = self.core.run_document(document, code)?;
        Ok(self.core.to_host_value(&value))
    }

    /// Evaluate a classic script, keeping the script-side result
    pub fn evaluate_script(&self, code: &str) -> ScriptResult<ScriptValue> {
        let document = self.core.next_document();
        self.core.run_document(document, code)
    }

    /// Run a classic script for its side effects
    pub fn execute(&self, code: &str) -> ScriptResult<()> {
        self.evaluate_script(code).map(|_| ())
    }

    /// Evaluate module source under `specifier`. A module already recorded
    /// yields `undefined` without running again.
    pub fn evaluate_module(&self, specifier: &str, code: &str) -> ScriptResult<HostValue> {
        let normalized = match self.core.loader.read().clone() {
            Some(loader) => loader.normalize(specifier, None)?,
            None => crate::module::normalize_path(specifier, None),
        };
        let value = self.core.evaluate_module_source(&normalized, code)?;
        Ok(self.core.to_host_value(&value))
    }

    /// Import a module through the configured loader
    pub fn import(&self, specifier: &str) -> ScriptResult<HostValue> {
        let value = self.core.import_module(specifier, None)?;
        Ok(self.core.to_host_value(&value))
    }

    /// Call the global function `name`
    pub fn invoke(&self, name: &str, args: &[HostValue]) -> ScriptResult<HostValue> {
        let core = &self.core;
        let result = core.run_frame(FrameKind::Script, || {
            let callee = core
                .globals
                .read()
                .get(name)
                .cloned()
                .ok_or_else(|| ScriptError::MissingMember(name.to_string()))?;
            let args = args
                .iter()
                .map(|arg| core.to_script(arg.clone(), &TypeRef::Object))
                .collect::<ScriptResult<Vec<_>>>()?;
            core.call_value(&callee, &args)
        })?;
        Ok(core.to_host_value(&result))
    }

    /// Run `f` against a scope of this engine in a top-level frame
    pub fn with_scope<R>(&self, f: impl FnOnce(&ScriptScope) -> ScriptResult<R>) -> ScriptResult<R> {
        let core = self.core.arc()?;
        let document = Arc::new(self.core.next_document());
        self.core
            .run_frame(FrameKind::Script, || f(&ScriptScope::new(core, document)))
    }

    // ========================================================================
    // Host items
    // ========================================================================

    /// Expose a host value as global `name`
    pub fn add_host_object(&self, name: &str, flags: HostItemFlags, value: HostValue) -> ScriptResult<()> {
        let core = &self.core;
        let item = match value {
            HostValue::Type(ty) => core.cache.type_handle(&ty, flags)?,
            value if value.is_value_like() => core.value_proxy(value, flags)?,
            value => {
                let declared = value.type_ref();
                core.reference_proxy(&value, &declared, flags)?
            }
        };
        self.register(name, flags, item);
        Ok(())
    }

    /// Expose a host type as global `name`
    pub fn add_host_type(&self, name: &str, flags: HostItemFlags, ty: TypeRef) -> ScriptResult<()> {
        if self.core.is_disposed() {
            return Err(ScriptError::ObjectDisposed(format!("engine '{}' has been disposed", self.core.name)));
        }
        let item = self.core.cache.type_handle(&ty, flags)?;
        self.register(name, flags, item);
        Ok(())
    }

    /// Expose the script helper functions as global `name`
    pub fn add_host_functions(&self, name: &str) -> ScriptResult<()> {
        self.add_host_type(name, HostItemFlags::NONE, TypeRef::named(&HOST_FUNCTIONS))
    }

    fn register(&self, name: &str, flags: HostItemFlags, item: Arc<HostItem>) {
        if flags.contains(HostItemFlags::GLOBAL_MEMBERS) {
            self.core.global_members.write().push(Arc::clone(&item));
        }
        tracing::trace!(engine = self.core.id, global = name, ?item, "added host item");
        self.core
            .globals
            .write()
            .insert(name.to_string(), ScriptValue::HostObject(item));
    }

    /// Set a script global
    pub fn set_global(&self, name: &str, value: ScriptValue) -> ScriptResult<()> {
        let value = self.core.adopt(value)?;
        self.core.globals.write().insert(name.to_string(), value);
        Ok(())
    }

    /// Host value of global `name`
    pub fn global(&self, name: &str) -> Option<HostValue> {
        let value = self.core.globals.read().get(name).cloned()?;
        Some(self.core.to_host_value(&value))
    }

    /// Script value of global `name`
    pub fn script_global(&self, name: &str) -> Option<ScriptValue> {
        self.core.globals.read().get(name).cloned()
    }

    /// Marshal a host value to script
    pub fn to_script(&self, value: HostValue, declared: &TypeRef) -> ScriptResult<ScriptValue> {
        self.core.to_script(value, declared)
    }

    /// Convert a script value to `target`
    pub fn to_host(&self, value: &ScriptValue, target: &TypeRef) -> ScriptResult<HostValue> {
        Ok(self.core.to_host(value, target)?.value)
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Install the module loader
    pub fn set_module_loader(&self, loader: Arc<dyn ModuleLoader>) {
        *self.core.loader.write() = Some(loader);
    }

    /// Change the access applied to unannotated members. Takes effect on the
    /// next member access.
    pub fn set_default_access(&self, access: ScriptAccess) {
        self.core.policy.set_default_access(access);
    }

    /// Change the type whose private members script may reach
    pub fn set_access_context(&self, ty: Option<Arc<HostType>>) {
        self.core.policy.set_access_context(ty);
    }

    // ========================================================================
    // Control
    // ========================================================================

    /// Interrupt the running call. Returns false when nothing is running.
    pub fn interrupt(&self) -> bool {
        let requested = self.core.session.request_interrupt();
        if requested {
            tracing::debug!(engine = self.core.id, "interrupt requested");
        }
        requested
    }

    /// Handle for interrupting from another thread
    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            core: Arc::downgrade(&self.core),
        }
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.core.session.state()
    }

    /// Terminal state of the last top-level call
    pub fn last_outcome(&self) -> SessionState {
        self.core.session.outcome()
    }

    /// Sweep released proxies and collect script garbage. While a call is in
    /// progress the collection is deferred to the end of the top-level call
    /// and `None` is returned.
    pub fn collect_garbage(&self, exhaustive: bool) -> Option<SweepStats> {
        let core = &self.core;
        let stats = core.session.with_idle(|| {
            core.backend.collect_garbage(exhaustive);
            core.sweep()
        });
        if stats.is_none() {
            tracing::trace!(engine = core.id, "deferred garbage collection");
            core.session.defer_gc();
        }
        stats
    }

    /// Invalidate every proxy and release globals and module records.
    /// Idempotent.
    pub fn dispose(&self) {
        self.core.dispose();
    }

    /// Has the engine been disposed?
    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }

    /// Live entries in the proxy cache
    pub fn cached_proxies(&self) -> usize {
        self.core.cache.len()
    }

    /// Proxy roots held by the engine
    pub fn proxy_roots(&self) -> usize {
        self.core.cache.root_count()
    }

    /// Recorded modules
    pub fn module_count(&self) -> usize {
        self.core.modules.len()
    }

    /// Has the module `specifier` finished evaluating?
    pub fn is_module_evaluated(&self, specifier: &str) -> bool {
        self.core
            .modules
            .get(specifier)
            .map(|record| record.is_evaluated())
            .unwrap_or(false)
    }

    /// Heap counters shared with the runtime
    pub fn heap_info(&self) -> HeapInfo {
        self.core.heap.snapshot()
    }

    /// Script-side heap size reported by the backend
    pub fn script_heap_size(&self) -> usize {
        self.core.backend.heap_size()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Engine({} #{})", self.core.name, self.core.id)
    }
}

/// Non-owning engine handle
#[derive(Clone)]
pub struct WeakEngine {
    core: Weak<EngineCore>,
}

impl WeakEngine {
    /// The engine, if it is still alive
    pub fn upgrade(&self) -> Option<Engine> {
        self.core.upgrade().map(Engine::from_core)
    }
}

impl fmt::Debug for WeakEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakEngine")
    }
}

/// Cross-thread interrupt trigger. Does not keep the engine alive.
#[derive(Clone)]
pub struct InterruptHandle {
    core: Weak<EngineCore>,
}

impl InterruptHandle {
    /// Interrupt the running call, if any
    pub fn interrupt(&self) -> bool {
        match self.core.upgrade() {
            Some(core) => core.session.request_interrupt(),
            None => false,
        }
    }

    /// Is the engine currently running a call?
    pub fn is_running(&self) -> bool {
        self.core
            .upgrade()
            .map(|core| core.session.state() == SessionState::Running)
            .unwrap_or(false)
    }
}

impl fmt::Debug for InterruptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("InterruptHandle")
    }
}
