//! Module records
//!
//! Modules are loaded through a pluggable [`ModuleLoader`] and cached per
//! engine by normalized specifier. A module body runs at most once: importing
//! it again (including a cyclic import while it is still evaluating) yields
//! `undefined`. A module whose first evaluation fails is evicted, so a later
//! import retries it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::backend::{CompiledScript, DocumentInfo};
use crate::engine::EngineCore;
use crate::error::{ScriptError, ScriptFault, ScriptResult};
use crate::heap::HeapCounters;
use crate::scope::ScriptScope;
use crate::session::FrameKind;
use crate::value::ScriptValue;

// ============================================================================
// Loaders
// ============================================================================

/// Resolves and fetches module source
pub trait ModuleLoader: Send + Sync {
    /// Normalize `specifier` relative to the importing document
    fn normalize(&self, specifier: &str, referrer: Option<&DocumentInfo>) -> ScriptResult<String> {
        let base = referrer.and_then(|doc| doc.specifier.as_deref());
        Ok(normalize_path(specifier, base))
    }

    /// Source text of a normalized specifier
    fn load(&self, specifier: &str) -> ScriptResult<String>;
}

/// Resolve `specifier` against the directory of `referrer`.
///
/// Relative specifiers (`./`, `../`) are joined to the referrer's directory;
/// `.` and `..` segments are folded. Bare specifiers are only folded.
pub fn normalize_path(specifier: &str, referrer: Option<&str>) -> String {
    let relative = specifier.starts_with("./") || specifier.starts_with("../");
    let mut segments: Vec<&str> = Vec::new();
    if relative {
        if let Some(base) = referrer {
            segments.extend(base.split('/'));
            segments.pop();
        }
    }
    for part in specifier.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.retain(|s| !s.is_empty());
    segments.join("/")
}

/// In-memory module sources
#[derive(Default)]
pub struct MemoryLoader {
    sources: RwLock<FxHashMap<String, String>>,
}

impl MemoryLoader {
    /// Empty loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module, builder style
    pub fn with_module(self, specifier: impl AsRef<str>, code: impl Into<String>) -> Self {
        self.insert(specifier, code);
        self
    }

    /// Add or replace a module
    pub fn insert(&self, specifier: impl AsRef<str>, code: impl Into<String>) {
        let key = normalize_path(specifier.as_ref(), None);
        self.sources.write().insert(key, code.into());
    }

    /// Number of modules
    pub fn len(&self) -> usize {
        self.sources.read().len()
    }

    /// Is the loader empty?
    pub fn is_empty(&self) -> bool {
        self.sources.read().is_empty()
    }
}

impl ModuleLoader for MemoryLoader {
    fn load(&self, specifier: &str) -> ScriptResult<String> {
        self.sources.read().get(specifier).cloned().ok_or_else(|| {
            ScriptError::Script(ScriptFault::new(format!("Cannot find module '{}'", specifier)))
        })
    }
}

// ============================================================================
// Records
// ============================================================================

/// A compiled module and whether its body has completed
pub(crate) struct ModuleRecord {
    document: Arc<DocumentInfo>,
    script: Arc<dyn CompiledScript>,
    evaluated: AtomicBool,
    heap: Arc<HeapCounters>,
}

impl ModuleRecord {
    fn new(document: Arc<DocumentInfo>, script: Arc<dyn CompiledScript>, heap: Arc<HeapCounters>) -> Arc<Self> {
        heap.module_created();
        Arc::new(ModuleRecord {
            document,
            script,
            evaluated: AtomicBool::new(false),
            heap,
        })
    }

    pub(crate) fn is_evaluated(&self) -> bool {
        self.evaluated.load(Ordering::Acquire)
    }
}

impl Drop for ModuleRecord {
    fn drop(&mut self) {
        self.heap.module_released();
    }
}

/// Per-engine module records keyed by normalized specifier
#[derive(Default)]
pub(crate) struct ModuleCache {
    records: Mutex<FxHashMap<String, Arc<ModuleRecord>>>,
}

impl ModuleCache {
    pub(crate) fn get(&self, specifier: &str) -> Option<Arc<ModuleRecord>> {
        self.records.lock().get(specifier).cloned()
    }

    /// Insert unless present; returns false when another record won
    fn insert(&self, specifier: &str, record: Arc<ModuleRecord>) -> bool {
        let mut records = self.records.lock();
        if records.contains_key(specifier) {
            return false;
        }
        records.insert(specifier.to_string(), record);
        true
    }

    fn remove(&self, specifier: &str) {
        // Dropped outside the lock
        let removed = self.records.lock().remove(specifier);
        drop(removed);
    }

    pub(crate) fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub(crate) fn clear(&self) {
        let records = std::mem::take(&mut *self.records.lock());
        drop(records);
    }
}

// ============================================================================
// Evaluation
// ============================================================================

impl EngineCore {
    /// Import `specifier` through the engine's loader
    pub(crate) fn import_module(
        &self,
        specifier: &str,
        referrer: Option<&DocumentInfo>,
    ) -> ScriptResult<ScriptValue> {
        let loader = self
            .loader
            .read()
            .clone()
            .ok_or_else(|| ScriptError::NotSupported("no module loader is configured".to_string()))?;
        let normalized = loader.normalize(specifier, referrer)?;
        if self.modules.get(&normalized).is_some() {
            return Ok(ScriptValue::Undefined);
        }
        let code = loader.load(&normalized)?;
        self.evaluate_module_source(&normalized, &code)
    }

    /// Compile and run a module unless it is already recorded
    pub(crate) fn evaluate_module_source(&self, specifier: &str, code: &str) -> ScriptResult<ScriptValue> {
        if self.modules.get(specifier).is_some() {
            return Ok(ScriptValue::Undefined);
        }
        let core = self.arc()?;
        let document = Arc::new(DocumentInfo::module(specifier));
        let script = self.backend.compile(&document, code)?;
        let record = ModuleRecord::new(Arc::clone(&document), script, Arc::clone(&self.heap));
        if !self.modules.insert(specifier, Arc::clone(&record)) {
            return Ok(ScriptValue::Undefined);
        }
        tracing::debug!(engine = self.id, module = specifier, "evaluating module");

        let result = self.run_frame(FrameKind::Script, || {
            let scope = ScriptScope::new(core, Arc::clone(&record.document));
            record.script.run(&scope)
        });
        match result {
            Ok(value) => {
                record.evaluated.store(true, Ordering::Release);
                Ok(value)
            }
            Err(err) => {
                tracing::debug!(engine = self.id, module = specifier, error = %err, "module evaluation failed");
                self.modules.remove(specifier);
                Err(err)
            }
        }
    }
}
