//! Runtime: engine factory and runtime-wide heap accounting
//!
//! Engines created by one [`Runtime`] share its heap counters and its
//! `max_heap_size`. The runtime tracks its engines weakly; dropping every
//! handle of an engine releases it even while the runtime lives.

use std::sync::Arc;

use hostbind_engine::{Engine, EngineOptions, HeapCounters, HeapInfo, ScriptBackend, SweepStats, WeakEngine};
use parking_lot::Mutex;

use crate::config::{RuntimeConfig, RuntimeOptions};
use crate::engine::ScriptEngine;

/// Totals of a runtime-wide collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectStats {
    /// Engines swept now
    pub swept: usize,
    /// Busy engines whose collection was deferred
    pub deferred: usize,
    /// Proxy roots released
    pub released: usize,
}

impl CollectStats {
    fn add(&mut self, stats: Option<SweepStats>) {
        match stats {
            Some(stats) => {
                self.swept += 1;
                self.released += stats.released;
            }
            None => self.deferred += 1,
        }
    }
}

/// Owner of the engines sharing one heap
pub struct Runtime {
    options: RuntimeOptions,
    engine_defaults: EngineOptions,
    heap: Arc<HeapCounters>,
    engines: Mutex<Vec<WeakEngine>>,
}

impl Runtime {
    /// Runtime with default configuration
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Runtime from parsed configuration
    pub fn with_config(config: RuntimeConfig) -> Self {
        tracing::debug!(max_heap_size = ?config.runtime.max_heap_size, "created runtime");
        Runtime {
            heap: Arc::new(HeapCounters::new(config.runtime.max_heap_size)),
            options: config.runtime,
            engine_defaults: config.engine,
            engines: Mutex::new(Vec::new()),
        }
    }

    /// Runtime-wide options
    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    /// Options new engines start from
    pub fn engine_defaults(&self) -> &EngineOptions {
        &self.engine_defaults
    }

    /// Create an engine with the runtime's engine defaults
    pub fn create_engine(&self, name: &str, backend: Arc<dyn ScriptBackend>) -> ScriptEngine {
        self.create_engine_with(name, self.engine_defaults.clone(), backend)
    }

    /// Create an engine with explicit options
    pub fn create_engine_with(
        &self,
        name: &str,
        options: EngineOptions,
        backend: Arc<dyn ScriptBackend>,
    ) -> ScriptEngine {
        let engine = Engine::new(name, options, backend, Arc::clone(&self.heap));
        let mut engines = self.engines.lock();
        engines.retain(|weak| weak.upgrade().is_some());
        engines.push(engine.downgrade());
        ScriptEngine::from_engine(engine)
    }

    /// Live engines
    pub fn engines(&self) -> Vec<ScriptEngine> {
        let mut engines = self.engines.lock();
        engines.retain(|weak| weak.upgrade().is_some());
        engines
            .iter()
            .filter_map(WeakEngine::upgrade)
            .filter(|engine| !engine.is_disposed())
            .map(ScriptEngine::from_engine)
            .collect()
    }

    /// Collect on every live engine. Busy engines defer to the end of their
    /// current call.
    pub fn collect_garbage(&self, exhaustive: bool) -> CollectStats {
        let mut stats = CollectStats::default();
        for engine in self.engines() {
            stats.add(engine.collect_garbage(exhaustive));
        }
        tracing::debug!(swept = stats.swept, deferred = stats.deferred, released = stats.released, "runtime collection");
        stats
    }

    /// Heap counters
    pub fn heap_info(&self) -> HeapInfo {
        self.heap.snapshot()
    }

    /// Is the runtime above its heap limit?
    pub fn is_over_limit(&self) -> bool {
        self.heap.is_over_limit()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("options", &self.options)
            .field("heap", &self.heap.snapshot())
            .finish()
    }
}
