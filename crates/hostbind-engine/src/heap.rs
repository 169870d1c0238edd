//! Runtime-wide heap accounting
//!
//! Engines created on the same runtime share one [`HeapCounters`]. Counters
//! track live managed objects (proxies, script functions, module records) and
//! live engines; `max_heap_size` bounds the object count.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Snapshot of the heap counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeapInfo {
    /// Live host item proxies
    pub live_proxies: usize,
    /// Live script functions
    pub live_functions: usize,
    /// Live module records
    pub live_modules: usize,
    /// Live (not yet disposed) engines
    pub live_engines: usize,
}

impl HeapInfo {
    /// Managed objects counted against `max_heap_size`
    pub fn used(&self) -> usize {
        self.live_proxies + self.live_functions + self.live_modules
    }
}

/// Shared atomic counters
#[derive(Debug, Default)]
pub struct HeapCounters {
    proxies: AtomicUsize,
    functions: AtomicUsize,
    modules: AtomicUsize,
    engines: AtomicUsize,
    max_heap_size: Option<usize>,
}

impl HeapCounters {
    /// Counters with an optional object limit
    pub fn new(max_heap_size: Option<usize>) -> Self {
        Self {
            max_heap_size,
            ..Self::default()
        }
    }

    /// Configured limit
    pub fn max_heap_size(&self) -> Option<usize> {
        self.max_heap_size
    }

    pub(crate) fn proxy_created(&self) {
        self.proxies.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn proxy_released(&self) {
        self.proxies.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn function_created(&self) {
        self.functions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn function_released(&self) {
        self.functions.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn module_created(&self) {
        self.modules.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn module_released(&self) {
        self.modules.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn engine_created(&self) {
        self.engines.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn engine_released(&self) {
        self.engines.fetch_sub(1, Ordering::Relaxed);
    }

    /// Current counts
    pub fn snapshot(&self) -> HeapInfo {
        HeapInfo {
            live_proxies: self.proxies.load(Ordering::Relaxed),
            live_functions: self.functions.load(Ordering::Relaxed),
            live_modules: self.modules.load(Ordering::Relaxed),
            live_engines: self.engines.load(Ordering::Relaxed),
        }
    }

    /// Is the object count above the limit?
    pub fn is_over_limit(&self) -> bool {
        match self.max_heap_size {
            Some(limit) => self.snapshot().used() > limit,
            None => false,
        }
    }
}
