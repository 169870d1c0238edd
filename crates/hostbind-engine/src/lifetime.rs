//! Proxy lifetime management
//!
//! A [`HostItem`] is the proxy script code holds for a host value. Proxies for
//! reference targets are cached per engine by (target, requested view, flags)
//! so that marshaling the same object twice yields the same proxy while any
//! proxy for it is alive.
//!
//! ## Ownership
//!
//! - The cache holds proxies weakly.
//! - A proxy holds its reference target weakly.
//! - The engine keeps one strong *root* per live reference proxy.
//!
//! Dropping a proxy never calls into the engine: the drop pushes a release
//! ticket onto a lock-free queue. Queued roots are released when a top-level
//! call ends ([`ProxyCache::release_dropped`]) and by a full
//! [`ProxyCache::sweep`], which also prunes dead cache entries. Both run only
//! at safe points.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crossbeam::queue::SegQueue;
use hostbind_sdk::{HostType, HostValue, ObjectId, TypeKey, TypeRef, WeakHostValue};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::error::{ScriptError, ScriptResult};
use crate::heap::HeapCounters;
use crate::options::HostItemFlags;

static NEXT_PROXY_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProxyId(u64);

impl ProxyId {
    fn next() -> Self {
        ProxyId(NEXT_PROXY_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// State shared between an engine and every proxy it created
pub(crate) struct EngineToken {
    engine_id: u64,
    disposed: AtomicBool,
    released: SegQueue<ProxyId>,
    heap: Arc<HeapCounters>,
}

impl EngineToken {
    pub(crate) fn new(engine_id: u64, heap: Arc<HeapCounters>) -> Arc<Self> {
        Arc::new(Self {
            engine_id,
            disposed: AtomicBool::new(false),
            released: SegQueue::new(),
            heap,
        })
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn heap(&self) -> &Arc<HeapCounters> {
        &self.heap
    }
}

// ============================================================================
// HostItem
// ============================================================================

/// What a proxy stands for
pub enum HostTarget {
    /// Reference-typed host value, held weakly
    Reference(WeakHostValue),
    /// Value-typed host value (enum, struct, boxed scalar), held by value
    Value(Arc<RwLock<HostValue>>),
    /// Type handle; binds static members
    Type(TypeRef),
}

/// Proxy for a host value, as held by script
pub struct HostItem {
    id: ProxyId,
    target: HostTarget,
    view: Option<Arc<HostType>>,
    flags: HostItemFlags,
    token: Arc<EngineToken>,
}

impl HostItem {
    /// Proxy id
    pub fn id(&self) -> ProxyId {
        self.id
    }

    /// Id of the engine that created the proxy
    pub fn engine_id(&self) -> u64 {
        self.token.engine_id
    }

    /// Flags the proxy was created with
    pub fn flags(&self) -> HostItemFlags {
        self.flags
    }

    /// Requested static view (interface or base class); `None` binds the runtime type
    pub fn view(&self) -> Option<&Arc<HostType>> {
        self.view.as_ref()
    }

    /// Raw target
    pub fn host_target(&self) -> &HostTarget {
        &self.target
    }

    /// Is this a type proxy?
    pub fn is_type(&self) -> bool {
        matches!(self.target, HostTarget::Type(_))
    }

    /// Type handled by a type proxy
    pub fn type_ref(&self) -> Option<&TypeRef> {
        match &self.target {
            HostTarget::Type(ty) => Some(ty),
            _ => None,
        }
    }

    /// Is this a value proxy?
    pub fn is_value(&self) -> bool {
        matches!(self.target, HostTarget::Value(_))
    }

    pub(crate) fn value_cell(&self) -> Option<&Arc<RwLock<HostValue>>> {
        match &self.target {
            HostTarget::Value(cell) => Some(cell),
            _ => None,
        }
    }

    /// Has the owning engine been disposed?
    pub fn is_disposed(&self) -> bool {
        self.token.is_disposed()
    }

    /// The host value behind the proxy
    pub fn target(&self) -> ScriptResult<HostValue> {
        if self.token.is_disposed() {
            return Err(ScriptError::ObjectDisposed(format!(
                "proxy {} belongs to a disposed engine",
                self.id.0
            )));
        }
        match &self.target {
            HostTarget::Reference(weak) => weak.upgrade().ok_or_else(|| {
                ScriptError::ObjectDisposed(format!("target of proxy {} was released", self.id.0))
            }),
            HostTarget::Value(cell) => Ok(cell.read().clone()),
            HostTarget::Type(ty) => Ok(HostValue::Type(ty.clone())),
        }
    }
}

impl Drop for HostItem {
    fn drop(&mut self) {
        self.token.released.push(self.id);
        self.token.heap.proxy_released();
    }
}

impl fmt::Debug for HostItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.target {
            HostTarget::Reference(_) => "ref",
            HostTarget::Value(_) => "value",
            HostTarget::Type(_) => "type",
        };
        write!(f, "HostItem({} {} e{})", kind, self.id.0, self.token.engine_id)
    }
}

// ============================================================================
// ProxyCache
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ProxyKey {
    target: ObjectId,
    view: Option<TypeKey>,
    flags: u8,
}

#[derive(Default)]
struct CacheInner {
    references: FxHashMap<ProxyKey, Weak<HostItem>>,
    types: FxHashMap<(TypeRef, u8), Weak<HostItem>>,
    roots: FxHashMap<ProxyId, HostValue>,
}

/// Result of a sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Roots released for dropped proxies
    pub released: usize,
    /// Dead cache entries removed
    pub pruned: usize,
}

/// Engine-scoped proxy cache
pub(crate) struct ProxyCache {
    token: Arc<EngineToken>,
    inner: Mutex<CacheInner>,
}

impl ProxyCache {
    pub(crate) fn new(token: Arc<EngineToken>) -> Self {
        Self {
            token,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    fn make(&self, target: HostTarget, view: Option<Arc<HostType>>, flags: HostItemFlags) -> Arc<HostItem> {
        self.token.heap.proxy_created();
        Arc::new(HostItem {
            id: ProxyId::next(),
            target,
            view,
            flags,
            token: Arc::clone(&self.token),
        })
    }

    /// Live proxy for a reference-typed `value`, or a new one
    pub(crate) fn reference(
        &self,
        value: &HostValue,
        view: Option<Arc<HostType>>,
        flags: HostItemFlags,
    ) -> ScriptResult<Arc<HostItem>> {
        if self.token.is_disposed() {
            return Err(ScriptError::ObjectDisposed("engine has been disposed".to_string()));
        }
        let (target, weak) = match (value.identity(), value.downgrade()) {
            (Some(id), Some(weak)) => (id, weak),
            _ => {
                return Err(ScriptError::NotSupported(format!(
                    "{} is not a reference type",
                    value.type_ref()
                )))
            }
        };
        let key = ProxyKey {
            target,
            view: view.as_ref().map(|v| v.key()),
            flags: flags.identity_bits(),
        };

        let mut inner = self.inner.lock();
        if let Some(item) = inner.references.get(&key).and_then(Weak::upgrade) {
            return Ok(item);
        }
        let item = self.make(HostTarget::Reference(weak), view, flags);
        inner.references.insert(key, Arc::downgrade(&item));
        inner.roots.insert(item.id, value.clone());
        tracing::trace!(proxy = item.id.0, target = target.as_u64(), "created host item");
        Ok(item)
    }

    /// Live proxy for a type handle, or a new one
    pub(crate) fn type_handle(&self, ty: &TypeRef, flags: HostItemFlags) -> ScriptResult<Arc<HostItem>> {
        if self.token.is_disposed() {
            return Err(ScriptError::ObjectDisposed("engine has been disposed".to_string()));
        }
        let key = (ty.clone(), flags.identity_bits());
        let mut inner = self.inner.lock();
        if let Some(item) = inner.types.get(&key).and_then(Weak::upgrade) {
            return Ok(item);
        }
        let item = self.make(HostTarget::Type(ty.clone()), None, flags);
        inner.types.insert(key, Arc::downgrade(&item));
        Ok(item)
    }

    /// New proxy for a value-typed `value`. Value proxies are not cached.
    pub(crate) fn value(&self, value: HostValue, flags: HostItemFlags) -> ScriptResult<Arc<HostItem>> {
        if self.token.is_disposed() {
            return Err(ScriptError::ObjectDisposed("engine has been disposed".to_string()));
        }
        Ok(self.make(HostTarget::Value(Arc::new(RwLock::new(value))), None, flags))
    }

    /// Release roots of dropped proxies without pruning the cache. Returns
    /// the number of roots released.
    pub(crate) fn release_dropped(&self) -> usize {
        if self.token.released.is_empty() {
            return 0;
        }
        let released: Vec<_> = {
            let mut inner = self.inner.lock();
            std::iter::from_fn(|| self.token.released.pop())
                .filter_map(|id| inner.roots.remove(&id))
                .collect()
        };
        // Roots may own script values; drop them with the cache unlocked.
        let count = released.len();
        drop(released);
        count
    }

    /// Release roots of dropped proxies and prune dead entries
    pub(crate) fn sweep(&self) -> SweepStats {
        let mut stats = SweepStats {
            released: self.release_dropped(),
            ..SweepStats::default()
        };
        {
            let mut inner = self.inner.lock();
            let before = inner.references.len() + inner.types.len();
            inner.references.retain(|_, weak| weak.strong_count() > 0);
            inner.types.retain(|_, weak| weak.strong_count() > 0);
            stats.pruned = before - inner.references.len() - inner.types.len();
        }
        tracing::debug!(
            engine = self.token.engine_id,
            released = stats.released,
            pruned = stats.pruned,
            "swept proxy cache"
        );
        stats
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.token.is_disposed()
    }

    /// Invalidate every proxy and release all roots
    pub(crate) fn dispose(&self) {
        self.token.disposed.store(true, Ordering::Release);
        let inner = std::mem::take(&mut *self.inner.lock());
        while self.token.released.pop().is_some() {}
        drop(inner);
    }

    /// Number of live cache entries
    pub(crate) fn len(&self) -> usize {
        let inner = self.inner.lock();
        inner
            .references
            .values()
            .chain(inner.types.values())
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Number of held roots
    pub(crate) fn root_count(&self) -> usize {
        self.inner.lock().roots.len()
    }
}
