//! Delegates and events
//!
//! A [`HostDelegate`] is a callable with a host signature. Its target is either
//! native Rust code or a script function; the latter reports a
//! [`ScriptHandle`] so the engine can hand the original function back to
//! script instead of wrapping it twice.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::{HostError, HostResult};
use crate::member::ParamInfo;
use crate::object::ObjectId;
use crate::types::{HostType, TypeRef};
use crate::value::{HostValue, ScriptHandle};

/// Parameter list and return type of a delegate type
#[derive(Debug, Clone)]
pub struct DelegateSignature {
    /// Parameters; `Ref`/`Out` parameters are written back through the argument slice
    pub params: Vec<ParamInfo>,
    /// Return type
    pub ret: TypeRef,
}

impl DelegateSignature {
    /// Signature with `params` returning `ret`
    pub fn new(params: Vec<ParamInfo>, ret: TypeRef) -> Self {
        DelegateSignature { params, ret }
    }
}

/// Something a delegate can call
pub trait DelegateTarget: Send + Sync {
    /// Invoke with arguments already converted to the signature's parameter types
    fn invoke(&self, args: &mut [HostValue]) -> HostResult<HostValue>;

    /// Script function behind this target, if any
    fn script_handle(&self) -> Option<&ScriptHandle> {
        None
    }
}

struct FnTarget<F>(F);

impl<F> DelegateTarget for FnTarget<F>
where
    F: Fn(&mut [HostValue]) -> HostResult<HostValue> + Send + Sync,
{
    fn invoke(&self, args: &mut [HostValue]) -> HostResult<HostValue> {
        (self.0)(args)
    }
}

struct DelegateInner {
    id: ObjectId,
    ty: Arc<HostType>,
    target: Arc<dyn DelegateTarget>,
}

/// Callable with a host signature
#[derive(Clone)]
pub struct HostDelegate(Arc<DelegateInner>);

impl HostDelegate {
    /// Delegate of type `ty` calling `target`
    pub fn new(ty: &Arc<HostType>, target: Arc<dyn DelegateTarget>) -> HostResult<Self> {
        if !ty.is_delegate() {
            return Err(HostError::TypeMismatch {
                expected: "delegate type".to_string(),
                got: ty.name().to_string(),
            });
        }
        Ok(HostDelegate(Arc::new(DelegateInner {
            id: ObjectId::next(),
            ty: Arc::clone(ty),
            target,
        })))
    }

    /// Delegate of type `ty` calling a Rust closure
    pub fn from_fn<F>(ty: &Arc<HostType>, f: F) -> HostResult<Self>
    where
        F: Fn(&mut [HostValue]) -> HostResult<HostValue> + Send + Sync + 'static,
    {
        Self::new(ty, Arc::new(FnTarget(f)))
    }

    /// Identity
    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    /// Delegate type
    pub fn ty(&self) -> &Arc<HostType> {
        &self.0.ty
    }

    /// Signature of the delegate type
    pub fn signature(&self) -> Option<&Arc<DelegateSignature>> {
        self.0.ty.delegate_signature()
    }

    /// Call target
    pub fn target(&self) -> &Arc<dyn DelegateTarget> {
        &self.0.target
    }

    /// Script function behind the delegate, if any
    pub fn script_handle(&self) -> Option<&ScriptHandle> {
        self.0.target.script_handle()
    }

    /// Invoke the delegate
    pub fn invoke(&self, args: &mut [HostValue]) -> HostResult<HostValue> {
        self.0.target.invoke(args)
    }

    /// Weak handle
    pub fn downgrade(&self) -> WeakHostDelegate {
        WeakHostDelegate(Arc::downgrade(&self.0))
    }

    /// Same delegate?
    pub fn ptr_eq(&self, other: &HostDelegate) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for HostDelegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostDelegate({}{})", self.0.ty.name(), self.0.id)
    }
}

/// Weak handle to a [`HostDelegate`]
#[derive(Clone)]
pub struct WeakHostDelegate(Weak<DelegateInner>);

impl WeakHostDelegate {
    /// Upgrade if the delegate is alive
    pub fn upgrade(&self) -> Option<HostDelegate> {
        self.0.upgrade().map(HostDelegate)
    }
}

// ============================================================================
// Events
// ============================================================================

/// Handler list backing an event member
#[derive(Default)]
pub struct HostEvent {
    handlers: Mutex<Vec<HostDelegate>>,
}

impl HostEvent {
    /// Empty handler list
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler
    pub fn add(&self, handler: &HostDelegate) {
        self.handlers.lock().push(handler.clone());
    }

    /// Remove the first registration of `handler`
    pub fn remove(&self, handler: &HostDelegate) {
        let mut handlers = self.handlers.lock();
        if let Some(pos) = handlers.iter().position(|h| h.ptr_eq(handler)) {
            handlers.remove(pos);
        }
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    /// No handlers registered?
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call every handler in registration order; stops at the first error
    pub fn fire(&self, args: &[HostValue]) -> HostResult<()> {
        let handlers = self.handlers.lock().clone();
        for handler in handlers {
            let mut call_args = args.to_vec();
            handler.invoke(&mut call_args)?;
        }
        Ok(())
    }
}
