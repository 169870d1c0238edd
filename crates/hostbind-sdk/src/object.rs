//! Reference-typed host values: objects, arrays and argument cells

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::dynamic::DynamicObject;
use crate::error::{HostError, HostResult};
use crate::types::{HostType, TypeRef};
use crate::value::HostValue;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a reference-typed host value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Allocate a fresh identity
    pub fn next() -> Self {
        ObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// HostObject
// ============================================================================

struct ObjectInner {
    id: ObjectId,
    ty: Arc<HostType>,
    state: RwLock<Box<dyn Any + Send + Sync>>,
    dynamic: Option<Arc<dyn DynamicObject>>,
}

/// Instance of a registered class.
///
/// The Rust state is stored type-erased; member closures reach it through
/// [`HostObject::with`] / [`HostObject::with_mut`].
#[derive(Clone)]
pub struct HostObject(Arc<ObjectInner>);

impl HostObject {
    /// Wrap `state` as an instance of `ty`
    pub fn new<T: Any + Send + Sync>(ty: &Arc<HostType>, state: T) -> Self {
        HostObject(Arc::new(ObjectInner {
            id: ObjectId::next(),
            ty: Arc::clone(ty),
            state: RwLock::new(Box::new(state)),
            dynamic: None,
        }))
    }

    /// Instance that also answers the dynamic-dispatch protocol
    pub fn with_dynamic<T: Any + Send + Sync>(
        ty: &Arc<HostType>,
        state: T,
        dynamic: Arc<dyn DynamicObject>,
    ) -> Self {
        HostObject(Arc::new(ObjectInner {
            id: ObjectId::next(),
            ty: Arc::clone(ty),
            state: RwLock::new(Box::new(state)),
            dynamic: Some(dynamic),
        }))
    }

    /// Identity
    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    /// Runtime type
    pub fn ty(&self) -> &Arc<HostType> {
        &self.0.ty
    }

    /// Dynamic-dispatch capability, if any
    pub fn dynamic(&self) -> Option<&Arc<dyn DynamicObject>> {
        self.0.dynamic.as_ref()
    }

    /// Borrow the state as `T`
    pub fn with<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> HostResult<R> {
        let guard = self.0.state.read();
        match (**guard).downcast_ref::<T>() {
            Some(state) => Ok(f(state)),
            None => Err(self.state_mismatch::<T>()),
        }
    }

    /// Mutably borrow the state as `T`
    pub fn with_mut<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> HostResult<R> {
        let mut guard = self.0.state.write();
        match (**guard).downcast_mut::<T>() {
            Some(state) => Ok(f(state)),
            None => Err(self.state_mismatch::<T>()),
        }
    }

    fn state_mismatch<T>(&self) -> HostError {
        HostError::TypeMismatch {
            expected: std::any::type_name::<T>().to_string(),
            got: self.0.ty.name().to_string(),
        }
    }

    /// Weak handle
    pub fn downgrade(&self) -> WeakHostObject {
        WeakHostObject(Arc::downgrade(&self.0))
    }

    /// Same instance?
    pub fn ptr_eq(&self, other: &HostObject) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Number of strong handles
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostObject({}{})", self.0.ty.name(), self.0.id)
    }
}

/// Weak handle to a [`HostObject`]
#[derive(Clone)]
pub struct WeakHostObject(Weak<ObjectInner>);

impl WeakHostObject {
    /// Upgrade if the object is alive
    pub fn upgrade(&self) -> Option<HostObject> {
        self.0.upgrade().map(HostObject)
    }
}

// ============================================================================
// HostArray
// ============================================================================

struct ArrayInner {
    id: ObjectId,
    element: TypeRef,
    items: RwLock<Vec<HostValue>>,
}

/// Fixed-length host array with a declared element type
#[derive(Clone)]
pub struct HostArray(Arc<ArrayInner>);

impl HostArray {
    /// Largest length `with_length` accepts
    pub const MAX_LENGTH: usize = i32::MAX as usize;

    /// Array of `items`
    pub fn new(element: TypeRef, items: Vec<HostValue>) -> Self {
        HostArray(Arc::new(ArrayInner {
            id: ObjectId::next(),
            element,
            items: RwLock::new(items),
        }))
    }

    /// Array of `length` default elements; fails with a range error when
    /// `length` exceeds [`HostArray::MAX_LENGTH`] or cannot be allocated
    pub fn with_length(element: TypeRef, length: usize) -> HostResult<Self> {
        if length > Self::MAX_LENGTH {
            return Err(HostError::Range(format!("array length {} exceeds {}", length, Self::MAX_LENGTH)));
        }
        let mut items = Vec::new();
        items
            .try_reserve_exact(length)
            .map_err(|_| HostError::Range(format!("cannot allocate an array of length {}", length)))?;
        items.resize(length, HostValue::default_for(&element));
        Ok(Self::new(element, items))
    }

    /// Identity
    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    /// Element type
    pub fn element(&self) -> &TypeRef {
        &self.0.element
    }

    /// Length
    pub fn len(&self) -> usize {
        self.0.items.read().len()
    }

    /// Is the array empty?
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index`
    pub fn get(&self, index: usize) -> HostResult<HostValue> {
        let items = self.0.items.read();
        items.get(index).cloned().ok_or_else(|| {
            HostError::Range(format!("index {} outside array of length {}", index, items.len()))
        })
    }

    /// Replace the element at `index`
    pub fn set(&self, index: usize, value: HostValue) -> HostResult<()> {
        let mut items = self.0.items.write();
        let len = items.len();
        match items.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(HostError::Range(format!(
                "index {} outside array of length {}",
                index, len
            ))),
        }
    }

    /// Copy of the elements
    pub fn to_vec(&self) -> Vec<HostValue> {
        self.0.items.read().clone()
    }

    /// Weak handle
    pub fn downgrade(&self) -> WeakHostArray {
        WeakHostArray(Arc::downgrade(&self.0))
    }

    /// Same array?
    pub fn ptr_eq(&self, other: &HostArray) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for HostArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostArray({}[{}]{})", self.0.element, self.len(), self.0.id)
    }
}

/// Weak handle to a [`HostArray`]
#[derive(Clone)]
pub struct WeakHostArray(Weak<ArrayInner>);

impl WeakHostArray {
    /// Upgrade if the array is alive
    pub fn upgrade(&self) -> Option<HostArray> {
        self.0.upgrade().map(HostArray)
    }
}

// ============================================================================
// HostVariable
// ============================================================================

struct VariableInner {
    id: ObjectId,
    ty: TypeRef,
    value: RwLock<HostValue>,
}

/// Boxed cell used to pass by-ref and out arguments from script
#[derive(Clone)]
pub struct HostVariable(Arc<VariableInner>);

impl HostVariable {
    /// Cell of type `ty` holding `value`
    pub fn new(ty: TypeRef, value: HostValue) -> Self {
        HostVariable(Arc::new(VariableInner {
            id: ObjectId::next(),
            ty,
            value: RwLock::new(value),
        }))
    }

    /// Identity
    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    /// Declared value type
    pub fn ty(&self) -> &TypeRef {
        &self.0.ty
    }

    /// Current value
    pub fn get(&self) -> HostValue {
        self.0.value.read().clone()
    }

    /// Replace the value
    pub fn set(&self, value: HostValue) {
        *self.0.value.write() = value;
    }

    /// Weak handle
    pub fn downgrade(&self) -> WeakHostVariable {
        WeakHostVariable(Arc::downgrade(&self.0))
    }

    /// Same cell?
    pub fn ptr_eq(&self, other: &HostVariable) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for HostVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostVariable<{}>({:?})", self.0.ty, self.get())
    }
}

/// Weak handle to a [`HostVariable`]
#[derive(Clone)]
pub struct WeakHostVariable(Weak<VariableInner>);

impl WeakHostVariable {
    /// Upgrade if the cell is alive
    pub fn upgrade(&self) -> Option<HostVariable> {
        self.0.upgrade().map(HostVariable)
    }
}
