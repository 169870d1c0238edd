//! Script-side values
//!
//! [`ScriptValue`] is what script code manipulates. Primitive values are held
//! inline; host values appear as proxies ([`HostItem`]) or bound members
//! ([`BoundMember`]); binary buffers are shared with the host as-is.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use hostbind_sdk::{ArrayBuffer, BufferView, TypeRef};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::backend::DocumentInfo;
use crate::binder::BoundMember;
use crate::engine::EngineCore;
use crate::error::{ScriptError, ScriptResult};
use crate::heap::HeapCounters;
use crate::lifetime::{HostItem, HostTarget};
use crate::scope::ScriptScope;

// ============================================================================
// Script functions
// ============================================================================

/// Body of a script function
pub trait ScriptCallable: Send + Sync {
    /// Run with `args` in `scope`
    fn call(&self, scope: &ScriptScope, args: &[ScriptValue]) -> ScriptResult<ScriptValue>;
}

impl<F> ScriptCallable for F
where
    F: Fn(&ScriptScope, &[ScriptValue]) -> ScriptResult<ScriptValue> + Send + Sync,
{
    fn call(&self, scope: &ScriptScope, args: &[ScriptValue]) -> ScriptResult<ScriptValue> {
        self(scope, args)
    }
}

static NEXT_FUNCTION_ID: AtomicU64 = AtomicU64::new(1);

struct FunctionInner {
    id: u64,
    name: Arc<str>,
    engine_id: u64,
    engine: Weak<EngineCore>,
    document: Arc<DocumentInfo>,
    body: Arc<dyn ScriptCallable>,
    heap: Arc<HeapCounters>,
}

impl Drop for FunctionInner {
    fn drop(&mut self) {
        self.heap.function_released();
    }
}

/// A function owned by one engine. Calls always run on the owning engine.
#[derive(Clone)]
pub struct ScriptFunction(Arc<FunctionInner>);

impl ScriptFunction {
    pub(crate) fn new(
        name: &str,
        engine: &Arc<EngineCore>,
        document: Arc<DocumentInfo>,
        body: Arc<dyn ScriptCallable>,
    ) -> Self {
        let heap = Arc::clone(engine.heap());
        heap.function_created();
        ScriptFunction(Arc::new(FunctionInner {
            id: NEXT_FUNCTION_ID.fetch_add(1, Ordering::Relaxed),
            name: Arc::from(name),
            engine_id: engine.id(),
            engine: Arc::downgrade(engine),
            document,
            body,
            heap,
        }))
    }

    /// Function id
    pub fn id(&self) -> u64 {
        self.0.id
    }

    /// Function name
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Id of the owning engine
    pub fn engine_id(&self) -> u64 {
        self.0.engine_id
    }

    /// Owning engine, if still alive
    pub(crate) fn engine(&self) -> ScriptResult<Arc<EngineCore>> {
        self.0
            .engine
            .upgrade()
            .filter(|core| !core.is_disposed())
            .ok_or_else(|| {
                ScriptError::ObjectDisposed(format!("engine of function '{}' is gone", self.0.name))
            })
    }

    /// Document the function was created in
    pub fn document(&self) -> &Arc<DocumentInfo> {
        &self.0.document
    }

    pub(crate) fn body(&self) -> &Arc<dyn ScriptCallable> {
        &self.0.body
    }

    /// Same function?
    pub fn ptr_eq(&self, other: &ScriptFunction) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ScriptFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function {}#{}", self.0.name, self.0.id)
    }
}

// ============================================================================
// Script arrays and objects
// ============================================================================

/// Script array
#[derive(Clone, Default)]
pub struct ScriptArray(Arc<RwLock<Vec<ScriptValue>>>);

impl ScriptArray {
    /// Array of `items`
    pub fn new(items: Vec<ScriptValue>) -> Self {
        ScriptArray(Arc::new(RwLock::new(items)))
    }

    /// Length
    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    /// Is the array empty?
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index`; `Undefined` past the end
    pub fn get(&self, index: usize) -> ScriptValue {
        self.0.read().get(index).cloned().unwrap_or(ScriptValue::Undefined)
    }

    /// Store at `index`, growing with `Undefined` as needed
    pub fn set(&self, index: usize, value: ScriptValue) {
        let mut items = self.0.write();
        if index >= items.len() {
            items.resize(index + 1, ScriptValue::Undefined);
        }
        items[index] = value;
    }

    /// Append
    pub fn push(&self, value: ScriptValue) {
        self.0.write().push(value);
    }

    /// Copy of the elements
    pub fn to_vec(&self) -> Vec<ScriptValue> {
        self.0.read().clone()
    }

    /// Same array?
    pub fn ptr_eq(&self, other: &ScriptArray) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Script object (property bag)
#[derive(Clone, Default)]
pub struct ScriptObject(Arc<RwLock<FxHashMap<String, ScriptValue>>>);

impl ScriptObject {
    /// Empty object
    pub fn new() -> Self {
        Self::default()
    }

    /// Object with the given properties
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, ScriptValue)>,
        K: Into<String>,
    {
        let map = pairs.into_iter().map(|(k, v)| (k.into(), v)).collect();
        ScriptObject(Arc::new(RwLock::new(map)))
    }

    /// Property value; `Undefined` when absent
    pub fn get(&self, name: &str) -> ScriptValue {
        self.0.read().get(name).cloned().unwrap_or(ScriptValue::Undefined)
    }

    /// Set a property
    pub fn set(&self, name: &str, value: ScriptValue) {
        self.0.write().insert(name.to_string(), value);
    }

    /// Remove a property; true if it existed
    pub fn delete(&self, name: &str) -> bool {
        self.0.write().remove(name).is_some()
    }

    /// Does the property exist?
    pub fn has(&self, name: &str) -> bool {
        self.0.read().contains_key(name)
    }

    /// Property names, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.0.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Same object?
    pub fn ptr_eq(&self, other: &ScriptObject) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

// ============================================================================
// ScriptValue
// ============================================================================

/// A value as seen by script code
#[derive(Clone, Default)]
pub enum ScriptValue {
    /// `undefined`
    #[default]
    Undefined,
    /// `null`
    Null,
    /// Boolean
    Bool(bool),
    /// Integral number
    Int(i64),
    /// Floating-point number
    Double(f64),
    /// String
    String(Arc<str>),
    /// Date, as milliseconds since the Unix epoch
    Date(f64),
    /// Array
    Array(ScriptArray),
    /// Object
    Object(ScriptObject),
    /// Function
    Function(ScriptFunction),
    /// Binary buffer shared with the host
    ArrayBuffer(ArrayBuffer),
    /// Typed view over a shared binary buffer
    TypedArray(BufferView),
    /// Proxy for a host value
    HostObject(Arc<HostItem>),
    /// Host method, indexer or event bound to its target
    HostMember(Arc<BoundMember>),
    /// Typed host null; strictly equals `null`
    WrappedNull(TypeRef),
}

impl ScriptValue {
    /// String value
    pub fn string(s: impl AsRef<str>) -> Self {
        ScriptValue::String(Arc::from(s.as_ref()))
    }

    /// Floating-point number value
    pub fn number(n: f64) -> Self {
        ScriptValue::Double(n)
    }

    /// Is this `null`, a wrapped null or `undefined`?
    pub fn is_nullish(&self) -> bool {
        matches!(
            self,
            ScriptValue::Undefined | ScriptValue::Null | ScriptValue::WrappedNull(_)
        )
    }

    /// Is this `undefined`?
    pub fn is_undefined(&self) -> bool {
        matches!(self, ScriptValue::Undefined)
    }

    /// Numeric value of a script number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScriptValue::Int(i) => Some(*i as f64),
            ScriptValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Integral value of a script integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ScriptValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// String slice of a script string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScriptValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean value of a script boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScriptValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Proxy behind a host object value
    pub fn as_host_item(&self) -> Option<&Arc<HostItem>> {
        match self {
            ScriptValue::HostObject(item) => Some(item),
            _ => None,
        }
    }

    /// Script truthiness
    pub fn is_truthy(&self) -> bool {
        match self {
            ScriptValue::Undefined | ScriptValue::Null | ScriptValue::WrappedNull(_) => false,
            ScriptValue::Bool(b) => *b,
            ScriptValue::Int(i) => *i != 0,
            ScriptValue::Double(d) => *d != 0.0 && !d.is_nan(),
            ScriptValue::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// `typeof` result
    pub fn type_of(&self) -> &'static str {
        match self {
            ScriptValue::Undefined => "undefined",
            ScriptValue::Bool(_) => "boolean",
            ScriptValue::Int(_) | ScriptValue::Double(_) => "number",
            ScriptValue::String(_) => "string",
            ScriptValue::Function(_) | ScriptValue::HostMember(_) => "function",
            _ => "object",
        }
    }

    /// Strict equality (`===`). Value-like proxies compare by value and a
    /// wrapped null equals `null`.
    pub fn strict_equals(&self, other: &ScriptValue) -> bool {
        match (self, other) {
            (ScriptValue::Undefined, ScriptValue::Undefined) => true,
            (
                ScriptValue::Null | ScriptValue::WrappedNull(_),
                ScriptValue::Null | ScriptValue::WrappedNull(_),
            ) => true,
            (ScriptValue::Bool(a), ScriptValue::Bool(b)) => a == b,
            (a, b) if a.as_f64().is_some() && b.as_f64().is_some() => a.as_f64() == b.as_f64(),
            (ScriptValue::String(a), ScriptValue::String(b)) => a == b,
            (ScriptValue::Date(a), ScriptValue::Date(b)) => a == b,
            (ScriptValue::Array(a), ScriptValue::Array(b)) => a.ptr_eq(b),
            (ScriptValue::Object(a), ScriptValue::Object(b)) => a.ptr_eq(b),
            (ScriptValue::Function(a), ScriptValue::Function(b)) => a.ptr_eq(b),
            (ScriptValue::ArrayBuffer(a), ScriptValue::ArrayBuffer(b)) => a.ptr_eq(b),
            (ScriptValue::TypedArray(a), ScriptValue::TypedArray(b)) => a == b,
            (ScriptValue::HostObject(a), ScriptValue::HostObject(b)) => {
                if Arc::ptr_eq(a, b) {
                    return true;
                }
                match (a.host_target(), b.host_target()) {
                    (HostTarget::Value(x), HostTarget::Value(y)) => *x.read() == *y.read(),
                    _ => false,
                }
            }
            (ScriptValue::HostMember(a), ScriptValue::HostMember(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Short description used in error messages
    pub fn describe(&self) -> String {
        match self {
            ScriptValue::Undefined => "undefined".to_string(),
            ScriptValue::Null => "null".to_string(),
            ScriptValue::Bool(b) => format!("boolean {}", b),
            ScriptValue::Int(i) => format!("number {}", i),
            ScriptValue::Double(d) => format!("number {}", d),
            ScriptValue::String(s) => format!("string '{}'", s),
            ScriptValue::Date(_) => "date".to_string(),
            ScriptValue::Array(_) => "array".to_string(),
            ScriptValue::Object(_) => "object".to_string(),
            ScriptValue::Function(f) => format!("function {}", f.name()),
            ScriptValue::ArrayBuffer(_) => "ArrayBuffer".to_string(),
            ScriptValue::TypedArray(v) => v.kind().name().to_string(),
            ScriptValue::HostObject(item) => match item.target() {
                Ok(target) => format!("host {}", target.type_ref()),
                Err(_) => "disposed host object".to_string(),
            },
            ScriptValue::HostMember(m) => format!("host member {}", m.name()),
            ScriptValue::WrappedNull(ty) => format!("null {}", ty),
        }
    }
}

impl fmt::Debug for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptValue::Array(a) => write!(f, "Array(len {})", a.len()),
            ScriptValue::Object(o) => write!(f, "Object({:?})", o.keys()),
            ScriptValue::Function(func) => write!(f, "{:?}", func),
            ScriptValue::HostObject(item) => write!(f, "{:?}", item),
            other => f.write_str(&other.describe()),
        }
    }
}

impl From<bool> for ScriptValue {
    fn from(b: bool) -> Self {
        ScriptValue::Bool(b)
    }
}

impl From<i32> for ScriptValue {
    fn from(i: i32) -> Self {
        ScriptValue::Int(i as i64)
    }
}

impl From<i64> for ScriptValue {
    fn from(i: i64) -> Self {
        ScriptValue::Int(i)
    }
}

impl From<f64> for ScriptValue {
    fn from(d: f64) -> Self {
        ScriptValue::Double(d)
    }
}

impl From<&str> for ScriptValue {
    fn from(s: &str) -> Self {
        ScriptValue::string(s)
    }
}

impl From<String> for ScriptValue {
    fn from(s: String) -> Self {
        ScriptValue::String(Arc::from(s))
    }
}
