//! Host values
//!
//! [`HostValue`] is the strongly-typed value the host side works with. Scalar
//! variants carry their exact width so overload resolution can tell `Int16`
//! from `Int64`; reference variants share their target by `Arc`.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::buffer::{ArrayBuffer, BufferView};
use crate::delegate::{HostDelegate, WeakHostDelegate};
use crate::object::{
    HostArray, HostObject, HostVariable, ObjectId, WeakHostArray, WeakHostObject,
    WeakHostVariable,
};
use crate::types::{HostType, NumericKind, TypeKind, TypeRef};

/// Enum value: its type plus the raw underlying integer
#[derive(Clone)]
pub struct EnumValue {
    /// Enumeration type
    pub ty: Arc<HostType>,
    /// Raw underlying value
    pub raw: i128,
}

impl EnumValue {
    /// Value of `ty` with raw value `raw`
    pub fn new(ty: &Arc<HostType>, raw: i128) -> Self {
        EnumValue {
            ty: Arc::clone(ty),
            raw,
        }
    }
}

impl fmt::Debug for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ty.enum_name_of(self.raw) {
            Some(name) => write!(f, "{}.{}", self.ty.name(), name),
            None => write!(f, "{}({})", self.ty.name(), self.raw),
        }
    }
}

/// Struct value: its type plus field values in declaration order
#[derive(Clone)]
pub struct StructValue {
    /// Struct type
    pub ty: Arc<HostType>,
    /// Field values, indexed by field slot
    pub fields: Vec<HostValue>,
}

impl fmt::Debug for StructValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:?}", self.ty.name(), self.fields)
    }
}

/// Opaque script value carried through host code (e.g. as `Object`)
#[derive(Clone)]
pub struct ScriptHandle(pub Arc<dyn Any + Send + Sync>);

impl ScriptHandle {
    /// Downcast to the engine's value type
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for ScriptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ScriptHandle")
    }
}

// ============================================================================
// HostValue
// ============================================================================

/// Strongly-typed host value
#[derive(Clone, Debug)]
pub enum HostValue {
    /// Script `undefined` surfaced to the host
    Undefined,
    /// Null reference
    Null,
    /// Boolean
    Bool(bool),
    /// `SByte`
    Int8(i8),
    /// `Byte`
    UInt8(u8),
    /// `Int16`
    Int16(i16),
    /// `UInt16`
    UInt16(u16),
    /// `Int32`
    Int32(i32),
    /// `UInt32`
    UInt32(u32),
    /// `Int64`
    Int64(i64),
    /// `UInt64`
    UInt64(u64),
    /// `Single`
    Single(f32),
    /// `Double`
    Double(f64),
    /// `Decimal`
    Decimal(Decimal),
    /// Unicode scalar
    Char(char),
    /// String
    String(Arc<str>),
    /// UTC date/time
    DateTime(DateTime<Utc>),
    /// Enum value
    Enum(EnumValue),
    /// Struct value
    Struct(StructValue),
    /// Class instance
    Object(HostObject),
    /// Host array
    Array(HostArray),
    /// Binary buffer
    Buffer(ArrayBuffer),
    /// Window onto a binary buffer
    View(BufferView),
    /// Callable
    Delegate(HostDelegate),
    /// Type handle
    Type(TypeRef),
    /// Argument cell
    Variable(HostVariable),
    /// Script value passed through untouched
    Script(ScriptHandle),
}

impl HostValue {
    /// String value
    pub fn string(s: impl AsRef<str>) -> Self {
        HostValue::String(Arc::from(s.as_ref()))
    }

    /// Is this null?
    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Null)
    }

    /// Is this null or undefined?
    pub fn is_nullish(&self) -> bool {
        matches!(self, HostValue::Null | HostValue::Undefined)
    }

    /// Numeric kind of a scalar numeric value
    pub fn numeric_kind(&self) -> Option<NumericKind> {
        Some(match self {
            HostValue::Int8(_) => NumericKind::Int8,
            HostValue::UInt8(_) => NumericKind::UInt8,
            HostValue::Int16(_) => NumericKind::Int16,
            HostValue::UInt16(_) => NumericKind::UInt16,
            HostValue::Int32(_) => NumericKind::Int32,
            HostValue::UInt32(_) => NumericKind::UInt32,
            HostValue::Int64(_) => NumericKind::Int64,
            HostValue::UInt64(_) => NumericKind::UInt64,
            HostValue::Single(_) => NumericKind::Single,
            HostValue::Double(_) => NumericKind::Double,
            HostValue::Decimal(_) => NumericKind::Decimal,
            _ => return None,
        })
    }

    /// Integral value of an integral scalar or enum
    pub fn to_i128(&self) -> Option<i128> {
        Some(match self {
            HostValue::Int8(v) => *v as i128,
            HostValue::UInt8(v) => *v as i128,
            HostValue::Int16(v) => *v as i128,
            HostValue::UInt16(v) => *v as i128,
            HostValue::Int32(v) => *v as i128,
            HostValue::UInt32(v) => *v as i128,
            HostValue::Int64(v) => *v as i128,
            HostValue::UInt64(v) => *v as i128,
            HostValue::Enum(e) => e.raw,
            _ => return None,
        })
    }

    /// Floating value of any numeric scalar
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            HostValue::Single(v) => Some(*v as f64),
            HostValue::Double(v) => Some(*v),
            HostValue::Decimal(v) => v.to_f64(),
            other => other.to_i128().map(|v| v as f64),
        }
    }

    /// Checked construction of an integral scalar of `kind`
    pub fn from_i128(kind: NumericKind, value: i128) -> Option<HostValue> {
        Some(match kind {
            NumericKind::Int8 => HostValue::Int8(i8::try_from(value).ok()?),
            NumericKind::UInt8 => HostValue::UInt8(u8::try_from(value).ok()?),
            NumericKind::Int16 => HostValue::Int16(i16::try_from(value).ok()?),
            NumericKind::UInt16 => HostValue::UInt16(u16::try_from(value).ok()?),
            NumericKind::Int32 => HostValue::Int32(i32::try_from(value).ok()?),
            NumericKind::UInt32 => HostValue::UInt32(u32::try_from(value).ok()?),
            NumericKind::Int64 => HostValue::Int64(i64::try_from(value).ok()?),
            NumericKind::UInt64 => HostValue::UInt64(u64::try_from(value).ok()?),
            NumericKind::Single => HostValue::Single(value as f32),
            NumericKind::Double => HostValue::Double(value as f64),
            NumericKind::Decimal => {
                HostValue::Decimal(Decimal::try_from_i128_with_scale(value, 0).ok()?)
            }
        })
    }

    /// Identity of a reference-typed value
    pub fn identity(&self) -> Option<ObjectId> {
        match self {
            HostValue::Object(o) => Some(o.id()),
            HostValue::Array(a) => Some(a.id()),
            HostValue::Delegate(d) => Some(d.id()),
            HostValue::Variable(v) => Some(v.id()),
            HostValue::Buffer(b) => Some(b.id()),
            _ => None,
        }
    }

    /// Weak handle to a reference-typed value
    pub fn downgrade(&self) -> Option<WeakHostValue> {
        match self {
            HostValue::Object(o) => Some(WeakHostValue::Object(o.downgrade())),
            HostValue::Array(a) => Some(WeakHostValue::Array(a.downgrade())),
            HostValue::Delegate(d) => Some(WeakHostValue::Delegate(d.downgrade())),
            HostValue::Variable(v) => Some(WeakHostValue::Variable(v.downgrade())),
            _ => None,
        }
    }

    /// Runtime type of the value
    pub fn type_ref(&self) -> TypeRef {
        match self {
            HostValue::Undefined | HostValue::Null | HostValue::Script(_) => TypeRef::Object,
            HostValue::Bool(_) => TypeRef::Bool,
            HostValue::Char(_) => TypeRef::Char,
            HostValue::String(_) => TypeRef::String,
            HostValue::DateTime(_) => TypeRef::DateTime,
            HostValue::Enum(e) => TypeRef::Named(Arc::clone(&e.ty)),
            HostValue::Struct(s) => TypeRef::Named(Arc::clone(&s.ty)),
            HostValue::Object(o) => TypeRef::Named(Arc::clone(o.ty())),
            HostValue::Array(a) => TypeRef::array(a.element().clone()),
            HostValue::Buffer(_) => TypeRef::Buffer,
            HostValue::View(_) => TypeRef::View,
            HostValue::Delegate(d) => TypeRef::Named(Arc::clone(d.ty())),
            HostValue::Type(_) => TypeRef::Type,
            HostValue::Variable(v) => TypeRef::Variable(Box::new(v.ty().clone())),
            other => match other.numeric_kind() {
                Some(kind) => TypeRef::Numeric(kind),
                None => TypeRef::Object,
            },
        }
    }

    /// Is the value an instance of `ty`? Null is an instance of nothing.
    pub fn is_instance_of(&self, ty: &TypeRef) -> bool {
        if self.is_nullish() {
            return false;
        }
        match ty.underlying() {
            TypeRef::Object | TypeRef::Dynamic => true,
            TypeRef::Named(target) => match self.type_ref() {
                TypeRef::Named(actual) => actual.is_assignable_to(target),
                _ => false,
            },
            other => self.type_ref() == *other,
        }
    }

    /// Default value of `ty`: zero for scalars, default fields for structs, null otherwise
    pub fn default_for(ty: &TypeRef) -> HostValue {
        match ty {
            TypeRef::Bool => HostValue::Bool(false),
            TypeRef::Char => HostValue::Char('\0'),
            TypeRef::DateTime => HostValue::DateTime(DateTime::<Utc>::default()),
            TypeRef::Numeric(kind) => Self::zero(*kind),
            TypeRef::Named(ty) => match ty.kind() {
                TypeKind::Enum { .. } => HostValue::Enum(EnumValue::new(ty, 0)),
                TypeKind::Struct => HostValue::Struct(StructValue {
                    ty: Arc::clone(ty),
                    fields: ty
                        .struct_fields()
                        .iter()
                        .map(|f| HostValue::default_for(f.ty()))
                        .collect(),
                }),
                _ => HostValue::Null,
            },
            _ => HostValue::Null,
        }
    }

    fn zero(kind: NumericKind) -> HostValue {
        match kind {
            NumericKind::Single => HostValue::Single(0.0),
            NumericKind::Double => HostValue::Double(0.0),
            NumericKind::Decimal => HostValue::Decimal(Decimal::ZERO),
            integral => HostValue::from_i128(integral, 0).unwrap_or(HostValue::Int32(0)),
        }
    }

    /// Is this a value type (compared by value, boxed on the script side)?
    pub fn is_value_like(&self) -> bool {
        matches!(
            self,
            HostValue::Bool(_)
                | HostValue::Char(_)
                | HostValue::DateTime(_)
                | HostValue::Enum(_)
                | HostValue::Struct(_)
        ) || self.numeric_kind().is_some()
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostValue::Undefined, HostValue::Undefined) => true,
            (HostValue::Null, HostValue::Null) => true,
            (HostValue::Bool(a), HostValue::Bool(b)) => a == b,
            (HostValue::Int8(a), HostValue::Int8(b)) => a == b,
            (HostValue::UInt8(a), HostValue::UInt8(b)) => a == b,
            (HostValue::Int16(a), HostValue::Int16(b)) => a == b,
            (HostValue::UInt16(a), HostValue::UInt16(b)) => a == b,
            (HostValue::Int32(a), HostValue::Int32(b)) => a == b,
            (HostValue::UInt32(a), HostValue::UInt32(b)) => a == b,
            (HostValue::Int64(a), HostValue::Int64(b)) => a == b,
            (HostValue::UInt64(a), HostValue::UInt64(b)) => a == b,
            (HostValue::Single(a), HostValue::Single(b)) => a == b,
            (HostValue::Double(a), HostValue::Double(b)) => a == b,
            (HostValue::Decimal(a), HostValue::Decimal(b)) => a == b,
            (HostValue::Char(a), HostValue::Char(b)) => a == b,
            (HostValue::String(a), HostValue::String(b)) => a == b,
            (HostValue::DateTime(a), HostValue::DateTime(b)) => a == b,
            (HostValue::Enum(a), HostValue::Enum(b)) => a.ty.key() == b.ty.key() && a.raw == b.raw,
            (HostValue::Struct(a), HostValue::Struct(b)) => a.ty.key() == b.ty.key() && a.fields == b.fields,
            (HostValue::Object(a), HostValue::Object(b)) => a.ptr_eq(b),
            (HostValue::Array(a), HostValue::Array(b)) => a.ptr_eq(b),
            (HostValue::Buffer(a), HostValue::Buffer(b)) => a.ptr_eq(b),
            (HostValue::View(a), HostValue::View(b)) => a == b,
            (HostValue::Delegate(a), HostValue::Delegate(b)) => a.ptr_eq(b),
            (HostValue::Type(a), HostValue::Type(b)) => a == b,
            (HostValue::Variable(a), HostValue::Variable(b)) => a.ptr_eq(b),
            (HostValue::Script(a), HostValue::Script(b)) => Arc::ptr_eq(&a.0, &b.0),
            _ => false,
        }
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Undefined => f.write_str("undefined"),
            HostValue::Null => Ok(()),
            HostValue::Bool(true) => f.write_str("True"),
            HostValue::Bool(false) => f.write_str("False"),
            HostValue::Int8(v) => write!(f, "{}", v),
            HostValue::UInt8(v) => write!(f, "{}", v),
            HostValue::Int16(v) => write!(f, "{}", v),
            HostValue::UInt16(v) => write!(f, "{}", v),
            HostValue::Int32(v) => write!(f, "{}", v),
            HostValue::UInt32(v) => write!(f, "{}", v),
            HostValue::Int64(v) => write!(f, "{}", v),
            HostValue::UInt64(v) => write!(f, "{}", v),
            HostValue::Single(v) => write!(f, "{}", v),
            HostValue::Double(v) => write!(f, "{}", v),
            HostValue::Decimal(v) => write!(f, "{}", v),
            HostValue::Char(c) => write!(f, "{}", c),
            HostValue::String(s) => f.write_str(s),
            HostValue::DateTime(d) => f.write_str(&d.to_rfc3339()),
            HostValue::Enum(e) => match e.ty.enum_name_of(e.raw) {
                Some(name) => f.write_str(name),
                None => write!(f, "{}", e.raw),
            },
            HostValue::Struct(s) => f.write_str(s.ty.name()),
            HostValue::Object(o) => f.write_str(o.ty().name()),
            HostValue::Array(a) => write!(f, "{}[]", a.element()),
            HostValue::Buffer(_) => f.write_str("ArrayBuffer"),
            HostValue::View(v) => f.write_str(v.kind().name()),
            HostValue::Delegate(d) => f.write_str(d.ty().name()),
            HostValue::Type(t) => write!(f, "{}", t),
            HostValue::Variable(v) => write!(f, "{}", v.get()),
            HostValue::Script(_) => f.write_str("[script value]"),
        }
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for HostValue {
                fn from(v: $ty) -> Self {
                    HostValue::$variant(v)
                }
            }
        )*
    };
}

impl_from_scalar! {
    bool => Bool,
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Single,
    f64 => Double,
    Decimal => Decimal,
    char => Char,
    DateTime<Utc> => DateTime,
    HostObject => Object,
    HostArray => Array,
    ArrayBuffer => Buffer,
    BufferView => View,
    HostDelegate => Delegate,
    HostVariable => Variable,
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::String(Arc::from(s))
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        HostValue::String(Arc::from(s))
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(HostValue::Null)
    }
}

// ============================================================================
// Weak values
// ============================================================================

/// Weak handle to a reference-typed host value
#[derive(Clone)]
pub enum WeakHostValue {
    /// Weak object
    Object(WeakHostObject),
    /// Weak array
    Array(WeakHostArray),
    /// Weak delegate
    Delegate(WeakHostDelegate),
    /// Weak argument cell
    Variable(WeakHostVariable),
}

impl WeakHostValue {
    /// Upgrade if the target is alive
    pub fn upgrade(&self) -> Option<HostValue> {
        match self {
            WeakHostValue::Object(w) => w.upgrade().map(HostValue::Object),
            WeakHostValue::Array(w) => w.upgrade().map(HostValue::Array),
            WeakHostValue::Delegate(w) => w.upgrade().map(HostValue::Delegate),
            WeakHostValue::Variable(w) => w.upgrade().map(HostValue::Variable),
        }
    }
}

impl fmt::Debug for WeakHostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(v) => write!(f, "Weak({:?})", v),
            None => f.write_str("Weak(<dead>)"),
        }
    }
}
