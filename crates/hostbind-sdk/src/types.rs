//! Host type metadata
//!
//! Rust has no runtime reflection, so host types are described by explicit
//! descriptors. A [`HostType`] is a flat member table: every entry records the
//! type (or interface) that declared it. Views onto the table (concrete class,
//! base class, specific interface) are filters over these entries.
//!
//! # Example
//!
//! ```ignore
//! let counter = HostType::class("Counter")
//!     .member(MemberDescriptor::property("Count", TypeRef::i32(), |this| { ... }))
//!     .member(MemberDescriptor::method("Add", vec![ParamInfo::new("n", TypeRef::i32())],
//!         TypeRef::Void, |_ctx, this, args| { ... }))
//!     .build();
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::delegate::DelegateSignature;
use crate::member::{MemberDescriptor, MemberImpl, MemberKind, ScriptAccess};

static NEXT_TYPE_KEY: AtomicU64 = AtomicU64::new(1);

/// Unique identity of a registered host type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(u64);

impl TypeKey {
    /// Placeholder carried by members until their type is built
    pub const UNBOUND: TypeKey = TypeKey(0);

    fn next() -> Self {
        TypeKey(NEXT_TYPE_KEY.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw key value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

// ============================================================================
// Numeric kinds
// ============================================================================

/// Width/sign-specific numeric kinds understood by the marshaler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NumericKind {
    /// 8-bit signed integer
    Int8,
    /// 8-bit unsigned integer
    UInt8,
    /// 16-bit signed integer
    Int16,
    /// 16-bit unsigned integer
    UInt16,
    /// 32-bit signed integer
    Int32,
    /// 32-bit unsigned integer
    UInt32,
    /// 64-bit signed integer
    Int64,
    /// 64-bit unsigned integer
    UInt64,
    /// 32-bit float
    Single,
    /// 64-bit float
    Double,
    /// 96-bit scaled decimal
    Decimal,
}

impl NumericKind {
    /// Every numeric kind, narrowest integral first
    pub const ALL: [NumericKind; 11] = [
        NumericKind::Int8,
        NumericKind::UInt8,
        NumericKind::Int16,
        NumericKind::UInt16,
        NumericKind::Int32,
        NumericKind::UInt32,
        NumericKind::Int64,
        NumericKind::UInt64,
        NumericKind::Single,
        NumericKind::Double,
        NumericKind::Decimal,
    ];

    /// Is this an integral kind?
    pub fn is_integral(self) -> bool {
        !matches!(
            self,
            NumericKind::Single | NumericKind::Double | NumericKind::Decimal
        )
    }

    /// Is this a signed kind? Floating kinds are signed.
    pub fn is_signed(self) -> bool {
        !matches!(
            self,
            NumericKind::UInt8 | NumericKind::UInt16 | NumericKind::UInt32 | NumericKind::UInt64
        )
    }

    /// Storage width in bits
    pub fn bits(self) -> u32 {
        match self {
            NumericKind::Int8 | NumericKind::UInt8 => 8,
            NumericKind::Int16 | NumericKind::UInt16 => 16,
            NumericKind::Int32 | NumericKind::UInt32 | NumericKind::Single => 32,
            NumericKind::Int64 | NumericKind::UInt64 | NumericKind::Double => 64,
            NumericKind::Decimal => 128,
        }
    }

    /// Inclusive value range of an integral kind
    pub fn integral_range(self) -> Option<(i128, i128)> {
        match self {
            NumericKind::Int8 => Some((i8::MIN as i128, i8::MAX as i128)),
            NumericKind::UInt8 => Some((0, u8::MAX as i128)),
            NumericKind::Int16 => Some((i16::MIN as i128, i16::MAX as i128)),
            NumericKind::UInt16 => Some((0, u16::MAX as i128)),
            NumericKind::Int32 => Some((i32::MIN as i128, i32::MAX as i128)),
            NumericKind::UInt32 => Some((0, u32::MAX as i128)),
            NumericKind::Int64 => Some((i64::MIN as i128, i64::MAX as i128)),
            NumericKind::UInt64 => Some((0, u64::MAX as i128)),
            _ => None,
        }
    }

    /// Does `value` fit this integral kind?
    pub fn contains(self, value: i128) -> bool {
        self.integral_range()
            .map(|(lo, hi)| value >= lo && value <= hi)
            .unwrap_or(false)
    }

    /// Host type name
    pub fn name(self) -> &'static str {
        match self {
            NumericKind::Int8 => "SByte",
            NumericKind::UInt8 => "Byte",
            NumericKind::Int16 => "Int16",
            NumericKind::UInt16 => "UInt16",
            NumericKind::Int32 => "Int32",
            NumericKind::UInt32 => "UInt32",
            NumericKind::Int64 => "Int64",
            NumericKind::UInt64 => "UInt64",
            NumericKind::Single => "Single",
            NumericKind::Double => "Double",
            NumericKind::Decimal => "Decimal",
        }
    }
}

impl fmt::Display for NumericKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Type references
// ============================================================================

/// A reference to a host type as it appears in a member signature.
///
/// Built-in kinds are structural; registered types (`Named`) compare by key.
#[derive(Clone)]
pub enum TypeRef {
    /// Any host value; script values are boxed
    Object,
    /// Late-bound value; converted like `Object`, but ranks after it
    Dynamic,
    /// No value (method return only)
    Void,
    /// Boolean
    Bool,
    /// Unicode scalar
    Char,
    /// String
    String,
    /// UTC date/time
    DateTime,
    /// Numeric scalar
    Numeric(NumericKind),
    /// Nullable value type
    Nullable(Box<TypeRef>),
    /// Reference array with element type
    Array(Box<TypeRef>),
    /// Fixed-size binary buffer
    Buffer,
    /// Window onto a binary buffer
    View,
    /// Registered class, struct, interface, enum or delegate
    Named(Arc<HostType>),
    /// A type handle
    Type,
    /// Boxed argument cell holding a value of the inner type
    Variable(Box<TypeRef>),
}

impl TypeRef {
    /// `SByte`
    pub fn i8() -> Self {
        TypeRef::Numeric(NumericKind::Int8)
    }
    /// `Byte`
    pub fn u8() -> Self {
        TypeRef::Numeric(NumericKind::UInt8)
    }
    /// `Int16`
    pub fn i16() -> Self {
        TypeRef::Numeric(NumericKind::Int16)
    }
    /// `UInt16`
    pub fn u16() -> Self {
        TypeRef::Numeric(NumericKind::UInt16)
    }
    /// `Int32`
    pub fn i32() -> Self {
        TypeRef::Numeric(NumericKind::Int32)
    }
    /// `UInt32`
    pub fn u32() -> Self {
        TypeRef::Numeric(NumericKind::UInt32)
    }
    /// `Int64`
    pub fn i64() -> Self {
        TypeRef::Numeric(NumericKind::Int64)
    }
    /// `UInt64`
    pub fn u64() -> Self {
        TypeRef::Numeric(NumericKind::UInt64)
    }
    /// `Single`
    pub fn f32() -> Self {
        TypeRef::Numeric(NumericKind::Single)
    }
    /// `Double`
    pub fn f64() -> Self {
        TypeRef::Numeric(NumericKind::Double)
    }
    /// `Decimal`
    pub fn decimal() -> Self {
        TypeRef::Numeric(NumericKind::Decimal)
    }

    /// Nullable wrapper around a value type
    pub fn nullable(inner: TypeRef) -> Self {
        TypeRef::Nullable(Box::new(inner))
    }

    /// Array of `element`
    pub fn array(element: TypeRef) -> Self {
        TypeRef::Array(Box::new(element))
    }

    /// Reference to a registered type
    pub fn named(ty: &Arc<HostType>) -> Self {
        TypeRef::Named(Arc::clone(ty))
    }

    /// Strip one level of `Nullable`
    pub fn underlying(&self) -> &TypeRef {
        match self {
            TypeRef::Nullable(inner) => inner,
            other => other,
        }
    }

    /// Numeric kind of this type (after stripping `Nullable`)
    pub fn numeric(&self) -> Option<NumericKind> {
        match self.underlying() {
            TypeRef::Numeric(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Registered type behind this reference (after stripping `Nullable`)
    pub fn host_type(&self) -> Option<&Arc<HostType>> {
        match self.underlying() {
            TypeRef::Named(ty) => Some(ty),
            _ => None,
        }
    }

    /// Is this a value type (cannot hold null unless wrapped in `Nullable`)?
    pub fn is_value_type(&self) -> bool {
        match self {
            TypeRef::Bool | TypeRef::Char | TypeRef::DateTime | TypeRef::Numeric(_) => true,
            TypeRef::Named(ty) => ty.is_value_type(),
            _ => false,
        }
    }

    /// Can a value of this type be null?
    pub fn accepts_null(&self) -> bool {
        !self.is_value_type() && !matches!(self, TypeRef::Void)
    }

    /// Display name used in error messages
    pub fn display_name(&self) -> String {
        match self {
            TypeRef::Object => "Object".to_string(),
            TypeRef::Dynamic => "dynamic".to_string(),
            TypeRef::Void => "Void".to_string(),
            TypeRef::Bool => "Boolean".to_string(),
            TypeRef::Char => "Char".to_string(),
            TypeRef::String => "String".to_string(),
            TypeRef::DateTime => "DateTime".to_string(),
            TypeRef::Numeric(kind) => kind.name().to_string(),
            TypeRef::Nullable(inner) => format!("Nullable<{}>", inner.display_name()),
            TypeRef::Array(inner) => format!("{}[]", inner.display_name()),
            TypeRef::Buffer => "ArrayBuffer".to_string(),
            TypeRef::View => "ArrayBufferView".to_string(),
            TypeRef::Named(ty) => ty.name().to_string(),
            TypeRef::Type => "Type".to_string(),
            TypeRef::Variable(inner) => format!("HostVariable<{}>", inner.display_name()),
        }
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TypeRef::Numeric(a), TypeRef::Numeric(b)) => a == b,
            (TypeRef::Nullable(a), TypeRef::Nullable(b)) => a == b,
            (TypeRef::Array(a), TypeRef::Array(b)) => a == b,
            (TypeRef::Variable(a), TypeRef::Variable(b)) => a == b,
            (TypeRef::Named(a), TypeRef::Named(b)) => a.key() == b.key(),
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b)
                && !matches!(
                    a,
                    TypeRef::Numeric(_)
                        | TypeRef::Nullable(_)
                        | TypeRef::Array(_)
                        | TypeRef::Variable(_)
                        | TypeRef::Named(_)
                ),
        }
    }
}

impl Eq for TypeRef {}

impl Hash for TypeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            TypeRef::Numeric(kind) => kind.hash(state),
            TypeRef::Nullable(inner) | TypeRef::Array(inner) | TypeRef::Variable(inner) => {
                inner.hash(state)
            }
            TypeRef::Named(ty) => ty.key().hash(state),
            _ => {}
        }
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeRef({})", self.display_name())
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

// ============================================================================
// Host types
// ============================================================================

/// Kind of a registered host type
#[derive(Debug, Clone)]
pub enum TypeKind {
    /// Reference type with identity
    Class,
    /// Value-type aggregate with structural equality
    Struct,
    /// Interface; members are reached only through an interface view
    Interface,
    /// Enumeration over an integral underlying kind
    Enum {
        /// Underlying integral kind
        underlying: NumericKind,
        /// Values may be combined bitwise
        flags: bool,
    },
    /// Callable signature
    Delegate(Arc<DelegateSignature>),
    /// Class with static members only
    Static,
}

/// Registered host type: name, kind, hierarchy and flat member table
pub struct HostType {
    key: TypeKey,
    name: String,
    kind: TypeKind,
    base: Option<Arc<HostType>>,
    interfaces: Vec<Arc<HostType>>,
    members: Vec<Arc<MemberDescriptor>>,
    default_access: Option<ScriptAccess>,
    default_member: Option<String>,
    nested: Vec<Arc<HostType>>,
    enum_values: Vec<(String, i128)>,
}

impl HostType {
    /// Start building a class
    pub fn class(name: impl Into<String>) -> TypeBuilder {
        TypeBuilder::new(name.into(), TypeKind::Class)
    }

    /// Start building a value-type aggregate
    pub fn structure(name: impl Into<String>) -> TypeBuilder {
        TypeBuilder::new(name.into(), TypeKind::Struct)
    }

    /// Start building an interface
    pub fn interface(name: impl Into<String>) -> TypeBuilder {
        TypeBuilder::new(name.into(), TypeKind::Interface)
    }

    /// Start building an enumeration
    pub fn enumeration(name: impl Into<String>, underlying: NumericKind, flags: bool) -> TypeBuilder {
        TypeBuilder::new(name.into(), TypeKind::Enum { underlying, flags })
    }

    /// Start building a static class
    pub fn static_class(name: impl Into<String>) -> TypeBuilder {
        TypeBuilder::new(name.into(), TypeKind::Static)
    }

    /// Build a delegate type for `signature`
    pub fn delegate(name: impl Into<String>, signature: DelegateSignature) -> Arc<HostType> {
        TypeBuilder::new(name.into(), TypeKind::Delegate(Arc::new(signature))).build()
    }

    /// Unique key
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type kind
    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    /// Base class
    pub fn base(&self) -> Option<&Arc<HostType>> {
        self.base.as_ref()
    }

    /// Directly implemented interfaces
    pub fn interfaces(&self) -> &[Arc<HostType>] {
        &self.interfaces
    }

    /// Members declared on this type, including explicit interface implementations
    pub fn members(&self) -> &[Arc<MemberDescriptor>] {
        &self.members
    }

    /// Type-level default script access
    pub fn default_access(&self) -> Option<ScriptAccess> {
        self.default_access
    }

    /// Name of the default (call-syntax) member
    pub fn default_member(&self) -> Option<&str> {
        match &self.default_member {
            Some(name) => Some(name),
            None => self.base.as_ref().and_then(|b| b.default_member()),
        }
    }

    /// Nested types
    pub fn nested(&self) -> &[Arc<HostType>] {
        &self.nested
    }

    /// Find a nested type by name
    pub fn find_nested(&self, name: &str) -> Option<&Arc<HostType>> {
        self.nested.iter().find(|t| t.name == name)
    }

    /// Named constants of an enumeration
    pub fn enum_values(&self) -> &[(String, i128)] {
        &self.enum_values
    }

    /// Value of a named enum constant
    pub fn enum_value_of(&self, name: &str) -> Option<i128> {
        self.enum_values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Name of the enum constant with value `raw`
    pub fn enum_name_of(&self, raw: i128) -> Option<&str> {
        self.enum_values
            .iter()
            .find(|(_, v)| *v == raw)
            .map(|(n, _)| n.as_str())
    }

    /// Underlying integral kind of an enumeration
    pub fn enum_underlying(&self) -> Option<NumericKind> {
        match self.kind {
            TypeKind::Enum { underlying, .. } => Some(underlying),
            _ => None,
        }
    }

    /// Signature of a delegate type
    pub fn delegate_signature(&self) -> Option<&Arc<DelegateSignature>> {
        match &self.kind {
            TypeKind::Delegate(sig) => Some(sig),
            _ => None,
        }
    }

    /// Is this an enumeration?
    pub fn is_enum(&self) -> bool {
        matches!(self.kind, TypeKind::Enum { .. })
    }

    /// Is this a flags enumeration?
    pub fn is_flags(&self) -> bool {
        matches!(self.kind, TypeKind::Enum { flags: true, .. })
    }

    /// Is this an interface?
    pub fn is_interface(&self) -> bool {
        matches!(self.kind, TypeKind::Interface)
    }

    /// Is this a struct?
    pub fn is_struct(&self) -> bool {
        matches!(self.kind, TypeKind::Struct)
    }

    /// Is this a delegate type?
    pub fn is_delegate(&self) -> bool {
        matches!(self.kind, TypeKind::Delegate(_))
    }

    /// Structs and enums are value types
    pub fn is_value_type(&self) -> bool {
        matches!(self.kind, TypeKind::Struct | TypeKind::Enum { .. })
    }

    /// This type followed by its base classes
    pub fn chain(&self) -> Vec<&HostType> {
        let mut chain = vec![self];
        let mut current = self.base.as_deref();
        while let Some(ty) = current {
            chain.push(ty);
            current = ty.base.as_deref();
        }
        chain
    }

    /// Every interface reachable from this type, deduplicated by key
    pub fn all_interfaces(&self) -> Vec<&HostType> {
        let mut out: Vec<&HostType> = Vec::new();
        let mut stack: Vec<&HostType> = Vec::new();
        for ty in self.chain() {
            if ty.is_interface() {
                stack.push(ty);
            }
            stack.extend(ty.interfaces.iter().map(|i| i.as_ref()));
        }
        while let Some(iface) = stack.pop() {
            if out.iter().any(|t| t.key == iface.key) {
                continue;
            }
            stack.extend(iface.interfaces.iter().map(|i| i.as_ref()));
            out.push(iface);
        }
        out
    }

    /// Can a value of this type be used where `target` is expected?
    pub fn is_assignable_to(&self, target: &HostType) -> bool {
        if self.chain().iter().any(|t| t.key == target.key) {
            return true;
        }
        target.is_interface() && self.all_interfaces().iter().any(|t| t.key == target.key)
    }

    /// Instance fields of a struct, in declaration order
    pub fn struct_fields(&self) -> Vec<&Arc<MemberDescriptor>> {
        self.members
            .iter()
            .filter(|m| matches!(m.imp(), MemberImpl::StructField(_)))
            .collect()
    }
}

impl fmt::Debug for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostType({}#{})", self.name, self.key.0)
    }
}

/// Fluent builder for [`HostType`]
pub struct TypeBuilder {
    name: String,
    kind: TypeKind,
    base: Option<Arc<HostType>>,
    interfaces: Vec<Arc<HostType>>,
    members: Vec<MemberDescriptor>,
    explicit: Vec<(Arc<HostType>, MemberDescriptor)>,
    default_access: Option<ScriptAccess>,
    default_member: Option<String>,
    nested: Vec<Arc<HostType>>,
    enum_values: Vec<(String, i128)>,
}

impl TypeBuilder {
    fn new(name: String, kind: TypeKind) -> Self {
        TypeBuilder {
            name,
            kind,
            base: None,
            interfaces: Vec::new(),
            members: Vec::new(),
            explicit: Vec::new(),
            default_access: None,
            default_member: None,
            nested: Vec::new(),
            enum_values: Vec::new(),
        }
    }

    /// Set the base class
    pub fn base(mut self, base: &Arc<HostType>) -> Self {
        self.base = Some(Arc::clone(base));
        self
    }

    /// Declare an implemented (or, for interfaces, extended) interface
    pub fn implements(mut self, iface: &Arc<HostType>) -> Self {
        self.interfaces.push(Arc::clone(iface));
        self
    }

    /// Type-level default script access for members without their own annotation
    pub fn default_access(mut self, access: ScriptAccess) -> Self {
        self.default_access = Some(access);
        self
    }

    /// Member reachable through call syntax on instances
    pub fn default_member(mut self, name: impl Into<String>) -> Self {
        self.default_member = Some(name.into());
        self
    }

    /// Declare a member on this type
    pub fn member(mut self, member: MemberDescriptor) -> Self {
        self.members.push(member);
        self
    }

    /// Explicitly implement an interface member; visible only through that interface
    pub fn explicit(mut self, iface: &Arc<HostType>, member: MemberDescriptor) -> Self {
        self.explicit.push((Arc::clone(iface), member));
        self
    }

    /// Declare a nested type
    pub fn nested(mut self, ty: &Arc<HostType>) -> Self {
        self.nested.push(Arc::clone(ty));
        self
    }

    /// Declare a named enum constant
    pub fn value(mut self, name: impl Into<String>, raw: i128) -> Self {
        self.enum_values.push((name.into(), raw));
        self
    }

    /// Finish the type
    pub fn build(self) -> Arc<HostType> {
        let key = TypeKey::next();
        let mut members = Vec::with_capacity(self.members.len() + self.explicit.len());
        let mut field_index = 0usize;

        for mut member in self.members {
            member.bind_declaring(key, self.default_access);
            if let MemberImpl::StructField(_) = member.imp() {
                member.set_struct_slot(field_index);
                field_index += 1;
            }
            members.push(Arc::new(member));
        }

        for (iface, mut member) in self.explicit {
            member.bind_declaring(iface.key(), iface.default_access());
            members.push(Arc::new(member));
        }

        debug_assert!(members
            .iter()
            .all(|m| m.kind() != MemberKind::Constructor || m.is_static()));

        Arc::new(HostType {
            key,
            name: self.name,
            kind: self.kind,
            base: self.base,
            interfaces: self.interfaces,
            members,
            default_access: self.default_access,
            default_member: self.default_member,
            nested: self.nested,
            enum_values: self.enum_values,
        })
    }
}
