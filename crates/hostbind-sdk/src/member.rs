//! Member descriptors
//!
//! A [`MemberDescriptor`] is the immutable description of one field, property,
//! method, event, indexer or constructor: its name, shape, script annotation
//! and the closures that implement it.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::HostContext;
use crate::delegate::HostDelegate;
use crate::error::HostResult;
use crate::types::{TypeKey, TypeRef};
use crate::value::HostValue;

// ============================================================================
// Script access
// ============================================================================

/// Script visibility of a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptAccess {
    /// Readable, writable and invocable
    #[default]
    Full,
    /// Readable and invocable; writes are denied
    ReadOnly,
    /// Not reachable from script
    None,
}

/// Per-member script annotation: access override and exposed name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptAnnotation {
    /// Access override; `None` defers to the type and engine defaults
    pub access: Option<ScriptAccess>,
    /// Name exposed to script instead of the declared name
    pub name: Option<String>,
}

impl ScriptAnnotation {
    /// Annotation hiding the member from script
    pub fn blocked() -> Self {
        ScriptAnnotation {
            access: Some(ScriptAccess::None),
            name: None,
        }
    }

    /// Annotation exposing the member read-only
    pub fn read_only() -> Self {
        ScriptAnnotation {
            access: Some(ScriptAccess::ReadOnly),
            name: None,
        }
    }

    /// Annotation exposing the member under another name
    pub fn renamed(name: impl Into<String>) -> Self {
        ScriptAnnotation {
            access: None,
            name: Some(name.into()),
        }
    }
}

// ============================================================================
// Shapes
// ============================================================================

/// Member kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Data field
    Field,
    /// Property with getter and optional setter
    Property,
    /// Method
    Method,
    /// Event with add/remove accessors
    Event,
    /// Indexed property
    Indexer,
    /// Constructor
    Constructor,
}

/// Host-side visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    /// Visible to every caller
    #[default]
    Public,
    /// Visible only from the declaring type and its subclasses
    Private,
}

/// Parameter passing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParamMode {
    /// By value
    #[default]
    In,
    /// By reference; the callee may read and write
    Ref,
    /// Output only; the callee writes
    Out,
}

/// Parameter shape
#[derive(Debug, Clone)]
pub struct ParamInfo {
    /// Parameter name
    pub name: String,
    /// Declared type; for a params-array this is the array type
    pub ty: TypeRef,
    /// Passing mode
    pub mode: ParamMode,
    /// Default value for an optional parameter
    pub default: Option<HostValue>,
    /// Trailing params-array collecting the remaining arguments
    pub is_params: bool,
}

impl ParamInfo {
    /// Required by-value parameter
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        ParamInfo {
            name: name.into(),
            ty,
            mode: ParamMode::In,
            default: None,
            is_params: false,
        }
    }

    /// Optional parameter with a default value
    pub fn optional(name: impl Into<String>, ty: TypeRef, default: HostValue) -> Self {
        ParamInfo {
            default: Some(default),
            ..ParamInfo::new(name, ty)
        }
    }

    /// Trailing params-array of `element`
    pub fn params(name: impl Into<String>, element: TypeRef) -> Self {
        ParamInfo {
            is_params: true,
            ..ParamInfo::new(name, TypeRef::array(element))
        }
    }

    /// By-reference parameter
    pub fn by_ref(name: impl Into<String>, ty: TypeRef) -> Self {
        ParamInfo {
            mode: ParamMode::Ref,
            ..ParamInfo::new(name, ty)
        }
    }

    /// Output parameter
    pub fn out(name: impl Into<String>, ty: TypeRef) -> Self {
        ParamInfo {
            mode: ParamMode::Out,
            ..ParamInfo::new(name, ty)
        }
    }

    /// Is the parameter optional?
    pub fn is_optional(&self) -> bool {
        self.default.is_some() || self.is_params
    }

    /// Element type of a params-array
    pub fn params_element(&self) -> Option<&TypeRef> {
        match (&self.ty, self.is_params) {
            (TypeRef::Array(element), true) => Some(element),
            _ => None,
        }
    }
}

// ============================================================================
// Implementations
// ============================================================================

/// Reads a field, property or indexer: `(ctx, this, index_args)`
pub type Getter =
    Arc<dyn Fn(&dyn HostContext, &HostValue, &[HostValue]) -> HostResult<HostValue> + Send + Sync>;

/// Writes a field, property or indexer: `(ctx, this, index_args, value)`
pub type Setter = Arc<
    dyn Fn(&dyn HostContext, &HostValue, &[HostValue], HostValue) -> HostResult<()> + Send + Sync,
>;

/// Invokes a method or constructor. By-ref and out slots are written back in place.
pub type Invoker = Arc<
    dyn Fn(&dyn HostContext, &HostValue, &mut [HostValue]) -> HostResult<HostValue> + Send + Sync,
>;

/// Adds or removes an event handler: `(this, handler)`
pub type EventHook = Arc<dyn Fn(&HostValue, &HostDelegate) -> HostResult<()> + Send + Sync>;

/// How a member is implemented
#[derive(Clone)]
pub enum MemberImpl {
    /// Field, property or indexer accessors
    Accessor {
        /// Getter, if readable
        get: Option<Getter>,
        /// Setter, if writable
        set: Option<Setter>,
    },
    /// Method or constructor body
    Invoke(Invoker),
    /// Event accessors
    Event {
        /// Adds a handler
        add: EventHook,
        /// Removes a handler
        remove: EventHook,
    },
    /// Slot of a struct field
    StructField(usize),
    /// Engine intrinsic, dispatched by id
    Intrinsic(u16),
    /// Interface member; implemented by the concrete type
    Abstract,
}

impl fmt::Debug for MemberImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberImpl::Accessor { get, set } => f
                .debug_struct("Accessor")
                .field("get", &get.is_some())
                .field("set", &set.is_some())
                .finish(),
            MemberImpl::Invoke(_) => f.write_str("Invoke"),
            MemberImpl::Event { .. } => f.write_str("Event"),
            MemberImpl::StructField(slot) => write!(f, "StructField({})", slot),
            MemberImpl::Intrinsic(id) => write!(f, "Intrinsic({:#06x})", id),
            MemberImpl::Abstract => f.write_str("Abstract"),
        }
    }
}

// ============================================================================
// Member descriptor
// ============================================================================

/// Name under which indexers are declared
pub const INDEXER_NAME: &str = "Item";

/// Name under which constructors are declared
pub const CONSTRUCTOR_NAME: &str = ".ctor";

/// Immutable description of one member
#[derive(Debug, Clone)]
pub struct MemberDescriptor {
    declaring: TypeKey,
    declaring_access: Option<ScriptAccess>,
    name: String,
    kind: MemberKind,
    is_static: bool,
    visibility: Visibility,
    params: Vec<ParamInfo>,
    ty: TypeRef,
    annotation: ScriptAnnotation,
    imp: MemberImpl,
}

impl MemberDescriptor {
    fn raw(name: String, kind: MemberKind, params: Vec<ParamInfo>, ty: TypeRef, imp: MemberImpl) -> Self {
        MemberDescriptor {
            declaring: TypeKey::UNBOUND,
            declaring_access: None,
            name,
            kind,
            is_static: false,
            visibility: Visibility::Public,
            params,
            ty,
            annotation: ScriptAnnotation::default(),
            imp,
        }
    }

    /// Read/write field
    pub fn field<G, S>(name: impl Into<String>, ty: TypeRef, get: G, set: S) -> Self
    where
        G: Fn(&HostValue) -> HostResult<HostValue> + Send + Sync + 'static,
        S: Fn(&HostValue, HostValue) -> HostResult<()> + Send + Sync + 'static,
    {
        let imp = MemberImpl::Accessor {
            get: Some(Arc::new(move |_ctx, this, _idx| get(this))),
            set: Some(Arc::new(move |_ctx, this, _idx, value| set(this, value))),
        };
        Self::raw(name.into(), MemberKind::Field, Vec::new(), ty, imp)
    }

    /// Read-only property
    pub fn property<G>(name: impl Into<String>, ty: TypeRef, get: G) -> Self
    where
        G: Fn(&HostValue) -> HostResult<HostValue> + Send + Sync + 'static,
    {
        let imp = MemberImpl::Accessor {
            get: Some(Arc::new(move |_ctx, this, _idx| get(this))),
            set: None,
        };
        Self::raw(name.into(), MemberKind::Property, Vec::new(), ty, imp)
    }

    /// Add a setter to a property or field
    pub fn with_setter<S>(mut self, set: S) -> Self
    where
        S: Fn(&HostValue, HostValue) -> HostResult<()> + Send + Sync + 'static,
    {
        if let MemberImpl::Accessor { set: slot, .. } = &mut self.imp {
            *slot = Some(Arc::new(move |_ctx, this, _idx, value| set(this, value)));
        }
        self
    }

    /// Indexed property (the default property of its type when named `Item`)
    pub fn indexer<G>(params: Vec<ParamInfo>, ty: TypeRef, get: G) -> Self
    where
        G: Fn(&HostValue, &[HostValue]) -> HostResult<HostValue> + Send + Sync + 'static,
    {
        let imp = MemberImpl::Accessor {
            get: Some(Arc::new(move |_ctx, this, idx| get(this, idx))),
            set: None,
        };
        Self::raw(INDEXER_NAME.to_string(), MemberKind::Indexer, params, ty, imp)
    }

    /// Add a setter to an indexer
    pub fn with_index_setter<S>(mut self, set: S) -> Self
    where
        S: Fn(&HostValue, &[HostValue], HostValue) -> HostResult<()> + Send + Sync + 'static,
    {
        if let MemberImpl::Accessor { set: slot, .. } = &mut self.imp {
            *slot = Some(Arc::new(move |_ctx, this, idx, value| set(this, idx, value)));
        }
        self
    }

    /// Instance method
    pub fn method<F>(name: impl Into<String>, params: Vec<ParamInfo>, ret: TypeRef, body: F) -> Self
    where
        F: Fn(&dyn HostContext, &HostValue, &mut [HostValue]) -> HostResult<HostValue>
            + Send
            + Sync
            + 'static,
    {
        Self::raw(
            name.into(),
            MemberKind::Method,
            params,
            ret,
            MemberImpl::Invoke(Arc::new(body)),
        )
    }

    /// Static method
    pub fn static_method<F>(
        name: impl Into<String>,
        params: Vec<ParamInfo>,
        ret: TypeRef,
        body: F,
    ) -> Self
    where
        F: Fn(&dyn HostContext, &mut [HostValue]) -> HostResult<HostValue> + Send + Sync + 'static,
    {
        Self::method(name, params, ret, move |ctx, _this, args| body(ctx, args)).static_member()
    }

    /// Constructor; the body returns the new instance
    pub fn constructor<F>(params: Vec<ParamInfo>, body: F) -> Self
    where
        F: Fn(&dyn HostContext, &mut [HostValue]) -> HostResult<HostValue> + Send + Sync + 'static,
    {
        let mut member = Self::raw(
            CONSTRUCTOR_NAME.to_string(),
            MemberKind::Constructor,
            params,
            TypeRef::Object,
            MemberImpl::Invoke(Arc::new(move |ctx, _this, args| body(ctx, args))),
        );
        member.is_static = true;
        member
    }

    /// Event of delegate type `handler_ty`
    pub fn event<A, R>(name: impl Into<String>, handler_ty: TypeRef, add: A, remove: R) -> Self
    where
        A: Fn(&HostValue, &HostDelegate) -> HostResult<()> + Send + Sync + 'static,
        R: Fn(&HostValue, &HostDelegate) -> HostResult<()> + Send + Sync + 'static,
    {
        let imp = MemberImpl::Event {
            add: Arc::new(add),
            remove: Arc::new(remove),
        };
        Self::raw(name.into(), MemberKind::Event, Vec::new(), handler_ty, imp)
    }

    /// Field of a struct; its slot is assigned when the type is built
    pub fn struct_field(name: impl Into<String>, ty: TypeRef) -> Self {
        Self::raw(
            name.into(),
            MemberKind::Field,
            Vec::new(),
            ty,
            MemberImpl::StructField(0),
        )
    }

    /// Static method implemented by the engine
    pub fn intrinsic(name: impl Into<String>, params: Vec<ParamInfo>, ret: TypeRef, id: u16) -> Self {
        let mut member = Self::raw(name.into(), MemberKind::Method, params, ret, MemberImpl::Intrinsic(id));
        member.is_static = true;
        member
    }

    /// Interface method
    pub fn abstract_method(name: impl Into<String>, params: Vec<ParamInfo>, ret: TypeRef) -> Self {
        Self::raw(name.into(), MemberKind::Method, params, ret, MemberImpl::Abstract)
    }

    /// Interface property
    pub fn abstract_property(name: impl Into<String>, ty: TypeRef) -> Self {
        Self::raw(name.into(), MemberKind::Property, Vec::new(), ty, MemberImpl::Abstract)
    }

    // ------------------------------------------------------------------------
    // Modifiers
    // ------------------------------------------------------------------------

    /// Make the member static
    pub fn static_member(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Make the member private
    pub fn private(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }

    /// Replace the script annotation
    pub fn annotate(mut self, annotation: ScriptAnnotation) -> Self {
        self.annotation = annotation;
        self
    }

    /// Hide the member from script
    pub fn blocked(mut self) -> Self {
        self.annotation.access = Some(ScriptAccess::None);
        self
    }

    /// Expose the member read-only
    pub fn read_only(mut self) -> Self {
        self.annotation.access = Some(ScriptAccess::ReadOnly);
        self
    }

    /// Expose the member under another name
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.annotation.name = Some(name.into());
        self
    }

    pub(crate) fn bind_declaring(&mut self, key: TypeKey, access: Option<ScriptAccess>) {
        self.declaring = key;
        self.declaring_access = access;
    }

    pub(crate) fn set_struct_slot(&mut self, slot: usize) {
        self.imp = MemberImpl::StructField(slot);
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Key of the declaring type or interface
    pub fn declaring(&self) -> TypeKey {
        self.declaring
    }

    /// Type-level default access of the declaring type
    pub fn declaring_access(&self) -> Option<ScriptAccess> {
        self.declaring_access
    }

    /// Declared name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name exposed to script
    pub fn script_name(&self) -> &str {
        self.annotation.name.as_deref().unwrap_or(&self.name)
    }

    /// Is the member renamed for script?
    pub fn is_renamed(&self) -> bool {
        matches!(&self.annotation.name, Some(n) if *n != self.name)
    }

    /// Member kind
    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    /// Is the member static?
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Host-side visibility
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Is the member private?
    pub fn is_private(&self) -> bool {
        self.visibility == Visibility::Private
    }

    /// Parameters (methods, indexers, constructors)
    pub fn params(&self) -> &[ParamInfo] {
        &self.params
    }

    /// Value type of a field/property/indexer, return type of a method, handler type of an event
    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    /// Script annotation
    pub fn annotation(&self) -> &ScriptAnnotation {
        &self.annotation
    }

    /// Implementation
    pub fn imp(&self) -> &MemberImpl {
        &self.imp
    }

    /// Minimum number of script arguments
    pub fn min_arity(&self) -> usize {
        self.params.iter().filter(|p| !p.is_optional()).count()
    }

    /// Maximum number of script arguments; `None` with a params-array
    pub fn max_arity(&self) -> Option<usize> {
        if self.params.last().map(|p| p.is_params).unwrap_or(false) {
            None
        } else {
            Some(self.params.len())
        }
    }

    /// Does `count` script arguments fit this member's parameter list?
    pub fn accepts_arity(&self, count: usize) -> bool {
        count >= self.min_arity() && self.max_arity().map(|max| count <= max).unwrap_or(true)
    }

    /// Is the member data-like (field or property)?
    pub fn is_data(&self) -> bool {
        matches!(self.kind, MemberKind::Field | MemberKind::Property)
    }

    /// Does the member have a setter?
    pub fn is_writable(&self) -> bool {
        match &self.imp {
            MemberImpl::Accessor { set, .. } => set.is_some(),
            MemberImpl::StructField(_) => true,
            _ => false,
        }
    }
}
