//! Member binder
//!
//! Resolves script operations on host proxies to host members. Every
//! operation starts from the proxy's current target:
//!
//! | Target            | Binding                                               |
//! |-------------------|-------------------------------------------------------|
//! | type handle       | static members, nested types, enum constants          |
//! | object/struct/... | instance members of the runtime type, through the view |
//! | array             | `length`, element index                               |
//! | variable          | `value`                                               |
//!
//! Objects carrying a [`DynamicObject`] capability are offered each operation
//! first, unless the proxy was added with `DIRECT_ACCESS`.
//!
//! Methods, indexers and events read as [`BoundMember`] values. Calling one
//! re-resolves against the target, so a change to the engine's access policy
//! applies to a member handle obtained earlier.
//!
//! ## Default members
//!
//! `obj(k)`, `obj.Item(k)`, `obj.Item.get(k)` and `obj(k) = v` all reach the
//! same indexer. Invoking a property, field or zero-argument method with
//! arguments tunnels: the member is read and the arguments are applied to
//! its value.

mod builtin;
mod overload;
mod table;

use std::fmt;
use std::sync::Arc;

use hostbind_sdk::{
    DynamicObject, EnumValue, HostArray, HostDelegate, HostError, HostType, HostValue,
    MemberImpl, MemberKind, TypeRef, INDEXER_NAME,
};

use crate::engine::EngineCore;
use crate::error::{ConversionError, ExecutionFault, ScriptError, ScriptFault, ScriptResult};
use crate::lifetime::HostItem;
use crate::marshal::script_delegate;
use crate::options::HostItemFlags;
use crate::value::ScriptValue;

use builtin::{host_to_string, EventConnection, EVENT_CONNECTION, INVOKE, TO_STRING};
use overload::{Mismatch, Prepared};
use table::{MemberTable, Slot};

// ============================================================================
// Bound members
// ============================================================================

/// What a [`BoundMember`] stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    /// Method group; calling it resolves overloads
    Method,
    /// Indexer; calling it reads an element
    Indexer,
    /// `Item.get`
    IndexerGet,
    /// `Item.set`; the last argument is the value
    IndexerSet,
    /// Event; exposes `connect`
    Event,
    /// `Event.connect`
    EventConnect,
}

/// A host member bound to its target, as held by script
pub struct BoundMember {
    target: Arc<HostItem>,
    name: String,
    kind: BoundKind,
}

impl BoundMember {
    fn new(target: &Arc<HostItem>, name: &str, kind: BoundKind) -> Arc<Self> {
        Arc::new(BoundMember {
            target: Arc::clone(target),
            name: name.to_string(),
            kind,
        })
    }

    /// Script name of the member
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Member kind
    pub fn kind(&self) -> BoundKind {
        self.kind
    }

    /// Proxy the member is bound to
    pub fn target(&self) -> &Arc<HostItem> {
        &self.target
    }
}

impl fmt::Debug for BoundMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoundMember({:?} {} on {:?})", self.kind, self.name, self.target)
    }
}

// ============================================================================
// Bindings
// ============================================================================

enum Binding {
    Static(TypeRef),
    Instance { this: HostValue, ty: Arc<HostType> },
    Plain(HostValue),
}

impl Binding {
    fn of(item: &HostItem) -> ScriptResult<Binding> {
        Ok(match item.target()? {
            HostValue::Type(ty) => Binding::Static(ty),
            value => match value.type_ref() {
                TypeRef::Named(ty) => Binding::Instance { this: value, ty },
                _ => Binding::Plain(value),
            },
        })
    }

    fn this(&self) -> HostValue {
        match self {
            Binding::Static(_) => HostValue::Null,
            Binding::Instance { this, .. } => this.clone(),
            Binding::Plain(value) => value.clone(),
        }
    }

    fn table(&self, item: &HostItem) -> MemberTable {
        match self {
            Binding::Static(TypeRef::Named(ty)) => MemberTable::statics(ty),
            Binding::Instance { ty, .. } => MemberTable::instance(ty, item.view().map(|v| v.as_ref())),
            _ => MemberTable::default(),
        }
    }
}

/// Visible slots for one name
struct Lookup<'t> {
    visible: Vec<&'t Slot>,
    declared: usize,
}

impl<'t> Lookup<'t> {
    fn first(&self) -> Option<&'t Slot> {
        self.visible.first().copied()
    }

    fn of_kind(&self, kind: MemberKind) -> Vec<&'t Slot> {
        self.visible.iter().copied().filter(|s| s.decl.kind() == kind).collect()
    }
}

fn dynamic_of(item: &HostItem, target: &HostValue) -> Option<Arc<dyn DynamicObject>> {
    if item.flags().contains(HostItemFlags::DIRECT_ACCESS) {
        return None;
    }
    match target {
        HostValue::Object(obj) => obj.dynamic().cloned(),
        _ => None,
    }
}

fn is_private(item: &HostItem) -> bool {
    item.flags().contains(HostItemFlags::PRIVATE_ACCESS)
}

/// Array errors surface as range errors; anything else is a host fault
pub(crate) fn element_error(err: HostError) -> ScriptError {
    match err {
        HostError::Range(message) => ScriptError::Range(message),
        other => ScriptError::Execution(ExecutionFault::host(other)),
    }
}

fn array_index(key: &ScriptValue) -> ScriptResult<usize> {
    match key.as_f64() {
        Some(n) if n >= 0.0 && n.fract() == 0.0 => Ok(n as usize),
        _ => Err(ScriptError::Range(format!("invalid array index {}", key.describe()))),
    }
}

/// No overload of `name`, hidden ones included, takes `count` arguments.
/// Only then may `obj.name(args)` call through a parameterless getter.
fn arity_miss(table: &MemberTable, name: &str, count: usize) -> bool {
    count > 0 && table.named(name).all(|slot| !slot.imp.accepts_arity(count))
}

fn not_callable(value: &ScriptValue) -> ScriptError {
    ScriptError::Script(ScriptFault::named(
        "TypeError",
        format!("{} is not a function", value.describe()),
    ))
}

// ============================================================================
// Member reads and writes
// ============================================================================

impl EngineCore {
    fn lookup<'t>(&self, table: &'t MemberTable, name: &str, private: bool) -> Lookup<'t> {
        let visible = table
            .slots()
            .iter()
            .filter(|slot| {
                let decision = self.policy.decide(&slot.decl, private);
                decision.is_visible() && decision.name == name
            })
            .collect();
        Lookup {
            visible,
            declared: table.named(name).count(),
        }
    }

    /// Read `name` on a proxy. Hidden and unknown members read as `undefined`.
    pub(crate) fn host_get(&self, item: &Arc<HostItem>, name: &str) -> ScriptResult<ScriptValue> {
        let target = item.target()?;
        if let Some(dynamic) = dynamic_of(item, &target) {
            let found = self.call_host(|ctx| dynamic.get_member(ctx, name).transpose())?;
            if let Some(value) = found {
                return self.to_script(value, &TypeRef::Object);
            }
        }

        let binding = Binding::of(item)?;
        let table = binding.table(item);
        let lookup = self.lookup(&table, name, is_private(item));
        if let Some(slot) = lookup.first() {
            return self.read_slot(item, &binding.this(), slot);
        }

        match &binding {
            Binding::Static(TypeRef::Named(ty)) => {
                if let Some(nested) = ty.find_nested(name) {
                    return self.to_script(HostValue::Type(TypeRef::named(nested)), &TypeRef::Type);
                }
                if let Some(raw) = ty.enum_value_of(name) {
                    return self.to_script(HostValue::Enum(EnumValue::new(ty, raw)), &TypeRef::named(ty));
                }
            }
            Binding::Plain(HostValue::Array(array)) if name == "length" || name == "Length" => {
                return Ok(ScriptValue::Int(array.len() as i64));
            }
            Binding::Plain(HostValue::Variable(cell)) if name == "value" || name == "Value" => {
                return self.to_script(cell.get(), cell.ty());
            }
            _ => {}
        }

        if name == TO_STRING {
            return Ok(ScriptValue::HostMember(BoundMember::new(item, name, BoundKind::Method)));
        }
        Ok(ScriptValue::Undefined)
    }

    fn read_slot(&self, item: &Arc<HostItem>, this: &HostValue, slot: &Slot) -> ScriptResult<ScriptValue> {
        let name = slot.decl.script_name();
        match slot.decl.kind() {
            MemberKind::Method => Ok(ScriptValue::HostMember(BoundMember::new(item, name, BoundKind::Method))),
            MemberKind::Indexer => Ok(ScriptValue::HostMember(BoundMember::new(item, name, BoundKind::Indexer))),
            MemberKind::Event => Ok(ScriptValue::HostMember(BoundMember::new(item, name, BoundKind::Event))),
            MemberKind::Constructor => Ok(ScriptValue::Undefined),
            MemberKind::Field | MemberKind::Property => match slot.imp.imp() {
                MemberImpl::Accessor { get: Some(get), .. } => {
                    let get = Arc::clone(get);
                    let value = self.call_host(|ctx| get(ctx, this, &[]))?;
                    self.to_script(value, slot.decl.ty())
                }
                MemberImpl::Accessor { get: None, .. } => Ok(ScriptValue::Undefined),
                MemberImpl::StructField(index) => match this {
                    HostValue::Struct(value) => {
                        let field = value.fields.get(*index).cloned().unwrap_or(HostValue::Null);
                        self.to_script(field, slot.decl.ty())
                    }
                    _ => Err(ScriptError::NotSupported(format!("'{}' is not a struct", this.type_ref()))),
                },
                _ => Err(ScriptError::NotSupported(format!("member '{}' has no implementation", name))),
            },
        }
    }

    /// Write `name` on a proxy
    pub(crate) fn host_set(&self, item: &Arc<HostItem>, name: &str, value: ScriptValue) -> ScriptResult<()> {
        let target = item.target()?;
        if let Some(dynamic) = dynamic_of(item, &target) {
            let host_value = self.to_host_value(&value);
            let handled = self.call_host(|ctx| dynamic.set_member(ctx, name, host_value).transpose())?;
            if handled.is_some() {
                return Ok(());
            }
        }

        let binding = Binding::of(item)?;
        if let Binding::Plain(HostValue::Variable(cell)) = &binding {
            if name == "value" || name == "Value" {
                let converted = self.to_host(&value, cell.ty())?;
                cell.set(converted.value);
                return Ok(());
            }
        }

        let table = binding.table(item);
        let private = is_private(item);
        let lookup = self.lookup(&table, name, private);
        let slot = lookup
            .first()
            .ok_or_else(|| ScriptError::MissingMember(name.to_string()))?;
        if !slot.decl.is_data() {
            return Err(ScriptError::AccessDenied(format!("cannot assign to {:?} '{}'", slot.decl.kind(), name)));
        }
        if !self.policy.decide(&slot.decl, private).is_writable() || !slot.imp.is_writable() {
            return Err(ScriptError::AccessDenied(format!("'{}' is read-only", name)));
        }

        let converted = self.to_host(&value, slot.decl.ty())?.value;
        match slot.imp.imp() {
            MemberImpl::Accessor { set: Some(set), .. } => {
                let set = Arc::clone(set);
                let this = binding.this();
                self.call_host(|ctx| set(ctx, &this, &[], converted))
            }
            MemberImpl::StructField(index) => {
                let cell = item
                    .value_cell()
                    .ok_or_else(|| ScriptError::NotSupported(format!("'{}' is not a boxed struct", name)))?;
                match &mut *cell.write() {
                    HostValue::Struct(boxed) => match boxed.fields.get_mut(*index) {
                        Some(field) => {
                            *field = converted;
                            Ok(())
                        }
                        None => Err(ScriptError::MissingMember(name.to_string())),
                    },
                    _ => Err(ScriptError::NotSupported(format!("'{}' is not a boxed struct", name))),
                }
            }
            _ => Err(ScriptError::AccessDenied(format!("'{}' is read-only", name))),
        }
    }

    // ========================================================================
    // Invocation
    // ========================================================================

    /// `obj.name(args)`
    pub(crate) fn host_invoke_member(
        &self,
        item: &Arc<HostItem>,
        name: &str,
        args: &[ScriptValue],
    ) -> ScriptResult<ScriptValue> {
        let target = item.target()?;
        if let Some(dynamic) = dynamic_of(item, &target) {
            let mut host_args: Vec<HostValue> = args.iter().map(|a| self.to_host_value(a)).collect();
            let result = self.call_host(|ctx| dynamic.invoke_member(ctx, name, &mut host_args).transpose())?;
            if let Some(value) = result {
                return self.to_script(value, &TypeRef::Object);
            }
        }
        self.invoke_static(item, name, args)
    }

    /// `obj.name(args)` against the static members only
    fn invoke_static(&self, item: &Arc<HostItem>, name: &str, args: &[ScriptValue]) -> ScriptResult<ScriptValue> {
        let binding = Binding::of(item)?;
        let this = binding.this();
        let table = binding.table(item);
        let lookup = self.lookup(&table, name, is_private(item));

        if let Some(first) = lookup.first() {
            return match first.decl.kind() {
                MemberKind::Method => {
                    let methods = lookup.of_kind(MemberKind::Method);
                    match self.resolve(name, &methods, lookup.declared, args) {
                        Ok((slot, prepared)) => self.invoke_slot(&this, slot, prepared, args),
                        Err(err) if arity_miss(&table, name, args.len()) => {
                            match methods
                                .iter()
                                .find(|s| s.imp.params().is_empty() && !matches!(s.imp.ty(), TypeRef::Void))
                            {
                                Some(getter) => {
                                    let value = self.invoke_slot(&this, getter, Prepared::empty(), &[])?;
                                    self.call_value(&value, args)
                                }
                                None => Err(err),
                            }
                        }
                        Err(err) => Err(err),
                    }
                }
                MemberKind::Indexer => self.indexer_get(&this, &lookup, args),
                MemberKind::Field | MemberKind::Property => {
                    let value = self.read_slot(item, &this, first)?;
                    if args.is_empty() {
                        Ok(value)
                    } else {
                        self.call_value(&value, args)
                    }
                }
                MemberKind::Event => Err(ScriptError::NotSupported(format!(
                    "event '{}' cannot be invoked; use connect",
                    name
                ))),
                MemberKind::Constructor => Err(ScriptError::MissingMember(name.to_string())),
            };
        }

        match (&binding, name) {
            (Binding::Static(ty), TO_STRING) if args.is_empty() => {
                Ok(ScriptValue::string(host_to_string(&HostValue::Type(ty.clone()))))
            }
            (_, TO_STRING) if args.is_empty() => Ok(ScriptValue::string(host_to_string(&this))),
            (Binding::Instance { this: HostValue::Delegate(delegate), .. }, INVOKE) => {
                self.invoke_delegate(delegate, args)
            }
            _ => Err(ScriptError::MissingMember(name.to_string())),
        }
    }

    pub(crate) fn invoke_slot(
        &self,
        this: &HostValue,
        slot: &Slot,
        prepared: Prepared,
        raw: &[ScriptValue],
    ) -> ScriptResult<ScriptValue> {
        match slot.imp.imp() {
            MemberImpl::Invoke(body) => {
                let body = Arc::clone(body);
                let mut prepared = prepared;
                let result = self.call_host(|ctx| body(ctx, this, &mut prepared.args))?;
                prepared.write_back();
                if *slot.decl.ty() == TypeRef::Void {
                    Ok(ScriptValue::Undefined)
                } else {
                    self.to_script(result, slot.decl.ty())
                }
            }
            MemberImpl::Intrinsic(id) => crate::helpers::call_intrinsic(self, *id, raw),
            MemberImpl::Abstract => Err(ScriptError::NotSupported(format!(
                "'{}' has no implementation",
                slot.decl.name()
            ))),
            _ => Err(ScriptError::NotSupported(format!("'{}' is not a method", slot.decl.name()))),
        }
    }

    /// `obj(args)`
    pub(crate) fn host_invoke(&self, item: &Arc<HostItem>, args: &[ScriptValue]) -> ScriptResult<ScriptValue> {
        let target = item.target()?;
        if let Some(dynamic) = dynamic_of(item, &target) {
            let mut host_args: Vec<HostValue> = args.iter().map(|a| self.to_host_value(a)).collect();
            let result = self.call_host(|ctx| dynamic.invoke(ctx, &mut host_args).transpose())?;
            if let Some(value) = result {
                return self.to_script(value, &TypeRef::Object);
            }
        }

        match Binding::of(item)? {
            Binding::Static(_) => self.host_construct(item, args),
            Binding::Instance { this: HostValue::Delegate(delegate), .. } => self.invoke_delegate(&delegate, args),
            binding @ Binding::Instance { .. } => match self.default_member(item, &binding) {
                Some(name) => self.invoke_static(item, &name, args),
                None => Err(ScriptError::NotSupported(format!(
                    "{} has no default member",
                    target.type_ref()
                ))),
            },
            Binding::Plain(HostValue::Array(_)) if args.len() == 1 => self.host_get_index(item, args),
            Binding::Plain(value) => Err(ScriptError::NotSupported(format!(
                "{} is not callable",
                value.type_ref()
            ))),
        }
    }

    /// Name of the call-syntax member: the declared default member, else a
    /// visible indexer
    fn default_member(&self, item: &HostItem, binding: &Binding) -> Option<String> {
        let Binding::Instance { ty, .. } = binding else {
            return None;
        };
        if let Some(name) = ty.default_member() {
            return Some(name.to_string());
        }
        let table = binding.table(item);
        let private = is_private(item);
        table
            .slots()
            .iter()
            .find(|s| s.decl.kind() == MemberKind::Indexer && self.policy.decide(&s.decl, private).is_visible())
            .map(|s| s.decl.script_name().to_string())
    }

    fn invoke_delegate(&self, delegate: &HostDelegate, args: &[ScriptValue]) -> ScriptResult<ScriptValue> {
        let signature = delegate
            .signature()
            .cloned()
            .ok_or_else(|| ScriptError::NotSupported(format!("{} is not a delegate type", delegate.ty().name())))?;
        let mut prepared = match self.prepare_args(&signature.params, args) {
            Ok(prepared) => prepared,
            Err(Mismatch::Arity) => return Err(ScriptError::MissingMember(INVOKE.to_string())),
            Err(Mismatch::Conversion(err)) => return Err(ScriptError::ArgumentConversion(err)),
        };
        let result = self.call_host(|_ctx| delegate.invoke(&mut prepared.args))?;
        prepared.write_back();
        if signature.ret == TypeRef::Void {
            Ok(ScriptValue::Undefined)
        } else {
            self.to_script(result, &signature.ret)
        }
    }

    // ========================================================================
    // Indexers
    // ========================================================================

    fn indexer_get(&self, this: &HostValue, lookup: &Lookup<'_>, keys: &[ScriptValue]) -> ScriptResult<ScriptValue> {
        let indexers = lookup.of_kind(MemberKind::Indexer);
        let (slot, prepared) = self.resolve(INDEXER_NAME, &indexers, lookup.declared, keys)?;
        match slot.imp.imp() {
            MemberImpl::Accessor { get: Some(get), .. } => {
                let get = Arc::clone(get);
                let value = self.call_host(|ctx| get(ctx, this, &prepared.args))?;
                self.to_script(value, slot.decl.ty())
            }
            _ => Err(ScriptError::AccessDenied(format!("indexer of {} is write-only", this.type_ref()))),
        }
    }

    fn indexer_set(
        &self,
        this: &HostValue,
        lookup: &Lookup<'_>,
        private: bool,
        keys: &[ScriptValue],
        value: ScriptValue,
    ) -> ScriptResult<()> {
        let indexers = lookup.of_kind(MemberKind::Indexer);
        let (slot, prepared) = self.resolve(INDEXER_NAME, &indexers, lookup.declared, keys)?;
        if !self.policy.decide(&slot.decl, private).is_writable() {
            return Err(ScriptError::AccessDenied(format!("indexer of {} is read-only", this.type_ref())));
        }
        match slot.imp.imp() {
            MemberImpl::Accessor { set: Some(set), .. } => {
                let set = Arc::clone(set);
                let converted = self.to_host(&value, slot.decl.ty())?.value;
                self.call_host(|ctx| set(ctx, this, &prepared.args, converted))
            }
            _ => Err(ScriptError::AccessDenied(format!("indexer of {} is read-only", this.type_ref()))),
        }
    }

    /// `obj[keys]`
    pub(crate) fn host_get_index(&self, item: &Arc<HostItem>, keys: &[ScriptValue]) -> ScriptResult<ScriptValue> {
        let target = item.target()?;
        if let Some(dynamic) = dynamic_of(item, &target) {
            let host_keys: Vec<HostValue> = keys.iter().map(|k| self.to_host_value(k)).collect();
            let found = self.call_host(|ctx| dynamic.get_index(ctx, &host_keys).transpose())?;
            if let Some(value) = found {
                return self.to_script(value, &TypeRef::Object);
            }
        }

        let binding = Binding::of(item)?;
        if let (Binding::Plain(HostValue::Array(array)), [key]) = (&binding, keys) {
            let element = array.get(array_index(key)?).map_err(element_error)?;
            return self.to_script(element, array.element());
        }

        let table = binding.table(item);
        let lookup = self.lookup(&table, INDEXER_NAME, is_private(item));
        if !lookup.of_kind(MemberKind::Indexer).is_empty() {
            return self.indexer_get(&binding.this(), &lookup, keys);
        }
        match keys {
            [ScriptValue::String(name)] => self.host_get(item, name),
            _ => Err(ScriptError::NotSupported(format!(
                "{} has no indexer",
                target.type_ref()
            ))),
        }
    }

    /// `obj[keys] = value`
    pub(crate) fn host_set_index(
        &self,
        item: &Arc<HostItem>,
        keys: &[ScriptValue],
        value: ScriptValue,
    ) -> ScriptResult<()> {
        let target = item.target()?;
        if let Some(dynamic) = dynamic_of(item, &target) {
            let host_keys: Vec<HostValue> = keys.iter().map(|k| self.to_host_value(k)).collect();
            let host_value = self.to_host_value(&value);
            let handled = self.call_host(|ctx| dynamic.set_index(ctx, &host_keys, host_value).transpose())?;
            if handled.is_some() {
                return Ok(());
            }
        }

        let binding = Binding::of(item)?;
        if let (Binding::Plain(HostValue::Array(array)), [key]) = (&binding, keys) {
            let index = array_index(key)?;
            let converted = self.to_host(&value, array.element())?.value;
            return array.set(index, converted).map_err(element_error);
        }

        let private = is_private(item);
        let table = binding.table(item);
        let lookup = self.lookup(&table, INDEXER_NAME, private);
        if !lookup.of_kind(MemberKind::Indexer).is_empty() {
            return self.indexer_set(&binding.this(), &lookup, private, keys, value);
        }
        match keys {
            [ScriptValue::String(name)] => self.host_set(item, name, value),
            _ => Err(ScriptError::NotSupported(format!(
                "{} has no indexer",
                target.type_ref()
            ))),
        }
    }

    /// `obj(keys) = value`
    pub(crate) fn host_set_invoke(
        &self,
        item: &Arc<HostItem>,
        keys: &[ScriptValue],
        value: ScriptValue,
    ) -> ScriptResult<()> {
        let binding = Binding::of(item)?;
        match &binding {
            Binding::Plain(HostValue::Array(_)) => self.host_set_index(item, keys, value),
            Binding::Instance { .. } => match self.default_member(item, &binding) {
                Some(name) => self.host_set_invoke_member(item, &name, keys, value),
                None => Err(ScriptError::NotSupported(format!(
                    "{} has no default member",
                    binding.this().type_ref()
                ))),
            },
            _ => Err(ScriptError::NotSupported("invalid assignment target".to_string())),
        }
    }

    /// `obj.name(keys) = value`
    pub(crate) fn host_set_invoke_member(
        &self,
        item: &Arc<HostItem>,
        name: &str,
        keys: &[ScriptValue],
        value: ScriptValue,
    ) -> ScriptResult<()> {
        let binding = Binding::of(item)?;
        let this = binding.this();
        let private = is_private(item);
        let table = binding.table(item);
        let lookup = self.lookup(&table, name, private);
        let first = lookup
            .first()
            .ok_or_else(|| ScriptError::MissingMember(name.to_string()))?;

        match first.decl.kind() {
            MemberKind::Indexer => self.indexer_set(&this, &lookup, private, keys, value),
            MemberKind::Field | MemberKind::Property if keys.is_empty() => self.host_set(item, name, value),
            MemberKind::Field | MemberKind::Property => {
                let inner = self.read_slot(item, &this, first)?;
                self.set_invoke_value(&inner, keys, value)
            }
            MemberKind::Method => {
                let getter = lookup
                    .of_kind(MemberKind::Method)
                    .into_iter()
                    .find(|s| s.imp.params().is_empty() && !matches!(s.imp.ty(), TypeRef::Void))
                    .ok_or_else(|| ScriptError::NotSupported(format!("cannot assign to method '{}'", name)))?;
                let inner = self.invoke_slot(&this, getter, Prepared::empty(), &[])?;
                self.set_invoke_value(&inner, keys, value)
            }
            _ => Err(ScriptError::AccessDenied(format!("cannot assign to '{}'", name))),
        }
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// `new T(args)` on a type handle
    pub(crate) fn host_construct(&self, item: &Arc<HostItem>, args: &[ScriptValue]) -> ScriptResult<ScriptValue> {
        let ty = match Binding::of(item)? {
            Binding::Static(ty) => ty,
            other => {
                return Err(ScriptError::NotSupported(format!(
                    "{} is not a type",
                    other.this().type_ref()
                )))
            }
        };

        match &ty {
            TypeRef::Named(host_type) if host_type.is_delegate() => match args {
                [ScriptValue::Function(function)] => {
                    let delegate = script_delegate(function, host_type)?;
                    let proxy = self.reference_proxy(&HostValue::Delegate(delegate), &ty, HostItemFlags::NONE)?;
                    Ok(ScriptValue::HostObject(proxy))
                }
                _ => Err(ScriptError::ArgumentConversion(ConversionError::incompatible(
                    args.first().map(|a| a.describe()).unwrap_or_else(|| "nothing".to_string()),
                    host_type.name(),
                ))),
            },
            TypeRef::Named(host_type) => {
                let table = MemberTable::constructors(host_type);
                let lookup = self.lookup_constructors(&table, is_private(item));
                if lookup.visible.is_empty() {
                    if host_type.is_struct() && args.is_empty() {
                        return self.to_script(HostValue::default_for(&ty), &ty);
                    }
                    return Err(ScriptError::NotSupported(format!(
                        "type {} has no accessible constructor",
                        host_type.name()
                    )));
                }
                let (slot, prepared) = self.resolve(host_type.name(), &lookup.visible, lookup.declared, args)?;
                self.invoke_slot(&HostValue::Null, slot, prepared, args)
            }
            TypeRef::Array(element) => match args {
                [length] => {
                    let length = array_index(length)?;
                    let array =
                        HostArray::with_length(element.as_ref().clone(), length).map_err(element_error)?;
                    self.to_script(HostValue::Array(array), &ty)
                }
                _ => Err(ScriptError::MissingMember(format!("{} constructor", ty))),
            },
            _ => Err(ScriptError::NotSupported(format!("type {} cannot be constructed", ty))),
        }
    }

    fn lookup_constructors<'t>(&self, table: &'t MemberTable, private: bool) -> Lookup<'t> {
        Lookup {
            visible: table
                .slots()
                .iter()
                .filter(|s| self.policy.decide(&s.decl, private).is_visible())
                .collect(),
            declared: table.slots().len(),
        }
    }

    // ========================================================================
    // Events
    // ========================================================================

    fn event_connect(&self, member: &BoundMember, args: &[ScriptValue]) -> ScriptResult<ScriptValue> {
        let item = &member.target;
        let binding = Binding::of(item)?;
        let table = binding.table(item);
        let lookup = self.lookup(&table, &member.name, is_private(item));
        let slot = lookup
            .of_kind(MemberKind::Event)
            .into_iter()
            .next()
            .ok_or_else(|| ScriptError::MissingMember(member.name.clone()))?;
        let (add, remove) = match slot.imp.imp() {
            MemberImpl::Event { add, remove } => (Arc::clone(add), Arc::clone(remove)),
            _ => return Err(ScriptError::NotSupported(format!("'{}' is not an event", member.name))),
        };

        let handler = match args {
            [handler] => self.to_host(handler, slot.decl.ty())?.value,
            _ => return Err(ScriptError::MissingMember("connect".to_string())),
        };
        let delegate = match handler {
            HostValue::Delegate(delegate) => delegate,
            other => {
                return Err(ScriptError::ArgumentConversion(ConversionError::incompatible(
                    other.type_ref(),
                    slot.decl.ty(),
                )))
            }
        };

        let this = binding.this();
        self.call_host(|_ctx| add(&this, &delegate))?;
        tracing::trace!(event = %member.name, "connected event handler");
        let connection = EventConnection::object(this, delegate, remove);
        self.to_script(HostValue::Object(connection), &TypeRef::named(&EVENT_CONNECTION))
    }

    // ========================================================================
    // Bound members
    // ========================================================================

    /// Read a property of a bound member (`Item.get`, `Event.connect`)
    pub(crate) fn bound_get(&self, member: &Arc<BoundMember>, name: &str) -> ScriptValue {
        let kind = match (member.kind, name) {
            (BoundKind::Indexer, "get") => BoundKind::IndexerGet,
            (BoundKind::Indexer, "set") => BoundKind::IndexerSet,
            (BoundKind::Event, "connect") => BoundKind::EventConnect,
            _ => return ScriptValue::Undefined,
        };
        ScriptValue::HostMember(BoundMember::new(&member.target, &member.name, kind))
    }

    /// Call a bound member
    pub(crate) fn bound_call(&self, member: &Arc<BoundMember>, args: &[ScriptValue]) -> ScriptResult<ScriptValue> {
        match member.kind {
            BoundKind::Method | BoundKind::Indexer | BoundKind::IndexerGet => {
                self.invoke_static(&member.target, &member.name, args)
            }
            BoundKind::IndexerSet => match args.split_last() {
                Some((value, keys)) => {
                    self.host_set_invoke_member(&member.target, &member.name, keys, value.clone())?;
                    Ok(ScriptValue::Undefined)
                }
                None => Err(ScriptError::MissingMember("set".to_string())),
            },
            BoundKind::Event => Err(ScriptError::NotSupported(format!(
                "event '{}' cannot be invoked; use connect",
                member.name
            ))),
            BoundKind::EventConnect => self.event_connect(member, args),
        }
    }

    /// `member.name(args)` on a bound member
    pub(crate) fn bound_invoke_member(
        &self,
        member: &Arc<BoundMember>,
        name: &str,
        args: &[ScriptValue],
    ) -> ScriptResult<ScriptValue> {
        match self.bound_get(member, name) {
            ScriptValue::HostMember(inner) => self.bound_call(&inner, args),
            _ => Err(ScriptError::MissingMember(name.to_string())),
        }
    }

    // ========================================================================
    // Generic dispatch
    // ========================================================================

    /// Call any callable script value
    pub(crate) fn call_value(&self, callee: &ScriptValue, args: &[ScriptValue]) -> ScriptResult<ScriptValue> {
        match callee {
            ScriptValue::Function(function) => self.call_function(function, args),
            ScriptValue::HostObject(item) => self.host_invoke(item, args),
            ScriptValue::HostMember(member) => self.bound_call(member, args),
            other => Err(not_callable(other)),
        }
    }

    /// `target(keys) = value` on any script value
    pub(crate) fn set_invoke_value(
        &self,
        target: &ScriptValue,
        keys: &[ScriptValue],
        value: ScriptValue,
    ) -> ScriptResult<()> {
        match target {
            ScriptValue::HostObject(item) => self.host_set_invoke(item, keys, value),
            ScriptValue::HostMember(member) if matches!(member.kind, BoundKind::Indexer | BoundKind::Method) => {
                self.host_set_invoke_member(&member.target, &member.name, keys, value)
            }
            other => Err(ScriptError::NotSupported(format!(
                "cannot assign through {}",
                other.describe()
            ))),
        }
    }

    // ========================================================================
    // Enumeration
    // ========================================================================

    /// Names script can reach on a proxy
    pub(crate) fn host_member_names(&self, item: &Arc<HostItem>) -> ScriptResult<Vec<String>> {
        let target = item.target()?;
        let mut names = match dynamic_of(item, &target) {
            Some(dynamic) => dynamic.member_names(),
            None => Vec::new(),
        };

        let binding = Binding::of(item)?;
        let private = is_private(item);
        let table = binding.table(item);
        for slot in table.slots() {
            let decision = self.policy.decide(&slot.decl, private);
            if decision.is_visible() {
                names.push(decision.name.to_string());
            }
        }
        match &binding {
            Binding::Static(TypeRef::Named(ty)) => {
                names.extend(ty.nested().iter().map(|t| t.name().to_string()));
                names.extend(ty.enum_values().iter().map(|(n, _)| n.clone()));
            }
            Binding::Plain(HostValue::Array(_)) => names.push("length".to_string()),
            Binding::Plain(HostValue::Variable(_)) => names.push("value".to_string()),
            _ => {}
        }

        let mut seen = rustc_hash::FxHashSet::default();
        names.retain(|n| seen.insert(n.clone()));
        Ok(names)
    }
}
