//! Value marshaling between host and script
//!
//! Host → script ([`EngineCore::to_script`]) is total: every host value has a
//! script representation. Script → host ([`EngineCore::to_host`]) is driven by
//! a declared target type and reports the [`ConversionRule`] it needed, which
//! the binder uses to rank overloads.
//!
//! Reference-typed host values (objects, arrays, delegates, variables) become
//! cached proxies; value-typed values (enums, structs, boxed scalars) become
//! uncached value proxies compared by value; primitives become script
//! primitives.

pub mod rules;

use std::sync::Arc;

use hostbind_sdk::{
    DateTime, Decimal, DelegateSignature, DelegateTarget, HostArray, HostDelegate, HostError,
    HostResult, HostType, HostValue, HostVariable, NumericKind, ParamMode, ScriptHandle, TypeRef,
    Utc,
};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::engine::EngineCore;
use crate::error::{ConversionError, ScriptError, ScriptResult};
use crate::lifetime::{HostItem, HostTarget};
use crate::options::{HostItemFlags, NullExport};
use crate::value::{ScriptArray, ScriptFunction, ScriptValue};

pub use rules::{BindCost, ConversionRule};

use rules::{numeric_penalty, numeric_rule, script_double_rule, script_int_kind, script_int_rule};

/// Outcome of a script → host conversion
#[derive(Debug, Clone)]
pub struct Converted {
    /// Converted value
    pub value: HostValue,
    /// Rule the conversion needed
    pub rule: ConversionRule,
    /// Tie-break penalty among candidates with equal rules
    pub penalty: u32,
}

impl Converted {
    fn new(value: HostValue, rule: ConversionRule, penalty: u32) -> Self {
        Converted {
            value,
            rule,
            penalty,
        }
    }
}

/// Penalty for boxing into an untyped target. `Dynamic` ranks after `Object`.
fn box_penalty(target: &TypeRef) -> u32 {
    match target {
        TypeRef::Object => 1,
        TypeRef::Dynamic => 2,
        _ => 0,
    }
}

// ============================================================================
// Numeric conversions
// ============================================================================

/// Script integer to a numeric kind, range-checked
pub(crate) fn int_to_numeric(value: i64, kind: NumericKind) -> Result<HostValue, ConversionError> {
    match kind {
        NumericKind::Single => Ok(HostValue::Single(value as f32)),
        NumericKind::Double => Ok(HostValue::Double(value as f64)),
        NumericKind::Decimal => Ok(HostValue::Decimal(Decimal::from(value))),
        integral => HostValue::from_i128(integral, value as i128)
            .ok_or_else(|| ConversionError::overflow(value, integral)),
    }
}

/// Script floating-point value to a non-integral numeric kind, range-checked
pub(crate) fn double_to_numeric(value: f64, kind: NumericKind) -> Result<HostValue, ConversionError> {
    match kind {
        NumericKind::Double => Ok(HostValue::Double(value)),
        NumericKind::Single => {
            if value.is_finite() && value.abs() > f32::MAX as f64 {
                Err(ConversionError::overflow(value, kind))
            } else {
                Ok(HostValue::Single(value as f32))
            }
        }
        NumericKind::Decimal => Decimal::from_f64(value)
            .map(HostValue::Decimal)
            .ok_or_else(|| ConversionError::overflow(value, kind)),
        integral => Err(ConversionError::incompatible(
            format!("number {}", value),
            integral,
        )),
    }
}

/// Host numeric to another numeric kind, range-checked
pub(crate) fn convert_numeric(value: &HostValue, kind: NumericKind) -> Result<HostValue, ConversionError> {
    let from = value
        .numeric_kind()
        .ok_or_else(|| ConversionError::incompatible(value.type_ref(), kind))?;
    if from == kind {
        return Ok(value.clone());
    }
    if from.is_integral() {
        let raw = value.to_i128().unwrap_or_default();
        return match kind {
            NumericKind::Single => Ok(HostValue::Single(raw as f32)),
            NumericKind::Double => Ok(HostValue::Double(raw as f64)),
            _ => HostValue::from_i128(kind, raw).ok_or_else(|| ConversionError::overflow(raw, kind)),
        };
    }
    if kind.is_integral() {
        return Err(ConversionError::incompatible(from, kind));
    }
    match (value, kind) {
        (HostValue::Decimal(d), _) => {
            let d = d.to_f64().ok_or_else(|| ConversionError::overflow(d, kind))?;
            double_to_numeric(d, kind)
        }
        (other, _) => double_to_numeric(other.to_f64().unwrap_or(f64::NAN), kind),
    }
}

// ============================================================================
// Script-backed delegates
// ============================================================================

/// Delegate target that calls a script function
struct ScriptDelegate {
    function: ScriptFunction,
    signature: Arc<DelegateSignature>,
    handle: ScriptHandle,
}

impl DelegateTarget for ScriptDelegate {
    fn invoke(&self, args: &mut [HostValue]) -> HostResult<HostValue> {
        let engine = self.function.engine()?;
        engine
            .call_script_delegate(&self.function, &self.signature, args)
            .map_err(HostError::from)
    }

    fn script_handle(&self) -> Option<&ScriptHandle> {
        Some(&self.handle)
    }
}

/// Wrap `function` as a delegate of type `ty`
pub(crate) fn script_delegate(function: &ScriptFunction, ty: &Arc<HostType>) -> Result<HostDelegate, ConversionError> {
    let signature = ty
        .delegate_signature()
        .cloned()
        .ok_or_else(|| ConversionError::incompatible(format!("function {}", function.name()), ty.name()))?;
    let target = ScriptDelegate {
        function: function.clone(),
        signature,
        handle: ScriptHandle(Arc::new(ScriptValue::Function(function.clone()))),
    };
    HostDelegate::new(ty, Arc::new(target))
        .map_err(|_| ConversionError::incompatible(format!("function {}", function.name()), ty.name()))
}

// ============================================================================
// Host → script
// ============================================================================

impl EngineCore {
    /// Marshal a host value for script, given the type it was declared as
    pub(crate) fn to_script(&self, value: HostValue, declared: &TypeRef) -> ScriptResult<ScriptValue> {
        Ok(match value {
            HostValue::Undefined => ScriptValue::Undefined,
            HostValue::Null => self.export_null(declared),
            HostValue::Bool(b) => ScriptValue::Bool(b),
            HostValue::Int8(v) => ScriptValue::Int(v as i64),
            HostValue::UInt8(v) => ScriptValue::Int(v as i64),
            HostValue::Int16(v) => ScriptValue::Int(v as i64),
            HostValue::UInt16(v) => ScriptValue::Int(v as i64),
            HostValue::Int32(v) => ScriptValue::Int(v as i64),
            HostValue::UInt32(v) => ScriptValue::Int(v as i64),
            HostValue::Int64(v) => ScriptValue::Int(v),
            HostValue::UInt64(v) => match i64::try_from(v) {
                Ok(v) => ScriptValue::Int(v),
                Err(_) => ScriptValue::Double(v as f64),
            },
            HostValue::Single(v) => ScriptValue::Double(v as f64),
            HostValue::Double(v) => ScriptValue::Double(v),
            HostValue::Decimal(v) => ScriptValue::Double(v.to_f64().unwrap_or(f64::NAN)),
            HostValue::Char(c) => ScriptValue::String(Arc::from(c.to_string())),
            HostValue::String(s) => ScriptValue::String(s),
            HostValue::DateTime(dt) if self.options.enable_date_time_conversion => {
                ScriptValue::Date(dt.timestamp_millis() as f64)
            }
            value @ (HostValue::DateTime(_) | HostValue::Enum(_) | HostValue::Struct(_)) => {
                ScriptValue::HostObject(self.value_proxy(value, HostItemFlags::NONE)?)
            }
            HostValue::Buffer(buffer) => ScriptValue::ArrayBuffer(buffer),
            HostValue::View(view) => ScriptValue::TypedArray(view),
            HostValue::Type(ty) => {
                self.reserve_proxy()?;
                ScriptValue::HostObject(self.cache.type_handle(&ty, HostItemFlags::NONE)?)
            }
            HostValue::Script(handle) => match handle.downcast_ref::<ScriptValue>() {
                Some(inner) => self.adopt(inner.clone())?,
                None => ScriptValue::Undefined,
            },
            HostValue::Array(array) if self.options.marshal_arrays_by_value => {
                let element = array.element().clone();
                let items = array
                    .to_vec()
                    .into_iter()
                    .map(|item| self.to_script(item, &element))
                    .collect::<ScriptResult<Vec<_>>>()?;
                ScriptValue::Array(ScriptArray::new(items))
            }
            HostValue::Delegate(delegate) => match self.unwrap_delegate(&delegate) {
                Some(function) => ScriptValue::Function(function),
                None => {
                    let value = HostValue::Delegate(delegate);
                    ScriptValue::HostObject(self.reference_proxy(&value, declared, HostItemFlags::NONE)?)
                }
            },
            value => ScriptValue::HostObject(self.reference_proxy(&value, declared, HostItemFlags::NONE)?),
        })
    }

    fn export_null(&self, declared: &TypeRef) -> ScriptValue {
        let untyped = matches!(
            declared.underlying(),
            TypeRef::Object | TypeRef::Dynamic | TypeRef::Void
        );
        if self.options.enable_null_result_wrapping && !untyped {
            return ScriptValue::WrappedNull(declared.clone());
        }
        match self.options.null_export {
            NullExport::Null => ScriptValue::Null,
            NullExport::Undefined => ScriptValue::Undefined,
        }
    }

    /// A script function of this engine behind a delegate
    fn unwrap_delegate(&self, delegate: &HostDelegate) -> Option<ScriptFunction> {
        match delegate.script_handle()?.downcast_ref::<ScriptValue>()? {
            ScriptValue::Function(f) if f.engine_id() == self.id => Some(f.clone()),
            _ => None,
        }
    }

    /// Proxy for a reference-typed value. The declared type becomes the
    /// proxy's view only when it is an interface the value implements.
    pub(crate) fn reference_proxy(
        &self,
        value: &HostValue,
        declared: &TypeRef,
        flags: HostItemFlags,
    ) -> ScriptResult<Arc<HostItem>> {
        let view = declared
            .host_type()
            .filter(|ty| ty.is_interface() && value.is_instance_of(declared))
            .cloned();
        self.reserve_proxy()?;
        self.cache.reference(value, view, flags)
    }

    /// Uncached proxy for a value-typed value
    pub(crate) fn value_proxy(&self, value: HostValue, flags: HostItemFlags) -> ScriptResult<Arc<HostItem>> {
        self.reserve_proxy()?;
        self.cache.value(value, flags)
    }

    /// Enforce the runtime heap limit before creating a proxy
    fn reserve_proxy(&self) -> ScriptResult<()> {
        if !self.heap.is_over_limit() {
            return Ok(());
        }
        self.sweep();
        if self.heap.is_over_limit() {
            tracing::warn!(engine = self.id, "runtime heap limit exceeded");
            return Err(ScriptError::fault("runtime heap limit exceeded"));
        }
        Ok(())
    }

    /// Re-wrap a proxy created by another engine for this one
    pub(crate) fn adopt(&self, value: ScriptValue) -> ScriptResult<ScriptValue> {
        let item = match &value {
            ScriptValue::HostObject(item) if item.engine_id() != self.id => Arc::clone(item),
            _ => return Ok(value),
        };
        let adopted = match item.host_target() {
            HostTarget::Type(ty) => self.cache.type_handle(ty, item.flags())?,
            HostTarget::Value(cell) => self.value_proxy(cell.read().clone(), item.flags())?,
            HostTarget::Reference(_) => {
                let target = item.target()?;
                self.reserve_proxy()?;
                self.cache.reference(&target, item.view().cloned(), item.flags())?
            }
        };
        Ok(ScriptValue::HostObject(adopted))
    }

    // ========================================================================
    // Script → host
    // ========================================================================

    /// Convert a script value to `target`
    pub(crate) fn to_host(&self, value: &ScriptValue, target: &TypeRef) -> Result<Converted, ConversionError> {
        let incompatible = || ConversionError::incompatible(value.describe(), target);

        if value.is_nullish() {
            return match target {
                TypeRef::Object | TypeRef::Dynamic if value.is_undefined() => Ok(Converted::new(
                    HostValue::Undefined,
                    ConversionRule::Exact,
                    box_penalty(target),
                )),
                t if t.accepts_null() => Ok(Converted::new(
                    HostValue::Null,
                    ConversionRule::Exact,
                    box_penalty(target),
                )),
                _ => Err(incompatible()),
            };
        }

        let boxed = self.proxy_target(value);
        match target {
            TypeRef::Nullable(inner) => self.to_host(value, inner),
            TypeRef::Object | TypeRef::Dynamic => Ok(Converted::new(
                self.to_host_value(value),
                ConversionRule::Widening,
                box_penalty(target),
            )),
            TypeRef::Void => Err(incompatible()),
            TypeRef::Bool => match (value, boxed) {
                (ScriptValue::Bool(b), _) => Ok(Converted::new(HostValue::Bool(*b), ConversionRule::Exact, 0)),
                (_, Some(v @ HostValue::Bool(_))) => Ok(Converted::new(v, ConversionRule::Exact, 0)),
                _ => Err(incompatible()),
            },
            TypeRef::Char => match (value, boxed) {
                (ScriptValue::String(s), _) => {
                    let mut chars = s.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => Ok(Converted::new(HostValue::Char(c), ConversionRule::Widening, 0)),
                        _ => Err(incompatible()),
                    }
                }
                (_, Some(v @ HostValue::Char(_))) => Ok(Converted::new(v, ConversionRule::Exact, 0)),
                _ => Err(incompatible()),
            },
            TypeRef::String => match value {
                ScriptValue::String(s) => Ok(Converted::new(
                    HostValue::String(Arc::clone(s)),
                    ConversionRule::Exact,
                    0,
                )),
                _ => Err(incompatible()),
            },
            TypeRef::DateTime => match (value, boxed) {
                (ScriptValue::Date(ms), _) => {
                    let dt = date_from_millis(*ms).ok_or_else(|| ConversionError::overflow(ms, target))?;
                    Ok(Converted::new(HostValue::DateTime(dt), ConversionRule::Exact, 0))
                }
                (_, Some(v @ HostValue::DateTime(_))) => Ok(Converted::new(v, ConversionRule::Exact, 0)),
                _ => Err(incompatible()),
            },
            TypeRef::Numeric(kind) => self.to_numeric(value, boxed, *kind),
            TypeRef::Named(ty) => self.to_named(value, boxed, ty),
            TypeRef::Array(element) => match (value, boxed) {
                (_, Some(HostValue::Array(array))) if array.element() == element.as_ref() => Ok(
                    Converted::new(HostValue::Array(array), ConversionRule::Exact, 0),
                ),
                (ScriptValue::Array(items), _) => {
                    let mut rule = ConversionRule::Widening;
                    let mut converted = Vec::with_capacity(items.len());
                    for item in items.to_vec() {
                        let c = self.to_host(&item, element)?;
                        rule = rule.max(c.rule);
                        converted.push(c.value);
                    }
                    Ok(Converted::new(
                        HostValue::Array(HostArray::new(element.as_ref().clone(), converted)),
                        rule,
                        0,
                    ))
                }
                _ => Err(incompatible()),
            },
            TypeRef::Buffer => match value {
                ScriptValue::ArrayBuffer(b) => Ok(Converted::new(HostValue::Buffer(b.clone()), ConversionRule::Exact, 0)),
                _ => Err(incompatible()),
            },
            TypeRef::View => match value {
                ScriptValue::TypedArray(v) => Ok(Converted::new(HostValue::View(v.clone()), ConversionRule::Exact, 0)),
                _ => Err(incompatible()),
            },
            TypeRef::Type => match boxed {
                Some(v @ HostValue::Type(_)) => Ok(Converted::new(v, ConversionRule::Exact, 0)),
                _ => Err(incompatible()),
            },
            TypeRef::Variable(inner) => match boxed {
                Some(HostValue::Variable(var)) if var.ty() == inner.as_ref() => {
                    Ok(Converted::new(HostValue::Variable(var), ConversionRule::Exact, 0))
                }
                _ => Err(incompatible()),
            },
        }
    }

    /// Host value behind a live proxy
    fn proxy_target(&self, value: &ScriptValue) -> Option<HostValue> {
        match value {
            ScriptValue::HostObject(item) => item.target().ok(),
            _ => None,
        }
    }

    fn to_numeric(
        &self,
        value: &ScriptValue,
        boxed: Option<HostValue>,
        kind: NumericKind,
    ) -> Result<Converted, ConversionError> {
        let (rule, converted) = match (value, boxed) {
            (ScriptValue::Int(i), _) => (script_int_rule(*i, kind), int_to_numeric(*i, kind)?),
            (ScriptValue::Double(d), _) => {
                let rule = script_double_rule(kind);
                if !rule.is_allowed() {
                    return Err(ConversionError::incompatible(value.describe(), kind));
                }
                (rule, double_to_numeric(*d, kind)?)
            }
            (_, Some(host)) if host.numeric_kind().is_some() => {
                let from = host.numeric_kind().unwrap_or(kind);
                let rule = numeric_rule(from, kind);
                if !rule.is_allowed() {
                    return Err(ConversionError::incompatible(host.type_ref(), kind));
                }
                (rule, convert_numeric(&host, kind)?)
            }
            _ => return Err(ConversionError::incompatible(value.describe(), kind)),
        };
        Ok(Converted::new(converted, rule, numeric_penalty(kind)))
    }

    fn to_named(
        &self,
        value: &ScriptValue,
        boxed: Option<HostValue>,
        ty: &Arc<HostType>,
    ) -> Result<Converted, ConversionError> {
        let target = TypeRef::Named(Arc::clone(ty));
        match (value, boxed) {
            (_, Some(host)) if host.is_instance_of(&target) => {
                let distance = match host.type_ref() {
                    TypeRef::Named(actual) => {
                        let chain = actual.chain();
                        chain
                            .iter()
                            .position(|t| t.key() == ty.key())
                            .unwrap_or(chain.len())
                    }
                    _ => 0,
                };
                Ok(Converted::new(host, ConversionRule::Exact, distance as u32))
            }
            (ScriptValue::Function(function), _) if ty.is_delegate() => Ok(Converted::new(
                HostValue::Delegate(script_delegate(function, ty)?),
                ConversionRule::Widening,
                0,
            )),
            _ => Err(ConversionError::incompatible(value.describe(), &target)),
        }
    }

    /// Convert for an untyped (`Object`) target. Never fails.
    pub(crate) fn to_host_value(&self, value: &ScriptValue) -> HostValue {
        match value {
            ScriptValue::Undefined => HostValue::Undefined,
            ScriptValue::Null | ScriptValue::WrappedNull(_) => HostValue::Null,
            ScriptValue::Bool(b) => HostValue::Bool(*b),
            ScriptValue::Int(i) => match script_int_kind(*i) {
                NumericKind::Int32 => HostValue::Int32(*i as i32),
                _ => HostValue::Int64(*i),
            },
            ScriptValue::Double(d) => HostValue::Double(*d),
            ScriptValue::String(s) => HostValue::String(Arc::clone(s)),
            ScriptValue::Date(ms) if self.options.enable_date_time_conversion => match date_from_millis(*ms) {
                Some(dt) => HostValue::DateTime(dt),
                None => HostValue::Script(ScriptHandle(Arc::new(value.clone()))),
            },
            ScriptValue::ArrayBuffer(b) => HostValue::Buffer(b.clone()),
            ScriptValue::TypedArray(v) => HostValue::View(v.clone()),
            ScriptValue::HostObject(item) => match item.target() {
                Ok(target) => target,
                Err(_) => HostValue::Null,
            },
            other => HostValue::Script(ScriptHandle(Arc::new(other.clone()))),
        }
    }

    /// Call a script function on behalf of a host delegate
    pub(crate) fn call_script_delegate(
        &self,
        function: &ScriptFunction,
        signature: &DelegateSignature,
        args: &mut [HostValue],
    ) -> ScriptResult<HostValue> {
        let auto_variables = self.options.enable_auto_host_variables;
        let mut cells = Vec::new();
        let mut script_args = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let param = signature.params.get(i);
            let declared = param.map(|p| p.ty.clone()).unwrap_or(TypeRef::Object);
            let by_ref = matches!(param.map(|p| p.mode), Some(ParamMode::Ref | ParamMode::Out));
            if by_ref && auto_variables {
                let cell = HostVariable::new(declared.clone(), arg.clone());
                let cell_type = TypeRef::Variable(Box::new(declared));
                script_args.push(self.to_script(HostValue::Variable(cell.clone()), &cell_type)?);
                cells.push((i, cell));
            } else {
                script_args.push(self.to_script(arg.clone(), &declared)?);
            }
        }

        let result = self.call_function(function, &script_args)?;
        for (i, cell) in cells {
            args[i] = cell.get();
        }
        if signature.ret == TypeRef::Void {
            return Ok(HostValue::Null);
        }
        Ok(self.to_host(&result, &signature.ret)?.value)
    }
}

fn date_from_millis(ms: f64) -> Option<DateTime<Utc>> {
    if !ms.is_finite() {
        return None;
    }
    DateTime::<Utc>::from_timestamp_millis(ms as i64)
}
