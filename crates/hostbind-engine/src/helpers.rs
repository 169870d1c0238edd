//! Script-facing helper functions
//!
//! [`HOST_FUNCTIONS`] is a static host type whose members are engine
//! intrinsics. Exposing it under a global name (usually `host`) gives script:
//!
//! | Helper                  | Result                                                   |
//! |-------------------------|----------------------------------------------------------|
//! | `cast(T, v)`            | `v` converted to `T`; conversion errors propagate        |
//! | `isType(T, v)`          | is `v` an instance of `T`?                               |
//! | `asType(T, v)`          | `v` viewed as `T`, or null                               |
//! | `del(obj, name)`        | remove a member of a dynamic host object or script object |
//! | `newArr([T,] n)`        | host array of `n` elements (`Object` by default)         |
//! | `newObj([T, ...args])`  | script object, or a constructed `T`                      |
//! | `newVar(T[, init])`     | host variable for by-ref and out arguments               |
//! | `flags(a, b, ...)`      | combined value of a flags enum                           |
//! | `toSByte` .. `toChar`   | value boxed as an exact host numeric or char             |
//! | `typeOf(v)`             | type handle of `v`'s runtime type                        |
//! | `toStaticType(v)`       | proxy that bypasses dynamic dispatch                     |
//! | `isNull(v)`             | null, undefined or a wrapped typed null?                 |
//!
//! Explicit numeric coercions truncate fractional values toward zero; any
//! value outside the target range raises an overflow error.

use std::sync::Arc;

use hostbind_sdk::{
    EnumValue, HostArray, HostType, HostValue, HostVariable, MemberDescriptor, NumericKind,
    ParamInfo, TypeRef,
};
use once_cell::sync::Lazy;
use rust_decimal::prelude::ToPrimitive;

use crate::binder::element_error;
use crate::engine::EngineCore;
use crate::error::{ConversionError, ScriptError, ScriptResult};
use crate::marshal::{convert_numeric, double_to_numeric, int_to_numeric};
use crate::options::HostItemFlags;
use crate::value::{ScriptObject, ScriptValue};

// ============================================================================
// Intrinsic ids
// ============================================================================

const CAST: u16 = 0x0100;
const IS_TYPE: u16 = 0x0101;
const AS_TYPE: u16 = 0x0102;
const DEL: u16 = 0x0103;
const NEW_ARR: u16 = 0x0104;
const NEW_OBJ: u16 = 0x0105;
const NEW_VAR: u16 = 0x0106;
const FLAGS: u16 = 0x0107;
const TO_NUMERIC_BASE: u16 = 0x0110;
const TO_CHAR: u16 = 0x011B;
const TYPE_OF: u16 = 0x0120;
const TO_STATIC_TYPE: u16 = 0x0121;
const IS_NULL: u16 = 0x0122;

/// Numeric coercions in intrinsic-id order starting at `0x0110`
const NUMERIC_COERCIONS: [(&str, NumericKind); 11] = [
    ("toSByte", NumericKind::Int8),
    ("toByte", NumericKind::UInt8),
    ("toInt16", NumericKind::Int16),
    ("toUInt16", NumericKind::UInt16),
    ("toInt32", NumericKind::Int32),
    ("toUInt32", NumericKind::UInt32),
    ("toInt64", NumericKind::Int64),
    ("toUInt64", NumericKind::UInt64),
    ("toSingle", NumericKind::Single),
    ("toDouble", NumericKind::Double),
    ("toDecimal", NumericKind::Decimal),
];

fn helper(name: &str, id: u16) -> MemberDescriptor {
    MemberDescriptor::intrinsic(
        name,
        vec![ParamInfo::params("args", TypeRef::Object)],
        TypeRef::Object,
        id,
    )
}

/// The helper type
pub static HOST_FUNCTIONS: Lazy<Arc<HostType>> = Lazy::new(|| {
    let mut builder = HostType::static_class("HostFunctions")
        .member(helper("cast", CAST))
        .member(helper("isType", IS_TYPE))
        .member(helper("asType", AS_TYPE))
        .member(helper("del", DEL))
        .member(helper("newArr", NEW_ARR))
        .member(helper("newObj", NEW_OBJ))
        .member(helper("newVar", NEW_VAR))
        .member(helper("flags", FLAGS));
    for (offset, (name, _)) in NUMERIC_COERCIONS.iter().enumerate() {
        builder = builder.member(helper(name, TO_NUMERIC_BASE + offset as u16));
    }
    builder
        .member(helper("toChar", TO_CHAR))
        .member(helper("typeOf", TYPE_OF))
        .member(helper("toStaticType", TO_STATIC_TYPE))
        .member(helper("isNull", IS_NULL))
        .build()
});

// ============================================================================
// Argument helpers
// ============================================================================

fn arg(args: &[ScriptValue], index: usize) -> ScriptValue {
    args.get(index).cloned().unwrap_or(ScriptValue::Undefined)
}

fn type_arg(value: &ScriptValue) -> ScriptResult<TypeRef> {
    value
        .as_host_item()
        .and_then(|item| item.type_ref().cloned())
        .ok_or_else(|| ConversionError::incompatible(value.describe(), "Type").into())
}

fn is_type_handle(value: &ScriptValue) -> bool {
    value.as_host_item().map(|item| item.is_type()).unwrap_or(false)
}

fn length_arg(value: &ScriptValue) -> ScriptResult<usize> {
    match value.as_i64() {
        Some(n) => usize::try_from(n).map_err(|_| ConversionError::overflow(n, "array length").into()),
        None => Err(ConversionError::incompatible(value.describe(), "array length").into()),
    }
}

/// Explicit numeric coercion: fractional values truncate, range is checked
fn coerce_numeric(core: &EngineCore, value: &ScriptValue, kind: NumericKind) -> ScriptResult<HostValue> {
    let from_double = |d: f64| -> Result<HostValue, ConversionError> {
        if !kind.is_integral() {
            return double_to_numeric(d, kind);
        }
        let truncated = d.trunc();
        if !truncated.is_finite() || truncated.abs() > i128::MAX as f64 {
            return Err(ConversionError::overflow(d, kind));
        }
        HostValue::from_i128(kind, truncated as i128).ok_or_else(|| ConversionError::overflow(d, kind))
    };

    let converted = match value {
        ScriptValue::Int(i) => int_to_numeric(*i, kind)?,
        ScriptValue::Double(d) => from_double(*d)?,
        ScriptValue::String(s) => match s.trim().parse::<f64>() {
            Ok(d) => from_double(d)?,
            Err(_) => return Err(ConversionError::incompatible(value.describe(), kind).into()),
        },
        other => {
            let host = core.to_host_value(other);
            match host {
                HostValue::Single(_) | HostValue::Double(_) if kind.is_integral() => {
                    from_double(host.to_f64().unwrap_or(f64::NAN))?
                }
                HostValue::Decimal(d) if kind.is_integral() => {
                    let truncated = d.trunc();
                    truncated
                        .to_i128()
                        .and_then(|raw| HostValue::from_i128(kind, raw))
                        .ok_or_else(|| ConversionError::overflow(d, kind))?
                }
                HostValue::Char(c) => int_to_numeric(c as u32 as i64, kind)?,
                numeric if numeric.numeric_kind().is_some() => convert_numeric(&numeric, kind)?,
                _ => return Err(ConversionError::incompatible(other.describe(), kind).into()),
            }
        }
    };
    Ok(converted)
}

fn coerce_char(core: &EngineCore, value: &ScriptValue) -> ScriptResult<HostValue> {
    let code = match value {
        ScriptValue::String(s) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => return Ok(HostValue::Char(c)),
                _ => return Err(ConversionError::incompatible(value.describe(), "Char").into()),
            }
        }
        other => match coerce_numeric(core, other, NumericKind::UInt16)? {
            HostValue::UInt16(code) => code,
            _ => return Err(ConversionError::incompatible(other.describe(), "Char").into()),
        },
    };
    char::from_u32(code as u32)
        .map(HostValue::Char)
        .ok_or_else(|| ConversionError::incompatible(code, "Char").into())
}

// ============================================================================
// Dispatch
// ============================================================================

/// Run helper `id` with the raw script arguments
pub(crate) fn call_intrinsic(core: &EngineCore, id: u16, args: &[ScriptValue]) -> ScriptResult<ScriptValue> {
    match id {
        CAST => {
            let ty = type_arg(&arg(args, 0))?;
            let converted = core.to_host(&arg(args, 1), &ty)?.value;
            core.to_script(converted, &ty)
        }
        IS_TYPE => {
            let ty = type_arg(&arg(args, 0))?;
            Ok(ScriptValue::Bool(core.to_host_value(&arg(args, 1)).is_instance_of(&ty)))
        }
        AS_TYPE => {
            let ty = type_arg(&arg(args, 0))?;
            let value = core.to_host_value(&arg(args, 1));
            if value.is_instance_of(&ty) {
                core.to_script(value, &ty)
            } else {
                Ok(ScriptValue::Null)
            }
        }
        DEL => delete_member(core, &arg(args, 0), &arg(args, 1)),
        NEW_ARR => {
            let (element, length) = if is_type_handle(&arg(args, 0)) {
                (type_arg(&arg(args, 0))?, args.get(1))
            } else {
                (TypeRef::Object, args.first())
            };
            let length = match length {
                Some(value) => length_arg(value)?,
                None => 0,
            };
            let ty = TypeRef::array(element.clone());
            let array = HostArray::with_length(element, length).map_err(element_error)?;
            core.to_script(HostValue::Array(array), &ty)
        }
        NEW_OBJ => match args.split_first() {
            None => Ok(ScriptValue::Object(ScriptObject::new())),
            Some((ScriptValue::HostObject(item), rest)) if item.is_type() => core.host_construct(item, rest),
            Some((other, _)) => Err(ConversionError::incompatible(other.describe(), "Type").into()),
        },
        NEW_VAR => {
            let ty = type_arg(&arg(args, 0))?;
            let initial = match args.get(1) {
                Some(value) => core.to_host(value, &ty)?.value,
                None => HostValue::default_for(&ty),
            };
            let cell = HostVariable::new(ty.clone(), initial);
            core.to_script(HostValue::Variable(cell), &TypeRef::Variable(Box::new(ty)))
        }
        FLAGS => combine_flags(core, args),
        TO_CHAR => {
            let value = coerce_char(core, &arg(args, 0))?;
            Ok(ScriptValue::HostObject(core.value_proxy(value, HostItemFlags::NONE)?))
        }
        id if (TO_NUMERIC_BASE..TO_CHAR).contains(&id) => {
            let (_, kind) = NUMERIC_COERCIONS[(id - TO_NUMERIC_BASE) as usize];
            let value = coerce_numeric(core, &arg(args, 0), kind)?;
            Ok(ScriptValue::HostObject(core.value_proxy(value, HostItemFlags::NONE)?))
        }
        TYPE_OF => {
            let value = arg(args, 0);
            if is_type_handle(&value) {
                return Ok(value);
            }
            if value.is_nullish() {
                return Err(ConversionError::incompatible(value.describe(), "Type").into());
            }
            let ty = core.to_host_value(&value).type_ref();
            core.to_script(HostValue::Type(ty), &TypeRef::Type)
        }
        TO_STATIC_TYPE => to_static_type(core, arg(args, 0)),
        IS_NULL => Ok(ScriptValue::Bool(matches!(
            arg(args, 0),
            ScriptValue::Null | ScriptValue::Undefined | ScriptValue::WrappedNull(_)
        ))),
        other => Err(ScriptError::NotSupported(format!("unknown intrinsic {:#06x}", other))),
    }
}

fn delete_member(core: &EngineCore, target: &ScriptValue, name: &ScriptValue) -> ScriptResult<ScriptValue> {
    let name = name
        .as_str()
        .ok_or_else(|| ScriptError::from(ConversionError::incompatible(name.describe(), "String")))?
        .to_string();
    match target {
        ScriptValue::Object(object) => Ok(ScriptValue::Bool(object.delete(&name))),
        ScriptValue::HostObject(item) => {
            let dynamic = match item.target()? {
                HostValue::Object(obj) if !item.flags().contains(HostItemFlags::DIRECT_ACCESS) => {
                    obj.dynamic().cloned()
                }
                _ => None,
            };
            let dynamic = dynamic.ok_or_else(|| {
                ScriptError::NotSupported(format!("cannot delete '{}' from a static host object", name))
            })?;
            let deleted = core.call_host(|ctx| dynamic.delete_member(ctx, &name).transpose())?;
            match deleted {
                Some(deleted) => Ok(ScriptValue::Bool(deleted)),
                None => Err(ScriptError::NotSupported(format!("cannot delete '{}'", name))),
            }
        }
        other => Err(ScriptError::NotSupported(format!(
            "cannot delete '{}' from {}",
            name,
            other.describe()
        ))),
    }
}

fn combine_flags(core: &EngineCore, args: &[ScriptValue]) -> ScriptResult<ScriptValue> {
    let mut ty: Option<Arc<HostType>> = None;
    let mut raw: i128 = 0;
    for value in args {
        let enum_value = match core.to_host_value(value) {
            HostValue::Enum(e) => e,
            _ => return Err(ConversionError::incompatible(value.describe(), "flags enum").into()),
        };
        match &ty {
            Some(t) if t.key() != enum_value.ty.key() => {
                return Err(ConversionError::incompatible(enum_value.ty.name(), t.name()).into());
            }
            Some(_) => {}
            None if !enum_value.ty.is_flags() => {
                return Err(ConversionError::incompatible(enum_value.ty.name(), "flags enum").into());
            }
            None => ty = Some(Arc::clone(&enum_value.ty)),
        }
        raw |= enum_value.raw;
    }

    let ty = ty.ok_or_else(|| ScriptError::from(ConversionError::incompatible("nothing", "flags enum")))?;
    let underlying = ty.enum_underlying().unwrap_or(NumericKind::Int32);
    if HostValue::from_i128(underlying, raw).is_none() {
        return Err(ConversionError::overflow(raw, ty.name()).into());
    }
    let declared = TypeRef::named(&ty);
    core.to_script(HostValue::Enum(EnumValue::new(&ty, raw)), &declared)
}

fn to_static_type(core: &EngineCore, value: ScriptValue) -> ScriptResult<ScriptValue> {
    let item = match &value {
        ScriptValue::HostObject(item) if !item.is_type() => Arc::clone(item),
        _ => return Ok(value),
    };
    let flags = item.flags() | HostItemFlags::DIRECT_ACCESS;
    let target = item.target()?;
    let proxy = if item.is_value() {
        core.value_proxy(target, flags)?
    } else {
        let declared = match item.view() {
            Some(view) => TypeRef::named(view),
            None => TypeRef::Object,
        };
        core.reference_proxy(&target, &declared, flags)?
    };
    Ok(ScriptValue::HostObject(proxy))
}
