//! Typed extraction of host values
//!
//! Member closures receive arguments already converted to their declared
//! parameter types, so extraction is strict: an `Int32` parameter arrives as
//! `HostValue::Int32` and is read with `i32::from_host`.
//!
//! # Example
//!
//! ```ignore
//! MemberDescriptor::method("Add", vec![ParamInfo::new("n", TypeRef::i32())], TypeRef::i32(),
//!     |_ctx, this, args| {
//!         let n: i32 = arg(args, 0)?;
//!         ...
//!     })
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::buffer::{ArrayBuffer, BufferView};
use crate::delegate::HostDelegate;
use crate::error::{HostError, HostResult};
use crate::object::{HostArray, HostObject, HostVariable};
use crate::value::HostValue;

/// Extract a Rust value from a host value
pub trait FromHost: Sized {
    /// Extract, failing with `TypeMismatch` on the wrong variant
    fn from_host(value: &HostValue) -> HostResult<Self>;
}

/// Convert a Rust value into a host value
pub trait ToHost {
    /// Convert
    fn to_host(self) -> HostValue;
}

impl<T: Into<HostValue>> ToHost for T {
    fn to_host(self) -> HostValue {
        self.into()
    }
}

fn mismatch(expected: &str, got: &HostValue) -> HostError {
    HostError::TypeMismatch {
        expected: expected.to_string(),
        got: got.type_ref().display_name(),
    }
}

macro_rules! impl_from_host {
    ($($ty:ty => $variant:ident, $name:expr);* $(;)?) => {
        $(
            impl FromHost for $ty {
                fn from_host(value: &HostValue) -> HostResult<Self> {
                    match value {
                        HostValue::$variant(v) => Ok(v.clone()),
                        other => Err(mismatch($name, other)),
                    }
                }
            }
        )*
    };
}

impl_from_host! {
    bool => Bool, "Boolean";
    i8 => Int8, "SByte";
    u8 => UInt8, "Byte";
    i16 => Int16, "Int16";
    u16 => UInt16, "UInt16";
    i32 => Int32, "Int32";
    u32 => UInt32, "UInt32";
    i64 => Int64, "Int64";
    u64 => UInt64, "UInt64";
    f32 => Single, "Single";
    f64 => Double, "Double";
    Decimal => Decimal, "Decimal";
    char => Char, "Char";
    Arc<str> => String, "String";
    DateTime<Utc> => DateTime, "DateTime";
    HostObject => Object, "Object";
    HostArray => Array, "Array";
    ArrayBuffer => Buffer, "ArrayBuffer";
    BufferView => View, "ArrayBufferView";
    HostDelegate => Delegate, "Delegate";
    HostVariable => Variable, "HostVariable";
}

impl FromHost for String {
    fn from_host(value: &HostValue) -> HostResult<Self> {
        match value {
            HostValue::String(s) => Ok(s.to_string()),
            other => Err(mismatch("String", other)),
        }
    }
}

impl FromHost for HostValue {
    fn from_host(value: &HostValue) -> HostResult<Self> {
        Ok(value.clone())
    }
}

impl<T: FromHost> FromHost for Option<T> {
    fn from_host(value: &HostValue) -> HostResult<Self> {
        match value {
            HostValue::Null | HostValue::Undefined => Ok(None),
            other => T::from_host(other).map(Some),
        }
    }
}

/// Extract argument `index`
pub fn arg<T: FromHost>(args: &[HostValue], index: usize) -> HostResult<T> {
    match args.get(index) {
        Some(value) => T::from_host(value),
        None => Err(HostError::Argument(format!("missing argument {}", index))),
    }
}
