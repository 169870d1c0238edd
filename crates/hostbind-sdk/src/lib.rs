//! Hostbind SDK - host-side types for exposing native objects to script engines
//!
//! This crate describes what the host exposes: registered types
//! ([`HostType`]), their members ([`MemberDescriptor`]) and the strongly-typed
//! values ([`HostValue`]) that flow across the bridge. It does not depend on
//! any engine; `hostbind-engine` consumes these descriptors.
//!
//! # Example
//!
//! ```ignore
//! use hostbind_sdk::{arg, HostObject, HostType, HostValue, MemberDescriptor, ParamInfo, TypeRef};
//!
//! struct Counter { count: i32 }
//!
//! let counter_type = HostType::class("Counter")
//!     .member(MemberDescriptor::property("Count", TypeRef::i32(), |this| {
//!         host_object(this)?.with(|c: &Counter| HostValue::Int32(c.count))
//!     }))
//!     .member(MemberDescriptor::method(
//!         "Add",
//!         vec![ParamInfo::new("n", TypeRef::i32())],
//!         TypeRef::Void,
//!         |_ctx, this, args| {
//!             let n: i32 = arg(args, 0)?;
//!             host_object(this)?.with_mut(|c: &mut Counter| c.count += n)?;
//!             Ok(HostValue::Null)
//!         },
//!     ))
//!     .build();
//!
//! let counter = HostObject::new(&counter_type, Counter { count: 0 });
//! ```

#![warn(missing_docs)]

pub mod buffer;
pub mod context;
pub mod convert;
pub mod delegate;
pub mod dynamic;
pub mod error;
pub mod member;
pub mod object;
pub mod types;
pub mod value;

pub use buffer::{ArrayBuffer, BufferView, ViewKind};
pub use context::{downcast_context, DetachedContext, HostContext};
pub use convert::{arg, FromHost, ToHost};
pub use delegate::{DelegateSignature, DelegateTarget, HostDelegate, HostEvent, WeakHostDelegate};
pub use dynamic::DynamicObject;
pub use error::{HostError, HostResult};
pub use member::{
    EventHook, Getter, Invoker, MemberDescriptor, MemberImpl, MemberKind, ParamInfo, ParamMode,
    ScriptAccess, ScriptAnnotation, Setter, Visibility, CONSTRUCTOR_NAME, INDEXER_NAME,
};
pub use object::{HostArray, HostObject, HostVariable, ObjectId};
pub use types::{HostType, NumericKind, TypeBuilder, TypeKey, TypeKind, TypeRef};
pub use value::{EnumValue, HostValue, ScriptHandle, StructValue, WeakHostValue};

pub use chrono::{DateTime, Utc};
pub use rust_decimal::Decimal;

/// The [`HostObject`] behind `this`, or a null-reference error
pub fn host_object(this: &HostValue) -> HostResult<&HostObject> {
    match this {
        HostValue::Object(obj) => Ok(obj),
        HostValue::Null | HostValue::Undefined => Err(HostError::NullReference("instance is null".to_string())),
        other => Err(HostError::TypeMismatch {
            expected: "Object".to_string(),
            got: other.type_ref().display_name(),
        }),
    }
}
