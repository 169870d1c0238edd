//! Members every host value answers to
//!
//! | Member              | Target                 | Result                          |
//! |---------------------|------------------------|---------------------------------|
//! | `ToString()`        | any host value or type | display string                  |
//! | `Invoke(...)`       | delegate               | delegate result                 |
//! | `length`/`Length`   | host array             | element count                   |
//! | `value`/`Value`     | host variable          | current cell value              |
//! | `connect(handler)`  | bound event            | an `EventConnection` object     |
//! | `disconnect()`      | `EventConnection`      | removes the handler once        |

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hostbind_sdk::{
    host_object, EventHook, HostDelegate, HostObject, HostResult, HostType, HostValue,
    MemberDescriptor, TypeRef,
};
use once_cell::sync::Lazy;

/// Name of the builtin string conversion
pub(crate) const TO_STRING: &str = "ToString";

/// Name of the builtin delegate invocation
pub(crate) const INVOKE: &str = "Invoke";

/// Host type of the objects returned by `connect`
pub(crate) static EVENT_CONNECTION: Lazy<Arc<HostType>> = Lazy::new(|| {
    HostType::class("EventConnection")
        .member(MemberDescriptor::method(
            "disconnect",
            vec![],
            TypeRef::Void,
            |_ctx, this, _args| {
                host_object(this)?.with(|c: &EventConnection| c.disconnect())??;
                Ok(HostValue::Null)
            },
        ))
        .member(MemberDescriptor::property("connected", TypeRef::Bool, |this| {
            host_object(this)?.with(|c: &EventConnection| HostValue::Bool(c.is_connected()))
        }))
        .build()
});

/// A handler attached to a host event
pub(crate) struct EventConnection {
    source: HostValue,
    handler: HostDelegate,
    remove: EventHook,
    connected: AtomicBool,
}

impl EventConnection {
    /// Host object for a handler just added to `source`
    pub(crate) fn object(source: HostValue, handler: HostDelegate, remove: EventHook) -> HostObject {
        HostObject::new(
            &EVENT_CONNECTION,
            EventConnection {
                source,
                handler,
                remove,
                connected: AtomicBool::new(true),
            },
        )
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn disconnect(&self) -> HostResult<()> {
        if self.connected.swap(false, Ordering::AcqRel) {
            (self.remove)(&self.source, &self.handler)?;
        }
        Ok(())
    }
}

/// `ToString()` of a host value
pub(crate) fn host_to_string(value: &HostValue) -> String {
    match value {
        HostValue::Type(ty) => ty.display_name(),
        other => other.to_string(),
    }
}
