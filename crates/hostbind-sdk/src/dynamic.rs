//! Dynamic-dispatch protocol
//!
//! Host objects may carry a [`DynamicObject`] capability. The binder offers
//! every operation to it first; a method returning `None` means "not handled"
//! and the binder falls back to the object's static members.

use crate::context::HostContext;
use crate::error::HostResult;
use crate::value::HostValue;

/// Late-bound member access on a host object
pub trait DynamicObject: Send + Sync {
    /// Read a named member
    fn get_member(&self, _ctx: &dyn HostContext, _name: &str) -> Option<HostResult<HostValue>> {
        None
    }

    /// Write a named member
    fn set_member(
        &self,
        _ctx: &dyn HostContext,
        _name: &str,
        _value: HostValue,
    ) -> Option<HostResult<()>> {
        None
    }

    /// Remove a named member; `Some(Ok(false))` when it did not exist
    fn delete_member(&self, _ctx: &dyn HostContext, _name: &str) -> Option<HostResult<bool>> {
        None
    }

    /// Invoke a named member
    fn invoke_member(
        &self,
        _ctx: &dyn HostContext,
        _name: &str,
        _args: &mut [HostValue],
    ) -> Option<HostResult<HostValue>> {
        None
    }

    /// Invoke the object itself
    fn invoke(&self, _ctx: &dyn HostContext, _args: &mut [HostValue]) -> Option<HostResult<HostValue>> {
        None
    }

    /// Read an index
    fn get_index(&self, _ctx: &dyn HostContext, _keys: &[HostValue]) -> Option<HostResult<HostValue>> {
        None
    }

    /// Write an index
    fn set_index(
        &self,
        _ctx: &dyn HostContext,
        _keys: &[HostValue],
        _value: HostValue,
    ) -> Option<HostResult<()>> {
        None
    }

    /// Names of dynamically provided members
    fn member_names(&self) -> Vec<String> {
        Vec::new()
    }
}
