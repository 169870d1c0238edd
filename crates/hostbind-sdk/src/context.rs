//! HostContext trait: what host code can see of the calling engine
//!
//! Every host member call receives an explicit `&dyn HostContext`. There is no
//! ambient "current engine"; code that needs the caller's identity or wants to
//! cooperate with interruption asks the context it was handed.

use std::any::Any;

use crate::error::{HostError, HostResult};

/// The engine frame a host member is being called from.
///
/// The engine provides the concrete implementation. Host code only sees this
/// trait.
pub trait HostContext {
    /// Unique id of the calling engine
    fn engine_id(&self) -> u64;

    /// Name of the calling engine
    fn engine_name(&self) -> &str;

    /// Number of active frames (script, host and foreign) on the calling engine
    fn call_depth(&self) -> usize;

    /// Has an interrupt been requested on the calling engine?
    fn is_interrupt_requested(&self) -> bool;

    /// Fail with the engine's interrupt error if an interrupt is pending.
    ///
    /// Long-running host code should call this periodically.
    fn check_interrupt(&self) -> HostResult<()>;

    /// Concrete context, for engine-internal downcasts
    fn as_any(&self) -> &dyn Any;
}

/// Context for host code called outside any engine (e.g. a host-side delegate
/// invocation)
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedContext;

impl HostContext for DetachedContext {
    fn engine_id(&self) -> u64 {
        0
    }

    fn engine_name(&self) -> &str {
        "<detached>"
    }

    fn call_depth(&self) -> usize {
        0
    }

    fn is_interrupt_requested(&self) -> bool {
        false
    }

    fn check_interrupt(&self) -> HostResult<()> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Require a concrete context type
pub fn downcast_context<T: 'static>(ctx: &dyn HostContext) -> HostResult<&T> {
    ctx.as_any().downcast_ref::<T>().ok_or_else(|| HostError::TypeMismatch {
        expected: std::any::type_name::<T>().to_string(),
        got: ctx.engine_name().to_string(),
    })
}
