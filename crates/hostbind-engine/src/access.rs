//! Access policy resolution
//!
//! Decides, on every access, how a member is exposed to script. Nothing is
//! cached: changing the engine default takes effect on the very next access.
//!
//! ## Resolution order
//!
//! | Layer | Source                                               |
//! |-------|------------------------------------------------------|
//! | 1     | Annotation on the member reached through the view     |
//! | 2     | Default annotation of the declaring type/interface    |
//! | 3     | Engine-wide default access                            |
//!
//! Private members are reachable only when the engine's access context type
//! is (or derives from) the declaring type, or the item carries
//! `PRIVATE_ACCESS`.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use hostbind_sdk::{HostType, MemberDescriptor, ScriptAccess};
use parking_lot::RwLock;

/// Outcome of resolving a member's access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecision<'a> {
    /// Effective access
    pub access: ScriptAccess,
    /// Name exposed to script
    pub name: &'a str,
}

impl AccessDecision<'_> {
    /// Is the member reachable at all?
    pub fn is_visible(&self) -> bool {
        self.access != ScriptAccess::None
    }

    /// May script write the member?
    pub fn is_writable(&self) -> bool {
        self.access == ScriptAccess::Full
    }
}

fn encode(access: ScriptAccess) -> u8 {
    match access {
        ScriptAccess::Full => 0,
        ScriptAccess::ReadOnly => 1,
        ScriptAccess::None => 2,
    }
}

fn decode(raw: u8) -> ScriptAccess {
    match raw {
        1 => ScriptAccess::ReadOnly,
        2 => ScriptAccess::None,
        _ => ScriptAccess::Full,
    }
}

/// Per-engine access resolver
#[derive(Debug)]
pub struct AccessPolicy {
    default_access: AtomicU8,
    access_context: RwLock<Option<Arc<HostType>>>,
}

impl AccessPolicy {
    /// Policy with an engine default and optional access context
    pub fn new(default_access: ScriptAccess, access_context: Option<Arc<HostType>>) -> Self {
        Self {
            default_access: AtomicU8::new(encode(default_access)),
            access_context: RwLock::new(access_context),
        }
    }

    /// Current engine default
    pub fn default_access(&self) -> ScriptAccess {
        decode(self.default_access.load(Ordering::Acquire))
    }

    /// Change the engine default; applies to the next access
    pub fn set_default_access(&self, access: ScriptAccess) {
        self.default_access.store(encode(access), Ordering::Release);
    }

    /// Current access context type
    pub fn access_context(&self) -> Option<Arc<HostType>> {
        self.access_context.read().clone()
    }

    /// Change the access context type
    pub fn set_access_context(&self, ty: Option<Arc<HostType>>) {
        *self.access_context.write() = ty;
    }

    /// Effective access of `member`, ignoring visibility
    pub fn resolve_access(&self, member: &MemberDescriptor) -> ScriptAccess {
        member
            .annotation()
            .access
            .or(member.declaring_access())
            .unwrap_or_else(|| self.default_access())
    }

    /// Is a private member visible from the current access context?
    pub fn is_private_visible(&self, member: &MemberDescriptor, private_access: bool) -> bool {
        if private_access {
            return true;
        }
        match self.access_context.read().as_ref() {
            Some(context) => context
                .chain()
                .iter()
                .any(|ty| ty.key() == member.declaring()),
            None => false,
        }
    }

    /// Decide how `member` is exposed. `private_access` is the item's `PRIVATE_ACCESS` flag.
    pub fn decide<'a>(&self, member: &'a MemberDescriptor, private_access: bool) -> AccessDecision<'a> {
        let access = if member.is_private() && !self.is_private_visible(member, private_access) {
            ScriptAccess::None
        } else {
            self.resolve_access(member)
        };
        AccessDecision {
            access,
            name: member.script_name(),
        }
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::new(ScriptAccess::Full, None)
    }
}
