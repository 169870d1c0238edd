//! Member tables
//!
//! A [`MemberTable`] is the flat list of members one binding sees. It is
//! derived from the type's descriptors on each access:
//!
//! | Binding                | Members                                                        |
//! |------------------------|----------------------------------------------------------------|
//! | Type handle            | static members of the type and its bases                       |
//! | Instance, no view      | instance members of the runtime type chain, hide-by-signature  |
//! | Instance, interface    | the interface's members, implemented by explicit or public ones |
//! | Instance, base class   | the base chain, with overrides from the runtime type           |
//!
//! Explicit interface implementations are declared on the class with the
//! interface as declaring type, so they only surface through an interface
//! view.

use std::sync::Arc;

use hostbind_sdk::{HostType, MemberDescriptor, MemberImpl, MemberKind};

/// One member as seen through a binding
#[derive(Debug, Clone)]
pub(crate) struct Slot {
    /// Declaration reached through the view; its annotation governs access
    pub decl: Arc<MemberDescriptor>,
    /// Implementation to call
    pub imp: Arc<MemberDescriptor>,
}

impl Slot {
    fn plain(member: &Arc<MemberDescriptor>) -> Self {
        Slot {
            decl: Arc::clone(member),
            imp: Arc::clone(member),
        }
    }
}

/// Same name, kind and parameter shape
pub(crate) fn same_signature(a: &MemberDescriptor, b: &MemberDescriptor) -> bool {
    a.name() == b.name()
        && a.kind() == b.kind()
        && a.params().len() == b.params().len()
        && a
            .params()
            .iter()
            .zip(b.params())
            .all(|(x, y)| x.ty == y.ty && x.mode == y.mode)
}

fn is_instance_member(member: &MemberDescriptor) -> bool {
    !member.is_static() && member.kind() != MemberKind::Constructor
}

/// Members declared along `chain` matching `pred`, most derived first;
/// a member hides base members with the same signature.
fn collect(chain: &[&HostType], pred: impl Fn(&MemberDescriptor) -> bool) -> Vec<Slot> {
    let mut slots: Vec<Slot> = Vec::new();
    for ty in chain {
        for member in ty.members() {
            if member.declaring() != ty.key() || !pred(member) {
                continue;
            }
            if slots.iter().any(|s| same_signature(&s.imp, member)) {
                continue;
            }
            slots.push(Slot::plain(member));
        }
    }
    slots
}

/// Members visible through one binding
#[derive(Debug, Default)]
pub(crate) struct MemberTable {
    slots: Vec<Slot>,
}

impl MemberTable {
    /// Static members of `ty` and its bases
    pub(crate) fn statics(ty: &HostType) -> Self {
        let chain = ty.chain();
        MemberTable {
            slots: collect(&chain, |m| m.is_static() && m.kind() != MemberKind::Constructor),
        }
    }

    /// Constructors declared on `ty` itself
    pub(crate) fn constructors(ty: &HostType) -> Self {
        MemberTable {
            slots: ty
                .members()
                .iter()
                .filter(|m| m.kind() == MemberKind::Constructor && m.declaring() == ty.key())
                .map(Slot::plain)
                .collect(),
        }
    }

    /// Instance members of runtime type `ty`, seen through `view`
    pub(crate) fn instance(ty: &HostType, view: Option<&HostType>) -> Self {
        let chain = ty.chain();
        let runtime = collect(&chain, is_instance_member);
        let slots = match view {
            None => runtime,
            Some(iface) if iface.is_interface() => Self::interface_slots(&chain, &runtime, iface),
            Some(base) => match chain.iter().position(|t| t.key() == base.key()) {
                Some(at) => Self::base_slots(&chain[..at], &chain[at..]),
                None => runtime,
            },
        };
        MemberTable { slots }
    }

    fn interface_slots(chain: &[&HostType], runtime: &[Slot], view: &HostType) -> Vec<Slot> {
        let mut slots: Vec<Slot> = Vec::new();
        for iface in view.all_interfaces() {
            for decl in iface.members() {
                if decl.declaring() != iface.key() || !is_instance_member(decl) {
                    continue;
                }
                let explicit = chain
                    .iter()
                    .flat_map(|t| t.members())
                    .find(|m| m.declaring() == iface.key() && same_signature(m, decl))
                    .cloned();
                let implicit = || {
                    runtime
                        .iter()
                        .find(|s| !s.imp.is_private() && same_signature(&s.imp, decl))
                        .map(|s| Arc::clone(&s.imp))
                };
                let default = || match decl.imp() {
                    MemberImpl::Abstract => None,
                    _ => Some(Arc::clone(decl)),
                };
                if let Some(imp) = explicit.or_else(implicit).or_else(default) {
                    slots.push(Slot {
                        decl: Arc::clone(decl),
                        imp,
                    });
                }
            }
        }
        slots
    }

    fn base_slots(derived: &[&HostType], base_chain: &[&HostType]) -> Vec<Slot> {
        let overrides = collect(derived, is_instance_member);
        collect(base_chain, is_instance_member)
            .into_iter()
            .map(|slot| {
                match overrides.iter().find(|o| same_signature(&o.imp, &slot.decl)) {
                    Some(o) => Slot {
                        decl: slot.decl,
                        imp: Arc::clone(&o.imp),
                    },
                    None => slot,
                }
            })
            .collect()
    }

    /// All slots
    pub(crate) fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Slots whose script name or declared name is `name`
    pub(crate) fn named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Slot> + 'a {
        self.slots
            .iter()
            .filter(move |s| s.decl.script_name() == name || s.decl.name() == name)
    }

    /// Is the table empty?
    pub(crate) fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
