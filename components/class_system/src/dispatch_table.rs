//! Dispatch tables and the ancestor display.
//!
//! A type's dispatch table is built exactly once, when the type enters
//! `Resolved`, by extending its superclass's table: inherited slots are
//! copied verbatim, overriding declarations overwrite their slot in place,
//! and new declarations append. A slot index assigned to a member is
//! therefore identical in every non-overriding subtype, which is what makes
//! fixed-slot dispatch sound.
//!
//! The header also carries the ancestor display (root..self) enabling the
//! O(1) subtype test for the single-inheritance chain, and the secondary
//! type list (transitively implemented interfaces) scanned linearly for
//! interface checks.

use std::sync::Arc;

use core_types::{CodePtr, MemberKey, TypeId, VmError};

use crate::collaborators::Compiler;
use crate::descriptor::TypeDescriptor;
use crate::registry::TypeRegistry;

/// One method slot of a dispatch table.
#[derive(Debug, Clone)]
pub struct DispatchSlot {
    /// Member this slot is bound to.
    pub key: MemberKey,
    /// Type providing the currently bound implementation.
    pub declared_in: TypeId,
    /// Compiled entry point; `None` while the binding is abstract.
    pub code: Option<CodePtr>,
}

/// Per-type dispatch table: layout header plus the flat method-slot array.
///
/// Immutable after publication; slots are never rewritten, so inline-cache
/// entries derived from a table never need revalidation.
#[derive(Debug)]
pub struct DispatchTable {
    owner: TypeId,
    depth: usize,
    display: Box<[TypeId]>,
    secondaries: Box<[TypeId]>,
    super_table: Option<Arc<DispatchTable>>,
    finalizer: Option<CodePtr>,
    trace_hook: Option<CodePtr>,
    slots: Vec<DispatchSlot>,
}

impl DispatchTable {
    /// The type this table belongs to (non-owning back-pointer).
    pub fn owner(&self) -> TypeId {
        self.owner
    }

    /// Position of the owner in its own display; equals
    /// `display.len() - 1`.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Ancestor display, root first, owner last.
    pub fn display(&self) -> &[TypeId] {
        &self.display
    }

    /// Transitively implemented interfaces not present in the display.
    pub fn secondaries(&self) -> &[TypeId] {
        &self.secondaries
    }

    /// The superclass's table, if any.
    pub fn super_table(&self) -> Option<&Arc<DispatchTable>> {
        self.super_table.as_ref()
    }

    /// Entry point of the inherited or declared finalizer, if any.
    pub fn finalizer(&self) -> Option<CodePtr> {
        self.finalizer
    }

    /// Per-type trace callback handed to the collector, if any.
    pub fn trace_hook(&self) -> Option<CodePtr> {
        self.trace_hook
    }

    /// Number of method slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True for a table with no method slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The slot at `index`.
    pub fn slot(&self, index: usize) -> Option<&DispatchSlot> {
        self.slots.get(index)
    }

    /// The bound entry point at `index`; `None` if the index is out of
    /// range or the binding is abstract.
    pub fn code_at(&self, index: usize) -> Option<CodePtr> {
        self.slots.get(index).and_then(|slot| slot.code)
    }

    /// Finds the slot currently bound to `key`.
    pub fn slot_of(&self, key: &MemberKey) -> Option<usize> {
        self.slots.iter().position(|slot| &slot.key == key)
    }

    /// Display-based ancestor test: true if `ancestor` (at `ancestor_depth`
    /// in its own display) appears in this table's display.
    pub fn extends(&self, ancestor: TypeId, ancestor_depth: usize) -> bool {
        ancestor_depth <= self.depth && self.display[ancestor_depth] == ancestor
    }

    /// Secondary-type scan: true if `interface` is transitively
    /// implemented.
    pub fn implements(&self, interface: TypeId) -> bool {
        self.secondaries.contains(&interface)
    }
}

/// Builds `descriptor`'s table by extending its resolved superclass table.
///
/// Every dependency must already be resolved; the lifecycle machine
/// guarantees this by resolving the hierarchy before calling in.
pub(crate) fn build_table(
    descriptor: &TypeDescriptor,
    super_ty: Option<&Arc<TypeDescriptor>>,
    interfaces: &[Arc<TypeDescriptor>],
    compiler: &dyn Compiler,
) -> Result<DispatchTable, VmError> {
    let super_table = match super_ty {
        Some(super_ty) => Some(super_ty.resolved_table()?.clone()),
        None => None,
    };

    // Inherited slots come over verbatim, bound implementations included.
    let mut slots: Vec<DispatchSlot> = super_table
        .as_ref()
        .map(|table| table.slots.clone())
        .unwrap_or_default();

    let members = descriptor.members().ok_or_else(|| {
        VmError::Internal(format!("`{}` linked before being parsed", descriptor.name()))
    })?;

    for method in &members.methods {
        let code = if method.is_abstract {
            None
        } else {
            Some(compiler.entry_point(descriptor.name(), &method.key)?)
        };
        match slots.iter().position(|slot| slot.key == method.key) {
            Some(index) => {
                slots[index] = DispatchSlot {
                    key: method.key.clone(),
                    declared_in: descriptor.id(),
                    code,
                };
                method.assign_slot(index);
            }
            None => {
                slots.push(DispatchSlot {
                    key: method.key.clone(),
                    declared_in: descriptor.id(),
                    code,
                });
                method.assign_slot(slots.len() - 1);
            }
        }
    }

    let display: Box<[TypeId]> = match super_table.as_ref() {
        Some(table) => {
            let mut display = table.display.to_vec();
            display.push(descriptor.id());
            display.into_boxed_slice()
        }
        // Root classes and interfaces are their own display.
        None => Box::new([descriptor.id()]),
    };
    let depth = display.len() - 1;

    let mut secondaries: Vec<TypeId> = Vec::new();
    let push_unique = |list: &mut Vec<TypeId>, id: TypeId| {
        if !display.contains(&id) && !list.contains(&id) {
            list.push(id);
        }
    };
    if let Some(table) = super_table.as_ref() {
        for &id in table.secondaries.iter() {
            push_unique(&mut secondaries, id);
        }
    }
    for interface in interfaces {
        push_unique(&mut secondaries, interface.id());
        for &id in interface.resolved_table()?.secondaries.iter() {
            push_unique(&mut secondaries, id);
        }
    }

    let finalizer = slots
        .iter()
        .find(|slot| slot.key.name.as_ref() == "finalize" && slot.key.signature.as_ref() == "()V")
        .and_then(|slot| slot.code);
    let trace_hook = compiler
        .trace_entry(descriptor.name())
        .or_else(|| super_table.as_ref().and_then(|table| table.trace_hook));

    Ok(DispatchTable {
        owner: descriptor.id(),
        depth,
        display,
        secondaries: secondaries.into_boxed_slice(),
        super_table,
        finalizer,
        trace_hook,
        slots,
    })
}

/// Subtype test: may a value of concrete type `descendant` be used where
/// `ancestor` is expected?
///
/// The single-inheritance chain is answered with one indexed display read;
/// interface targets fall back to a linear secondary scan. Both types must
/// be resolved.
pub fn is_assignable_from(
    registry: &TypeRegistry,
    ancestor: TypeId,
    descendant: TypeId,
) -> Result<bool, VmError> {
    let ancestor_ty = registry.get(ancestor);
    let descendant_ty = registry.get(descendant);
    let ancestor_table = ancestor_ty.resolved_table()?;
    let descendant_table = descendant_ty.resolved_table()?;

    if descendant_table.extends(ancestor, ancestor_table.depth()) {
        return Ok(true);
    }
    Ok(descendant_table.implements(ancestor))
}
