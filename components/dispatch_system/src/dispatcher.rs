//! Call dispatch over the two coexisting strategies.
//!
//! Ordinary single-inheritance virtual calls are slot-bound: the slot index
//! is fixed at the declaring type and identical in every non-overriding
//! subtype, so a call site just reads `receiver_table[slot]`. Calls whose
//! slot cannot be fixed statically (interface calls above all) are
//! cache-bound and go through a per-site inline cache backed by the full
//! resolver.

use std::sync::Arc;

use class_system::{Compiler, Linker, TypeRegistry};
use core_types::{CodePtr, MemberKey, TypeId, VmError};
use object_monitor::HeapObject;
use tracing::trace;

use crate::call_site::CallSiteCache;
use crate::resolver::resolve_member;

/// Dispatch strategy owned by one call site.
#[derive(Debug)]
pub enum CallSite {
    /// Fixed-slot virtual dispatch through the receiver's table.
    Slot(usize),
    /// Inline-cached dispatch for members without a fixed slot.
    Cached(CallSiteCache),
}

impl CallSite {
    /// A slot-bound site reading the given table index.
    pub fn slot(index: usize) -> CallSite {
        CallSite::Slot(index)
    }

    /// A cache-bound site invoking `member`.
    pub fn cached(member: MemberKey) -> CallSite {
        CallSite::Cached(CallSiteCache::new(member))
    }
}

/// Resolves dynamically dispatched calls to native entry points.
pub struct Dispatcher {
    registry: Arc<TypeRegistry>,
    compiler: Arc<dyn Compiler>,
}

impl Dispatcher {
    /// Creates a dispatcher over `registry` using `compiler` for misses.
    pub fn new(registry: Arc<TypeRegistry>, compiler: Arc<dyn Compiler>) -> Self {
        Dispatcher { registry, compiler }
    }

    /// Builds a dispatcher sharing a linker's registry and compiler.
    pub fn for_linker(linker: &Linker) -> Self {
        Dispatcher::new(linker.registry().clone(), linker.compiler().clone())
    }

    /// Chooses the dispatch strategy for a call through the statically
    /// known `static_ty`: class members with a known slot are slot-bound,
    /// everything else (interface calls included) is cache-bound.
    ///
    /// `static_ty` must be resolved.
    pub fn make_site(&self, static_ty: TypeId, member: &MemberKey) -> Result<CallSite, VmError> {
        let ty = self.registry.get(static_ty);
        let table = ty.resolved_table()?;
        let is_interface = ty.flags().map(|f| f.is_interface).unwrap_or(false);
        if !is_interface {
            if let Some(slot) = table.slot_of(member) {
                return Ok(CallSite::Slot(slot));
            }
        }
        Ok(CallSite::cached(member.clone()))
    }

    /// Dispatches a call on `receiver` through `site`, returning the native
    /// entry point to invoke.
    pub fn dispatch(&self, receiver: &HeapObject, site: &CallSite) -> Result<CodePtr, VmError> {
        match site {
            CallSite::Slot(index) => {
                let ty = self.registry.get(receiver.type_id());
                let table = ty.resolved_table()?;
                match table.slot(*index) {
                    Some(slot) => slot.code.ok_or_else(|| VmError::UnresolvedMember {
                        type_name: ty.name().to_string(),
                        member: slot.key.clone(),
                    }),
                    None => Err(VmError::Internal(format!(
                        "slot {} out of range for `{}`",
                        index,
                        ty.name()
                    ))),
                }
            }
            CallSite::Cached(cache) => {
                let receiver_ty = receiver.type_id();
                if let Some(code) = cache.lookup(receiver_ty) {
                    return Ok(code);
                }
                trace!(member = %cache.member(), "inline cache miss");
                let (_declared_in, code) = resolve_member(
                    &self.registry,
                    receiver_ty,
                    cache.member(),
                    self.compiler.as_ref(),
                )?;
                cache.insert(receiver_ty, code);
                Ok(code)
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Dispatcher({:?})", self.registry)
    }
}
