//! Full member resolution, used on inline-cache misses.

use class_system::{Compiler, TypeRegistry};
use core_types::{CodePtr, MemberKey, TypeId, VmError};

/// Resolves `member` against the concrete `receiver` type by walking its
/// ancestor chain from the receiver upward; the first declaring or
/// overriding type wins.
///
/// Returns the declaring type and the compiled entry point. A chain that
/// declares the member only abstractly, or not at all, is reported as
/// unresolved; whether that is fatal is the caller's decision.
pub fn resolve_member(
    registry: &TypeRegistry,
    receiver: TypeId,
    member: &MemberKey,
    compiler: &dyn Compiler,
) -> Result<(TypeId, CodePtr), VmError> {
    let receiver_ty = registry.get(receiver);
    let table = receiver_ty.resolved_table()?;

    for &ancestor_id in table.display().iter().rev() {
        let ancestor = registry.get(ancestor_id);
        let members = match ancestor.members() {
            Some(members) => members,
            None => continue,
        };
        if let Some(method) = members.method(member) {
            if method.is_abstract {
                // The most derived declaration is abstract; an inherited
                // concrete body further up is shadowed, not callable.
                break;
            }
            let code = compiler.entry_point(ancestor.name(), member)?;
            return Ok((ancestor_id, code));
        }
    }

    Err(VmError::UnresolvedMember {
        type_name: receiver_ty.name().to_string(),
        member: member.clone(),
    })
}
