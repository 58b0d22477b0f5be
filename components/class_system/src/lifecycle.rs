//! Type lifecycle state machine.
//!
//! Drives a descriptor from `Named` to `Ready`. Every transition runs under
//! the descriptor's own monitor (exclusive-with-waiters). The two
//! operations that may block on *other* types, hierarchy resolution and
//! static initialization, run with the monitor released and re-check the
//! status afterwards. Failure in any phase parks the type in the sticky
//! `Erroneous` state: no later attempt re-runs a failed transition.

use std::cell::RefCell;
use std::sync::Arc;

use core_types::{vm_thread, TypeId, Value, VmError};
use tracing::debug;

use crate::collaborators::{Compiler, TypeSource};
use crate::descriptor::{MemberTable, MethodInfo, StaticFieldInfo, TypeDescriptor, TypeStatus};
use crate::dispatch_table::build_table;
use crate::registry::TypeRegistry;

thread_local! {
    /// Names this thread is currently resolving, outermost first. A name
    /// reappearing means the hierarchy is circular.
    static RESOLVING: RefCell<Vec<Arc<str>>> = RefCell::new(Vec::new());
}

struct CycleGuard;

impl CycleGuard {
    fn enter(name: &Arc<str>) -> Result<CycleGuard, VmError> {
        RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.iter().any(|entry| entry == name) {
                return Err(VmError::linkage(
                    name.as_ref(),
                    "circular type hierarchy",
                ));
            }
            stack.push(name.clone());
            Ok(CycleGuard)
        })
    }
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        RESOLVING.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Hierarchy dependencies of a type, resolved ahead of its own table build.
struct ResolvedDeps {
    super_ty: Option<Arc<TypeDescriptor>>,
    interfaces: Vec<Arc<TypeDescriptor>>,
}

/// The lifecycle engine for one registry.
///
/// Owns the collaborator handles and exposes the two entry points the rest
/// of the runtime calls: [`Linker::resolve`] (used by the compiler before
/// it emits layout-dependent code) and [`Linker::ensure_ready`] (used
/// before any static member access or instantiation).
pub struct Linker {
    registry: Arc<TypeRegistry>,
    source: Arc<dyn TypeSource>,
    compiler: Arc<dyn Compiler>,
}

impl Linker {
    /// Creates a linker over `registry` with the given collaborators.
    pub fn new(
        registry: Arc<TypeRegistry>,
        source: Arc<dyn TypeSource>,
        compiler: Arc<dyn Compiler>,
    ) -> Self {
        Linker {
            registry,
            source,
            compiler,
        }
    }

    /// The registry this linker populates.
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// The compiler collaborator.
    pub fn compiler(&self) -> &Arc<dyn Compiler> {
        &self.compiler
    }

    /// Returns the descriptor for `name`, creating it in state `Named` if
    /// this is the first reference.
    pub fn type_named(&self, name: &str) -> Arc<TypeDescriptor> {
        self.registry.lookup_or_create(name)
    }

    /// Drives the type to `Resolved`: definition loaded, members parsed,
    /// statics prepared, hierarchy resolved, dispatch table published.
    pub fn resolve(&self, id: TypeId) -> Result<Arc<TypeDescriptor>, VmError> {
        let ty = self.registry.get(id);
        if ty.status().is_resolved() {
            return Ok(ty);
        }
        if ty.status() == TypeStatus::Erroneous {
            return Err(VmError::previously_failed(ty.name()));
        }

        let _guard = CycleGuard::enter(ty.name_arc())?;
        loop {
            let status = ty.status();
            if status.is_resolved() {
                return Ok(ty);
            }
            if status == TypeStatus::Erroneous {
                return Err(VmError::previously_failed(ty.name()));
            }
            self.advance(&ty)?;
        }
    }

    /// Ensures the type is initialized, running its static initializer at
    /// most once process-wide.
    ///
    /// Safe to call from any number of threads concurrently, and from a
    /// static initializer that transitively re-triggers its own type (the
    /// re-entrant call returns immediately).
    pub fn ensure_ready(&self, id: TypeId) -> Result<(), VmError> {
        let ty = self.registry.get(id);

        // Lock-free fast paths.
        match ty.status() {
            TypeStatus::Ready => return Ok(()),
            TypeStatus::Erroneous => return Err(VmError::previously_failed(ty.name())),
            _ => {}
        }

        self.resolve(id)?;
        let me = vm_thread::current().get();

        ty.monitor().acquire();
        loop {
            match ty.status() {
                TypeStatus::Initializing => {
                    if ty.init_owner_raw() == me {
                        // Re-entrant: our own static initializer came back
                        // around. Nothing to do, and blocking would
                        // deadlock.
                        let _ = ty.monitor().release();
                        return Ok(());
                    }
                    if let Err(wait_err) = ty.monitor().wait(None) {
                        let _ = ty.monitor().release();
                        return Err(wait_err);
                    }
                }
                TypeStatus::Ready => {
                    let _ = ty.monitor().release();
                    return Ok(());
                }
                TypeStatus::Erroneous => {
                    let _ = ty.monitor().release();
                    return Err(VmError::previously_failed(ty.name()));
                }
                TypeStatus::Resolved => break,
                other => {
                    let _ = ty.monitor().release();
                    return Err(VmError::Internal(format!(
                        "`{}` regressed to {:?} after resolution",
                        ty.name(),
                        other
                    )));
                }
            }
        }
        ty.set_init_owner(me);
        ty.set_status(TypeStatus::Initializing);
        ty.monitor().release()?;

        // A supertype reaches Ready before any thread observes the subtype
        // as Ready.
        if let Some(super_id) = ty.super_id() {
            let super_ty = self.registry.get(super_id);
            if super_ty.status() != TypeStatus::Ready {
                if let Err(cause) = self.ensure_ready(super_id) {
                    self.fail_initialization(&ty);
                    return Err(cause);
                }
            }
        }

        // Static field initializers and the static-initializer callable run
        // outside the monitor.
        match self.run_initializers(&ty) {
            Ok(()) => {
                ty.monitor().acquire();
                ty.set_status(TypeStatus::Ready);
                ty.set_init_owner(0);
                ty.monitor().notify_all()?;
                ty.monitor().release()?;
                debug!(ty = ty.name(), "type initialized");
                Ok(())
            }
            Err(cause) => {
                self.fail_initialization(&ty);
                Err(VmError::initialization(ty.name(), cause))
            }
        }
    }

    /// Advances one lifecycle phase under the descriptor's monitor.
    fn advance(&self, ty: &Arc<TypeDescriptor>) -> Result<(), VmError> {
        ty.monitor().acquire();
        let step = match ty.status() {
            TypeStatus::Named => self.load_locked(ty),
            TypeStatus::Loaded => self.parse_locked(ty),
            TypeStatus::Parsed => self.prepare_locked(ty),
            TypeStatus::Prepared => self.link_locked(ty),
            // Another thread got there first; the caller's loop re-checks.
            _ => Ok(()),
        };
        match step {
            Ok(()) => {
                ty.monitor().release()?;
                Ok(())
            }
            Err(cause) => {
                ty.set_status(TypeStatus::Erroneous);
                ty.set_init_owner(0);
                let _ = ty.monitor().notify_all();
                let _ = ty.monitor().release();
                Err(cause)
            }
        }
    }

    fn load_locked(&self, ty: &TypeDescriptor) -> Result<(), VmError> {
        let def = self.source.load(ty.name())?;
        ty.install_definition(def)?;
        ty.set_status(TypeStatus::Loaded);
        debug!(ty = ty.name(), "definition loaded");
        Ok(())
    }

    fn parse_locked(&self, ty: &TypeDescriptor) -> Result<(), VmError> {
        let def = ty
            .definition()
            .ok_or_else(|| VmError::Internal(format!("`{}` parsed before loading", ty.name())))?;

        if def.flags.is_interface && def.super_name.is_some() {
            return Err(VmError::linkage(
                ty.name(),
                "an interface may not declare a superclass",
            ));
        }

        let mut methods: Vec<MethodInfo> = Vec::with_capacity(def.methods.len());
        for method in &def.methods {
            if methods.iter().any(|existing| existing.key == method.key) {
                return Err(VmError::linkage(
                    ty.name(),
                    format!("duplicate member `{}`", method.key),
                ));
            }
            methods.push(MethodInfo::new(method.key.clone(), method.is_abstract));
        }

        let mut static_fields: Vec<StaticFieldInfo> = Vec::with_capacity(def.static_fields.len());
        for (slot, field) in def.static_fields.iter().enumerate() {
            if static_fields.iter().any(|existing| existing.name == field.name) {
                return Err(VmError::linkage(
                    ty.name(),
                    format!("duplicate static field `{}`", field.name),
                ));
            }
            static_fields.push(StaticFieldInfo {
                name: field.name.clone(),
                slot,
                initial: field.initial.clone(),
            });
        }

        ty.install_members(MemberTable {
            methods,
            static_fields,
        })?;
        ty.set_status(TypeStatus::Parsed);
        debug!(ty = ty.name(), "members parsed");
        Ok(())
    }

    fn prepare_locked(&self, ty: &TypeDescriptor) -> Result<(), VmError> {
        let field_count = ty.members().map(|m| m.static_fields.len()).unwrap_or(0);
        // Statics hold default values until initialization runs.
        ty.install_statics(vec![Value::Null; field_count])?;
        ty.set_status(TypeStatus::Prepared);
        debug!(ty = ty.name(), "statics prepared");
        Ok(())
    }

    /// Prepared→Resolved. Called with the monitor held; drops it around
    /// hierarchy resolution, which may block on other types' monitors.
    fn link_locked(&self, ty: &Arc<TypeDescriptor>) -> Result<(), VmError> {
        ty.monitor().release()?;
        let deps = self.resolve_dependencies(ty);
        ty.monitor().acquire();

        if ty.status() != TypeStatus::Prepared {
            // Another thread completed (or failed) the transition while we
            // were resolving the hierarchy.
            return Ok(());
        }
        let deps = deps?;

        let table = build_table(
            ty,
            deps.super_ty.as_ref(),
            &deps.interfaces,
            self.compiler.as_ref(),
        )?;
        ty.install_table(Arc::new(table))?;
        ty.set_status(TypeStatus::Resolved);
        debug!(ty = ty.name(), "dispatch table published");
        Ok(())
    }

    fn resolve_dependencies(&self, ty: &TypeDescriptor) -> Result<ResolvedDeps, VmError> {
        let def = ty
            .definition()
            .ok_or_else(|| VmError::Internal(format!("`{}` linked before loading", ty.name())))?;

        let mut super_ty = None;
        if let Some(super_name) = &def.super_name {
            let descriptor = self.registry.lookup_or_create(super_name);
            let descriptor = self.resolve(descriptor.id())?;
            let flags = descriptor.flags().ok_or_else(|| {
                VmError::Internal(format!("resolved `{}` has no flags", super_name))
            })?;
            if flags.is_interface {
                return Err(VmError::linkage(
                    ty.name(),
                    format!("superclass `{}` is an interface", super_name),
                ));
            }
            if flags.is_final {
                return Err(VmError::linkage(
                    ty.name(),
                    format!("superclass `{}` is final", super_name),
                ));
            }
            super_ty = Some(descriptor);
        }

        let mut interfaces = Vec::with_capacity(def.interface_names.len());
        for interface_name in &def.interface_names {
            let descriptor = self.registry.lookup_or_create(interface_name);
            let descriptor = self.resolve(descriptor.id())?;
            let is_interface = descriptor
                .flags()
                .map(|flags| flags.is_interface)
                .unwrap_or(false);
            if !is_interface {
                return Err(VmError::linkage(
                    ty.name(),
                    format!("`{}` is not an interface", interface_name),
                ));
            }
            interfaces.push(descriptor);
        }

        Ok(ResolvedDeps {
            super_ty,
            interfaces,
        })
    }

    /// Writes declared static values in declaration order, then runs the
    /// type's static-initializer callable.
    fn run_initializers(&self, ty: &TypeDescriptor) -> Result<(), VmError> {
        let members = ty
            .members()
            .ok_or_else(|| VmError::Internal(format!("`{}` initialized before parsing", ty.name())))?;
        for field in &members.static_fields {
            ty.write_static(field.slot, field.initial.clone())?;
        }
        if let Some(initializer) = self.compiler.static_initializer(ty.name()) {
            initializer()?;
        }
        Ok(())
    }

    /// Parks the type in `Erroneous` and wakes every waiter.
    fn fail_initialization(&self, ty: &TypeDescriptor) {
        ty.monitor().acquire();
        ty.set_status(TypeStatus::Erroneous);
        ty.set_init_owner(0);
        // We own the monitor; notify and release cannot fail.
        let _ = ty.monitor().notify_all();
        let _ = ty.monitor().release();
    }
}

impl std::fmt::Debug for Linker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Linker({:?})", self.registry)
    }
}
