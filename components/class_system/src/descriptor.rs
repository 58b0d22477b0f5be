//! Per-type runtime metadata.
//!
//! A `TypeDescriptor` is created in state `Named` the first time its name is
//! referenced within a registry and lives as long as that registry. All
//! lifecycle fields are written only by the thread holding the descriptor's
//! own monitor; the status word is additionally readable lock-free for the
//! hot paths.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use core_types::{MemberKey, TypeFlags, TypeId, Value, VmError};
use object_monitor::Monitor;
use parking_lot::RwLock;

use crate::collaborators::TypeDefinition;
use crate::dispatch_table::DispatchTable;

/// Lifecycle states of a type.
///
/// The order is monotonic except for the absorbing `Erroneous` state.
/// `Initializing` is a transient marker used only during the
/// Resolved→Ready transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TypeStatus {
    /// Referenced by name; nothing loaded yet.
    Named = 0,
    /// Raw definition fetched from the type source.
    Loaded = 1,
    /// Member/signature tables validated and interned.
    Parsed = 2,
    /// Static storage allocated with default values.
    Prepared = 3,
    /// Hierarchy resolved and dispatch table published.
    Resolved = 4,
    /// A thread is running the static initializer.
    Initializing = 5,
    /// Fully usable.
    Ready = 6,
    /// A linkage or initialization attempt failed; terminal.
    Erroneous = 7,
}

impl TypeStatus {
    fn from_u8(raw: u8) -> TypeStatus {
        match raw {
            0 => TypeStatus::Named,
            1 => TypeStatus::Loaded,
            2 => TypeStatus::Parsed,
            3 => TypeStatus::Prepared,
            4 => TypeStatus::Resolved,
            5 => TypeStatus::Initializing,
            6 => TypeStatus::Ready,
            _ => TypeStatus::Erroneous,
        }
    }

    /// True once the dispatch table is published (Resolved, Initializing or
    /// Ready).
    pub fn is_resolved(self) -> bool {
        matches!(
            self,
            TypeStatus::Resolved | TypeStatus::Initializing | TypeStatus::Ready
        )
    }
}

/// A declared method with its assigned dispatch slot.
#[derive(Debug)]
pub struct MethodInfo {
    /// Name + signature.
    pub key: MemberKey,
    /// Declared without a body.
    pub is_abstract: bool,
    slot: OnceLock<usize>,
}

impl MethodInfo {
    pub(crate) fn new(key: MemberKey, is_abstract: bool) -> Self {
        MethodInfo {
            key,
            is_abstract,
            slot: OnceLock::new(),
        }
    }

    /// The dispatch-table slot assigned when the declaring type's table was
    /// built; `None` before that.
    pub fn slot(&self) -> Option<usize> {
        self.slot.get().copied()
    }

    pub(crate) fn assign_slot(&self, index: usize) {
        // Assigned exactly once, by the table builder.
        let _ = self.slot.set(index);
    }
}

/// A declared static field and its slot in the statics storage.
#[derive(Debug)]
pub struct StaticFieldInfo {
    /// Field name.
    pub name: Arc<str>,
    /// Index into the statics storage.
    pub slot: usize,
    /// Constant assigned during initialization.
    pub initial: Value,
}

/// Validated member tables, built at the Loaded→Parsed transition.
#[derive(Debug, Default)]
pub struct MemberTable {
    /// Declared methods in declaration order.
    pub methods: Vec<MethodInfo>,
    /// Declared static fields in declaration order.
    pub static_fields: Vec<StaticFieldInfo>,
}

impl MemberTable {
    /// Finds a declared method by key.
    pub fn method(&self, key: &MemberKey) -> Option<&MethodInfo> {
        self.methods.iter().find(|m| &m.key == key)
    }

    /// Finds the statics-storage slot of a declared static field.
    pub fn static_slot(&self, name: &str) -> Option<usize> {
        self.static_fields
            .iter()
            .find(|f| f.name.as_ref() == name)
            .map(|f| f.slot)
    }
}

/// Runtime metadata for one named type within a registry.
#[derive(Debug)]
pub struct TypeDescriptor {
    id: TypeId,
    name: Arc<str>,
    monitor: Monitor,
    status: AtomicU8,
    /// Thread token of the initializing thread; 0 outside `Initializing`.
    init_owner: AtomicU32,
    definition: OnceLock<TypeDefinition>,
    members: OnceLock<MemberTable>,
    statics: OnceLock<RwLock<Vec<Value>>>,
    table: OnceLock<Arc<DispatchTable>>,
}

impl TypeDescriptor {
    pub(crate) fn new(id: TypeId, name: Arc<str>) -> Self {
        TypeDescriptor {
            id,
            name,
            monitor: Monitor::new(),
            status: AtomicU8::new(TypeStatus::Named as u8),
            init_owner: AtomicU32::new(0),
            definition: OnceLock::new(),
            members: OnceLock::new(),
            statics: OnceLock::new(),
            table: OnceLock::new(),
        }
    }

    /// The handle this descriptor is registered under.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The fully qualified type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> &Arc<str> {
        &self.name
    }

    /// The descriptor's own monitor; backs every lifecycle transition.
    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// Current lifecycle status (lock-free read).
    pub fn status(&self) -> TypeStatus {
        TypeStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub(crate) fn set_status(&self, status: TypeStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    pub(crate) fn init_owner_raw(&self) -> u32 {
        self.init_owner.load(Ordering::Acquire)
    }

    pub(crate) fn set_init_owner(&self, token: u32) {
        self.init_owner.store(token, Ordering::Release);
    }

    /// Declaration flags; `None` until the definition is loaded.
    pub fn flags(&self) -> Option<TypeFlags> {
        self.definition.get().map(|def| def.flags)
    }

    pub(crate) fn definition(&self) -> Option<&TypeDefinition> {
        self.definition.get()
    }

    pub(crate) fn install_definition(&self, def: TypeDefinition) -> Result<(), VmError> {
        self.definition
            .set(def)
            .map_err(|_| VmError::Internal(format!("definition of `{}` installed twice", self.name)))
    }

    /// Validated member tables; `None` until the type is parsed.
    pub fn members(&self) -> Option<&MemberTable> {
        self.members.get()
    }

    pub(crate) fn install_members(&self, members: MemberTable) -> Result<(), VmError> {
        self.members
            .set(members)
            .map_err(|_| VmError::Internal(format!("members of `{}` installed twice", self.name)))
    }

    pub(crate) fn install_statics(&self, storage: Vec<Value>) -> Result<(), VmError> {
        self.statics
            .set(RwLock::new(storage))
            .map_err(|_| VmError::Internal(format!("statics of `{}` installed twice", self.name)))
    }

    pub(crate) fn write_static(&self, slot: usize, value: Value) -> Result<(), VmError> {
        let storage = self
            .statics
            .get()
            .ok_or_else(|| VmError::Internal(format!("`{}` has no statics storage", self.name)))?;
        let mut storage = storage.write();
        if slot >= storage.len() {
            return Err(VmError::Internal(format!(
                "static slot {} out of range for `{}`",
                slot, self.name
            )));
        }
        storage[slot] = value;
        Ok(())
    }

    /// Reads a static field by name. `None` if the field does not exist or
    /// the type is not yet prepared.
    pub fn static_value(&self, name: &str) -> Option<Value> {
        let slot = self.members.get()?.static_slot(name)?;
        self.statics.get().map(|s| s.read()[slot].clone())
    }

    /// The published dispatch table; `None` before the type is resolved.
    pub fn dispatch_table(&self) -> Option<&Arc<DispatchTable>> {
        self.table.get()
    }

    /// The published dispatch table, or a linkage failure if the type has
    /// not reached `Resolved`.
    pub fn resolved_table(&self) -> Result<&Arc<DispatchTable>, VmError> {
        self.table
            .get()
            .ok_or_else(|| VmError::linkage(self.name(), "type is not resolved"))
    }

    pub(crate) fn install_table(&self, table: Arc<DispatchTable>) -> Result<(), VmError> {
        self.table
            .set(table)
            .map_err(|_| VmError::Internal(format!("dispatch table of `{}` built twice", self.name)))
    }

    /// The superclass handle, once resolved.
    pub fn super_id(&self) -> Option<TypeId> {
        self.table
            .get()
            .and_then(|t| t.super_table().map(|s| s.owner()))
    }

    /// Names of the directly implemented (or extended) interfaces; `None`
    /// until the definition is loaded.
    pub fn interface_names(&self) -> Option<&[Arc<str>]> {
        self.definition
            .get()
            .map(|def| def.interface_names.as_slice())
    }
}
