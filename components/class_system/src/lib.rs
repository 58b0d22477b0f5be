//! Type registry, lifecycle, and dispatch-table construction.
//!
//! This crate is the linking half of the runtime core:
//! - [`TypeRegistry`] - one loader scope's name→type namespace and arena
//! - [`TypeDescriptor`] - per-type metadata with an atomic lifecycle status
//! - [`Linker`] - the Named→…→Ready state machine with its concurrency
//!   protocol (exclusive-with-waiters transitions, re-entrant
//!   initialization, sticky `Erroneous`)
//! - [`DispatchTable`] - per-type slot array, ancestor display and
//!   secondary types, built once at the Prepared→Resolved transition
//! - [`TypeSource`] / [`Compiler`] - collaborator traits for parsing and
//!   native code generation
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use class_system::{Compiler, Linker, TypeDefinition, TypeRegistry, TypeSource};
//! use core_types::{CodePtr, MemberKey, VmError};
//!
//! struct OneClass;
//! impl TypeSource for OneClass {
//!     fn load(&self, name: &str) -> Result<TypeDefinition, VmError> {
//!         match name {
//!             "Widget" => Ok(TypeDefinition::class().with_method("run", "()V")),
//!             _ => Err(VmError::linkage(name, "not found")),
//!         }
//!     }
//! }
//!
//! struct NoCompile;
//! impl Compiler for NoCompile {
//!     fn entry_point(&self, _: &str, _: &MemberKey) -> Result<CodePtr, VmError> {
//!         Ok(CodePtr::new(0x1000))
//!     }
//! }
//!
//! let linker = Linker::new(
//!     Arc::new(TypeRegistry::new()),
//!     Arc::new(OneClass),
//!     Arc::new(NoCompile),
//! );
//! let widget = linker.type_named("Widget");
//! linker.ensure_ready(widget.id()).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod collaborators;
pub mod descriptor;
pub mod dispatch_table;
pub mod lifecycle;
pub mod registry;

pub use collaborators::{
    Compiler, MethodDefinition, StaticFieldDefinition, StaticInitializer, TypeDefinition,
    TypeSource,
};
pub use descriptor::{MemberTable, MethodInfo, StaticFieldInfo, TypeDescriptor, TypeStatus};
pub use dispatch_table::{is_assignable_from, DispatchSlot, DispatchTable};
pub use lifecycle::Linker;
pub use registry::TypeRegistry;
