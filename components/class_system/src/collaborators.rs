//! Collaborator interfaces consumed by the linker.
//!
//! Parsing/verification and native code generation are external to the
//! runtime core. The linker consumes them through two traits: `TypeSource`
//! hands out raw definitions keyed by name, and `Compiler` is a
//! get-callable-pointer service that lazily compiles members on first
//! request.

use std::sync::Arc;

use core_types::{CodePtr, MemberKey, TypeFlags, Value, VmError};

/// Callable that runs a type's static initializer.
pub type StaticInitializer = Arc<dyn Fn() -> Result<(), VmError> + Send + Sync>;

/// One method row of a raw type definition.
#[derive(Debug, Clone)]
pub struct MethodDefinition {
    /// Name + signature identifying the method.
    pub key: MemberKey,
    /// Declared without a body; occupies a slot but carries no code.
    pub is_abstract: bool,
}

/// One static field row of a raw type definition, with the constant its
/// initializer assigns.
#[derive(Debug, Clone)]
pub struct StaticFieldDefinition {
    /// Field name, unique within the declaring type.
    pub name: Arc<str>,
    /// Value assigned when the type is initialized.
    pub initial: Value,
}

/// A parsed type definition as delivered by the parser collaborator.
#[derive(Debug, Clone, Default)]
pub struct TypeDefinition {
    /// Declaration flags.
    pub flags: TypeFlags,
    /// Name of the superclass; `None` for root classes and interfaces.
    pub super_name: Option<Arc<str>>,
    /// Directly implemented interfaces (or, for an interface, the
    /// interfaces it extends).
    pub interface_names: Vec<Arc<str>>,
    /// Declared methods, in declaration order.
    pub methods: Vec<MethodDefinition>,
    /// Declared static fields, in declaration order.
    pub static_fields: Vec<StaticFieldDefinition>,
}

impl TypeDefinition {
    /// A concrete class definition with no super, members or interfaces.
    pub fn class() -> Self {
        TypeDefinition::default()
    }

    /// An interface definition.
    pub fn interface() -> Self {
        TypeDefinition {
            flags: TypeFlags::interface(),
            ..TypeDefinition::default()
        }
    }

    /// Sets the superclass name.
    pub fn with_super(mut self, name: impl Into<Arc<str>>) -> Self {
        self.super_name = Some(name.into());
        self
    }

    /// Adds an implemented (or extended) interface name.
    pub fn with_interface(mut self, name: impl Into<Arc<str>>) -> Self {
        self.interface_names.push(name.into());
        self
    }

    /// Adds a concrete method.
    pub fn with_method(mut self, name: &str, signature: &str) -> Self {
        self.methods.push(MethodDefinition {
            key: MemberKey::new(name, signature),
            is_abstract: false,
        });
        self
    }

    /// Adds an abstract method.
    pub fn with_abstract_method(mut self, name: &str, signature: &str) -> Self {
        self.methods.push(MethodDefinition {
            key: MemberKey::new(name, signature),
            is_abstract: true,
        });
        self
    }

    /// Adds a static field with its declared initial value.
    pub fn with_static_field(mut self, name: impl Into<Arc<str>>, initial: Value) -> Self {
        self.static_fields.push(StaticFieldDefinition {
            name: name.into(),
            initial,
        });
        self
    }
}

/// Parser/loader I/O: given a type name, produce its definition.
///
/// A failed load is a linkage failure; the linker records it on the
/// requesting descriptor.
pub trait TypeSource: Send + Sync {
    /// Loads the raw definition for `name`.
    fn load(&self, name: &str) -> Result<TypeDefinition, VmError>;
}

/// Native code generation service.
///
/// Compiles lazily on first request; repeated requests for the same member
/// return the same entry point.
pub trait Compiler: Send + Sync {
    /// Returns the callable entry point of `member` as declared (or
    /// overridden) by `type_name`.
    fn entry_point(&self, type_name: &str, member: &MemberKey) -> Result<CodePtr, VmError>;

    /// The static-initializer callable of `type_name`, if the type has one.
    fn static_initializer(&self, type_name: &str) -> Option<StaticInitializer> {
        let _ = type_name;
        None
    }

    /// Per-type trace callback handed to the collector through the
    /// dispatch-table header, if one exists.
    fn trace_entry(&self, type_name: &str) -> Option<CodePtr> {
        let _ = type_name;
        None
    }
}
