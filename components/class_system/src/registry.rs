//! Per-loader type namespace.
//!
//! One `TypeRegistry` models one loader scope: it owns the name→type map,
//! the backing arena of descriptors, and the interned names. Multiple
//! registries can coexist; handles must never cross registries.

use std::collections::HashMap;
use std::sync::Arc;

use core_types::TypeId;
use parking_lot::Mutex;

use crate::descriptor::TypeDescriptor;

struct RegistryInner {
    by_name: HashMap<Arc<str>, TypeId>,
    arena: Vec<Arc<TypeDescriptor>>,
}

/// Owns the name→type namespace for one loader scope.
///
/// The registry lock is held only for map mutation, never across a type's
/// own lifecycle transitions, so registry contention cannot block
/// resolution of unrelated types.
pub struct TypeRegistry {
    inner: Mutex<RegistryInner>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        TypeRegistry {
            inner: Mutex::new(RegistryInner {
                by_name: HashMap::new(),
                arena: Vec::new(),
            }),
        }
    }

    /// Returns the existing descriptor for `name`, or atomically inserts a
    /// fresh one in state `Named`.
    ///
    /// Exactly one descriptor exists per (registry, name) for the
    /// registry's lifetime; creation never fails. Downstream failures mark
    /// the descriptor erroneous, not the registry.
    pub fn lookup_or_create(&self, name: &str) -> Arc<TypeDescriptor> {
        let mut inner = self.inner.lock();
        if let Some(&id) = inner.by_name.get(name) {
            return inner.arena[id.index()].clone();
        }
        let id = TypeId::new(inner.arena.len() as u32);
        let interned: Arc<str> = Arc::from(name);
        let descriptor = Arc::new(TypeDescriptor::new(id, interned.clone()));
        inner.arena.push(descriptor.clone());
        inner.by_name.insert(interned, id);
        descriptor
    }

    /// Non-creating lookup by name.
    pub fn lookup(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        let inner = self.inner.lock();
        inner
            .by_name
            .get(name)
            .map(|id| inner.arena[id.index()].clone())
    }

    /// Resolves a handle issued by this registry.
    ///
    /// # Panics
    ///
    /// Panics if `id` was issued by a different registry.
    pub fn get(&self, id: TypeId) -> Arc<TypeDescriptor> {
        self.inner.lock().arena[id.index()].clone()
    }

    /// Number of descriptors in this registry.
    pub fn len(&self) -> usize {
        self.inner.lock().arena.len()
    }

    /// True if no type has been named yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TypeRegistry({} types)", self.len())
    }
}
