//! Minimal heap object representation.
//!
//! The runtime core needs just enough of an object to synchronize on it and
//! dispatch through it: a header carrying the concrete type handle and the
//! embedded monitor. Field layout and reclamation belong to the
//! collaborating allocator and collector.

use core_types::{TypeId, Value};

use crate::monitor::Monitor;

/// Header present at the start of every heap object.
#[derive(Debug)]
pub struct ObjectHeader {
    type_id: TypeId,
    monitor: Monitor,
}

impl ObjectHeader {
    /// Creates a header for an instance of `type_id` with an unlocked
    /// monitor.
    pub fn new(type_id: TypeId) -> Self {
        ObjectHeader {
            type_id,
            monitor: Monitor::new(),
        }
    }

    /// The concrete type of the object this header belongs to.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The object's monitor.
    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }
}

/// A heap object: header plus instance field storage.
#[derive(Debug)]
pub struct HeapObject {
    header: ObjectHeader,
    fields: Vec<Value>,
}

impl HeapObject {
    /// Allocates an instance of `type_id` with no fields.
    pub fn new(type_id: TypeId) -> Self {
        HeapObject {
            header: ObjectHeader::new(type_id),
            fields: Vec::new(),
        }
    }

    /// Allocates an instance of `type_id` with the given field values.
    pub fn with_fields(type_id: TypeId, fields: Vec<Value>) -> Self {
        HeapObject {
            header: ObjectHeader::new(type_id),
            fields,
        }
    }

    /// The object's header.
    pub fn header(&self) -> &ObjectHeader {
        &self.header
    }

    /// The object's concrete type.
    pub fn type_id(&self) -> TypeId {
        self.header.type_id()
    }

    /// Reads an instance field slot.
    pub fn field(&self, index: usize) -> Option<&Value> {
        self.fields.get(index)
    }
}
