//! Two-tier object monitor and the minimal heap object that embeds it.
//!
//! Any heap object, type metadata included, owns a one-word [`Monitor`]:
//! - Uncontended acquire/release is a single compare-and-set, no allocation
//! - Contention or wait/notify promotes to a heavyweight record (one-way)
//! - `wait` supports timeouts and surfaces thread interrupts
//!
//! The free functions at the crate root are the surface generated code
//! calls to implement synchronized blocks and wait/notify.
//!
//! # Examples
//!
//! ```
//! use core_types::TypeId;
//! use object_monitor::{acquire, release, HeapObject};
//!
//! let obj = HeapObject::new(TypeId::new(0));
//! acquire(&obj);
//! release(&obj).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod monitor;
pub mod object;

pub use monitor::{Monitor, THIN_RECURSION_CAP};
pub use object::{HeapObject, ObjectHeader};

use core_types::VmError;
use std::time::Duration;

/// Enters `obj`'s monitor, blocking until it is available.
pub fn acquire(obj: &HeapObject) {
    obj.header().monitor().acquire();
}

/// Exits `obj`'s monitor.
pub fn release(obj: &HeapObject) -> Result<(), VmError> {
    obj.header().monitor().release()
}

/// Releases `obj`'s monitor and parks until notified, `timeout` elapses, or
/// the thread is interrupted; re-acquires before returning.
pub fn wait(obj: &HeapObject, timeout: Option<Duration>) -> Result<(), VmError> {
    obj.header().monitor().wait(timeout)
}

/// Wakes one thread waiting on `obj`.
pub fn notify_one(obj: &HeapObject) -> Result<(), VmError> {
    obj.header().monitor().notify_one()
}

/// Wakes every thread waiting on `obj`.
pub fn notify_all(obj: &HeapObject) -> Result<(), VmError> {
    obj.header().monitor().notify_all()
}
