//! Runtime error taxonomy.
//!
//! Four error families cover the core: linkage failures (a type could not be
//! loaded, parsed, prepared or resolved), initialization failures (a static
//! initializer raised), monitor misuse, and unresolved member lookups. A
//! small fatal category is never wrapped when it propagates out of a static
//! initializer.

use thiserror::Error;

use crate::member::MemberKey;

/// Any failure produced by the runtime core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VmError {
    /// A type could not be linked: missing or malformed definition, circular
    /// hierarchy, incompatible super/interface, or a previous failed attempt.
    #[error("linkage of type `{type_name}` failed: {message}")]
    Linkage {
        /// The type whose linkage failed.
        type_name: String,
        /// What went wrong.
        message: String,
    },

    /// A static initializer raised; `cause` is the original failure.
    #[error("initialization of type `{type_name}` failed")]
    Initialization {
        /// The type whose initializer failed.
        type_name: String,
        /// The wrapped original failure.
        #[source]
        cause: Box<VmError>,
    },

    /// wait/notify/release performed by a thread that does not own the
    /// monitor.
    #[error("illegal monitor state: {0}")]
    IllegalMonitorState(String),

    /// A dispatch lookup found no member, or only an abstract one.
    #[error("unresolved member `{member}` on type `{type_name}`")]
    UnresolvedMember {
        /// Receiver type the lookup started from.
        type_name: String,
        /// The member that could not be resolved.
        member: MemberKey,
    },

    /// A monitor wait was cut short by a thread interrupt.
    #[error("monitor wait interrupted")]
    InterruptedWait,

    /// Allocation failed. Fatal: never wrapped.
    #[error("out of memory")]
    OutOfMemory,

    /// Guest stack exhausted. Fatal: never wrapped.
    #[error("stack overflow")]
    StackOverflow,

    /// Invariant violation inside the runtime itself. Fatal: never wrapped.
    #[error("internal runtime fault: {0}")]
    Internal(String),
}

impl VmError {
    /// Builds a linkage failure for `type_name`.
    pub fn linkage(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        VmError::Linkage {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// The error every waiter and later caller observes once a type is
    /// erroneous. The original cause is only seen by the thread that drove
    /// the failure.
    pub fn previously_failed(type_name: impl Into<String>) -> Self {
        VmError::linkage(
            type_name,
            "type failed during an earlier linkage or initialization attempt",
        )
    }

    /// Wraps `cause` as an initialization failure of `type_name`, unless the
    /// cause is fatal, in which case it propagates unchanged.
    pub fn initialization(type_name: impl Into<String>, cause: VmError) -> Self {
        if cause.is_fatal() {
            return cause;
        }
        VmError::Initialization {
            type_name: type_name.into(),
            cause: Box::new(cause),
        }
    }

    /// True for the non-wrappable category: out-of-memory, stack overflow,
    /// and internal faults.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            VmError::OutOfMemory | VmError::StackOverflow | VmError::Internal(_)
        )
    }
}
