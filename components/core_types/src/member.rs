//! Member keys and declaration flags.
//!
//! A member is identified by its name plus signature string; two
//! declarations with the same `MemberKey` are the same member for
//! overriding and dispatch purposes.

use std::fmt;
use std::sync::Arc;

/// Name + signature pair identifying a callable member.
///
/// Keys are interned per descriptor via `Arc<str>` so cloning one is cheap
/// and comparing two usually short-circuits on pointer identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberKey {
    /// Simple member name, e.g. `toString`.
    pub name: Arc<str>,
    /// Encoded parameter/return signature, e.g. `()Ljava/lang/String;`.
    pub signature: Arc<str>,
}

impl MemberKey {
    /// Creates a key from a name and signature.
    pub fn new(name: impl Into<Arc<str>>, signature: impl Into<Arc<str>>) -> Self {
        MemberKey {
            name: name.into(),
            signature: signature.into(),
        }
    }
}

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.signature)
    }
}

/// Access flags of a type declaration.
///
/// Only the flags the linker acts on are modeled; everything else in a
/// class-file access mask is the parser's concern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeFlags {
    /// Interface rather than class.
    pub is_interface: bool,
    /// May not be instantiated directly.
    pub is_abstract: bool,
    /// May not be extended.
    pub is_final: bool,
}

impl TypeFlags {
    /// Flags for a plain concrete class.
    pub fn class() -> Self {
        TypeFlags::default()
    }

    /// Flags for an interface declaration.
    pub fn interface() -> Self {
        TypeFlags {
            is_interface: true,
            is_abstract: true,
            is_final: false,
        }
    }
}
