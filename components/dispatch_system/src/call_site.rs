//! Per-call-site inline caches.
//!
//! A cache maps the receiver's concrete type to a previously resolved entry
//! point. Call sites are overwhelmingly monomorphic, so the most recently
//! used entry sits at the head and the expected lookup is one comparison.
//! There is no eviction: one entry accumulates per distinct receiver type
//! actually observed at the site.

use core_types::{CodePtr, MemberKey, TypeId};
use parking_lot::Mutex;

/// One resolved binding: concrete receiver type → entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry {
    /// Concrete type observed at the call site.
    pub receiver: TypeId,
    /// Entry point resolved for that type.
    pub code: CodePtr,
}

/// Inline cache owned by one dynamically dispatched call site.
///
/// Entries are inserted and read under the cache lock, so a partially
/// formed entry is never visible to another thread. At most one entry
/// exists per receiver type.
#[derive(Debug)]
pub struct CallSiteCache {
    member: MemberKey,
    entries: Mutex<Vec<CacheEntry>>,
}

impl CallSiteCache {
    /// Creates an empty cache for calls to `member`.
    pub fn new(member: MemberKey) -> Self {
        CallSiteCache {
            member,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// The member this call site invokes.
    pub fn member(&self) -> &MemberKey {
        &self.member
    }

    /// Looks up the entry for `receiver`, moving a hit to the head.
    pub fn lookup(&self, receiver: TypeId) -> Option<CodePtr> {
        let mut entries = self.entries.lock();
        let index = entries.iter().position(|e| e.receiver == receiver)?;
        if index != 0 {
            let entry = entries.remove(index);
            entries.insert(0, entry);
        }
        Some(entries[0].code)
    }

    /// Installs the head entry for `receiver`, replacing any previous entry
    /// for the same type.
    pub fn insert(&self, receiver: TypeId, code: CodePtr) {
        let mut entries = self.entries.lock();
        if let Some(index) = entries.iter().position(|e| e.receiver == receiver) {
            entries.remove(index);
        }
        entries.insert(0, CacheEntry { receiver, code });
    }

    /// Number of distinct receiver types cached.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True if no receiver has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
