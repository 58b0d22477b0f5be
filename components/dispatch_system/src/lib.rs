//! Call-site dispatch for the runtime core.
//!
//! Two dispatch strategies coexist behind [`CallSite`]:
//! - Slot dispatch for ordinary virtual calls: one read of the receiver's
//!   dispatch table at a statically fixed index
//! - Cached dispatch for interface calls (and anything else without a
//!   fixed slot): a per-site [`CallSiteCache`] in front of the full
//!   ancestor-walk resolver
//!
//! # Examples
//!
//! ```no_run
//! use core_types::MemberKey;
//! use dispatch_system::{CallSite, Dispatcher};
//! # fn demo(dispatcher: &Dispatcher, receiver: &object_monitor::HeapObject) {
//! let site = CallSite::cached(MemberKey::new("run", "()V"));
//! let entry = dispatcher.dispatch(receiver, &site).unwrap();
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod call_site;
pub mod dispatcher;
pub mod resolver;

pub use call_site::{CacheEntry, CallSiteCache};
pub use dispatcher::{CallSite, Dispatcher};
pub use resolver::resolve_member;
