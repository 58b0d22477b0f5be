//! Core vocabulary types for the runtime.
//!
//! This crate provides the foundational types shared by every runtime
//! component: handles, member identity, constant values, the error
//! taxonomy, and VM thread identity.
//!
//! # Overview
//!
//! - [`TypeId`] / [`CodePtr`] - Stable handles for types and native entry
//!   points
//! - [`MemberKey`] / [`TypeFlags`] - Member identity and declaration flags
//! - [`Value`] - Constant values for static fields
//! - [`VmError`] - Linkage, initialization, monitor and dispatch failures
//! - [`vm_thread`] - Compact thread tokens and interrupt flags
//!
//! # Examples
//!
//! ```
//! use core_types::{MemberKey, VmError};
//!
//! let member = MemberKey::new("run", "()V");
//! let err = VmError::UnresolvedMember {
//!     type_name: "Widget".to_string(),
//!     member,
//! };
//! assert!(!err.is_fatal());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod handle;
mod member;
mod value;
pub mod vm_thread;

pub use error::VmError;
pub use handle::{CodePtr, TypeId};
pub use member::{MemberKey, TypeFlags};
pub use value::Value;
pub use vm_thread::ThreadToken;
