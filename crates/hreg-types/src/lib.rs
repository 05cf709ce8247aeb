//! Foundation types for the handle registry.
//!
//! This crate provides the identity, temporal, and record types shared by
//! every other registry crate. It has no I/O of its own.
//!
//! # Key Types
//!
//! - [`OwnerId`]: UUID v7 identifier of the user entity holding a handle
//! - [`Handle`]: a handle string that has passed the format rules
//! - [`Timestamp`] / [`Clock`]: millisecond wall-clock time, injectable for tests
//! - [`HandleRecord`]: the uniqueness-index document for one handle
//! - [`OwnerRecord`] / [`Owner`]: the owner document with its handle history

pub mod error;
pub mod handle;
pub mod identity;
pub mod record;
pub mod temporal;

pub use error::TypeError;
pub use handle::{validate_format, FormatViolation, Handle, MAX_HANDLE_LEN, MIN_HANDLE_LEN};
pub use identity::OwnerId;
pub use record::{HandleHistoryEntry, HandleRecord, Owner, OwnerRecord};
pub use temporal::{Clock, ManualClock, SystemClock, Timestamp};
