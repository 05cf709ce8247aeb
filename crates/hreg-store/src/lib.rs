//! Document storage for the handle registry.
//!
//! The registry treats its store as a black box addressed by
//! `(collection, key)`. This crate defines that boundary and ships two
//! backends.
//!
//! # Capabilities
//!
//! - point read, point write, point delete
//! - [`WriteBatch`] commit: heterogeneous writes and deletes across keys and
//!   collections that apply all-or-nothing
//! - per-operation preconditions inside a batch: [`WriteOp::Create`] fails if
//!   the key exists, [`WriteOp::Update`] fails unless the stored document
//!   equals the expected snapshot
//!
//! # Storage Backends
//!
//! All backends implement the [`DocumentStore`] trait:
//!
//! - [`InMemoryDocumentStore`] -- map-based store for tests and embedding,
//!   with call statistics and fault injection
//! - [`JsonFileStore`] -- whole-file JSON snapshot, replaced atomically on
//!   every mutation
//!
//! # Design Rules
//!
//! 1. A failed batch leaves no trace: preconditions are checked for every
//!    operation before any operation is applied.
//! 2. Readers never observe a partially applied batch.
//! 3. The store never interprets documents beyond equality checks.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod batch;
pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use batch::{Collections, Document, DocumentKey, WriteBatch, WriteOp};
pub use error::{PreconditionKind, StoreError, StoreResult};
pub use file::JsonFileStore;
pub use memory::{InMemoryDocumentStore, StoreStats};
pub use traits::DocumentStore;
