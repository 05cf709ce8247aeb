//! Username identity registry.
//!
//! This crate keeps the global one-to-one mapping between handles and owners.
//! A handle is reserved by the existence of its [`HandleRecord`] in the
//! handle index; every change to that index goes through exactly one atomic
//! store batch together with the matching owner-side history update.
//!
//! # Architecture
//!
//! - **Create** reserves a handle for a new owner with a create-only write,
//!   so a lost race fails instead of overwriting the winner.
//! - **Rename** moves an owner to a new handle: create the new index record,
//!   compare-and-swap the owner document (closing the old history entry,
//!   opening a new one), and delete the old index record, all in one batch.
//! - **Lookup** resolves handle → owner id → owner document with two point
//!   reads. Any miss is "not found".
//! - **Generate** samples `prefix_suffix` candidates until one is free. It
//!   does not reserve; the caller reserves through create.
//!
//! # Modules
//!
//! - [`error`]: [`RegistryError`] taxonomy
//! - [`config`]: [`RegistryConfig`] and [`GeneratorConfig`]
//! - [`schema`]: collection names and document encoding
//! - [`generator`]: [`HandleGenerator`]
//! - [`registry`]: [`HandleRegistry`] operations
//!
//! [`HandleRecord`]: hreg_types::HandleRecord

pub mod config;
pub mod error;
pub mod generator;
pub mod registry;
pub mod schema;

pub use config::{GeneratorConfig, RegistryConfig};
pub use error::{RegistryError, RegistryResult};
pub use generator::HandleGenerator;
pub use registry::{HandleRegistry, RenameOutcome};
pub use schema::{HANDLES, OWNERS};

pub use hreg_types::{validate_format, FormatViolation, Handle};
