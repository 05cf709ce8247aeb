//! Collection layout and document encoding.
//!
//! - `handles/{handle}` holds a [`HandleRecord`](hreg_types::HandleRecord)
//! - `users/{owner_id}` holds an [`OwnerRecord`](hreg_types::OwnerRecord)

use serde::de::DeserializeOwned;
use serde::Serialize;

use hreg_store::{Document, DocumentKey};
use hreg_types::{Handle, OwnerId};

use crate::error::{RegistryError, RegistryResult};

/// The handle index collection.
pub const HANDLES: &str = "handles";

/// The owner collection.
pub const OWNERS: &str = "users";

pub fn handle_key(handle: &Handle) -> DocumentKey {
    DocumentKey::new(HANDLES, handle.as_str())
}

pub fn owner_key(owner: &OwnerId) -> DocumentKey {
    DocumentKey::new(OWNERS, owner.to_key())
}

pub fn encode<T: Serialize>(value: &T) -> RegistryResult<Document> {
    serde_json::to_value(value).map_err(|e| RegistryError::Corrupt(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(key: &DocumentKey, document: Document) -> RegistryResult<T> {
    serde_json::from_value(document).map_err(|e| RegistryError::Corrupt(format!("{key}: {e}")))
}
