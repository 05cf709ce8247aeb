use async_trait::async_trait;

use crate::batch::{Document, DocumentKey, WriteBatch};
use crate::error::StoreResult;

/// Document store addressed by `(collection, key)`.
///
/// All implementations must satisfy these invariants:
/// - `commit` is all-or-nothing: either every operation in the batch is
///   applied or none is, and the caller sees a single error.
/// - Preconditions ([`WriteOp::Create`](crate::WriteOp::Create),
///   [`WriteOp::Update`](crate::WriteOp::Update)) are evaluated in the same
///   critical section as the writes they guard.
/// - Readers never observe a partially applied batch. They may observe a
///   committed batch late.
/// - All I/O errors are propagated, never silently ignored.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document.
    ///
    /// Returns `Ok(None)` if the document does not exist.
    async fn get(&self, key: &DocumentKey) -> StoreResult<Option<Document>>;

    /// Write (create or replace) a document unconditionally.
    async fn put(&self, key: &DocumentKey, document: Document) -> StoreResult<()>;

    /// Delete a document. Returns `true` if it existed.
    async fn delete(&self, key: &DocumentKey) -> StoreResult<bool>;

    /// Apply a batch atomically.
    async fn commit(&self, batch: WriteBatch) -> StoreResult<()>;

    /// Check whether a document exists.
    ///
    /// Default implementation reads the document. Backends may override.
    async fn exists(&self, key: &DocumentKey) -> StoreResult<bool> {
        Ok(self.get(key).await?.is_some())
    }
}
