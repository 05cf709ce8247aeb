//! Keys, documents, and atomic write batches.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PreconditionKind, StoreError, StoreResult};

/// A stored document. The store only compares documents for equality.
pub type Document = serde_json::Value;

/// Address of a document: `(collection, key)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentKey {
    pub collection: String,
    pub key: String,
}

impl DocumentKey {
    pub fn new(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.key)
    }
}

/// A single operation inside a [`WriteBatch`].
#[derive(Clone, Debug, PartialEq)]
pub enum WriteOp {
    /// Write only if no document exists at `key`.
    Create { key: DocumentKey, document: Document },
    /// Write unconditionally.
    Put { key: DocumentKey, document: Document },
    /// Replace only if the current document equals `expected`.
    Update {
        key: DocumentKey,
        expected: Document,
        document: Document,
    },
    /// Remove the document if present.
    Delete { key: DocumentKey },
}

impl WriteOp {
    pub fn key(&self) -> &DocumentKey {
        match self {
            Self::Create { key, .. }
            | Self::Put { key, .. }
            | Self::Update { key, .. }
            | Self::Delete { key } => key,
        }
    }

    fn is_delete(&self) -> bool {
        matches!(self, Self::Delete { .. })
    }
}

/// An ordered set of operations committed all-or-nothing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(mut self, key: DocumentKey, document: Document) -> Self {
        self.ops.push(WriteOp::Create { key, document });
        self
    }

    pub fn put(mut self, key: DocumentKey, document: Document) -> Self {
        self.ops.push(WriteOp::Put { key, document });
        self
    }

    pub fn update(mut self, key: DocumentKey, expected: Document, document: Document) -> Self {
        self.ops.push(WriteOp::Update {
            key,
            expected,
            document,
        });
        self
    }

    pub fn delete(mut self, key: DocumentKey) -> Self {
        self.ops.push(WriteOp::Delete { key });
        self
    }

    pub fn push(&mut self, op: WriteOp) {
        self.ops.push(op);
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of operations that write a document (everything but deletes).
    pub fn write_count(&self) -> usize {
        self.ops.iter().filter(|op| !op.is_delete()).count()
    }

    /// Number of delete operations.
    pub fn delete_count(&self) -> usize {
        self.ops.iter().filter(|op| op.is_delete()).count()
    }
}

impl IntoIterator for WriteBatch {
    type Item = WriteOp;
    type IntoIter = std::vec::IntoIter<WriteOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

/// All documents of a store, grouped by collection.
///
/// Shared by the in-memory and file backends. Serializes as a nested JSON
/// object `{ collection: { key: document } }`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Collections(BTreeMap<String, BTreeMap<String, Document>>);

impl Collections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &DocumentKey) -> Option<&Document> {
        self.0.get(&key.collection)?.get(&key.key)
    }

    pub fn put(&mut self, key: &DocumentKey, document: Document) {
        self.0
            .entry(key.collection.clone())
            .or_default()
            .insert(key.key.clone(), document);
    }

    pub fn delete(&mut self, key: &DocumentKey) -> bool {
        let Some(collection) = self.0.get_mut(&key.collection) else {
            return false;
        };
        let removed = collection.remove(&key.key).is_some();
        if collection.is_empty() {
            self.0.remove(&key.collection);
        }
        removed
    }

    /// Number of documents in `collection`.
    pub fn count(&self, collection: &str) -> usize {
        self.0.get(collection).map_or(0, BTreeMap::len)
    }

    /// Total number of documents across all collections.
    pub fn len(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sorted keys of `collection`.
    pub fn keys(&self, collection: &str) -> Vec<String> {
        self.0
            .get(collection)
            .map(|docs| docs.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Check every precondition in `batch` against the current state.
    ///
    /// Operations are evaluated in order, so a later operation sees the
    /// effect of an earlier one on the same key.
    pub fn check(&self, batch: &WriteBatch) -> StoreResult<()> {
        let mut staged: HashMap<&DocumentKey, Option<&Document>> = HashMap::new();
        for op in batch.ops() {
            let key = op.key();
            let current = match staged.get(key) {
                Some(doc) => *doc,
                None => self.get(key),
            };
            match op {
                WriteOp::Create { document, .. } => {
                    if current.is_some() {
                        return Err(StoreError::PreconditionFailed {
                            key: key.clone(),
                            kind: PreconditionKind::AlreadyExists,
                        });
                    }
                    staged.insert(key, Some(document));
                }
                WriteOp::Update {
                    expected, document, ..
                } => {
                    if current != Some(expected) {
                        return Err(StoreError::PreconditionFailed {
                            key: key.clone(),
                            kind: PreconditionKind::Mismatch,
                        });
                    }
                    staged.insert(key, Some(document));
                }
                WriteOp::Put { document, .. } => {
                    staged.insert(key, Some(document));
                }
                WriteOp::Delete { .. } => {
                    staged.insert(key, None);
                }
            }
        }
        Ok(())
    }

    /// Check and then apply `batch`. On error nothing is applied.
    pub fn apply(&mut self, batch: WriteBatch) -> StoreResult<()> {
        self.check(&batch)?;
        for op in batch {
            match op {
                WriteOp::Create { key, document }
                | WriteOp::Put { key, document }
                | WriteOp::Update { key, document, .. } => self.put(&key, document),
                WriteOp::Delete { key } => {
                    self.delete(&key);
                }
            }
        }
        Ok(())
    }
}
