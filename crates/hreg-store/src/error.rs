use crate::batch::DocumentKey;

/// Which batch precondition failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreconditionKind {
    /// A create-only write found an existing document.
    AlreadyExists,
    /// A compare-and-swap update found a different (or missing) document.
    Mismatch,
}

/// Errors from document store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A batch precondition failed; nothing in the batch was applied.
    #[error("precondition failed for {key}: {kind:?}")]
    PreconditionFailed {
        key: DocumentKey,
        kind: PreconditionKind,
    },

    /// The backend cannot be reached or refused the operation. Retryable.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Returns `true` for transient failures a caller may retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Io(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
