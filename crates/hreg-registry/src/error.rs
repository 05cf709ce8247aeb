//! Error types for registry operations.

use thiserror::Error;

use hreg_store::StoreError;
use hreg_types::{FormatViolation, OwnerId};

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The candidate failed the format rules. Never touches the store.
    #[error("invalid handle format: {0}")]
    InvalidFormat(FormatViolation),

    /// The handle is held by another owner.
    #[error("handle already taken: {handle}")]
    HandleTaken { handle: String },

    /// The owner document does not exist.
    #[error("owner not found: {owner}")]
    OwnerNotFound { owner: OwnerId },

    /// The owner already holds a handle; use rename instead.
    #[error("owner already has a handle: {owner}")]
    AlreadyProvisioned { owner: OwnerId },

    /// The owner document changed between read and commit.
    #[error("owner was modified concurrently: {owner}")]
    ConcurrentModification { owner: OwnerId },

    /// No free handle was found within the attempt bound.
    #[error("handle generation exhausted after {attempts} attempts")]
    GenerationExhausted { attempts: u32 },

    /// The store failed transiently. Nothing was committed.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A stored document could not be decoded.
    #[error("corrupt document: {0}")]
    Corrupt(String),

    /// Configuration could not be parsed or is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl RegistryError {
    /// Returns `true` if retrying the whole operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable(_) | Self::ConcurrentModification { .. }
        )
    }
}

impl From<FormatViolation> for RegistryError {
    fn from(violation: FormatViolation) -> Self {
        Self::InvalidFormat(violation)
    }
}

/// Store errors outside a batch context. Precondition failures are mapped
/// at the commit site, where the offending key has a meaning.
impl From<StoreError> for RegistryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Serialization(msg) => Self::Corrupt(msg),
            other => Self::StoreUnavailable(other.to_string()),
        }
    }
}

/// Convenience type alias for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
