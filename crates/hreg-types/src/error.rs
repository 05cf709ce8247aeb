use thiserror::Error;

use crate::handle::FormatViolation;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid owner id: {0}")]
    InvalidOwnerId(String),

    #[error("invalid handle: {0}")]
    InvalidHandle(FormatViolation),

    #[error("inconsistent handle history: {0}")]
    InconsistentHistory(String),
}
