//! Unified error handling for the client core.

use crate::store::StoreError;

/// Failures surfaced by the access layer to its callers.
///
/// All variants are terminal: the access layer performs no retries beyond
/// the store's own transaction-retry contract.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("not authenticated")]
    NotAuthenticated,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transaction conflict: retry budget exhausted")]
    ConflictExceeded,

    #[error("document store unavailable")]
    StoreUnavailable,

    #[error("validation failed: {0}")]
    Validation(String),
}

impl From<StoreError> for AccessError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(path) => AccessError::NotFound(path),
            StoreError::Conflict | StoreError::ConflictExceeded(_) => AccessError::ConflictExceeded,
            StoreError::Unavailable => AccessError::StoreUnavailable,
            StoreError::InvalidDocument { path, reason } => {
                AccessError::Validation(format!("malformed document {path}: {reason}"))
            }
        }
    }
}

/// Result type alias for access-layer operations.
pub type Result<T> = std::result::Result<T, AccessError>;
