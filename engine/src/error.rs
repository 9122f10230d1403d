//! Error types for the boardsync engine.

use thiserror::Error;

/// All possible errors from the boardsync engine.
///
/// Order assignment itself is total and never fails; the only failure mode
/// is decoding a malformed persisted tag.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("invalid card status tag: {0}")]
    InvalidCardStatus(u8),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
