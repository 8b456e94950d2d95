//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid document id: {0}")]
    InvalidDocumentId(String),

    #[error("invalid owner id: {0}")]
    InvalidOwner(String),

    #[error("invalid document state: {0}")]
    InvalidState(String),

    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("invalid encoded payload: {0}")]
    InvalidPayload(String),

    #[error("invalid fragment size: {size} (must be between {min} and {max})")]
    InvalidFragmentSize { size: usize, min: usize, max: usize },

    #[error("payload of {encoded_len} bytes needs more than {max} fragments")]
    TooManyFragments { encoded_len: usize, max: u32 },
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
