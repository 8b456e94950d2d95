//! Storage error types.

use thiserror::Error;

/// SQLite result codes for lock contention (SQLITE_BUSY, SQLITE_LOCKED).
const SQLITE_TRANSIENT_CODES: [&str; 2] = ["5", "6"];

/// Fragment store operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("record already exists: {0}")]
    AlreadyExists(String),

    #[error("record for {key} is {size} bytes (ceiling {limit})")]
    RecordTooLarge {
        key: String,
        size: usize,
        limit: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{matches} records share key {key}")]
    Ambiguous { key: String, matches: usize },

    #[error("corrupt record {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Whether retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Unavailable(_) => true,
            StoreError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ),
            StoreError::Database(e) => match e {
                sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => true,
                sqlx::Error::Database(db) => db
                    .code()
                    .is_some_and(|code| SQLITE_TRANSIENT_CODES.contains(&code.as_ref())),
                _ => false,
            },
            StoreError::NotFound(_)
            | StoreError::AlreadyExists(_)
            | StoreError::RecordTooLarge { .. }
            | StoreError::Ambiguous { .. }
            | StoreError::Corrupt { .. }
            | StoreError::Config(_) => false,
        }
    }
}

/// Result type for storage operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
