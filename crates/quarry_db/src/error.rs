//! Error types for the record store.

use thiserror::Error;

/// Record store result type.
pub type Result<T> = std::result::Result<T, DbError>;

/// Record store errors.
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLx error (connection, query, etc.)
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// IO error (file system operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored row could not be mapped back into a record
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),
}

impl DbError {
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptRecord(msg.into())
    }
}
