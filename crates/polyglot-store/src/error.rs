use thiserror::Error;

/// Errors surfaced by the message store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The message has no scope identifier.
    #[error("invalid message: scope id is empty")]
    InvalidScope,

    /// The message has no author identifier.
    #[error("invalid message: author id is empty")]
    InvalidAuthor,

    /// The message has no identifier of its own.
    #[error("invalid message: message id is empty")]
    InvalidId,

    /// Underlying SQLite / rusqlite error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;
