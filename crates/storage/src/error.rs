//! Storage error types.

use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    /// The store has no multipart upload with this id: it never existed,
    /// expired, or was already completed or aborted.
    #[error("unknown upload session: {0}")]
    UploadNotFound(String),

    #[error("invalid part: {0}")]
    InvalidPart(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("S3 error: {0}")]
    S3(#[from] Box<dyn std::error::Error + Send + Sync>),

    #[error("presign error: {0}")]
    Presign(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
