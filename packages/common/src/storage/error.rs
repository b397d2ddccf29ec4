use thiserror::Error;

/// Errors that can occur during attachment storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested attachment was not found.
    #[error("attachment not found: {0}")]
    NotFound(String),

    /// An I/O error occurred.
    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The given stored name is not a valid attachment reference.
    #[error("invalid stored name: {0}")]
    InvalidName(String),

    /// The attachment exceeds the configured size limit.
    #[error("attachment exceeds size limit ({actual} > {limit} bytes)")]
    SizeLimitExceeded { actual: u64, limit: u64 },
}
