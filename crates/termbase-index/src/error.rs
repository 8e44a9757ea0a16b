//! Error types for the index crate.

/// Errors that can occur while persisting or restoring an index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The cache file could not be decoded.
    #[error("corrupt index cache {path}: {reason}")]
    Corrupt { path: String, reason: String },

    /// The cache was written by an incompatible format version.
    #[error("index cache version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    /// The cache belongs to a different object kind.
    #[error("index cache kind mismatch: expected {expected}, found {found}")]
    KindMismatch { expected: String, found: String },

    /// Serialization failure while writing the cache.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error reading or writing the cache file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for index results.
pub type IndexResult<T> = Result<T, IndexError>;
