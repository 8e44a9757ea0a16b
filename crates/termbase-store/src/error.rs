use termbase_index::IndexError;

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No object with this id exists in the kind.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    /// A file could not be decoded, or an object failed validation.
    #[error("malformed record {path}: field {field}: {reason}")]
    MalformedRecord {
        path: String,
        field: String,
        reason: String,
    },

    /// A path escaped the working directory or was otherwise unusable.
    #[error("invalid path {0:?}")]
    InvalidPath(String),

    /// The caller's request contradicts itself (e.g. mismatched ids).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Filesystem failure, after the automatic retry for transient errors.
    #[error("I/O error during {op} on {path}: {source}")]
    Io {
        op: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A lock was poisoned by a panicking thread.
    #[error("lock poisoned: {0}")]
    LockPoisoned(&'static str),

    /// Index cache failure.
    #[error("index error: {0}")]
    Index(#[from] IndexError),
}

impl StoreError {
    pub fn io(op: &'static str, path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// Returns `true` for the errors a listing skips instead of failing on.
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::MalformedRecord { .. })
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
