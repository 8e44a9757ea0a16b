use termbase_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    /// A query or write arrived before `load()` completed.
    #[error("workspace is not loaded yet")]
    NotReady,

    #[error("unknown kind {0:?}")]
    UnknownKind(String),

    #[error("invalid {kind} id {id:?}")]
    InvalidId { kind: &'static str, id: String },

    /// The id in the request path and the id in the payload disagree.
    #[error("id mismatch: request is for {expected}, payload has {found}")]
    IdMismatch { expected: String, found: String },

    #[error("invalid payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WorkspaceError {
    /// Returns `true` if this is a missing object, as opposed to a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(StoreError::NotFound { .. }))
    }
}

pub type WorkspaceResult<T> = Result<T, WorkspaceError>;
