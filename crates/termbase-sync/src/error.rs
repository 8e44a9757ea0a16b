use termbase_store::StoreError;
use termbase_workspace::WorkspaceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    #[error("no conflict for {0}")]
    UnknownConflict(String),

    /// Both sides changed a file that is not an object file, so there is no
    /// field-level resolution for it.
    #[error("{0} changed locally and remotely but is not an object file")]
    UnresolvableCollision(String),

    #[error("merge conflict at {0}")]
    MergeConflict(String),

    #[error("push rejected: {0}")]
    PushRejected(String),

    #[error("working tree has uncommitted changes")]
    DirtyWorkingTree,

    #[error("repository error during {op}: {source}")]
    Repository {
        op: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("lock poisoned: {0}")]
    LockPoisoned(&'static str),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SyncError {
    pub fn repository(
        op: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Repository {
            op,
            source: source.into(),
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
