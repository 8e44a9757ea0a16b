use std::path::PathBuf;

use termbase_sync::SyncError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("git {op} failed: {source}")]
    Git {
        op: &'static str,
        #[source]
        source: git2::Error,
    },

    #[error("invalid {what} URL {url:?}: {source}")]
    InvalidUrl {
        what: &'static str,
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("repository at {0} has no working directory")]
    Bare(PathBuf),

    #[error("no remote named {0}")]
    NoRemote(String),

    #[error("merge conflict at {0}")]
    MergeConflict(String),

    #[error("working tree has uncommitted changes")]
    DirtyWorkingTree,

    #[error("push rejected: {0}")]
    PushRejected(String),

    #[error("repository lock poisoned")]
    LockPoisoned,
}

impl GitError {
    /// Network-level failures worth one more attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Git { source, .. } => is_transient(source),
            _ => false,
        }
    }
}

pub(crate) fn is_transient(err: &git2::Error) -> bool {
    matches!(
        err.class(),
        git2::ErrorClass::Net | git2::ErrorClass::Http | git2::ErrorClass::Ssl
    ) && !matches!(err.code(), git2::ErrorCode::Auth | git2::ErrorCode::Certificate)
}

pub type GitResult<T> = Result<T, GitError>;

/// Attach the operation name to a libgit2 error.
pub(crate) trait GitContext<T> {
    fn op(self, op: &'static str) -> GitResult<T>;
}

impl<T> GitContext<T> for Result<T, git2::Error> {
    fn op(self, op: &'static str) -> GitResult<T> {
        self.map_err(|source| GitError::Git { op, source })
    }
}

impl From<GitError> for SyncError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::MergeConflict(path) => SyncError::MergeConflict(path),
            GitError::DirtyWorkingTree => SyncError::DirtyWorkingTree,
            GitError::PushRejected(reason) => SyncError::PushRejected(reason),
            GitError::LockPoisoned => SyncError::LockPoisoned("git repository"),
            GitError::Git { op, .. } => SyncError::repository(op, err),
            other => SyncError::repository("open", other),
        }
    }
}
