use std::path::PathBuf;

use termbase_git::GitError;
use termbase_store::StoreError;
use termbase_sync::SyncError;
use termbase_workspace::WorkspaceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Another process holds the instance lock for this data directory.
    #[error("another termbase instance is running (lock held on {0})")]
    AlreadyRunning(PathBuf),

    #[error("invalid configuration in {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot serialize configuration: {0}")]
    ConfigFormat(#[from] toml::ser::Error),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Git(#[from] GitError),
}

impl AppError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if the error is a missing object.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Workspace(e) => e.is_not_found(),
            Self::Store(StoreError::NotFound { .. }) => true,
            _ => false,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
