use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};

/// Exclusive advisory lock held for the lifetime of an application
/// instance. Released on drop.
#[derive(Debug)]
pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl InstanceLock {
    /// Take the lock at `path`, failing with [`AppError::AlreadyRunning`]
    /// when another instance holds it.
    pub fn acquire(path: &Path) -> AppResult<Self> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| AppError::io(dir, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|e| AppError::io(path, e))?;
        if file.try_lock_exclusive().is_err() {
            return Err(AppError::AlreadyRunning(path.to_path_buf()));
        }
        debug!(path = %path.display(), "instance lock acquired");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %e, "failed to release instance lock");
        }
    }
}
