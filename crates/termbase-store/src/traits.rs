use std::path::Path;
use std::time::SystemTime;

use crate::error::{StoreError, StoreResult};

/// Size and modification time of a stored file, used for cheap staleness
/// checks before falling back to content hashing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    /// `None` when the backend cannot report one; callers then hash.
    pub mtime: Option<SystemTime>,
}

/// File access relative to a working directory.
///
/// Paths are `/`-separated and relative (`concepts/concept-1.yaml`).
/// Implementations must satisfy:
/// - `write` is atomic: concurrent readers see the old or new bytes, never
///   a mix.
/// - A missing file is `Ok(None)` / `Ok(false)`, never an error.
/// - `walk` never descends into `.git`.
pub trait FileBackend: Send + Sync {
    /// Read a file. Returns `Ok(None)` if it does not exist.
    fn read(&self, path: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Stat a file. Returns `Ok(None)` if it does not exist.
    fn stat(&self, path: &str) -> StoreResult<Option<FileStat>>;

    /// Replace a file's contents atomically, creating parent directories.
    fn write(&self, path: &str, data: &[u8]) -> StoreResult<FileStat>;

    /// Delete a file. Returns `true` if it existed.
    fn delete(&self, path: &str) -> StoreResult<bool>;

    /// Files directly inside `dir`, sorted by path. A missing directory
    /// lists as empty.
    fn list(&self, dir: &str) -> StoreResult<Vec<(String, FileStat)>>;

    /// Every file under the working directory, sorted.
    fn walk(&self) -> StoreResult<Vec<String>>;

    /// On-disk root, when there is one.
    fn root(&self) -> Option<&Path> {
        None
    }
}

/// Reject paths that are absolute, empty, or step outside the root.
pub fn check_relative(path: &str) -> StoreResult<()> {
    let bad = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path
            .split('/')
            .any(|part| part.is_empty() || part == "." || part == "..");
    if bad {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(())
}
