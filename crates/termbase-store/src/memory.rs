use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::traits::{check_relative, FileBackend, FileStat};

/// In-memory file backend.
///
/// Intended for tests and embedding. Files live in a sorted map behind a
/// `RwLock`. No modification times are reported, so staleness checks always
/// fall back to content hashes.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    files: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files currently held.
    pub fn len(&self) -> usize {
        self.files.read().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every file, for snapshots.
    pub fn snapshot(&self) -> StoreResult<BTreeMap<String, Vec<u8>>> {
        Ok(self.files.read().map_err(|_| poisoned())?.clone())
    }

    /// Replace all files with `files`.
    pub fn restore(&self, files: BTreeMap<String, Vec<u8>>) -> StoreResult<()> {
        *self.files.write().map_err(|_| poisoned())? = files;
        Ok(())
    }
}

fn poisoned() -> StoreError {
    StoreError::LockPoisoned("in-memory files")
}

fn stat(data: &[u8]) -> FileStat {
    FileStat {
        size: data.len() as u64,
        mtime: None,
    }
}

impl FileBackend for InMemoryBackend {
    fn read(&self, path: &str) -> StoreResult<Option<Vec<u8>>> {
        check_relative(path)?;
        let files = self.files.read().map_err(|_| poisoned())?;
        Ok(files.get(path).cloned())
    }

    fn stat(&self, path: &str) -> StoreResult<Option<FileStat>> {
        check_relative(path)?;
        let files = self.files.read().map_err(|_| poisoned())?;
        Ok(files.get(path).map(|d| stat(d)))
    }

    fn write(&self, path: &str, data: &[u8]) -> StoreResult<FileStat> {
        check_relative(path)?;
        let mut files = self.files.write().map_err(|_| poisoned())?;
        files.insert(path.to_string(), data.to_vec());
        Ok(stat(data))
    }

    fn delete(&self, path: &str) -> StoreResult<bool> {
        check_relative(path)?;
        let mut files = self.files.write().map_err(|_| poisoned())?;
        Ok(files.remove(path).is_some())
    }

    fn list(&self, dir: &str) -> StoreResult<Vec<(String, FileStat)>> {
        check_relative(dir)?;
        let prefix = format!("{dir}/");
        let files = self.files.read().map_err(|_| poisoned())?;
        Ok(files
            .range(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(&prefix))
            .filter(|(path, _)| !path[prefix.len()..].contains('/'))
            .map(|(path, data)| (path.clone(), stat(data)))
            .collect())
    }

    fn walk(&self) -> StoreResult<Vec<String>> {
        let files = self.files.read().map_err(|_| poisoned())?;
        Ok(files
            .keys()
            .filter(|p| !p.starts_with(".git/"))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_delete() {
        let mem = InMemoryBackend::new();
        mem.write("concepts/concept-1.yaml", b"x").unwrap();
        assert_eq!(mem.read("concepts/concept-1.yaml").unwrap().unwrap(), b"x");
        assert!(mem.delete("concepts/concept-1.yaml").unwrap());
        assert!(!mem.delete("concepts/concept-1.yaml").unwrap());
        assert!(mem.is_empty());
    }

    #[test]
    fn list_only_direct_children() {
        let mem = InMemoryBackend::new();
        mem.write("concepts/concept-1.yaml", b"a").unwrap();
        mem.write("concepts/deep/concept-2.yaml", b"b").unwrap();
        mem.write("conceptsX/concept-3.yaml", b"c").unwrap();
        let listed: Vec<String> = mem.list("concepts").unwrap().into_iter().map(|(p, _)| p).collect();
        assert_eq!(listed, vec!["concepts/concept-1.yaml"]);
    }

    #[test]
    fn snapshot_restore() {
        let mem = InMemoryBackend::new();
        mem.write("a", b"1").unwrap();
        let snap = mem.snapshot().unwrap();
        mem.write("a", b"2").unwrap();
        mem.write("b", b"3").unwrap();
        mem.restore(snap).unwrap();
        assert_eq!(mem.read("a").unwrap().unwrap(), b"1");
        assert!(mem.read("b").unwrap().is_none());
    }
}
