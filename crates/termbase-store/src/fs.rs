use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};
use crate::retry::retry_once;
use crate::traits::{check_relative, FileBackend, FileStat};

/// Filesystem backend rooted at a working directory.
///
/// Writes go to a temporary file in the target directory which is then
/// renamed over the destination, so readers never observe partial content.
#[derive(Debug, Clone)]
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    /// Open a backend at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        let display = root.display().to_string();
        retry_once("create root", &display, || fs::create_dir_all(&root))?;
        Ok(Self { root })
    }

    fn resolve(&self, path: &str) -> StoreResult<PathBuf> {
        check_relative(path)?;
        Ok(self.root.join(path))
    }
}

fn stat_of(meta: &fs::Metadata) -> FileStat {
    FileStat {
        size: meta.len(),
        mtime: meta.modified().ok(),
    }
}

impl FileBackend for FsBackend {
    fn read(&self, path: &str) -> StoreResult<Option<Vec<u8>>> {
        let full = self.resolve(path)?;
        retry_once("read", path, || match fs::read(&full) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        })
    }

    fn stat(&self, path: &str) -> StoreResult<Option<FileStat>> {
        let full = self.resolve(path)?;
        retry_once("stat", path, || match fs::metadata(&full) {
            Ok(meta) if meta.is_file() => Ok(Some(stat_of(&meta))),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        })
    }

    fn write(&self, path: &str, data: &[u8]) -> StoreResult<FileStat> {
        let full = self.resolve(path)?;
        let dir = full
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        retry_once("write", path, || {
            fs::create_dir_all(&dir)?;
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(data)?;
            tmp.as_file().sync_all()?;
            let file = tmp.persist(&full).map_err(|e| e.error)?;
            Ok(stat_of(&file.metadata()?))
        })
        .inspect(|stat| debug!(path, size = stat.size, "file written"))
    }

    fn delete(&self, path: &str) -> StoreResult<bool> {
        let full = self.resolve(path)?;
        retry_once("delete", path, || match fs::remove_file(&full) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        })
    }

    fn list(&self, dir: &str) -> StoreResult<Vec<(String, FileStat)>> {
        let full = self.resolve(dir)?;
        let entries = match fs::read_dir(&full) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io("list", dir, e)),
        };

        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io("list", dir, e))?;
            let meta = entry.metadata().map_err(|e| StoreError::io("list", dir, e))?;
            if !meta.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            out.push((format!("{dir}/{name}"), stat_of(&meta)));
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    fn walk(&self) -> StoreResult<Vec<String>> {
        let mut out = Vec::new();
        let walker = WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|e| e.file_name() != ".git");
        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                StoreError::io("walk", path, std::io::Error::other(e.to_string()))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let parts: Option<Vec<&str>> = rel.components().map(|c| c.as_os_str().to_str()).collect();
            if let Some(parts) = parts {
                out.push(parts.join("/"));
            }
        }
        out.sort();
        Ok(out)
    }

    fn root(&self) -> Option<&Path> {
        Some(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> (tempfile::TempDir, FsBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::new(dir.path().join("work")).unwrap();
        (dir, backend)
    }

    #[test]
    fn write_read_roundtrip_creates_parents() {
        let (_dir, fs) = backend();
        let stat = fs.write("concepts/concept-1.yaml", b"term: a\n").unwrap();
        assert_eq!(stat.size, 8);
        assert_eq!(
            fs.read("concepts/concept-1.yaml").unwrap().as_deref(),
            Some(&b"term: a\n"[..])
        );
    }

    #[test]
    fn missing_file_is_none() {
        let (_dir, fs) = backend();
        assert!(fs.read("concepts/concept-9.yaml").unwrap().is_none());
        assert!(fs.stat("concepts/concept-9.yaml").unwrap().is_none());
        assert!(!fs.delete("concepts/concept-9.yaml").unwrap());
    }

    #[test]
    fn overwrite_replaces_content() {
        let (_dir, fs) = backend();
        fs.write("a.txt", b"first version").unwrap();
        fs.write("a.txt", b"second").unwrap();
        assert_eq!(fs.read("a.txt").unwrap().unwrap(), b"second");
        assert_eq!(fs.stat("a.txt").unwrap().unwrap().size, 6);
    }

    #[test]
    fn list_is_sorted_and_skips_subdirs() {
        let (_dir, fs) = backend();
        fs.write("concepts/concept-2.yaml", b"b").unwrap();
        fs.write("concepts/concept-1.yaml", b"a").unwrap();
        fs.write("concepts/nested/x.yaml", b"c").unwrap();
        let names: Vec<String> = fs.list("concepts").unwrap().into_iter().map(|(p, _)| p).collect();
        assert_eq!(names, vec!["concepts/concept-1.yaml", "concepts/concept-2.yaml"]);
        assert!(fs.list("missing").unwrap().is_empty());
    }

    #[test]
    fn walk_skips_git_dir() {
        let (_dir, fs) = backend();
        fs.write("concepts/concept-1.yaml", b"a").unwrap();
        fs.write(".git/HEAD", b"ref").unwrap();
        fs.write("README.md", b"hi").unwrap();
        assert_eq!(fs.walk().unwrap(), vec!["README.md", "concepts/concept-1.yaml"]);
    }

    #[test]
    fn rejects_escaping_path() {
        let (_dir, fs) = backend();
        assert!(matches!(fs.read("../secret"), Err(StoreError::InvalidPath(_))));
    }
}
