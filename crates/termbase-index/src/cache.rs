//! On-disk persistence of an [`Index`] between runs.
//!
//! Layout (bincode):
//! ```text
//! [header: magic "TBIX", format version u32, kind name]
//! [entries: Vec<(id, IndexEntry)>]
//! ```
//! The header is decoded first so a version or kind mismatch is reported
//! without attempting to decode entries written in another format.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::entry::IndexEntry;
use crate::error::{IndexError, IndexResult};
use crate::index::{Index, INDEX_VERSION};

const MAGIC: [u8; 4] = *b"TBIX";

#[derive(Serialize)]
struct Header<'a> {
    magic: [u8; 4],
    version: u32,
    kind: &'a str,
}

/// Write `index` to `path`, replacing any previous cache atomically.
pub fn save<I, S>(path: &Path, kind: &str, index: &Index<I, S>) -> IndexResult<()>
where
    I: Serialize + Ord,
    S: Serialize,
{
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let header = Header {
        magic: MAGIC,
        version: index.version,
        kind,
    };
    let entries: Vec<(&I, &IndexEntry<S>)> = index.iter().collect();

    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        bincode::serialize_into(&mut writer, &header)
            .map_err(|e| IndexError::Serialization(e.to_string()))?;
        bincode::serialize_into(&mut writer, &entries)
            .map_err(|e| IndexError::Serialization(e.to_string()))?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| IndexError::Io(e.error))?;

    debug!(kind, entries = entries.len(), path = %path.display(), "index cache written");
    Ok(())
}

/// Read a cache written by [`save`].
///
/// Returns `Ok(None)` when no cache exists. Any cache that cannot be used is
/// reported as an error so the caller can fall back to a rebuild.
pub fn load<I, S>(path: &Path, kind: &str) -> IndexResult<Option<Index<I, S>>>
where
    I: DeserializeOwned + Ord,
    S: DeserializeOwned,
{
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    // Length prefixes read from a damaged file must not drive allocations
    // larger than the file itself.
    let opts = bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(file.metadata()?.len());
    let mut reader = BufReader::new(file);
    let corrupt = |reason: String| IndexError::Corrupt {
        path: path.display().to_string(),
        reason,
    };

    let (magic, version): ([u8; 4], u32) = opts
        .deserialize_from(&mut reader)
        .map_err(|e| corrupt(e.to_string()))?;
    if magic != MAGIC {
        return Err(corrupt("bad magic".to_string()));
    }
    if version != INDEX_VERSION {
        return Err(IndexError::VersionMismatch {
            expected: INDEX_VERSION,
            found: version,
        });
    }
    let found: String = opts
        .deserialize_from(&mut reader)
        .map_err(|e| corrupt(e.to_string()))?;
    if found != kind {
        return Err(IndexError::KindMismatch {
            expected: kind.to_string(),
            found,
        });
    }

    let entries: Vec<(I, IndexEntry<S>)> = opts
        .deserialize_from(&mut reader)
        .map_err(|e| corrupt(e.to_string()))?;
    let mut index = Index::new();
    index.rebuild(entries);
    debug!(kind, entries = index.len(), path = %path.display(), "index cache loaded");
    Ok(Some(index))
}

/// Delete the cache at `path` if present.
pub fn remove(path: &Path) -> IndexResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Fingerprint;
    use std::time::{Duration, SystemTime};

    fn sample() -> Index<u64, String> {
        let mut index = Index::new();
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        for (id, term) in [(1u64, "datum"), (32, "coordinate reference system")] {
            let fp = Fingerprint::new(term.as_bytes(), Some(t));
            index.put(id, IndexEntry::new(format!("concepts/concept-{id}.yaml"), term.to_string(), fp));
        }
        index
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index").join("concepts.idx");
        let index = sample();
        save(&path, "concepts", &index).unwrap();

        let loaded: Index<u64, String> = load(&path, "concepts").unwrap().unwrap();
        assert_eq!(loaded, index);
    }

    #[test]
    fn missing_cache_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded: Option<Index<u64, String>> = load(&dir.path().join("nope.idx"), "concepts").unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn garbage_is_reported_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("concepts.idx");
        fs::write(&path, b"definitely not an index").unwrap();
        let err = load::<u64, String>(&path, "concepts").unwrap_err();
        assert!(matches!(err, IndexError::Corrupt { .. }));
    }

    #[test]
    fn kind_mismatch_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("concepts.idx");
        save(&path, "concepts", &sample()).unwrap();
        let err = load::<u64, String>(&path, "sources").unwrap_err();
        assert!(matches!(err, IndexError::KindMismatch { .. }));
    }

    #[test]
    fn version_mismatch_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("concepts.idx");
        let mut index = sample();
        index.version = INDEX_VERSION + 1;
        save(&path, "concepts", &index).unwrap();
        let err = load::<u64, String>(&path, "concepts").unwrap_err();
        assert!(matches!(err, IndexError::VersionMismatch { found, .. } if found == INDEX_VERSION + 1));
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("concepts.idx");
        save(&path, "concepts", &sample()).unwrap();
        remove(&path).unwrap();
        remove(&path).unwrap();
        assert!(!path.exists());
    }
}
