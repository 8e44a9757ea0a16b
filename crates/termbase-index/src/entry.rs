//! Index entry types.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// BLAKE3 hash of a file's bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash raw file content.
    pub fn of(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.short_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Identity of one version of a file on disk.
///
/// `size` and `mtime` give a cheap staleness check; `hash` settles it when the
/// cheap check is inconclusive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub size: u64,
    /// Last modification time, when the backend can report one.
    pub mtime: Option<SystemTime>,
    pub hash: ContentHash,
}

impl Fingerprint {
    pub fn new(data: &[u8], mtime: Option<SystemTime>) -> Self {
        Self {
            size: data.len() as u64,
            mtime,
            hash: ContentHash::of(data),
        }
    }

    /// Returns `true` when size and mtime both match and an mtime is known.
    ///
    /// A `false` result does not mean the content changed, only that the
    /// hash has to be compared.
    pub fn quick_match(&self, size: u64, mtime: Option<SystemTime>) -> bool {
        self.size == size && self.mtime.is_some() && self.mtime == mtime
    }
}

/// One indexed object: its summary and the file it was computed from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry<S> {
    /// Path of the object's file, relative to the working directory.
    pub path: String,
    pub summary: S,
    pub fingerprint: Fingerprint,
}

impl<S> IndexEntry<S> {
    pub fn new(path: impl Into<String>, summary: S, fingerprint: Fingerprint) -> Self {
        Self {
            path: path.into(),
            summary,
            fingerprint,
        }
    }
}
