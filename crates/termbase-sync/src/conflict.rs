use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use crate::diff::ConflictDiff;
use crate::error::{SyncError, SyncResult};

/// An object whose file was changed both locally and remotely, to
/// different content, since the common ancestor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub kind: &'static str,
    pub id: String,
    pub path: String,
}

/// Everything needed to decide a conflict. A version is `None` when the
/// file does not exist on that side or cannot be decoded; decoding
/// failures are listed in `problems`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConflictVersions {
    pub conflict: Conflict,
    pub base: Option<Value>,
    pub local: Option<Value>,
    pub remote: Option<Value>,
    pub problems: Vec<String>,
    pub diff: ConflictDiff,
}

/// How to settle one conflict.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    /// Store this object, typically a field-level merge of both versions.
    Accept(Value),
    KeepLocal,
    TakeRemote,
    /// Delete the object on both sides.
    Delete,
}

impl Resolution {
    /// Accept a typed object.
    pub fn accept<T: Serialize>(object: &T) -> SyncResult<Self> {
        serde_json::to_value(object)
            .map(Self::Accept)
            .map_err(|e| SyncError::Workspace(e.into()))
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "mine" => Ok(Self::KeepLocal),
            "remote" | "theirs" => Ok(Self::TakeRemote),
            "delete" => Ok(Self::Delete),
            other => Err(format!("unknown resolution {other:?} (expected local, remote or delete)")),
        }
    }
}
