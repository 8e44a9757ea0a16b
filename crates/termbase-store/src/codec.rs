//! Object <-> bytes conversion.

use crate::error::StoreError;

/// A decoding or validation failure, located by field path.
///
/// The store attaches the file path when turning this into
/// [`StoreError::MalformedRecord`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("field {field}: {reason}")]
pub struct CodecError {
    pub field: String,
    pub reason: String,
}

impl CodecError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Locate this error at a file path.
    pub fn at(self, path: impl Into<String>) -> StoreError {
        StoreError::MalformedRecord {
            path: path.into(),
            field: self.field,
            reason: self.reason,
        }
    }
}

/// Converts objects to their on-disk bytes and back.
///
/// Implementations must satisfy:
/// - `deserialize(serialize(o)) == o` for every valid `o`.
/// - `serialize` is deterministic, so unchanged objects produce unchanged
///   files and no spurious diffs.
/// - Both directions validate: invalid objects are never written and
///   invalid files are never returned.
pub trait Codec: Send + Sync {
    type Object;

    fn serialize(&self, object: &Self::Object) -> Result<Vec<u8>, CodecError>;

    fn deserialize(&self, bytes: &[u8]) -> Result<Self::Object, CodecError>;
}
