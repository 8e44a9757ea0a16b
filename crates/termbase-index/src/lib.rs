//! Search index for termbase.
//!
//! An [`Index`] maps object ids to lightweight summaries so that queries do
//! not have to deserialize every file of a kind. It is an optimization, never
//! a source of truth: the store can always rebuild it from the files on disk.
//!
//! # Key Types
//!
//! - [`Index`] -- The in-memory index (BTreeMap-backed)
//! - [`IndexEntry`] -- Summary plus the fingerprint of the file it came from
//! - [`Fingerprint`] / [`ContentHash`] -- Size, mtime and BLAKE3 hash of a file
//! - [`ValidationReport`] -- What a validation pass against the files changed
//! - [`cache`] -- Versioned bincode persistence of an index between runs

pub mod cache;
pub mod entry;
pub mod error;
pub mod index;
pub mod status;

pub use entry::{ContentHash, Fingerprint, IndexEntry};
pub use error::{IndexError, IndexResult};
pub use index::Index;
pub use status::ValidationReport;
