//! One-file-per-object storage for termbase.
//!
//! Every object of a [`Kind`] lives in its own file under a per-kind
//! directory of the working copy (`concepts/concept-32.yaml`). The path is a
//! pure function of kind and id; no path table is persisted.
//!
//! # Layers
//!
//! - [`FileBackend`] -- raw file access relative to the working directory
//!   ([`FsBackend`] for disk, [`InMemoryBackend`] for tests and embedding)
//! - [`Codec`] -- object <-> bytes, including field renames and validation
//! - [`Kind`] -- per-kind capabilities: naming, summaries, query matching
//! - [`KindStore`] -- store/load/find/delete for one kind, keeping its
//!   [`Index`](termbase_index::Index) consistent with the files it writes
//!
//! # Design Rules
//!
//! 1. Writes are atomic per file: a reader sees the old or the new version.
//! 2. Write-then-index: the file is written, then its index entry updated,
//!    both under the object's lock.
//! 3. The index is never a source of truth; `rebuild_index` recovers it.
//! 4. A single unreadable file never aborts a listing; it is reported.

pub mod codec;
pub mod concepts;
pub mod error;
pub mod fs;
pub mod kind;
pub mod memory;
pub mod query;
pub mod retry;
pub mod store;
pub mod traits;

pub use codec::{Codec, CodecError};
pub use concepts::{ConceptCodec, ConceptSummary, LocalizedSummary};
pub use error::{StoreError, StoreResult};
pub use fs::FsBackend;
pub use kind::Kind;
pub use memory::InMemoryBackend;
pub use query::{Diagnostic, FindOptions, FindResult};
pub use store::{Ack, KindStore, RebuildReport};
pub use traits::{FileBackend, FileStat};
