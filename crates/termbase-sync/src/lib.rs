//! Synchronization of a termbase working copy with its remote.
//!
//! Each object is its own file, so reconciling local and remote history is
//! a per-file question. Files changed on one side only merge trivially.
//! Files changed on both sides to different content are conflicts: the
//! [`SyncWorkflow`] stops in [`SyncState::ConflictsPresent`], shows both
//! versions, and waits for a [`Resolution`] per object before anything is
//! committed.
//!
//! Version-control plumbing sits behind [`RepositoryController`]; an
//! in-memory implementation is provided for tests and embedding.

pub mod conflict;
pub mod controller;
pub mod diff;
pub mod error;
pub mod memory;
pub mod workflow;

pub use conflict::{Conflict, ConflictVersions, Resolution};
pub use controller::{CommitInfo, Divergence, MergeOutcome, RepositoryController};
pub use diff::{diff_versions, ConflictDiff, DiffHunk, DiffLine};
pub use error::{SyncError, SyncResult};
pub use memory::InMemoryController;
pub use workflow::{SyncOptions, SyncReport, SyncState, SyncWorkflow};
