//! The set of kind stores for one working copy.
//!
//! A [`Workspace`] owns one [`KindStore`](termbase_store::KindStore) per
//! declared kind, and with it every kind's index. Nothing else mutates those
//! indexes. Until [`Workspace::load`] has run, every query and write fails
//! with [`WorkspaceError::NotReady`].

pub mod erased;
pub mod error;
pub mod workspace;

pub use erased::{ErasedStore, IndexSource, KindLoad, SearchPage};
pub use error::{WorkspaceError, WorkspaceResult};
pub use workspace::{LoadReport, Workspace};
