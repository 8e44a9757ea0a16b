//! Git repository controller for termbase working copies.
//!
//! [`GitController`] implements [`termbase_sync::RepositoryController`] on
//! top of libgit2: one working copy, one tracked branch on one remote.

pub mod controller;
pub mod error;
pub mod options;

pub use controller::GitController;
pub use error::{GitError, GitResult};
pub use options::GitOptions;
