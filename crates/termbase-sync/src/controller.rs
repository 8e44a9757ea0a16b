use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::SyncResult;

/// One commit, as shown to the user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommitInfo {
    pub id: String,
    pub summary: String,
    pub author: String,
    pub time: DateTime<Utc>,
}

/// Commits on either side since the last common ancestor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Divergence {
    /// Remote commits not yet present locally, newest first.
    pub incoming: Vec<CommitInfo>,
    /// Local commits not yet pushed, newest first.
    pub outgoing: Vec<CommitInfo>,
}

impl Divergence {
    pub fn is_synced(&self) -> bool {
        self.incoming.is_empty() && self.outgoing.is_empty()
    }
}

/// What a merge of the remote branch did to the local branch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MergeOutcome {
    UpToDate,
    FastForward { head: String },
    Merged { commit: String },
}

impl MergeOutcome {
    pub fn changed_files(&self) -> bool {
        !matches!(self, Self::UpToDate)
    }
}

/// Version-control operations the store and the workflow rely on.
///
/// Paths are relative to the working directory and `/`-separated.
/// Implementations must satisfy:
/// - `merge_remote` and `reset_hard` either complete or leave the branch
///   and the working tree as they were.
/// - `local_changes` covers committed-but-unpushed and uncommitted changes
///   since the merge base; `remote_changes` covers fetched remote commits
///   since the same base.
pub trait RepositoryController: Send + Sync {
    /// Update the remote-tracking branch from the remote.
    fn fetch(&self) -> SyncResult<()>;

    /// Id of the local branch tip; `None` before the first commit.
    fn head(&self) -> SyncResult<Option<String>>;

    fn divergence(&self) -> SyncResult<Divergence>;

    fn local_changes(&self) -> SyncResult<BTreeSet<String>>;

    fn remote_changes(&self) -> SyncResult<BTreeSet<String>>;

    /// Content of `path` at the merge base.
    fn read_base(&self, path: &str) -> SyncResult<Option<Vec<u8>>>;

    /// Content of `path` at the remote-tracking branch tip.
    fn read_remote(&self, path: &str) -> SyncResult<Option<Vec<u8>>>;

    /// Commit every change in the working tree. Returns the new commit id,
    /// or `None` when there was nothing to commit.
    fn commit_all(&self, message: &str) -> SyncResult<Option<String>>;

    /// Merge the remote-tracking branch into the local branch and update the
    /// working tree. Paths in `keep_local` take the local version.
    fn merge_remote(&self, message: &str, keep_local: &BTreeSet<String>)
        -> SyncResult<MergeOutcome>;

    /// Point the local branch at `commit` and make the working tree match it.
    fn reset_hard(&self, commit: &str) -> SyncResult<()>;

    /// Publish the local branch to the remote.
    fn push(&self) -> SyncResult<()>;

    /// Paths left unmerged in the index by an interrupted merge.
    fn list_unmerged_conflicts(&self) -> SyncResult<BTreeSet<String>>;

    /// Fetch, then merge with no paths kept local.
    fn pull(&self) -> SyncResult<MergeOutcome> {
        self.fetch()?;
        self.merge_remote("Merge remote changes", &BTreeSet::new())
    }
}
