//! The reconciliation state machine for one synchronization attempt.
//!
//! ```text
//! Idle -> CheckingRemote -> NoConflict -> FastForward ----------> Committed
//!                        \-> ConflictsPresent -> Resolving -> Resolved -/
//! any step -> Failed;  reset(): Failed | Committed | ... -> Idle
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use termbase_workspace::Workspace;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::conflict::{Conflict, ConflictVersions, Resolution};
use crate::controller::{Divergence, MergeOutcome, RepositoryController};
use crate::diff::diff_versions;
use crate::error::{SyncError, SyncResult};

/// Behaviour of a synchronization attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncOptions {
    /// Push the merged result.
    pub push: bool,
    /// Message for the commit saving local work before merging.
    pub save_message: String,
    /// Message for the commit recording conflict resolutions.
    pub resolve_message: String,
    pub merge_message: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            push: true,
            save_message: "Save local changes".to_string(),
            resolve_message: "Resolve synchronization conflicts".to_string(),
            merge_message: "Merge remote changes".to_string(),
        }
    }
}

/// Summary of a committed attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub attempt: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub incoming: usize,
    pub outgoing: usize,
    /// Commit saving uncommitted local work, if there was any.
    pub local_commit: Option<String>,
    pub merge: MergeOutcome,
    pub resolved: Vec<Conflict>,
    pub pushed: bool,
    /// Index entries added, refreshed or removed by the merge.
    pub index_changes: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    CheckingRemote,
    NoConflict,
    FastForward,
    ConflictsPresent { conflicts: Vec<Conflict> },
    Resolving { remaining: Vec<Conflict> },
    Resolved,
    Committed { report: SyncReport },
    Failed { reason: String },
}

impl SyncState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::CheckingRemote => "checking remote",
            Self::NoConflict => "no conflict",
            Self::FastForward => "fast forward",
            Self::ConflictsPresent { .. } => "conflicts present",
            Self::Resolving { .. } => "resolving",
            Self::Resolved => "resolved",
            Self::Committed { .. } => "committed",
            Self::Failed { .. } => "failed",
        }
    }

    /// Returns `true` when `finalize` may be called.
    pub fn is_ready_to_commit(&self) -> bool {
        matches!(self, Self::FastForward | Self::Resolved)
    }
}

/// What finalize does for one conflict, decided when the resolution is
/// accepted so that invalid resolutions fail early.
#[derive(Clone, Debug, PartialEq)]
enum Plan {
    Store(Value),
    Keep,
    Remove,
}

/// One synchronization attempt over a workspace and its repository.
pub struct SyncWorkflow {
    workspace: Arc<Workspace>,
    controller: Arc<dyn RepositoryController>,
    options: SyncOptions,
    attempt: Uuid,
    started_at: DateTime<Utc>,
    state: SyncState,
    divergence: Divergence,
    conflicts: BTreeMap<String, Conflict>,
    plans: BTreeMap<String, Plan>,
}

impl SyncWorkflow {
    pub fn new(
        workspace: Arc<Workspace>,
        controller: Arc<dyn RepositoryController>,
        options: SyncOptions,
    ) -> Self {
        Self {
            workspace,
            controller,
            options,
            attempt: Uuid::now_v7(),
            started_at: Utc::now(),
            state: SyncState::Idle,
            divergence: Divergence::default(),
            conflicts: BTreeMap::new(),
            plans: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn attempt(&self) -> Uuid {
        self.attempt
    }

    pub fn divergence(&self) -> &Divergence {
        &self.divergence
    }

    /// Conflicts found by `begin`, in path order.
    pub fn conflicts(&self) -> Vec<Conflict> {
        self.conflicts.values().cloned().collect()
    }

    /// Conflicts that still lack a resolution.
    pub fn unresolved(&self) -> Vec<Conflict> {
        self.conflicts
            .values()
            .filter(|c| !self.plans.contains_key(&c.path))
            .cloned()
            .collect()
    }

    fn transition(&mut self, next: SyncState) {
        info!(
            attempt = %self.attempt,
            from = self.state.name(),
            to = next.name(),
            "sync state change"
        );
        self.state = next;
    }

    fn fail(&mut self, err: SyncError) -> SyncError {
        warn!(attempt = %self.attempt, error = %err, "sync attempt failed");
        self.transition(SyncState::Failed {
            reason: err.to_string(),
        });
        err
    }

    fn invalid(&self, action: &'static str) -> SyncError {
        SyncError::InvalidTransition {
            action,
            state: self.state.name(),
        }
    }

    /// Compare local and remote history and classify the attempt.
    ///
    /// Ends in `FastForward` when no object collides, otherwise in
    /// `ConflictsPresent`. Nothing is written.
    pub fn begin(&mut self) -> SyncResult<&SyncState> {
        if self.state != SyncState::Idle {
            return Err(self.invalid("begin"));
        }
        self.transition(SyncState::CheckingRemote);
        match self.check_remote() {
            Ok(conflicts) if conflicts.is_empty() => {
                self.transition(SyncState::NoConflict);
                self.transition(SyncState::FastForward);
            }
            Ok(conflicts) => {
                self.conflicts = conflicts
                    .iter()
                    .map(|c| (c.path.clone(), c.clone()))
                    .collect();
                self.transition(SyncState::ConflictsPresent { conflicts });
            }
            Err(e) => return Err(self.fail(e)),
        }
        Ok(&self.state)
    }

    fn check_remote(&mut self) -> SyncResult<Vec<Conflict>> {
        self.controller.fetch()?;
        self.divergence = self.controller.divergence()?;
        let local = self.controller.local_changes()?;
        let remote = self.controller.remote_changes()?;
        debug!(
            incoming = self.divergence.incoming.len(),
            outgoing = self.divergence.outgoing.len(),
            local = local.len(),
            remote = remote.len(),
            "compared histories"
        );

        let mut conflicts = Vec::new();
        for path in local.intersection(&remote) {
            let mine = self.workspace.backend().read(path)?;
            let theirs = self.controller.read_remote(path)?;
            if mine == theirs {
                debug!(path = %path, "same change on both sides");
                continue;
            }
            match self.workspace.object_at(path) {
                Some((kind, id)) => conflicts.push(Conflict {
                    kind,
                    id,
                    path: path.clone(),
                }),
                None => return Err(SyncError::UnresolvableCollision(path.clone())),
            }
        }
        Ok(conflicts)
    }

    fn find_conflict(&self, id: &str) -> SyncResult<Conflict> {
        self.conflicts
            .values()
            .find(|c| c.id == id || c.path == id)
            .cloned()
            .ok_or_else(|| SyncError::UnknownConflict(id.to_string()))
    }

    fn decode(&self, conflict: &Conflict, bytes: &[u8]) -> SyncResult<Value> {
        let store = self.workspace.store_for(conflict.kind)?;
        Ok(store.decode_json(&conflict.path, bytes)?)
    }

    /// Base, local and remote versions of the conflicting object `id`, with
    /// a diff of local against remote.
    pub fn conflict_versions(&self, id: &str) -> SyncResult<ConflictVersions> {
        let conflict = self.find_conflict(id)?;
        let base = self.controller.read_base(&conflict.path)?;
        let local = self.workspace.backend().read(&conflict.path)?;
        let remote = self.controller.read_remote(&conflict.path)?;

        let mut problems = Vec::new();
        let mut view = |side: &str, bytes: &Option<Vec<u8>>| -> Option<Value> {
            let bytes = bytes.as_deref()?;
            match self.decode(&conflict, bytes) {
                Ok(value) => Some(value),
                Err(e) => {
                    problems.push(format!("{side}: {e}"));
                    None
                }
            }
        };
        let base_view = view("base", &base);
        let local_view = view("local", &local);
        let remote_view = view("remote", &remote);

        Ok(ConflictVersions {
            diff: diff_versions(&conflict.path, local.as_deref(), remote.as_deref()),
            conflict,
            base: base_view,
            local: local_view,
            remote: remote_view,
            problems,
        })
    }

    /// Record how to settle the conflict on `id` (an object id or path).
    ///
    /// The resolution is validated now; an invalid one is rejected without
    /// changing the state, so the caller can try again.
    pub fn resolve(&mut self, id: &str, resolution: Resolution) -> SyncResult<&SyncState> {
        if !matches!(
            self.state,
            SyncState::ConflictsPresent { .. } | SyncState::Resolving { .. } | SyncState::Resolved
        ) {
            return Err(self.invalid("resolve"));
        }
        let conflict = self.find_conflict(id)?;
        let plan = self.plan(&conflict, resolution)?;
        debug!(attempt = %self.attempt, path = %conflict.path, ?plan, "resolution accepted");
        self.plans.insert(conflict.path, plan);

        let remaining = self.unresolved();
        if matches!(self.state, SyncState::ConflictsPresent { .. }) || !remaining.is_empty() {
            self.transition(SyncState::Resolving {
                remaining: remaining.clone(),
            });
        }
        if remaining.is_empty() {
            self.transition(SyncState::Resolved);
        }
        Ok(&self.state)
    }

    fn plan(&self, conflict: &Conflict, resolution: Resolution) -> SyncResult<Plan> {
        let store = self.workspace.store_for(conflict.kind)?;
        match resolution {
            Resolution::Accept(value) => {
                store.encode_json(&conflict.id, value.clone())?;
                Ok(Plan::Store(value))
            }
            Resolution::KeepLocal => match self.workspace.backend().read(&conflict.path)? {
                Some(bytes) => {
                    self.decode(conflict, &bytes)?;
                    Ok(Plan::Keep)
                }
                None => Ok(Plan::Remove),
            },
            Resolution::TakeRemote => match self.controller.read_remote(&conflict.path)? {
                Some(bytes) => Ok(Plan::Store(self.decode(conflict, &bytes)?)),
                None => Ok(Plan::Remove),
            },
            Resolution::Delete => Ok(Plan::Remove),
        }
    }

    /// Write the resolutions, commit, merge, refresh the indexes and push.
    ///
    /// All or nothing: on any failure the branch and working tree are put
    /// back as they were after local work was saved, the indexes are
    /// rebuilt, and the attempt ends in `Failed`.
    pub fn finalize(&mut self) -> SyncResult<&SyncState> {
        if !self.state.is_ready_to_commit() {
            return Err(self.invalid("finalize"));
        }

        let (local_commit, saved) = match self.save_local_work() {
            Ok(saved) => saved,
            Err(e) => return Err(self.fail(e)),
        };
        let backups = match self.backup() {
            Ok(backups) => backups,
            Err(e) => return Err(self.fail(e)),
        };

        match self.apply(local_commit) {
            Ok(report) => {
                info!(
                    attempt = %self.attempt,
                    incoming = report.incoming,
                    outgoing = report.outgoing,
                    resolved = report.resolved.len(),
                    pushed = report.pushed,
                    "sync committed"
                );
                self.transition(SyncState::Committed { report });
                Ok(&self.state)
            }
            Err(e) => {
                if let Err(rollback) = self.rollback(saved.as_deref(), backups) {
                    warn!(attempt = %self.attempt, error = %rollback, "rollback incomplete");
                }
                Err(self.fail(e))
            }
        }
    }

    /// Commit uncommitted local work so it survives any rollback. Returns
    /// that commit, if one was made, and the branch tip to roll back to.
    fn save_local_work(&self) -> SyncResult<(Option<String>, Option<String>)> {
        let commit = self.controller.commit_all(&self.options.save_message)?;
        Ok((commit, self.controller.head()?))
    }

    fn backup(&self) -> SyncResult<BTreeMap<String, Option<Vec<u8>>>> {
        self.conflicts
            .keys()
            .map(|path| Ok((path.clone(), self.workspace.backend().read(path)?)))
            .collect()
    }

    fn apply(&self, local_commit: Option<String>) -> SyncResult<SyncReport> {
        for (path, plan) in &self.plans {
            let Some(conflict) = self.conflicts.get(path) else {
                continue;
            };
            match plan {
                Plan::Store(value) => {
                    self.workspace.put(conflict.kind, &conflict.id, value.clone())?;
                }
                Plan::Keep => {}
                Plan::Remove => match self.workspace.delete(conflict.kind, &conflict.id) {
                    Err(e) if !e.is_not_found() => return Err(e.into()),
                    _ => {}
                },
            }
        }

        let resolved_commit = if self.plans.is_empty() {
            None
        } else {
            self.controller.commit_all(&self.options.resolve_message)?
        };
        let keep: BTreeSet<String> = self.conflicts.keys().cloned().collect();
        let merge = self
            .controller
            .merge_remote(&self.options.merge_message, &keep)?;
        let refreshed = self.workspace.refresh()?;

        let outgoing = self.divergence.outgoing.len()
            + usize::from(local_commit.is_some())
            + usize::from(resolved_commit.is_some());
        let pushed = self.options.push && (outgoing > 0 || merge.changed_files());
        if pushed {
            self.controller.push()?;
        }

        Ok(SyncReport {
            attempt: self.attempt,
            started_at: self.started_at,
            finished_at: Utc::now(),
            incoming: self.divergence.incoming.len(),
            outgoing,
            merge,
            resolved: self.conflicts.values().cloned().collect(),
            local_commit,
            pushed,
            index_changes: refreshed.total_changed(),
        })
    }

    fn rollback(
        &self,
        saved: Option<&str>,
        backups: BTreeMap<String, Option<Vec<u8>>>,
    ) -> SyncResult<()> {
        if let Some(commit) = saved {
            self.controller.reset_hard(commit)?;
        }
        // A hard reset leaves files the resolutions created untracked.
        let backend = self.workspace.backend();
        for (path, content) in backups {
            match content {
                Some(bytes) => {
                    backend.write(&path, &bytes)?;
                }
                None => {
                    backend.delete(&path)?;
                }
            }
        }
        self.workspace.rebuild_indexes()?;
        info!(attempt = %self.attempt, "rolled back");
        Ok(())
    }

    /// `begin`, then `finalize` straight away when there is nothing to
    /// resolve.
    pub fn run(&mut self) -> SyncResult<&SyncState> {
        self.begin()?;
        if self.state == SyncState::FastForward {
            self.finalize()?;
        }
        Ok(&self.state)
    }

    /// Abandon the attempt and return to `Idle` under a new attempt id.
    /// Nothing is written before `finalize`, so this is always safe.
    pub fn reset(&mut self) {
        self.attempt = Uuid::now_v7();
        self.started_at = Utc::now();
        self.divergence = Divergence::default();
        self.conflicts.clear();
        self.plans.clear();
        self.transition(SyncState::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryController;
    use serde_json::json;
    use termbase_store::{Codec, ConceptCodec, FileBackend, InMemoryBackend};
    use termbase_types::{Concept, ConceptId, Language, LocalizedConcept};

    struct Fixture {
        worktree: Arc<InMemoryBackend>,
        controller: Arc<InMemoryController>,
        workspace: Arc<Workspace>,
    }

    fn encode(id: u64, term: &str) -> Vec<u8> {
        let concept = Concept::new(ConceptId::new(id), term)
            .with_localized(LocalizedConcept::new(Language::Eng, term));
        ConceptCodec.serialize(&concept).unwrap()
    }

    fn path(id: u64) -> String {
        format!("concepts/concept-{id}.yaml")
    }

    /// A clone of a remote holding concepts 1..=3.
    fn fixture() -> Fixture {
        let worktree = Arc::new(InMemoryBackend::new());
        let controller = Arc::new(InMemoryController::new(Arc::clone(&worktree)));
        let files: Vec<(String, Vec<u8>)> = [(1, "datum"), (2, "geoid"), (3, "ellipsoid")]
            .into_iter()
            .map(|(id, term)| (path(id), encode(id, term)))
            .collect();
        controller
            .commit_upstream(
                "initial",
                files.iter().map(|(p, b)| (p.as_str(), Some(b.as_slice()))),
            )
            .unwrap();
        controller.pull().unwrap();
        let workspace = Arc::new(Workspace::new(worktree.clone(), None));
        workspace.load().unwrap();
        Fixture {
            worktree,
            controller,
            workspace,
        }
    }

    impl Fixture {
        fn workflow(&self) -> SyncWorkflow {
            SyncWorkflow::new(
                Arc::clone(&self.workspace),
                self.controller.clone(),
                SyncOptions::default(),
            )
        }

        fn edit_locally(&self, id: u64, term: &str) {
            self.workspace
                .put("concepts", &id.to_string(), json!({"term": term, "eng": {"term": term}}))
                .unwrap();
        }

        fn edit_remotely(&self, id: u64, term: &str) {
            let bytes = encode(id, term);
            self.controller
                .commit_upstream("remote edit", [(path(id).as_str(), Some(bytes.as_slice()))])
                .unwrap();
        }

        fn term(&self, id: u64) -> String {
            let c = self.workspace.concepts().unwrap().load(ConceptId::new(id)).unwrap();
            c.term
        }
    }

    #[test]
    fn disjoint_edits_fast_forward_and_commit() {
        let fx = fixture();
        fx.edit_locally(1, "geodetic datum");
        fx.edit_remotely(2, "gravimetric geoid");

        let mut wf = fx.workflow();
        assert_eq!(wf.begin().unwrap(), &SyncState::FastForward);
        wf.finalize().unwrap();
        let SyncState::Committed { report } = wf.state() else {
            panic!("expected committed, got {:?}", wf.state());
        };
        assert!(report.pushed);
        assert_eq!(report.incoming, 1);
        assert_eq!(report.outgoing, 1);
        assert!(report.local_commit.is_some());
        assert_eq!(fx.term(2), "gravimetric geoid");
        assert_eq!(fx.term(1), "geodetic datum");
        assert!(fx.controller.upstream_file(&path(1)).unwrap().is_some());
        assert_eq!(
            fx.workspace.concepts().unwrap().summary(ConceptId::new(2)).unwrap().unwrap().term,
            "gravimetric geoid"
        );
    }

    #[test]
    fn same_object_edited_on_both_sides_is_a_conflict() {
        let fx = fixture();
        fx.edit_locally(2, "local geoid");
        fx.edit_remotely(2, "remote geoid");
        fx.edit_remotely(3, "remote ellipsoid");

        let mut wf = fx.workflow();
        let state = wf.begin().unwrap().clone();
        let SyncState::ConflictsPresent { conflicts } = state else {
            panic!("expected conflicts, got {state:?}");
        };
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].id, "2");
        assert_eq!(conflicts[0].kind, "concepts");
    }

    #[test]
    fn identical_edits_are_not_conflicts() {
        let fx = fixture();
        fx.edit_locally(2, "geoid model");
        let local = fx.worktree.read(&path(2)).unwrap().unwrap();
        fx.controller
            .commit_upstream("same edit", [(path(2).as_str(), Some(local.as_slice()))])
            .unwrap();
        let mut wf = fx.workflow();
        assert_eq!(wf.begin().unwrap(), &SyncState::FastForward);
    }

    #[test]
    fn non_object_collision_fails() {
        let fx = fixture();
        fx.worktree.write("README.md", b"local").unwrap();
        fx.controller
            .commit_upstream("readme", [("README.md", Some(&b"remote"[..]))])
            .unwrap();
        let mut wf = fx.workflow();
        assert!(matches!(wf.begin(), Err(SyncError::UnresolvableCollision(p)) if p == "README.md"));
        assert!(matches!(wf.state(), SyncState::Failed { .. }));
        wf.reset();
        assert_eq!(wf.state(), &SyncState::Idle);
    }

    #[test]
    fn conflict_versions_show_all_sides() {
        let fx = fixture();
        fx.edit_locally(2, "local geoid");
        fx.edit_remotely(2, "remote geoid");
        let mut wf = fx.workflow();
        wf.begin().unwrap();
        let versions = wf.conflict_versions("2").unwrap();
        assert_eq!(versions.base.unwrap()["term"], "geoid");
        assert_eq!(versions.local.unwrap()["term"], "local geoid");
        assert_eq!(versions.remote.unwrap()["term"], "remote geoid");
        assert!(versions.problems.is_empty());
        assert!(versions.diff.unified.contains("+term: remote geoid"));
        assert!(matches!(wf.conflict_versions("9"), Err(SyncError::UnknownConflict(_))));
    }

    #[test]
    fn finalize_requires_every_conflict_resolved() {
        let fx = fixture();
        fx.edit_locally(1, "local datum");
        fx.edit_remotely(1, "remote datum");
        fx.edit_locally(2, "local geoid");
        fx.edit_remotely(2, "remote geoid");
        let mut wf = fx.workflow();
        wf.begin().unwrap();
        assert!(matches!(wf.finalize(), Err(SyncError::InvalidTransition { .. })));

        let state = wf.resolve("1", Resolution::TakeRemote).unwrap();
        assert!(matches!(state, SyncState::Resolving { remaining } if remaining.len() == 1));
        assert!(matches!(wf.finalize(), Err(SyncError::InvalidTransition { .. })));

        let merged = json!({"term": "merged geoid", "eng": {"term": "merged geoid"}});
        assert_eq!(wf.resolve("2", Resolution::Accept(merged)).unwrap(), &SyncState::Resolved);
        wf.finalize().unwrap();
        assert!(matches!(wf.state(), SyncState::Committed { .. }));

        assert_eq!(fx.term(1), "remote datum");
        assert_eq!(fx.term(2), "merged geoid");
        let upstream = fx.controller.upstream_file(&path(2)).unwrap().unwrap();
        assert!(String::from_utf8(upstream).unwrap().contains("merged geoid"));
    }

    #[test]
    fn take_remote_keeps_unknown_fields() {
        let fx = fixture();
        fx.edit_locally(2, "local geoid");
        let mut eng = LocalizedConcept::new(Language::Eng, "remote geoid");
        eng.extra.insert("reviewer".into(), serde_yaml::Value::from("ogc"));
        let mut remote = Concept::new(ConceptId::new(2), "remote geoid").with_localized(eng);
        remote
            .extra
            .insert("entry_status".into(), serde_yaml::Value::from("valid"));
        let bytes = ConceptCodec.serialize(&remote).unwrap();
        fx.controller
            .commit_upstream("remote edit", [(path(2).as_str(), Some(bytes.as_slice()))])
            .unwrap();

        let mut wf = fx.workflow();
        wf.begin().unwrap();
        wf.resolve("2", Resolution::TakeRemote).unwrap();
        wf.finalize().unwrap();

        assert_eq!(fx.worktree.read(&path(2)).unwrap().unwrap(), bytes);
        assert_eq!(
            fx.workspace.concepts().unwrap().load(ConceptId::new(2)).unwrap(),
            remote
        );
        assert_eq!(fx.controller.upstream_file(&path(2)).unwrap().unwrap(), bytes);
    }

    #[test]
    fn keep_local_and_delete_resolutions() {
        let fx = fixture();
        fx.edit_locally(1, "local datum");
        fx.edit_remotely(1, "remote datum");
        fx.edit_locally(3, "local ellipsoid");
        fx.edit_remotely(3, "remote ellipsoid");
        let mut wf = fx.workflow();
        wf.begin().unwrap();
        wf.resolve("1", Resolution::KeepLocal).unwrap();
        wf.resolve(&path(3), Resolution::Delete).unwrap();
        wf.finalize().unwrap();
        assert_eq!(fx.term(1), "local datum");
        assert!(fx.worktree.read(&path(3)).unwrap().is_none());
        assert!(fx.controller.upstream_file(&path(3)).unwrap().is_none());
        assert!(fx
            .workspace
            .concepts()
            .unwrap()
            .summary(ConceptId::new(3))
            .unwrap()
            .is_none());
    }

    #[test]
    fn invalid_resolution_is_rejected_without_state_change() {
        let fx = fixture();
        fx.edit_locally(1, "local datum");
        fx.edit_remotely(1, "remote datum");
        let mut wf = fx.workflow();
        wf.begin().unwrap();
        let err = wf.resolve("1", Resolution::Accept(json!({"term": "  "}))).unwrap_err();
        assert!(matches!(err, SyncError::Workspace(_)));
        assert!(matches!(wf.state(), SyncState::ConflictsPresent { .. }));
    }

    #[test]
    fn failed_merge_rolls_back_everything() {
        let fx = fixture();
        fx.edit_locally(1, "local datum");
        fx.edit_remotely(1, "remote datum");
        let mut wf = fx.workflow();
        wf.begin().unwrap();
        wf.resolve("1", Resolution::TakeRemote).unwrap();
        fx.controller.fail_next_merge().unwrap();

        assert!(wf.finalize().is_err());
        assert!(matches!(wf.state(), SyncState::Failed { .. }));
        assert_eq!(fx.term(1), "local datum");
        assert_eq!(
            fx.workspace.concepts().unwrap().summary(ConceptId::new(1)).unwrap().unwrap().term,
            "local datum"
        );

        wf.reset();
        wf.begin().unwrap();
        wf.resolve("1", Resolution::TakeRemote).unwrap();
        wf.finalize().unwrap();
        assert_eq!(fx.term(1), "remote datum");
    }

    #[test]
    fn rejected_push_rolls_back_merge() {
        let fx = fixture();
        fx.edit_remotely(2, "remote geoid");
        fx.edit_locally(3, "local ellipsoid");
        fx.controller.set_reject_push(true).unwrap();
        let mut wf = fx.workflow();
        assert!(matches!(wf.run(), Err(SyncError::PushRejected(_))));
        assert_eq!(fx.term(2), "geoid");
        assert_eq!(fx.term(3), "local ellipsoid");
    }

    #[test]
    fn nothing_to_do_commits_without_push() {
        let fx = fixture();
        let mut wf = fx.workflow();
        wf.run().unwrap();
        let SyncState::Committed { report } = wf.state() else {
            panic!("expected committed");
        };
        assert!(!report.pushed);
        assert_eq!(report.merge, MergeOutcome::UpToDate);
    }

    #[test]
    fn begin_twice_is_invalid() {
        let fx = fixture();
        let mut wf = fx.workflow();
        wf.begin().unwrap();
        assert!(matches!(wf.begin(), Err(SyncError::InvalidTransition { .. })));
    }
}
