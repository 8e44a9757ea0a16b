use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use termbase_git::GitController;
use termbase_store::{Ack, FileBackend, FindOptions, FindResult, FsBackend};
use termbase_sync::{ConflictVersions, RepositoryController, Resolution, SyncState, SyncWorkflow};
use termbase_types::{Concept, ConceptId, Language, LocalizedConcept};
use termbase_workspace::{LoadReport, SearchPage, Workspace};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::events::{AppEvent, Notifier};
use crate::lock::InstanceLock;

/// Snapshot of the working copy for status displays.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Status {
    pub work_dir: PathBuf,
    pub head: Option<String>,
    pub counts: BTreeMap<&'static str, usize>,
    /// Paths changed since the last synchronization, as of the last fetch.
    pub local_changes: Vec<String>,
    pub unmerged: Vec<String>,
}

/// Result of [`ApplicationContext::sync`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SyncOutcome {
    pub state: SyncState,
    /// Conflicts still waiting for a resolution, with all their versions.
    pub pending: Vec<ConflictVersions>,
}

impl SyncOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self.state, SyncState::Committed { .. })
    }
}

/// One running application instance over one working copy.
pub struct ApplicationContext {
    config: AppConfig,
    workspace: Arc<Workspace>,
    controller: Arc<dyn RepositoryController>,
    notifier: Arc<dyn Notifier>,
    // Dropped last.
    _lock: InstanceLock,
}

impl ApplicationContext {
    /// Lock the instance, clone or open the working copy, and load it.
    pub fn start(config: AppConfig, notifier: Arc<dyn Notifier>) -> AppResult<Self> {
        let lock = InstanceLock::acquire(&config.lock_path())?;
        let controller = GitController::init_repo(config.git_options())?;
        let backend = FsBackend::new(controller.workdir())?;
        Self::assemble(config, lock, Arc::new(backend), Arc::new(controller), notifier)
    }

    /// Like [`ApplicationContext::start`] for an existing working copy,
    /// without contacting the remote.
    pub fn open(config: AppConfig, notifier: Arc<dyn Notifier>) -> AppResult<Self> {
        let lock = InstanceLock::acquire(&config.lock_path())?;
        let controller = GitController::open(config.git_options())?;
        let backend = FsBackend::new(controller.workdir())?;
        Self::assemble(config, lock, Arc::new(backend), Arc::new(controller), notifier)
    }

    /// Assemble from an explicit backend and controller.
    pub fn with_parts(
        config: AppConfig,
        backend: Arc<dyn FileBackend>,
        controller: Arc<dyn RepositoryController>,
        notifier: Arc<dyn Notifier>,
    ) -> AppResult<Self> {
        let lock = InstanceLock::acquire(&config.lock_path())?;
        Self::assemble(config, lock, backend, controller, notifier)
    }

    fn assemble(
        config: AppConfig,
        lock: InstanceLock,
        backend: Arc<dyn FileBackend>,
        controller: Arc<dyn RepositoryController>,
        notifier: Arc<dyn Notifier>,
    ) -> AppResult<Self> {
        let workspace = Arc::new(Workspace::new(backend, Some(config.cache_dir())));
        let report = workspace.load()?;
        info!(
            work_dir = %config.work_dir.display(),
            objects = report.total_entries(),
            "application loaded"
        );
        notifier.notify(AppEvent::AppLoaded);
        Ok(Self {
            config,
            workspace,
            controller,
            notifier,
            _lock: lock,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn workspace(&self) -> &Arc<Workspace> {
        &self.workspace
    }

    pub fn controller(&self) -> &Arc<dyn RepositoryController> {
        &self.controller
    }

    // -- query API ---------------------------------------------------------

    pub fn search(&self, kind: &str, options: &FindOptions) -> AppResult<SearchPage> {
        Ok(self.workspace.search(kind, options)?)
    }

    pub fn search_concepts(&self, options: &FindOptions) -> AppResult<FindResult<ConceptId, Concept>> {
        Ok(self.workspace.concepts()?.find_objects(options)?)
    }

    pub fn get(&self, kind: &str, id: &str) -> AppResult<Value> {
        Ok(self.workspace.get(kind, id)?)
    }

    pub fn concept(&self, id: ConceptId) -> AppResult<Concept> {
        Ok(self.workspace.concepts()?.load(id)?)
    }

    pub fn put(&self, kind: &str, id: &str, data: Value) -> AppResult<Ack<String>> {
        let ack = self.workspace.put(kind, id, data)?;
        self.after_write(&format!("Update {kind} {}", ack.id), vec![ack.id.clone()])?;
        Ok(ack)
    }

    pub fn save_concept(&self, concept: &Concept) -> AppResult<Ack<ConceptId>> {
        let ack = self.workspace.concepts()?.store(concept, true)?;
        self.after_write(&format!("Update concepts {}", ack.id), vec![ack.id.to_string()])?;
        Ok(ack)
    }

    /// Create a concept under a fresh id, with `term` as both the default
    /// term and the term in `lang` (the configured default language when
    /// `None`).
    pub fn create_concept(&self, term: &str, lang: Option<Language>) -> AppResult<Concept> {
        let store = self.workspace.concepts()?;
        let lang = lang.unwrap_or(self.config.default_language);
        let concept = Concept::new(store.next_id()?, term)
            .with_localized(LocalizedConcept::new(lang, term));
        let ack = store.store(&concept, true)?;
        self.after_write(&format!("Add concepts {}", ack.id), vec![ack.id.to_string()])?;
        Ok(concept)
    }

    pub fn delete(&self, kind: &str, id: &str) -> AppResult<()> {
        self.workspace.delete(kind, id)?;
        self.after_write(&format!("Delete {kind} {id}"), vec![id.to_string()])
    }

    pub fn missing_localization(&self, lang: Language) -> AppResult<Vec<ConceptId>> {
        Ok(self.workspace.concepts()?.missing_localization(lang)?)
    }

    fn after_write(&self, message: &str, ids: Vec<String>) -> AppResult<()> {
        if self.config.commit_after_write {
            if let Some(commit) = self.controller.commit_all(message)? {
                debug!(%commit, message, "committed write");
            }
        }
        self.notifier.notify(AppEvent::UpdatedConcepts { ids });
        Ok(())
    }

    // -- maintenance -------------------------------------------------------

    /// Rebuild every index from the files and persist the result.
    pub fn reindex(&self) -> AppResult<LoadReport> {
        let report = self.workspace.rebuild_indexes()?;
        self.workspace.persist_indexes()?;
        self.notifier.notify(AppEvent::UpdatedConcepts { ids: Vec::new() });
        Ok(report)
    }

    pub fn status(&self) -> AppResult<Status> {
        Ok(Status {
            work_dir: self.config.work_dir.clone(),
            head: self.controller.head()?,
            counts: self.workspace.counts()?,
            local_changes: self.controller.local_changes()?.into_iter().collect(),
            unmerged: self.controller.list_unmerged_conflicts()?.into_iter().collect(),
        })
    }

    // -- UI signals --------------------------------------------------------

    pub fn open_concept(&self, id: ConceptId, lang: Option<Language>) {
        self.notifier.notify(AppEvent::OpenConcept {
            id: id.to_string(),
            lang,
        });
    }

    pub fn open_data_synchronizer(&self) {
        self.notifier.notify(AppEvent::OpenDataSynchronizer);
    }

    // -- synchronization ---------------------------------------------------

    /// A fresh workflow for interactive synchronization.
    pub fn synchronizer(&self) -> SyncWorkflow {
        SyncWorkflow::new(
            Arc::clone(&self.workspace),
            Arc::clone(&self.controller),
            self.config.sync_options(),
        )
    }

    /// Run one synchronization attempt non-interactively.
    ///
    /// `resolutions` settle conflicts by object id or path. When conflicts
    /// remain unresolved nothing is written and they are returned in
    /// [`SyncOutcome::pending`].
    pub fn sync(&self, resolutions: &[(String, Resolution)]) -> AppResult<SyncOutcome> {
        let mut workflow = self.synchronizer();
        workflow.begin()?;
        if matches!(workflow.state(), SyncState::ConflictsPresent { .. }) {
            for (id, resolution) in resolutions {
                workflow.resolve(id, resolution.clone())?;
            }
        } else if !resolutions.is_empty() {
            debug!(count = resolutions.len(), "no conflicts, resolutions ignored");
        }

        if workflow.state().is_ready_to_commit() {
            workflow.finalize()?;
            self.workspace.persist_indexes()?;
            self.notifier.notify(AppEvent::UpdatedConcepts { ids: Vec::new() });
            return Ok(SyncOutcome {
                state: workflow.state().clone(),
                pending: Vec::new(),
            });
        }

        let pending = workflow
            .unresolved()
            .iter()
            .map(|conflict| workflow.conflict_versions(&conflict.path))
            .collect::<Result<Vec<_>, _>>()?;
        info!(pending = pending.len(), "synchronization waiting for resolutions");
        Ok(SyncOutcome {
            state: workflow.state().clone(),
            pending,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::events::{ChannelNotifier, NullNotifier};
    use serde_json::json;
    use std::path::Path;
    use termbase_store::{Codec, ConceptCodec, InMemoryBackend};
    use termbase_sync::InMemoryController;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn encode(id: u64, term: &str) -> Vec<u8> {
        let concept = Concept::new(ConceptId::new(id), term)
            .with_localized(LocalizedConcept::new(Language::Eng, term));
        ConceptCodec.serialize(&concept).unwrap()
    }

    fn path(id: u64) -> String {
        format!("concepts/concept-{id}.yaml")
    }

    struct Harness {
        _dir: tempfile::TempDir,
        ctx: ApplicationContext,
        controller: Arc<InMemoryController>,
        events: UnboundedReceiver<AppEvent>,
    }

    /// A context over a clone of a remote holding concepts 1 and 2.
    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let worktree = Arc::new(InMemoryBackend::new());
        let controller = Arc::new(InMemoryController::new(Arc::clone(&worktree)));
        let (one, two) = (encode(1, "datum"), encode(2, "geoid"));
        controller
            .commit_upstream(
                "initial",
                [
                    (path(1).as_str(), Some(one.as_slice())),
                    (path(2).as_str(), Some(two.as_slice())),
                ],
            )
            .unwrap();
        controller.pull().unwrap();
        let (notifier, events) = ChannelNotifier::new();
        let ctx = ApplicationContext::with_parts(
            AppConfig::in_dir(dir.path()),
            worktree,
            controller.clone(),
            Arc::new(notifier),
        )
        .unwrap();
        Harness {
            _dir: dir,
            ctx,
            controller,
            events,
        }
    }

    #[test]
    fn loads_and_announces() {
        let mut h = harness();
        assert_eq!(h.events.try_recv().unwrap(), AppEvent::AppLoaded);
        let all = h.ctx.search_concepts(&FindOptions::all()).unwrap();
        assert_eq!(all.total, 2);
        let page = h.ctx.search("concepts", &FindOptions::matching("geo")).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0]["term"], "geoid");
    }

    #[test]
    fn writes_commit_and_notify() {
        let mut h = harness();
        h.events.try_recv().unwrap();
        let before = h.controller.head().unwrap();
        let ack = h
            .ctx
            .put("concepts", "1", json!({"term": "geodetic datum", "eng": {"term": "geodetic datum"}}))
            .unwrap();
        assert_eq!(ack.path, path(1));
        assert_ne!(h.controller.head().unwrap(), before);
        assert_eq!(
            h.events.try_recv().unwrap(),
            AppEvent::UpdatedConcepts { ids: vec!["1".into()] }
        );
        assert_eq!(h.ctx.get("concepts", "1").unwrap()["term"], "geodetic datum");
    }

    #[test]
    fn create_allocates_fresh_ids_and_delete_removes() {
        let h = harness();
        let first = h.ctx.create_concept("ellipsoid", None).unwrap();
        let second = h.ctx.create_concept("projection", Some(Language::Fra)).unwrap();
        assert_eq!(first.id, ConceptId::new(3));
        assert_eq!(second.id, ConceptId::new(4));
        assert_eq!(second.term_in(Language::Fra), Some("projection"));

        h.ctx.delete("concepts", "3").unwrap();
        assert!(h.ctx.get("concepts", "3").unwrap_err().is_not_found());
        assert_eq!(h.ctx.create_concept("geoid", None).unwrap().id, ConceptId::new(5));
        assert_eq!(
            h.ctx.missing_localization(Language::Fra).unwrap(),
            vec![ConceptId::new(1), ConceptId::new(2), ConceptId::new(5)]
        );
    }

    #[test]
    fn second_instance_is_refused() {
        let h = harness();
        let again = ApplicationContext::with_parts(
            h.ctx.config().clone(),
            Arc::new(InMemoryBackend::new()),
            Arc::new(InMemoryController::new(Arc::new(InMemoryBackend::new()))),
            Arc::new(NullNotifier),
        );
        assert!(matches!(again, Err(AppError::AlreadyRunning(_))));
    }

    #[test]
    fn sync_waits_for_resolutions_then_commits() {
        let h = harness();
        h.ctx
            .put("concepts", "1", json!({"term": "local datum", "eng": {"term": "local datum"}}))
            .unwrap();
        let remote = encode(1, "remote datum");
        h.controller
            .commit_upstream("remote edit", [(path(1).as_str(), Some(remote.as_slice()))])
            .unwrap();

        let outcome = h.ctx.sync(&[]).unwrap();
        assert!(matches!(outcome.state, SyncState::ConflictsPresent { .. }));
        assert_eq!(outcome.pending.len(), 1);
        assert_eq!(outcome.pending[0].conflict.id, "1");
        assert_eq!(h.ctx.concept(ConceptId::new(1)).unwrap().term, "local datum");

        let outcome = h.ctx.sync(&[("1".to_string(), Resolution::TakeRemote)]).unwrap();
        assert!(outcome.is_committed());
        assert_eq!(h.ctx.concept(ConceptId::new(1)).unwrap().term, "remote datum");
        assert_eq!(h.controller.upstream_file(&path(1)).unwrap().unwrap(), remote);
    }

    #[test]
    fn status_reports_counts_and_head() {
        let h = harness();
        let status = h.ctx.status().unwrap();
        assert_eq!(status.counts["concepts"], 2);
        assert!(status.head.is_some());
        assert!(status.local_changes.is_empty());
        assert!(status.unmerged.is_empty());
    }

    #[test]
    fn reindex_rebuilds_and_persists() {
        let h = harness();
        let report = h.ctx.reindex().unwrap();
        assert_eq!(report.total_entries(), 2);
        assert!(h.ctx.config().cache_dir().join("concepts.idx").is_file());
    }

    fn git_config(root: &Path, remote: &str) -> AppConfig {
        let mut config = AppConfig::in_dir(root);
        config.remote_url = remote.to_string();
        config.author_name = "Tester".into();
        config.author_email = "tester@example.org".into();
        config
    }

    fn term(ctx: &ApplicationContext, id: u64) -> String {
        ctx.concept(ConceptId::new(id)).unwrap().term
    }

    #[test]
    fn two_instances_reconcile_through_git() {
        let remote_dir = tempfile::tempdir().unwrap();
        git2::Repository::init_bare(remote_dir.path()).unwrap();
        let remote = remote_dir.path().to_str().unwrap().to_string();

        let a_dir = tempfile::tempdir().unwrap();
        let a = ApplicationContext::start(git_config(a_dir.path(), &remote), Arc::new(NullNotifier))
            .unwrap();
        a.create_concept("datum", None).unwrap();
        assert!(a.sync(&[]).unwrap().is_committed());

        let b_dir = tempfile::tempdir().unwrap();
        let b = ApplicationContext::start(git_config(b_dir.path(), &remote), Arc::new(NullNotifier))
            .unwrap();
        assert_eq!(term(&b, 1), "datum");

        a.put("concepts", "1", json!({"term": "datum A", "eng": {"term": "datum A"}}))
            .unwrap();
        assert!(a.sync(&[]).unwrap().is_committed());
        b.put("concepts", "1", json!({"term": "datum B", "eng": {"term": "datum B"}}))
            .unwrap();

        let pending = b.sync(&[]).unwrap();
        assert_eq!(pending.pending.len(), 1);
        let versions = &pending.pending[0];
        assert_eq!(versions.local.as_ref().unwrap()["term"], "datum B");
        assert_eq!(versions.remote.as_ref().unwrap()["term"], "datum A");
        assert_eq!(versions.base.as_ref().unwrap()["term"], "datum");

        assert!(b
            .sync(&[("1".to_string(), Resolution::KeepLocal)])
            .unwrap()
            .is_committed());
        assert_eq!(term(&b, 1), "datum B");

        assert!(a.sync(&[]).unwrap().is_committed());
        assert_eq!(term(&a, 1), "datum B");
        assert_eq!(
            a.search_concepts(&FindOptions::matching("datum b")).unwrap().total,
            1
        );
    }
}
