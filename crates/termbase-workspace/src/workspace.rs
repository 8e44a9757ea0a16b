use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use termbase_store::{Ack, FileBackend, FindOptions, KindStore, StoreResult};
use termbase_types::Concept;
use tracing::{info, warn};

use crate::erased::{ErasedStore, KindLoad, SearchPage};
use crate::error::{WorkspaceError, WorkspaceResult};

/// Per-kind outcome of a load, refresh or rebuild.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub kinds: BTreeMap<&'static str, KindLoad>,
}

impl LoadReport {
    pub fn total_entries(&self) -> usize {
        self.kinds.values().map(|k| k.entries).sum()
    }

    pub fn total_changed(&self) -> usize {
        self.kinds.values().map(|k| k.changed).sum()
    }
}

/// All kind stores of one working directory.
///
/// Created when storage initializes for a directory and dropped when the
/// directory is re-pointed; a new directory gets a new workspace.
pub struct Workspace {
    backend: Arc<dyn FileBackend>,
    cache_dir: Option<PathBuf>,
    concepts: KindStore<Concept>,
    ready: AtomicBool,
}

impl Workspace {
    /// A workspace over `backend`, not yet loaded. With a `cache_dir`,
    /// indexes are persisted there between runs as `<kind>.idx`.
    pub fn new(backend: Arc<dyn FileBackend>, cache_dir: Option<PathBuf>) -> Self {
        Self {
            concepts: KindStore::new(Arc::clone(&backend)),
            backend,
            cache_dir,
            ready: AtomicBool::new(false),
        }
    }

    pub fn backend(&self) -> &Arc<dyn FileBackend> {
        &self.backend
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn stores(&self) -> [&dyn ErasedStore; 1] {
        [&self.concepts]
    }

    /// Names of the declared kinds.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.stores().iter().map(|s| s.kind()).collect()
    }

    fn cache_path(&self, kind: &str) -> Option<PathBuf> {
        self.cache_dir.as_ref().map(|dir| dir.join(format!("{kind}.idx")))
    }

    fn ensure_ready(&self) -> WorkspaceResult<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(WorkspaceError::NotReady)
        }
    }

    fn each_kind<F>(&self, mut f: F) -> WorkspaceResult<LoadReport>
    where
        F: FnMut(&dyn ErasedStore, Option<&Path>) -> StoreResult<KindLoad>,
    {
        let mut report = LoadReport::default();
        for store in self.stores() {
            let cache = self.cache_path(store.kind());
            let load = f(store, cache.as_deref())?;
            info!(
                kind = store.kind(),
                source = ?load.source,
                entries = load.entries,
                changed = load.changed,
                skipped = load.skipped.len(),
                "kind index ready"
            );
            report.kinds.insert(store.kind(), load);
        }
        self.save_caches_quietly();
        Ok(report)
    }

    /// Make every kind's index usable: from its cache, validated against
    /// the files, or by a full rebuild. Queries are accepted afterwards.
    pub fn load(&self) -> WorkspaceResult<LoadReport> {
        let report = self.each_kind(|store, cache| store.load_index(cache))?;
        self.ready.store(true, Ordering::Release);
        info!(entries = report.total_entries(), "workspace loaded");
        Ok(report)
    }

    /// Re-validate every index after files changed outside the store, for
    /// example after a pull.
    pub fn refresh(&self) -> WorkspaceResult<LoadReport> {
        self.ensure_ready()?;
        self.each_kind(|store, _| store.refresh_index())
    }

    /// Discard every index and rebuild from the files.
    pub fn rebuild_indexes(&self) -> WorkspaceResult<LoadReport> {
        let report = self.each_kind(|store, _| store.rebuild_index())?;
        self.ready.store(true, Ordering::Release);
        Ok(report)
    }

    /// Write every index to the cache directory, if there is one.
    pub fn persist_indexes(&self) -> WorkspaceResult<()> {
        self.ensure_ready()?;
        for store in self.stores() {
            if let Some(path) = self.cache_path(store.kind()) {
                store.save_index(&path)?;
            }
        }
        Ok(())
    }

    fn save_caches_quietly(&self) {
        for store in self.stores() {
            if let Some(path) = self.cache_path(store.kind()) {
                if let Err(e) = store.save_index(&path) {
                    warn!(kind = store.kind(), path = %path.display(), error = %e, "could not persist index cache");
                }
            }
        }
    }

    /// The typed concept store.
    pub fn concepts(&self) -> WorkspaceResult<&KindStore<Concept>> {
        self.ensure_ready()?;
        Ok(&self.concepts)
    }

    /// The store for `kind`, by name.
    pub fn store_for(&self, kind: &str) -> WorkspaceResult<&dyn ErasedStore> {
        self.ensure_ready()?;
        self.stores()
            .into_iter()
            .find(|s| s.kind() == kind)
            .ok_or_else(|| WorkspaceError::UnknownKind(kind.to_string()))
    }

    /// Run `options` against every kind independently.
    pub fn find_objects(
        &self,
        options: &FindOptions,
    ) -> WorkspaceResult<BTreeMap<&'static str, SearchPage>> {
        self.ensure_ready()?;
        self.stores()
            .into_iter()
            .map(|store| Ok((store.kind(), store.search(options)?)))
            .collect()
    }

    pub fn search(&self, kind: &str, options: &FindOptions) -> WorkspaceResult<SearchPage> {
        self.store_for(kind)?.search(options)
    }

    pub fn get(&self, kind: &str, id: &str) -> WorkspaceResult<Value> {
        self.store_for(kind)?.get(id)
    }

    pub fn put(&self, kind: &str, id: &str, data: Value) -> WorkspaceResult<Ack<String>> {
        self.store_for(kind)?.put(id, data)
    }

    pub fn delete(&self, kind: &str, id: &str) -> WorkspaceResult<()> {
        self.store_for(kind)?.delete(id)
    }

    /// The kind and id of the object stored at `path`, for paths inside a
    /// kind directory.
    pub fn object_at(&self, path: &str) -> Option<(&'static str, String)> {
        self.stores()
            .into_iter()
            .find_map(|s| s.id_for_path(path).map(|id| (s.kind(), id)))
    }

    /// Entry count per kind.
    pub fn counts(&self) -> WorkspaceResult<BTreeMap<&'static str, usize>> {
        self.ensure_ready()?;
        self.stores()
            .into_iter()
            .map(|s| Ok((s.kind(), s.count()?)))
            .collect()
    }
}
