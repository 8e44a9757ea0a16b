use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use termbase_index::{cache, ContentHash, Fingerprint, Index, IndexEntry, ValidationReport};
use termbase_types::Language;
use tracing::{debug, info, warn};

use crate::codec::{Codec, CodecError};
use crate::error::{StoreError, StoreResult};
use crate::kind::Kind;
use crate::query::{Diagnostic, FindOptions, FindResult};
use crate::traits::{FileBackend, FileStat};

/// Acknowledgement of a successful write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ack<I> {
    pub id: I,
    /// Path of the written file, relative to the working directory.
    pub path: String,
    pub hash: ContentHash,
}

/// Outcome of [`KindStore::rebuild_index`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RebuildReport {
    pub indexed: usize,
    pub skipped: Vec<Diagnostic>,
}

/// Store for every object of one [`Kind`].
///
/// Invariants:
/// - An object's file lives at `K::relative_path(id)` and nowhere else.
/// - Writes to one id are serialized; the file write and the index update
///   happen under the same per-id lock, so the index never describes a file
///   version older than the last completed write.
/// - Ids are handed out above every id this store has seen, including
///   deleted ones.
pub struct KindStore<K: Kind> {
    backend: Arc<dyn FileBackend>,
    codec: K::Codec,
    index: RwLock<Index<K::Id, K::Summary>>,
    locks: Mutex<HashMap<K::Id, Arc<Mutex<()>>>>,
    highest: Mutex<Option<K::Id>>,
}

impl<K: Kind> KindStore<K> {
    /// Create a store with an empty index. Call [`KindStore::rebuild_index`]
    /// or [`KindStore::load_cache`] before querying.
    pub fn new(backend: Arc<dyn FileBackend>) -> Self {
        Self {
            backend,
            codec: K::Codec::default(),
            index: RwLock::new(Index::new()),
            locks: Mutex::new(HashMap::new()),
            highest: Mutex::new(None),
        }
    }

    pub fn kind(&self) -> &'static str {
        K::DIR
    }

    pub fn backend(&self) -> &Arc<dyn FileBackend> {
        &self.backend
    }

    // -- lock helpers ------------------------------------------------------

    fn read_index(&self) -> StoreResult<RwLockReadGuard<'_, Index<K::Id, K::Summary>>> {
        self.index.read().map_err(|_| StoreError::LockPoisoned("index"))
    }

    fn write_index(&self) -> StoreResult<RwLockWriteGuard<'_, Index<K::Id, K::Summary>>> {
        self.index.write().map_err(|_| StoreError::LockPoisoned("index"))
    }

    fn id_lock(&self, id: K::Id) -> StoreResult<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| StoreError::LockPoisoned("object locks"))?;
        Ok(Arc::clone(locks.entry(id).or_default()))
    }

    fn observe(&self, id: K::Id) -> StoreResult<()> {
        let mut highest = self
            .highest
            .lock()
            .map_err(|_| StoreError::LockPoisoned("id allocator"))?;
        *highest = (*highest).max(Some(id));
        Ok(())
    }

    // -- codec -------------------------------------------------------------

    /// Encode `object`, reporting validation failures against its path.
    pub fn encode(&self, object: &K) -> StoreResult<Vec<u8>> {
        self.codec
            .serialize(object)
            .map_err(|e| e.at(K::relative_path(object.id())))
    }

    /// Decode the file at `path`, which must hold the object `id`.
    pub fn decode(&self, path: &str, id: K::Id, bytes: &[u8]) -> StoreResult<K> {
        let object = self.codec.deserialize(bytes).map_err(|e| e.at(path))?;
        if object.id() != id {
            return Err(CodecError::new(
                "id",
                format!("file name says {id}, record says {}", object.id()),
            )
            .at(path));
        }
        Ok(object.post_load())
    }

    // -- object operations -------------------------------------------------

    /// Write `object` to its file.
    ///
    /// With `update_index` false the index is left untouched; callers doing
    /// bulk writes follow up with [`KindStore::rebuild_index`].
    pub fn store(&self, object: &K, update_index: bool) -> StoreResult<Ack<K::Id>> {
        let id = object.id();
        let path = K::relative_path(id);
        let bytes = self.encode(object)?;

        let lock = self.id_lock(id)?;
        let _guard = lock.lock().map_err(|_| StoreError::LockPoisoned("object lock"))?;

        let stat = self.backend.write(&path, &bytes)?;
        let fingerprint = Fingerprint::new(&bytes, stat.mtime);
        let hash = fingerprint.hash;
        if update_index {
            let entry = IndexEntry::new(path.clone(), object.summarize(), fingerprint);
            self.write_index()?.put(id, entry);
        }
        self.observe(id)?;

        debug!(kind = K::DIR, %id, hash = %hash.short_hex(), update_index, "object stored");
        Ok(Ack { id, path, hash })
    }

    /// Read and decode the object `id`.
    pub fn load(&self, id: K::Id) -> StoreResult<K> {
        let lock = self.id_lock(id)?;
        let _guard = lock.lock().map_err(|_| StoreError::LockPoisoned("object lock"))?;
        self.load_unlocked(id)
    }

    fn load_unlocked(&self, id: K::Id) -> StoreResult<K> {
        let path = K::relative_path(id);
        let bytes = self.backend.read(&path)?.ok_or_else(|| StoreError::NotFound {
            kind: K::DIR,
            id: id.to_string(),
        })?;
        self.decode(&path, id, &bytes)
    }

    /// Delete the object `id` and its index entry.
    pub fn delete(&self, id: K::Id) -> StoreResult<()> {
        let path = K::relative_path(id);
        let lock = self.id_lock(id)?;
        let _guard = lock.lock().map_err(|_| StoreError::LockPoisoned("object lock"))?;

        let existed = self.backend.delete(&path)?;
        self.write_index()?.remove(&id);
        if !existed {
            return Err(StoreError::NotFound {
                kind: K::DIR,
                id: id.to_string(),
            });
        }
        self.observe(id)?;
        debug!(kind = K::DIR, %id, "object deleted");
        Ok(())
    }

    /// Recompute the index entry of `object` from the file currently on disk.
    pub fn update_indexed_item(&self, object: &K) -> StoreResult<()> {
        let id = object.id();
        let path = K::relative_path(id);
        let lock = self.id_lock(id)?;
        let _guard = lock.lock().map_err(|_| StoreError::LockPoisoned("object lock"))?;

        let Some(bytes) = self.backend.read(&path)? else {
            self.write_index()?.remove(&id);
            return Ok(());
        };
        let mtime = self.backend.stat(&path)?.and_then(|s| s.mtime);
        let entry = IndexEntry::new(path, object.summarize(), Fingerprint::new(&bytes, mtime));
        self.write_index()?.put(id, entry);
        self.observe(id)
    }

    /// Objects selected by `options`, loaded from their files.
    ///
    /// Candidates come from the index; each is then loaded and matched again
    /// so a concurrent edit cannot return an object that no longer matches.
    /// Missing or malformed files are skipped and reported in
    /// `diagnostics`; other I/O failures abort the call.
    pub fn find_objects(&self, options: &FindOptions) -> StoreResult<FindResult<K::Id, K>> {
        let query = options.normalized_query();
        let lang = options.language;
        let candidates: Vec<K::Id> = {
            let index = self.read_index()?;
            match &query {
                None => index.ids().copied().collect(),
                Some(q) => index
                    .matching(|s| K::matches_query(s, q, lang))
                    .into_iter()
                    .copied()
                    .collect(),
            }
        };

        let mut matched = Vec::with_capacity(candidates.len());
        let mut diagnostics = Vec::new();
        for id in candidates {
            match self.load(id) {
                Ok(object) => {
                    let still_matches = query
                        .as_deref()
                        .map_or(true, |q| K::matches_query(&object.summarize(), q, lang));
                    if still_matches {
                        matched.push((id, object));
                    }
                }
                Err(e) if e.is_skippable() => {
                    warn!(kind = K::DIR, %id, error = %e, "skipping unreadable object");
                    diagnostics.push(Diagnostic::new(K::relative_path(id), e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }

        let total = matched.len();
        let limit = options.limit.unwrap_or(usize::MAX);
        let items = matched.into_iter().skip(options.offset).take(limit).collect();
        Ok(FindResult {
            items,
            total,
            diagnostics,
        })
    }

    /// Ids of indexed objects with no variant in `lang`.
    pub fn missing_localization(&self, lang: Language) -> StoreResult<Vec<K::Id>> {
        let index = self.read_index()?;
        Ok(index
            .matching(|s| !K::has_language(s, lang))
            .into_iter()
            .copied()
            .collect())
    }

    /// A fresh id, above every id seen so far. The id is reserved even if no
    /// object is ever stored under it.
    pub fn next_id(&self) -> StoreResult<K::Id> {
        let indexed = self.read_index()?.max_id().copied();
        let mut highest = self
            .highest
            .lock()
            .map_err(|_| StoreError::LockPoisoned("id allocator"))?;
        let id = K::next_id((*highest).max(indexed));
        *highest = Some(id);
        Ok(id)
    }

    // -- index maintenance -------------------------------------------------

    fn listed_files(&self) -> StoreResult<Vec<(String, K::Id, FileStat)>> {
        Ok(self
            .backend
            .list(K::DIR)?
            .into_iter()
            .filter_map(|(path, stat)| match K::parse_relative_path(&path) {
                Some(id) => Some((path, id, stat)),
                None => {
                    debug!(kind = K::DIR, path = %path, "ignoring foreign file");
                    None
                }
            })
            .collect())
    }

    /// Discard the index and rebuild it by decoding every file of the kind.
    ///
    /// Idempotent: rebuilding twice over unchanged files yields the same
    /// index.
    pub fn rebuild_index(&self) -> StoreResult<RebuildReport> {
        let files = self.listed_files()?;
        let mut index = self.write_index()?;
        let mut entries = Vec::with_capacity(files.len());
        let mut report = RebuildReport::default();

        for (path, id, stat) in files {
            self.observe(id)?;
            let Some(bytes) = self.backend.read(&path)? else {
                continue;
            };
            match self.decode(&path, id, &bytes) {
                Ok(object) => {
                    let fingerprint = Fingerprint::new(&bytes, stat.mtime);
                    entries.push((id, IndexEntry::new(path, object.summarize(), fingerprint)));
                }
                Err(e) if e.is_skippable() => {
                    warn!(kind = K::DIR, path = %path, error = %e, "skipping malformed file");
                    report.skipped.push(Diagnostic::new(path, e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }

        report.indexed = index.rebuild(entries);
        info!(
            kind = K::DIR,
            indexed = report.indexed,
            skipped = report.skipped.len(),
            "index rebuilt"
        );
        Ok(report)
    }

    /// Bring the index up to date with the files, decoding only files whose
    /// fingerprint changed.
    pub fn validate_index(&self) -> StoreResult<ValidationReport<K::Id>> {
        let files = self.listed_files()?;
        let mut index = self.write_index()?;
        let mut report = ValidationReport::new();
        let mut present = BTreeSet::new();

        for (path, id, stat) in files {
            self.observe(id)?;
            present.insert(id);
            let existing = index.get(&id).cloned();
            if let Some(entry) = &existing {
                if entry.fingerprint.quick_match(stat.size, stat.mtime) {
                    report.unchanged += 1;
                    continue;
                }
            }

            let Some(bytes) = self.backend.read(&path)? else {
                continue;
            };
            let fingerprint = Fingerprint::new(&bytes, stat.mtime);
            match existing {
                Some(entry) if entry.fingerprint.hash == fingerprint.hash => {
                    index.put(id, IndexEntry::new(path, entry.summary, fingerprint));
                    report.unchanged += 1;
                }
                existing => match self.decode(&path, id, &bytes) {
                    Ok(object) => {
                        index.put(id, IndexEntry::new(path, object.summarize(), fingerprint));
                        if existing.is_some() {
                            report.refreshed.push(id);
                        } else {
                            report.added.push(id);
                        }
                    }
                    Err(e) if e.is_skippable() => {
                        warn!(kind = K::DIR, path = %path, error = %e, "skipping malformed file");
                        index.remove(&id);
                        report.skipped.push((path, e.to_string()));
                    }
                    Err(e) => return Err(e),
                },
            }
        }

        report.removed = index.retain(|id, _| present.contains(id));
        if !report.is_clean() {
            info!(
                kind = K::DIR,
                added = report.added.len(),
                refreshed = report.refreshed.len(),
                removed = report.removed.len(),
                skipped = report.skipped.len(),
                "index refreshed"
            );
        }
        Ok(report)
    }

    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.read_index()?.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn summary(&self, id: K::Id) -> StoreResult<Option<K::Summary>> {
        Ok(self.read_index()?.summary(&id).cloned())
    }

    pub fn index_snapshot(&self) -> StoreResult<Index<K::Id, K::Summary>> {
        Ok(self.read_index()?.clone())
    }

    /// Persist the index to `path`.
    pub fn save_cache(&self, path: &Path) -> StoreResult<()> {
        let index = self.read_index()?;
        cache::save(path, K::DIR, &index)?;
        Ok(())
    }

    /// Replace the index with the cache at `path`.
    ///
    /// Returns `false`, leaving the index untouched, when there is no usable
    /// cache. A cache is only a starting point: follow up with
    /// [`KindStore::validate_index`].
    pub fn load_cache(&self, path: &Path) -> StoreResult<bool> {
        let loaded = match cache::load::<K::Id, K::Summary>(path, K::DIR) {
            Ok(Some(index)) => index,
            Ok(None) => return Ok(false),
            Err(e) => {
                warn!(kind = K::DIR, path = %path.display(), error = %e, "discarding index cache");
                return Ok(false);
            }
        };
        if let Some(max) = loaded.max_id() {
            self.observe(*max)?;
        }
        *self.write_index()? = loaded;
        Ok(true)
    }
}
