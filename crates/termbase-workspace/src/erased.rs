//! Kind-erased access to a [`KindStore`], for callers that address kinds by
//! name and exchange objects as JSON.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use termbase_store::{Ack, Diagnostic, FindOptions, Kind, KindStore, StoreError, StoreResult};

use crate::error::{WorkspaceError, WorkspaceResult};

/// Where a kind's index came from during load.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexSource {
    /// A persisted cache, then validated against the files.
    Cache,
    /// A full scan of the kind's files.
    Rebuilt,
}

/// Index state of one kind after a load, refresh or rebuild.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KindLoad {
    pub source: IndexSource,
    pub entries: usize,
    /// Entries added, refreshed or removed relative to the cache.
    pub changed: usize,
    pub skipped: Vec<Diagnostic>,
}

/// One page of a kind-erased search.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchPage {
    pub kind: &'static str,
    /// Objects in id order, in their JSON form.
    pub items: Vec<Value>,
    pub total: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Operations every kind store supports, without naming its types.
pub trait ErasedStore: Send + Sync {
    fn kind(&self) -> &'static str;

    /// Start from the cache at `cache` when usable, else rebuild.
    fn load_index(&self, cache: Option<&Path>) -> StoreResult<KindLoad>;

    /// Bring the index up to date with files changed outside the store.
    fn refresh_index(&self) -> StoreResult<KindLoad>;

    fn rebuild_index(&self) -> StoreResult<KindLoad>;

    fn save_index(&self, cache: &Path) -> StoreResult<()>;

    fn count(&self) -> StoreResult<usize>;

    fn search(&self, options: &FindOptions) -> WorkspaceResult<SearchPage>;

    fn get(&self, id: &str) -> WorkspaceResult<Value>;

    /// Validate and write `data` as the object `id`. A payload without an
    /// `id` field takes the requested one.
    fn put(&self, id: &str, data: Value) -> WorkspaceResult<Ack<String>>;

    fn delete(&self, id: &str) -> WorkspaceResult<()>;

    /// Validate `data` as the object `id` and return its file content,
    /// without writing anything.
    fn encode_json(&self, id: &str, data: Value) -> WorkspaceResult<Vec<u8>>;

    /// Decode the content of the file at `path` into its JSON form.
    fn decode_json(&self, path: &str, bytes: &[u8]) -> WorkspaceResult<Value>;

    /// The id of the object stored at `path`, if `path` belongs to this kind.
    fn id_for_path(&self, path: &str) -> Option<String>;
}

fn parse_id<K: Kind>(id: &str) -> WorkspaceResult<K::Id> {
    id.trim().parse().map_err(|_| WorkspaceError::InvalidId {
        kind: K::DIR,
        id: id.to_string(),
    })
}

fn object_from_json<K>(id: K::Id, mut data: Value) -> WorkspaceResult<K>
where
    K: Kind + DeserializeOwned,
{
    if let Value::Object(map) = &mut data {
        if !map.contains_key("id") {
            map.insert("id".to_string(), serde_json::to_value(id)?);
        }
    }
    let object: K = serde_json::from_value(data)?;
    if object.id() != id {
        return Err(WorkspaceError::IdMismatch {
            expected: id.to_string(),
            found: object.id().to_string(),
        });
    }
    Ok(object)
}

impl<K> ErasedStore for KindStore<K>
where
    K: Kind + Serialize + DeserializeOwned,
{
    fn kind(&self) -> &'static str {
        K::DIR
    }

    fn load_index(&self, cache: Option<&Path>) -> StoreResult<KindLoad> {
        match cache {
            Some(path) if self.load_cache(path)? => {
                let mut load = self.refresh_index()?;
                load.source = IndexSource::Cache;
                Ok(load)
            }
            _ => ErasedStore::rebuild_index(self),
        }
    }

    fn refresh_index(&self) -> StoreResult<KindLoad> {
        let report = self.validate_index()?;
        Ok(KindLoad {
            source: IndexSource::Cache,
            entries: self.len()?,
            changed: report.total_changes(),
            skipped: report
                .skipped
                .into_iter()
                .map(|(path, reason)| Diagnostic::new(path, reason))
                .collect(),
        })
    }

    fn rebuild_index(&self) -> StoreResult<KindLoad> {
        let report = KindStore::rebuild_index(self)?;
        Ok(KindLoad {
            source: IndexSource::Rebuilt,
            entries: report.indexed,
            changed: report.indexed,
            skipped: report.skipped,
        })
    }

    fn save_index(&self, cache: &Path) -> StoreResult<()> {
        self.save_cache(cache)
    }

    fn count(&self) -> StoreResult<usize> {
        self.len()
    }

    fn search(&self, options: &FindOptions) -> WorkspaceResult<SearchPage> {
        let found = self.find_objects(options)?;
        let items = found
            .items
            .values()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SearchPage {
            kind: K::DIR,
            items,
            total: found.total,
            diagnostics: found.diagnostics,
        })
    }

    fn get(&self, id: &str) -> WorkspaceResult<Value> {
        let object = self.load(parse_id::<K>(id)?)?;
        Ok(serde_json::to_value(object)?)
    }

    fn put(&self, id: &str, data: Value) -> WorkspaceResult<Ack<String>> {
        let object = object_from_json::<K>(parse_id::<K>(id)?, data)?;
        let ack = self.store(&object, true)?;
        Ok(Ack {
            id: ack.id.to_string(),
            path: ack.path,
            hash: ack.hash,
        })
    }

    fn delete(&self, id: &str) -> WorkspaceResult<()> {
        KindStore::delete(self, parse_id::<K>(id)?)?;
        Ok(())
    }

    fn encode_json(&self, id: &str, data: Value) -> WorkspaceResult<Vec<u8>> {
        let object = object_from_json::<K>(parse_id::<K>(id)?, data)?;
        Ok(self.encode(&object)?)
    }

    fn decode_json(&self, path: &str, bytes: &[u8]) -> WorkspaceResult<Value> {
        let id = K::parse_relative_path(path)
            .ok_or_else(|| StoreError::InvalidPath(path.to_string()))?;
        let object = self.decode(path, id, bytes)?;
        Ok(serde_json::to_value(object)?)
    }

    fn id_for_path(&self, path: &str) -> Option<String> {
        K::parse_relative_path(path).map(|id| id.to_string())
    }
}
