//! The core Index structure.
//!
//! The [`Index`] manages a `BTreeMap<I, IndexEntry<S>>`. All operations are
//! in-memory; reading files and computing summaries is the responsibility of
//! the store that owns the index.

use std::collections::BTreeMap;
use std::fmt;

use crate::entry::IndexEntry;

/// Current on-disk format version of a persisted index.
pub const INDEX_VERSION: u32 = 1;

/// Id-to-summary map for one object kind.
#[derive(Clone, PartialEq, Eq)]
pub struct Index<I, S> {
    /// The index format version.
    pub version: u32,
    entries: BTreeMap<I, IndexEntry<S>>,
}

impl<I: fmt::Debug, S> fmt::Debug for Index<I, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Index")
            .field("version", &self.version)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl<I: Ord, S> Default for Index<I, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Ord, S> Index<I, S> {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self {
            version: INDEX_VERSION,
            entries: BTreeMap::new(),
        }
    }

    /// Number of entries in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the index has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get an entry by id.
    pub fn get(&self, id: &I) -> Option<&IndexEntry<S>> {
        self.entries.get(id)
    }

    /// Get just the summary for an id.
    pub fn summary(&self, id: &I) -> Option<&S> {
        self.entries.get(id).map(|e| &e.summary)
    }

    pub fn contains(&self, id: &I) -> bool {
        self.entries.contains_key(id)
    }

    /// Insert or replace the entry for `id`, returning the previous one.
    pub fn put(&mut self, id: I, entry: IndexEntry<S>) -> Option<IndexEntry<S>> {
        self.entries.insert(id, entry)
    }

    /// Remove the entry for `id`, returning it if it existed.
    pub fn remove(&mut self, id: &I) -> Option<IndexEntry<S>> {
        self.entries.remove(id)
    }

    /// Discard every entry and repopulate from `source`.
    ///
    /// Returns the number of entries after the rebuild. Later duplicates of
    /// the same id replace earlier ones.
    pub fn rebuild<T>(&mut self, source: T) -> usize
    where
        T: IntoIterator<Item = (I, IndexEntry<S>)>,
    {
        self.entries.clear();
        self.entries.extend(source);
        self.entries.len()
    }

    /// Iterate entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&I, &IndexEntry<S>)> {
        self.entries.iter()
    }

    /// Iterate ids in order.
    pub fn ids(&self) -> impl Iterator<Item = &I> {
        self.entries.keys()
    }

    /// Ids whose summary satisfies `pred`, in id order.
    pub fn matching<F>(&self, mut pred: F) -> Vec<&I>
    where
        F: FnMut(&S) -> bool,
    {
        self.entries
            .iter()
            .filter(|(_, e)| pred(&e.summary))
            .map(|(id, _)| id)
            .collect()
    }

    /// The largest indexed id.
    pub fn max_id(&self) -> Option<&I> {
        self.entries.keys().next_back()
    }

    /// Remove every entry whose id is not accepted by `keep`, returning the
    /// removed ids.
    pub fn retain<F>(&mut self, mut keep: F) -> Vec<I>
    where
        F: FnMut(&I, &IndexEntry<S>) -> bool,
        I: Clone,
    {
        let removed: Vec<I> = self
            .entries
            .iter()
            .filter(|(id, e)| !keep(id, e))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &removed {
            self.entries.remove(id);
        }
        removed
    }

    /// Move all entries out, leaving the index empty.
    pub fn into_entries(self) -> BTreeMap<I, IndexEntry<S>> {
        self.entries
    }
}
