use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use termbase_types::Language;

/// Parameters of a `find_objects` call.
///
/// A query that is absent or blank after trimming selects every object,
/// including objects with no variant in `language`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindOptions {
    pub query: Option<String>,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub offset: usize,
    pub limit: Option<usize>,
}

impl FindOptions {
    /// Every object, in id order.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn matching(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }

    pub fn in_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }

    /// Trimmed, lowercased query; `None` when it selects everything.
    pub fn normalized_query(&self) -> Option<String> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase)
    }
}

/// A file skipped during a listing or a rebuild.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub path: String,
    pub reason: String,
}

impl Diagnostic {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Objects selected by a `find_objects` call.
#[derive(Clone, Debug, PartialEq)]
pub struct FindResult<I, T> {
    /// The requested page, keyed by id.
    pub items: BTreeMap<I, T>,
    /// Number of matching objects before pagination.
    pub total: usize,
    /// Files that matched the index but could not be loaded.
    pub diagnostics: Vec<Diagnostic>,
}

impl<I, T> FindResult<I, T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
