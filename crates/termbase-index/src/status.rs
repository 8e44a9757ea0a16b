//! Outcome of validating an index against the files it was built from.

/// What a validation pass found when comparing index entries to the files
/// currently on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationReport<I> {
    /// Entries whose file was unchanged.
    pub unchanged: usize,
    /// Files present on disk but missing from the index.
    pub added: Vec<I>,
    /// Files whose content changed since they were indexed.
    pub refreshed: Vec<I>,
    /// Entries whose file no longer exists.
    pub removed: Vec<I>,
    /// Files that could not be decoded, with the reason.
    pub skipped: Vec<(String, String)>,
}

impl<I> Default for ValidationReport<I> {
    fn default() -> Self {
        Self {
            unchanged: 0,
            added: Vec::new(),
            refreshed: Vec::new(),
            removed: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl<I> ValidationReport<I> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the index already matched the files.
    pub fn is_clean(&self) -> bool {
        self.added.is_empty()
            && self.refreshed.is_empty()
            && self.removed.is_empty()
            && self.skipped.is_empty()
    }

    /// Number of entries that had to be touched.
    pub fn total_changes(&self) -> usize {
        self.added.len() + self.refreshed.len() + self.removed.len()
    }
}
