//! Line diff between the local and remote content of a conflicting file.

use serde::Serialize;
use similar::{ChangeTag, TextDiff};

const CONTEXT_LINES: usize = 3;

/// Local-versus-remote diff of one file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConflictDiff {
    pub hunks: Vec<DiffHunk>,
    /// The same diff rendered in unified format, ready to print.
    pub unified: String,
}

impl ConflictDiff {
    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }

    /// Lines only the remote side has.
    pub fn remote_only(&self) -> usize {
        self.lines().filter(|l| matches!(l, DiffLine::Remote(_))).count()
    }

    /// Lines only the local side has.
    pub fn local_only(&self) -> usize {
        self.lines().filter(|l| matches!(l, DiffLine::Local(_))).count()
    }

    fn lines(&self) -> impl Iterator<Item = &DiffLine> {
        self.hunks.iter().flat_map(|h| &h.lines)
    }
}

/// A contiguous region of differences.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DiffHunk {
    /// First line of the hunk in the local content (1-based).
    pub local_start: usize,
    pub local_count: usize,
    /// First line of the hunk in the remote content (1-based).
    pub remote_start: usize,
    pub remote_count: usize,
    pub lines: Vec<DiffLine>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "side", content = "text", rename_all = "snake_case")]
pub enum DiffLine {
    Both(String),
    Local(String),
    Remote(String),
}

/// Diff the local and remote content of `path`. A missing side (the file
/// was deleted there) diffs as empty; non-UTF-8 content is summarized by
/// size.
pub fn diff_versions(path: &str, local: Option<&[u8]>, remote: Option<&[u8]>) -> ConflictDiff {
    let local = local.unwrap_or_default();
    let remote = remote.unwrap_or_default();
    let (Ok(old), Ok(new)) = (std::str::from_utf8(local), std::str::from_utf8(remote)) else {
        return binary_diff(path, local, remote);
    };
    if old == new {
        return ConflictDiff {
            hunks: Vec::new(),
            unified: String::new(),
        };
    }

    let text_diff = TextDiff::from_lines(old, new);
    let mut hunks = Vec::new();
    for group in text_diff.grouped_ops(CONTEXT_LINES) {
        let Some(first) = group.first() else {
            continue;
        };
        let mut hunk = DiffHunk {
            local_start: first.old_range().start + 1,
            local_count: 0,
            remote_start: first.new_range().start + 1,
            remote_count: 0,
            lines: Vec::new(),
        };
        for op in &group {
            for change in text_diff.iter_changes(op) {
                let text = change.value().trim_end_matches('\n').to_string();
                match change.tag() {
                    ChangeTag::Equal => {
                        hunk.local_count += 1;
                        hunk.remote_count += 1;
                        hunk.lines.push(DiffLine::Both(text));
                    }
                    ChangeTag::Delete => {
                        hunk.local_count += 1;
                        hunk.lines.push(DiffLine::Local(text));
                    }
                    ChangeTag::Insert => {
                        hunk.remote_count += 1;
                        hunk.lines.push(DiffLine::Remote(text));
                    }
                }
            }
        }
        hunks.push(hunk);
    }

    let unified = text_diff
        .unified_diff()
        .context_radius(CONTEXT_LINES)
        .header(&format!("local/{path}"), &format!("remote/{path}"))
        .to_string();
    ConflictDiff { hunks, unified }
}

fn binary_diff(path: &str, local: &[u8], remote: &[u8]) -> ConflictDiff {
    let mut lines = Vec::new();
    if !local.is_empty() {
        lines.push(DiffLine::Local(format!("(binary content, {} bytes)", local.len())));
    }
    if !remote.is_empty() {
        lines.push(DiffLine::Remote(format!("(binary content, {} bytes)", remote.len())));
    }
    ConflictDiff {
        unified: format!("binary file {path} differs\n"),
        hunks: vec![DiffHunk {
            local_start: 1,
            local_count: usize::from(!local.is_empty()),
            remote_start: 1,
            remote_count: usize::from(!remote.is_empty()),
            lines,
        }],
    }
}
