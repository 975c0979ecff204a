//! Change descriptions and commit reports for the staged tree.

use crate::path::TreePath;
use serde::Serialize;
use std::fmt;

/// How a staged path differs from disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        };
        f.write_str(label)
    }
}

/// A single pending change, as reported by [`crate::StagedTree::changes`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChange {
    pub path: TreePath,
    pub kind: ChangeKind,
}

/// Outcome of a commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitReport {
    /// Files created or updated
    pub files_written: usize,

    /// Files removed
    pub files_deleted: usize,

    /// Directories removed because a delete left them empty
    pub dirs_pruned: usize,

    /// Total bytes written
    pub bytes_written: usize,

    /// Wall time of the commit
    pub duration_ms: u64,
}
