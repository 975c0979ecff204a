//! Applying a staged tree to disk.
//!
//! The commit runs in a single pass with an ordering that never loses data:
//! every delete is applied first, directories emptied by those deletes are
//! pruned, and only then do writes land. A path vacated by a move is
//! therefore free before anything is written into it.
//!
//! An I/O error aborts the commit immediately. Writes already applied at that
//! point stay on disk; all-or-nothing durability is left to the caller (for
//! example by requiring a clean version-control state).

use crate::path::TreePath;
use crate::staged::StagedTree;
use crate::types::{ChangeKind, CommitReport};
use monotree_core::{MonotreeError, Result};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::time::Instant;
use tempfile::NamedTempFile;
use tracing::{debug, info};

impl StagedTree {
    /// Apply every buffered operation to the real filesystem.
    ///
    /// A tree can be committed once; afterwards every mutating call,
    /// including a second commit, fails with
    /// [`MonotreeError::AlreadyCommitted`].
    pub fn commit(&mut self) -> Result<CommitReport> {
        self.ensure_open()?;
        self.committed = true;

        let start = Instant::now();
        let changes = self.changes();
        let mut report = CommitReport::default();

        if changes.is_empty() {
            info!("No changes to commit");
            return Ok(report);
        }

        info!("Committing {} change(s) to {}", changes.len(), self.root().display());

        let (deletes, writes): (Vec<_>, Vec<_>) = changes
            .into_iter()
            .partition(|change| change.kind == ChangeKind::Delete);

        for change in &deletes {
            let physical = change.path.to_physical(self.root());
            match fs::remove_file(&physical) {
                Ok(()) => {
                    report.files_deleted += 1;
                    debug!("Deleted: {}", change.path);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!("Already absent: {}", change.path);
                }
                Err(e) => return Err(e.into()),
            }
        }

        if self.commit_config.prune_empty_dirs {
            for change in &deletes {
                report.dirs_pruned += prune_empty_parents(self.root(), &change.path)?;
            }
        }

        for change in &writes {
            let content = self.staged_content(&change.path).ok_or_else(|| {
                MonotreeError::not_found("Staged content", change.path.to_string())
            })?;
            let physical = change.path.to_physical(self.root());

            if let Some(parent) = physical.parent() {
                fs::create_dir_all(parent)?;
            }

            if self.commit_config.atomic_writes {
                write_atomic(&physical, content)?;
            } else {
                fs::write(&physical, content)?;
            }

            report.files_written += 1;
            report.bytes_written += content.len();
            debug!("Wrote: {} ({} bytes)", change.path, content.len());
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Commit finished: {} written, {} deleted in {}ms",
            report.files_written, report.files_deleted, report.duration_ms
        );
        Ok(report)
    }
}

/// Write to a temporary file in the same directory, sync it, then rename it
/// into place.
fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| MonotreeError::invalid_path(path.display().to_string(), "no parent directory"))?;

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Remove the chain of now-empty directories above a deleted file.
fn prune_empty_parents(root: &Path, deleted: &TreePath) -> Result<usize> {
    let mut pruned = 0;
    let mut dir = deleted.parent();

    while let Some(current) = dir {
        if current.is_root() {
            break;
        }
        let physical = current.to_physical(root);
        let is_empty = match fs::read_dir(&physical) {
            Ok(mut entries) => entries.next().is_none(),
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        if !is_empty {
            break;
        }
        fs::remove_dir(&physical)?;
        debug!("Pruned empty directory: {}", current);
        pruned += 1;
        dir = current.parent();
    }

    Ok(pruned)
}
