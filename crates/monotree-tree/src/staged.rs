//! In-memory overlay over a workspace directory.
//!
//! Every generator reads and writes through a [`StagedTree`]. Writes and
//! deletes are buffered in an ordered overlay keyed by [`TreePath`]; reads
//! consult the overlay first and fall back to disk. Nothing touches the
//! filesystem until [`StagedTree::commit`].
//!
//! Directories are implicit: a directory exists while at least one live file
//! (staged or on disk) sits below it. A subtree moved with
//! [`StagedTree::rename`] therefore vanishes from its old location and shows
//! up at the new one purely from overlay state.

use crate::path::TreePath;
use crate::types::{ChangeKind, FileChange};
use monotree_core::{CommitConfig, MonotreeError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Staged {
    Content(Vec<u8>),
    Deleted,
}

/// Staged virtual file tree bound to a workspace root.
#[derive(Debug)]
pub struct StagedTree {
    root: PathBuf,
    overlay: BTreeMap<TreePath, Staged>,
    pub(crate) commit_config: CommitConfig,
    pub(crate) committed: bool,
}

impl StagedTree {
    /// Create a tree over the workspace at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_commit_config(root, CommitConfig::default())
    }

    /// Create a tree with explicit commit behaviour.
    pub fn with_commit_config(root: impl Into<PathBuf>, commit_config: CommitConfig) -> Self {
        let root = root.into();
        debug!("Opening staged tree at {}", root.display());
        Self {
            root,
            overlay: BTreeMap::new(),
            commit_config,
            committed: false,
        }
    }

    /// Physical workspace root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether [`StagedTree::commit`] already ran.
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    // ============================================================================
    // Reads
    // ============================================================================

    /// Read file content, overlay first.
    ///
    /// Tombstoned paths read as not found regardless of disk state.
    pub fn read(&self, path: &TreePath) -> Result<Vec<u8>> {
        match self.overlay.get(path) {
            Some(Staged::Content(content)) => return Ok(content.clone()),
            Some(Staged::Deleted) => return Err(MonotreeError::not_found("File", path.to_string())),
            None => {}
        }

        if self.shadowed_by_staged_file(path) {
            return Err(MonotreeError::not_found("File", path.to_string()));
        }

        let physical = path.to_physical(&self.root);
        match fs::read(&physical) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(MonotreeError::not_found("File", path.to_string()))
            }
            Err(_) if physical.is_dir() => Err(MonotreeError::not_found("File", path.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Read file content as UTF-8 text.
    pub fn read_to_string(&self, path: &TreePath) -> Result<String> {
        let content = self.read(path)?;
        String::from_utf8(content)
            .map_err(|_| MonotreeError::parse(path.to_string(), "file is not valid UTF-8"))
    }

    /// Whether a file or directory exists at `path`.
    pub fn exists(&self, path: &TreePath) -> bool {
        self.is_file(path) || self.is_dir(path)
    }

    /// Whether a live file exists at `path`.
    pub fn is_file(&self, path: &TreePath) -> bool {
        match self.overlay.get(path) {
            Some(Staged::Content(_)) => true,
            Some(Staged::Deleted) => false,
            None => !self.shadowed_by_staged_file(path) && path.to_physical(&self.root).is_file(),
        }
    }

    /// Whether `path` is a directory holding at least one live file.
    pub fn is_dir(&self, path: &TreePath) -> bool {
        if path.is_root() {
            return true;
        }
        if matches!(self.overlay.get(path), Some(Staged::Content(_))) {
            return false;
        }
        if self.staged_files_below(path).next().is_some() {
            return true;
        }
        if self.shadowed_by_staged_file(path) {
            return false;
        }

        let physical = path.to_physical(&self.root);
        if !physical.is_dir() {
            return false;
        }

        WalkDir::new(&physical)
            .min_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .any(|entry| match TreePath::from_physical(entry.path(), &self.root) {
                Ok(file) => !matches!(self.overlay.get(&file), Some(Staged::Deleted)),
                Err(_) => false,
            })
    }

    /// Immediate children of a directory, merging disk listing with overlay
    /// additions and removals. Sorted; empty for files and missing paths.
    pub fn children(&self, dir: &TreePath) -> Result<Vec<TreePath>> {
        let mut names = BTreeSet::new();

        let physical = dir.to_physical(&self.root);
        if physical.is_dir() && !self.shadowed_by_staged_file(dir) {
            for entry in fs::read_dir(&physical)? {
                let entry = entry?;
                let Ok(name) = entry.file_name().into_string() else {
                    trace!("Skipping non UTF-8 entry in {}", physical.display());
                    continue;
                };
                let child = dir.join(&name)?;
                if self.is_file(&child) || self.is_dir(&child) {
                    names.insert(name);
                }
            }
        }

        for (path, _) in self.staged_files_below(dir) {
            if let Some(name) = path.segments().get(dir.len()) {
                names.insert(name.clone());
            }
        }

        names.iter().map(|name| dir.join(name)).collect()
    }

    /// Every live file below `dir`, recursively, in path order.
    pub fn walk_files(&self, dir: &TreePath) -> Result<Vec<TreePath>> {
        self.walk_files_where(dir, |_| true)
    }

    /// Like [`StagedTree::walk_files`], descending only into directories for
    /// which `descend` returns true.
    pub fn walk_files_where<F>(&self, dir: &TreePath, descend: F) -> Result<Vec<TreePath>>
    where
        F: Fn(&TreePath) -> bool,
    {
        let mut files = Vec::new();
        if self.is_file(dir) {
            files.push(dir.clone());
            return Ok(files);
        }
        self.walk_into(dir, &descend, &mut files)?;
        Ok(files)
    }

    fn walk_into<F>(&self, dir: &TreePath, descend: &F, files: &mut Vec<TreePath>) -> Result<()>
    where
        F: Fn(&TreePath) -> bool,
    {
        for child in self.children(dir)? {
            if self.is_file(&child) {
                files.push(child);
            } else if descend(&child) {
                self.walk_into(&child, descend, files)?;
            }
        }
        Ok(())
    }

    // ============================================================================
    // Writes
    // ============================================================================

    /// Buffer a write, replacing any earlier staged state for `path`.
    pub fn write(&mut self, path: &TreePath, content: impl Into<Vec<u8>>) -> Result<()> {
        self.ensure_open()?;

        if path.is_root() {
            return Err(MonotreeError::invalid_path(".", "cannot write to the workspace root"));
        }
        if self.is_dir(path) {
            return Err(MonotreeError::invalid_input(format!(
                "Cannot write {}: it is a directory",
                path
            )));
        }
        let mut ancestor = path.parent();
        while let Some(dir) = ancestor {
            if self.is_file(&dir) {
                return Err(MonotreeError::invalid_input(format!(
                    "Cannot write {}: {} is a file",
                    path, dir
                )));
            }
            ancestor = dir.parent();
        }

        trace!("Staging write: {}", path);
        self.overlay.insert(path.clone(), Staged::Content(content.into()));
        Ok(())
    }

    /// Buffer a delete of a file or of every file below a directory.
    ///
    /// Deleting a missing path is a no-op.
    pub fn delete(&mut self, path: &TreePath) -> Result<()> {
        self.ensure_open()?;

        if self.is_file(path) {
            trace!("Staging delete: {}", path);
            if path.to_physical(&self.root).is_file() {
                self.overlay.insert(path.clone(), Staged::Deleted);
            } else {
                self.overlay.remove(path);
            }
        } else if self.is_dir(path) {
            for file in self.walk_files(path)? {
                self.delete(&file)?;
            }
        } else {
            debug!("Delete of missing path ignored: {}", path);
        }
        Ok(())
    }

    /// Move a file or a whole directory, preserving relative structure and
    /// content byte-for-byte.
    pub fn rename(&mut self, from: &TreePath, to: &TreePath) -> Result<()> {
        self.ensure_open()?;

        if from == to {
            return Ok(());
        }

        let moves: Vec<(TreePath, TreePath)> = if self.is_file(from) {
            vec![(from.clone(), to.clone())]
        } else if self.is_dir(from) {
            if from.is_root() || to.starts_with(from) {
                return Err(MonotreeError::invalid_input(format!(
                    "Cannot move {} into itself ({})",
                    from, to
                )));
            }
            self.walk_files(from)?
                .into_iter()
                .map(|file| {
                    let relative = file.strip_prefix(from).unwrap_or_else(TreePath::root);
                    let target = to.join_path(&relative);
                    (file, target)
                })
                .collect()
        } else {
            return Err(MonotreeError::not_found("Path", from.to_string()));
        };

        debug!("Staging move of {} file(s): {} -> {}", moves.len(), from, to);

        let mut staged = Vec::with_capacity(moves.len());
        for (old, new) in &moves {
            staged.push((new.clone(), self.read(old)?));
        }
        for (old, _) in &moves {
            self.delete(old)?;
        }
        for (new, content) in staged {
            self.write(&new, content)?;
        }
        Ok(())
    }

    // ============================================================================
    // Inspection
    // ============================================================================

    /// Pending changes against disk, in path order. Writes identical to the
    /// disk content are not reported.
    pub fn changes(&self) -> Vec<FileChange> {
        self.overlay
            .iter()
            .filter_map(|(path, staged)| {
                let physical = path.to_physical(&self.root);
                let kind = match staged {
                    Staged::Deleted => ChangeKind::Delete,
                    Staged::Content(content) => match fs::read(&physical) {
                        Ok(existing) if existing == *content => return None,
                        Ok(_) => ChangeKind::Update,
                        Err(_) => ChangeKind::Create,
                    },
                };
                Some(FileChange {
                    path: path.clone(),
                    kind,
                })
            })
            .collect()
    }

    /// Whether any change is pending.
    pub fn has_changes(&self) -> bool {
        !self.changes().is_empty()
    }

    pub(crate) fn staged_content(&self, path: &TreePath) -> Option<&[u8]> {
        match self.overlay.get(path) {
            Some(Staged::Content(content)) => Some(content),
            _ => None,
        }
    }

    // ============================================================================
    // Helpers
    // ============================================================================

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.committed {
            Err(MonotreeError::AlreadyCommitted)
        } else {
            Ok(())
        }
    }

    /// Staged files strictly below `dir`.
    fn staged_files_below<'a>(
        &'a self,
        dir: &'a TreePath,
    ) -> impl Iterator<Item = (&'a TreePath, &'a Staged)> + 'a {
        self.overlay
            .range(dir.clone()..)
            .take_while(move |(path, _)| path.starts_with(dir))
            .filter(move |(path, staged)| {
                path.len() > dir.len() && matches!(staged, Staged::Content(_))
            })
    }

    /// A staged file at an ancestor hides anything the disk has below it.
    fn shadowed_by_staged_file(&self, path: &TreePath) -> bool {
        let mut ancestor = path.parent();
        while let Some(dir) = ancestor {
            if matches!(self.overlay.get(&dir), Some(Staged::Content(_))) {
                return true;
            }
            ancestor = dir.parent();
        }
        false
    }
}
