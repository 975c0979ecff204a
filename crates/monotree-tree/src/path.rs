//! Workspace-relative path type used as the key of the staged tree.
//!
//! Tree paths are always relative to the workspace root and never tied to a
//! physical location until they are materialized by a commit. They are
//! normalized on construction, so two spellings of the same location compare
//! equal and hash the same.

use monotree_core::{MonotreeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A normalized path relative to the workspace root.
///
/// The root itself has no segments and displays as `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TreePath {
    segments: Vec<String>,
}

impl TreePath {
    /// Create a new tree path from a string.
    ///
    /// Leading slashes are removed, backslashes are treated as separators,
    /// `.` segments are dropped and `..` segments pop their parent. A `..`
    /// that would climb above the workspace root is rejected.
    pub fn new(path: &str) -> Result<Self> {
        Self::root().join(path)
    }

    /// Create the root path.
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Create a tree path from a physical path, making it relative to the given base.
    pub fn from_physical(physical: &Path, base: &Path) -> Result<Self> {
        let relative = physical.strip_prefix(base).map_err(|_| {
            MonotreeError::invalid_path(
                physical.display().to_string(),
                format!("not under {}", base.display()),
            )
        })?;

        let path_str = relative.to_str().ok_or_else(|| {
            MonotreeError::invalid_path(physical.display().to_string(), "invalid UTF-8")
        })?;

        Self::new(path_str)
    }

    /// Join this path with another segment or relative path.
    pub fn join(&self, other: &str) -> Result<Self> {
        let mut segments = self.segments.clone();

        let normalized = other.trim().replace('\\', "/");
        for segment in normalized.trim_start_matches('/').split('/') {
            match segment {
                "" | "." => continue,
                ".." => {
                    if segments.pop().is_none() {
                        return Err(MonotreeError::invalid_path(
                            other,
                            "escapes the workspace root",
                        ));
                    }
                }
                s if s.contains('\0') => {
                    return Err(MonotreeError::invalid_path(other, "contains a NUL byte"));
                }
                s => segments.push(s.to_string()),
            }
        }

        Ok(Self { segments })
    }

    /// Append every segment of another tree path.
    pub fn join_path(&self, other: &TreePath) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// Get the parent path, if any.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }

        let mut segments = self.segments.clone();
        segments.pop();

        Some(Self { segments })
    }

    /// Get the file name (last segment), if any.
    pub fn file_name(&self) -> Option<&str> {
        self.segments.last().map(|s| s.as_str())
    }

    /// Get the extension of the file, if any.
    pub fn extension(&self) -> Option<&str> {
        self.file_name().and_then(|name| {
            let (stem, ext) = name.rsplit_once('.')?;
            if stem.is_empty() { None } else { Some(ext) }
        })
    }

    /// Check if this path equals `base` or lies below it.
    pub fn starts_with(&self, base: &TreePath) -> bool {
        base.segments.len() <= self.segments.len()
            && self
                .segments
                .iter()
                .zip(base.segments.iter())
                .all(|(a, b)| a == b)
    }

    /// The remainder of this path below `base`.
    pub fn strip_prefix(&self, base: &TreePath) -> Option<TreePath> {
        if !self.starts_with(base) {
            return None;
        }
        Some(Self {
            segments: self.segments[base.segments.len()..].to_vec(),
        })
    }

    /// Relative path leading from the directory `base` to this path.
    ///
    /// Returns `.` when both are the same location.
    pub fn relative_to(&self, base: &TreePath) -> String {
        let common = self
            .segments
            .iter()
            .zip(base.segments.iter())
            .take_while(|(a, b)| a == b)
            .count();

        let mut parts: Vec<&str> = vec![".."; base.segments.len() - common];
        parts.extend(self.segments[common..].iter().map(|s| s.as_str()));

        if parts.is_empty() {
            ".".to_string()
        } else {
            parts.join("/")
        }
    }

    /// `../` repeated once per segment, the prefix that leads from this
    /// directory back to the workspace root.
    pub fn offset_from_root(&self) -> String {
        "../".repeat(self.segments.len())
    }

    /// Check if this is the root path.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Get the number of segments in this path.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Check if this path is empty (root).
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Get the segments of this path.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// First segment, if any.
    pub fn first(&self) -> Option<&str> {
        self.segments.first().map(|s| s.as_str())
    }

    /// Convert to a PathBuf below a physical base path.
    pub fn to_physical(&self, base: &Path) -> PathBuf {
        let mut physical = base.to_path_buf();
        for segment in &self.segments {
            physical.push(segment);
        }
        physical
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            write!(f, ".")
        } else {
            write!(f, "{}", self.segments.join("/"))
        }
    }
}

impl TryFrom<String> for TreePath {
    type Error = MonotreeError;

    fn try_from(s: String) -> Result<Self> {
        Self::new(&s)
    }
}

impl TryFrom<&str> for TreePath {
    type Error = MonotreeError;

    fn try_from(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl From<TreePath> for String {
    fn from(path: TreePath) -> Self {
        path.to_string()
    }
}
