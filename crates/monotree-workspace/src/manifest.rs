//! Per-project manifests (`project.json`).
//!
//! Only the fields the tool reasons about are typed. Everything else in a
//! manifest is carried through `extensions` so that reading and writing a
//! manifest preserves unknown fields and their order.

use crate::json::{merge_in_place, read_json, write_json};
use indexmap::IndexMap;
use monotree_core::{MonotreeError, Result, WorkspaceSettings};
use monotree_tree::{StagedTree, TreePath};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Application or library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    Application,
    Library,
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectType::Application => write!(f, "application"),
            ProjectType::Library => write!(f, "library"),
        }
    }
}

/// A named task of a project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configurations: Option<IndexMap<String, Map<String, Value>>>,

    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl TargetConfiguration {
    /// Look up a string option.
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.as_ref()?.get(key)?.as_str()
    }
}

/// A project manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfiguration {
    #[serde(default)]
    pub name: String,

    #[serde(default = "TreePath::root")]
    pub root: TreePath,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_type: Option<ProjectType>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub targets: IndexMap<String, TargetConfiguration>,

    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl ProjectConfiguration {
    pub fn new(name: impl Into<String>, root: TreePath) -> Self {
        Self {
            name: name.into(),
            root,
            source_root: None,
            project_type: None,
            targets: IndexMap::new(),
            extensions: Map::new(),
        }
    }

    /// Read the manifest stored in `dir`.
    ///
    /// The stored `root` is replaced by the manifest's actual location, and a
    /// missing name falls back to the directory name. A manifest at the
    /// workspace root must carry a name.
    pub fn read(tree: &StagedTree, dir: &TreePath, settings: &WorkspaceSettings) -> Result<Self> {
        let path = dir.join(&settings.manifest_file)?;
        let mut manifest: ProjectConfiguration = read_json(tree, &path)?;

        if manifest.root != *dir {
            tracing::debug!(
                "Manifest {} declares root '{}', using its location '{}'",
                path,
                manifest.root,
                dir
            );
            manifest.root = dir.clone();
        }

        if manifest.name.is_empty() {
            manifest.name = dir
                .file_name()
                .map(str::to_string)
                .ok_or_else(|| MonotreeError::parse(path.to_string(), "root project has no name"))?;
        }

        Ok(manifest)
    }

    /// Write the manifest into its root directory.
    ///
    /// An existing manifest is updated in place: its keys keep their order
    /// and fields the manifest never declared are not added. `root` and an
    /// inferred `name` are both implied by the manifest's location, so they
    /// are only written when the file already carries them.
    pub fn write(&self, tree: &mut StagedTree, settings: &WorkspaceSettings) -> Result<()> {
        let path = self.manifest_path(settings)?;
        let Value::Object(mut updated) = serde_json::to_value(self)? else {
            return Err(MonotreeError::invalid_input(format!("manifest {} is not an object", path)));
        };

        if !tree.is_file(&path) {
            return write_json(tree, &path, &updated);
        }

        let mut document: Map<String, Value> = read_json(tree, &path)?;
        if !document.contains_key("root") {
            updated.remove("root");
        }
        if !document.contains_key("name") && self.root.file_name() == Some(self.name.as_str()) {
            updated.remove("name");
        }
        merge_in_place(&mut document, updated);
        write_json(tree, &path, &document)
    }

    pub fn manifest_path(&self, settings: &WorkspaceSettings) -> Result<TreePath> {
        self.root.join(&settings.manifest_file)
    }
}
