//! Workspace-level configuration (`nx.json`) and root path mappings.

use crate::json::{read_json, write_json};
use indexmap::IndexMap;
use monotree_core::{Result, WorkspaceSettings};
use monotree_tree::{StagedTree, TreePath};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Contents of the workspace configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub named_inputs: Option<IndexMap<String, Vec<Value>>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_project: Option<String>,

    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl WorkspaceConfiguration {
    /// Read the workspace configuration, or an empty one if the file is absent.
    pub fn read(tree: &StagedTree, settings: &WorkspaceSettings) -> Result<Self> {
        let path = Self::path(settings)?;
        if !tree.is_file(&path) {
            return Ok(Self::default());
        }
        read_json(tree, &path)
    }

    pub fn write(&self, tree: &mut StagedTree, settings: &WorkspaceSettings) -> Result<()> {
        write_json(tree, &Self::path(settings)?, self)
    }

    pub fn path(settings: &WorkspaceSettings) -> Result<TreePath> {
        TreePath::new(&settings.workspace_file)
    }
}

/// `compilerOptions.paths` of the root tsconfig: import paths mapped to
/// workspace-relative targets.
#[derive(Debug, Clone, Default)]
pub struct PathMappings {
    file: Option<TreePath>,
    entries: IndexMap<String, Vec<String>>,
}

impl PathMappings {
    /// Read the mappings from the first tsconfig candidate that exists.
    pub fn read(tree: &StagedTree, settings: &WorkspaceSettings) -> Result<Self> {
        for candidate in &settings.tsconfig_candidates {
            let path = TreePath::new(candidate)?;
            if !tree.is_file(&path) {
                continue;
            }

            let document: Value = read_json(tree, &path)?;
            let mut entries = IndexMap::new();
            if let Some(paths) = document.pointer("/compilerOptions/paths").and_then(Value::as_object) {
                for (key, targets) in paths {
                    let targets = targets
                        .as_array()
                        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
                        .unwrap_or_default();
                    entries.insert(key.clone(), targets);
                }
            }

            tracing::debug!("Loaded {} path mapping(s) from {}", entries.len(), path);
            return Ok(Self {
                file: Some(path),
                entries,
            });
        }

        Ok(Self::default())
    }

    /// The tsconfig the mappings were read from.
    pub fn file(&self) -> Option<&TreePath> {
        self.file.as_ref()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.entries.iter()
    }

    pub fn get(&self, key: &str) -> Option<&Vec<String>> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The longest non-wildcard key that `specifier` imports from, either
    /// exactly or through a sub-path.
    pub fn key_for_specifier(&self, specifier: &str) -> Option<&str> {
        self.entries
            .keys()
            .filter(|key| !key.contains('*'))
            .filter(|key| {
                specifier == key.as_str()
                    || specifier
                        .strip_prefix(key.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            .max_by_key(|key| key.len())
            .map(String::as_str)
    }
}

/// Strip the `./` a mapping target may carry.
pub fn mapping_target_path(target: &str) -> Result<TreePath> {
    TreePath::new(target.trim_start_matches("./"))
}
