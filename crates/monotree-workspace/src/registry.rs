//! Project discovery.
//!
//! The registry is a snapshot of every project manifest found in a staged
//! tree. It is never updated in place: after a relocation the tree is the
//! source of truth and a fresh registry is built from it.

use crate::manifest::ProjectConfiguration;
use indexmap::IndexMap;
use monotree_core::{MonotreeError, Result, ToolConfig};
use monotree_tree::{StagedTree, TreePath};
use tracing::{debug, info};

/// Every project of a workspace, keyed by name in discovery order
#[derive(Debug, Clone, Default)]
pub struct ProjectRegistry {
    projects: IndexMap<String, ProjectConfiguration>,
}

impl ProjectRegistry {
    /// Scan the tree for project manifests.
    ///
    /// Ignored directories are never descended into. Two manifests with the
    /// same name are an error.
    pub fn build(tree: &StagedTree, config: &ToolConfig) -> Result<Self> {
        let settings = &config.workspace;
        let files = tree.walk_files_where(&TreePath::root(), |dir| {
            dir.file_name().is_none_or(|name| !config.is_ignored_dir(name))
        })?;

        let mut projects: IndexMap<String, ProjectConfiguration> = IndexMap::new();

        for file in files {
            if file.file_name() != Some(settings.manifest_file.as_str()) {
                continue;
            }
            let Some(dir) = file.parent() else {
                continue;
            };

            let project = ProjectConfiguration::read(tree, &dir, settings)?;
            debug!("Discovered project '{}' at {}", project.name, project.root);

            if let Some(existing) = projects.get(&project.name) {
                return Err(MonotreeError::invalid_input(format!(
                    "project name '{}' is declared at both '{}' and '{}'",
                    project.name, existing.root, project.root
                )));
            }
            projects.insert(project.name.clone(), project);
        }

        info!("Found {} project(s)", projects.len());
        Ok(Self { projects })
    }

    pub fn get(&self, name: &str) -> Option<&ProjectConfiguration> {
        self.projects.get(name)
    }

    /// Like [`ProjectRegistry::get`] but failing with `NotFound`.
    pub fn require(&self, name: &str) -> Result<&ProjectConfiguration> {
        self.get(name)
            .ok_or_else(|| MonotreeError::not_found("Project", name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProjectConfiguration> {
        self.projects.values()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// The project rooted at the workspace root, if any.
    pub fn root_project(&self) -> Option<&ProjectConfiguration> {
        self.iter().find(|project| project.root.is_root())
    }

    /// The project owning `path`: the one with the deepest root containing it.
    pub fn project_for_path(&self, path: &TreePath) -> Option<&ProjectConfiguration> {
        self.iter()
            .filter(|project| path.starts_with(&project.root))
            .max_by_key(|project| project.root.len())
    }

    /// Projects whose root lies strictly below `dir`.
    pub fn projects_below(&self, dir: &TreePath) -> Vec<&ProjectConfiguration> {
        self.iter()
            .filter(|project| project.root != *dir && project.root.starts_with(dir))
            .collect()
    }

    /// Pairs of non-root projects where one root contains the other.
    pub fn overlapping_roots(&self) -> Vec<(&str, &str)> {
        let projects: Vec<&ProjectConfiguration> =
            self.iter().filter(|project| !project.root.is_root()).collect();

        let mut overlaps = Vec::new();
        for (i, a) in projects.iter().enumerate() {
            for b in &projects[i + 1..] {
                if a.root.starts_with(&b.root) || b.root.starts_with(&a.root) {
                    overlaps.push((a.name.as_str(), b.name.as_str()));
                }
            }
        }
        overlaps
    }
}
