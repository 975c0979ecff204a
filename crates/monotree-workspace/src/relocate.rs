//! Project relocation.
//!
//! A relocation runs against a staged tree in four steps: validate the
//! request against a fresh registry, collect every reference on the
//! pre-move layout, rewrite those references in place, then rename the
//! moving files and rewrite the project's own manifest at its new location.
//! Any failure before the renames leaves the tree as it was; nothing ever
//! touches the disk until the caller commits.

use crate::json::rewrite_strings;
use crate::manifest::ProjectConfiguration;
use crate::moves::ProjectMove;
use crate::references::{apply_references, Reference, ReferenceIndex};
use crate::registry::ProjectRegistry;
use crate::workspace_config::{PathMappings, WorkspaceConfiguration};
use monotree_core::{MonotreeError, Result, ToolConfig};
use monotree_tree::{StagedTree, TreePath};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A request to move (and optionally rename) one project
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelocateRequest {
    pub project: String,
    pub destination: String,
    #[serde(default)]
    pub new_name: Option<String>,
    #[serde(default = "default_true")]
    pub update_references: bool,
    #[serde(default)]
    pub update_import_path: bool,
    #[serde(default)]
    pub import_path: Option<String>,
}

fn default_true() -> bool {
    true
}

impl RelocateRequest {
    pub fn new(project: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            destination: destination.into(),
            new_name: None,
            update_references: true,
            update_import_path: false,
            import_path: None,
        }
    }

    pub fn with_new_name(mut self, name: impl Into<String>) -> Self {
        self.new_name = Some(name.into());
        self
    }

    pub fn with_update_references(mut self, update: bool) -> Self {
        self.update_references = update;
        self
    }

    pub fn with_update_import_path(mut self, update: bool) -> Self {
        self.update_import_path = update;
        self
    }

    pub fn with_import_path(mut self, import_path: impl Into<String>) -> Self {
        self.import_path = Some(import_path.into());
        self.update_import_path = true;
        self
    }
}

/// What a relocation did
#[derive(Debug, Clone)]
pub struct RelocationReport {
    pub project: String,
    pub new_name: String,
    pub old_root: TreePath,
    pub new_root: TreePath,
    pub files_moved: usize,
    pub references: Vec<Reference>,
}

/// Moves projects inside a staged tree
pub struct RelocationEngine<'a> {
    config: &'a ToolConfig,
}

impl<'a> RelocationEngine<'a> {
    pub fn new(config: &'a ToolConfig) -> Self {
        Self { config }
    }

    /// Move one project and rewrite everything that refers to it.
    pub fn relocate(&self, tree: &mut StagedTree, request: &RelocateRequest) -> Result<RelocationReport> {
        let settings = &self.config.workspace;
        let registry = ProjectRegistry::build(tree, self.config)?;
        let project = registry.require(&request.project)?;

        let destination = TreePath::new(&request.destination)?;
        let new_name = request.new_name.clone().unwrap_or_else(|| project.name.clone());
        self.validate(tree, &registry, project, &destination, &new_name)?;

        info!(
            "Moving project '{}' from {} to {}",
            project.name, project.root, destination
        );

        let workspace = WorkspaceConfiguration::read(tree, settings)?;
        let mappings = PathMappings::read(tree, settings)?;
        let index = ReferenceIndex::new(&registry, &workspace, &mappings, self.config);

        let mut mv = ProjectMove::new(&registry, tree, self.config, &project.name, &new_name, destination)?;
        mv.old_import_path = index.import_path_of(&mv);
        mv.new_import_path = if request.update_import_path {
            request
                .import_path
                .clone()
                .or_else(|| mv.old_import_path.as_deref().map(|old| derive_import_path(old, &new_name)))
        } else {
            mv.old_import_path.clone()
        };

        let references = index.find_references(tree, &mv, request.update_references)?;
        let manifest_path = project.manifest_path(settings)?;

        apply_references(tree, &references)?;

        let files = if mv.old_root == mv.new_root {
            Vec::new()
        } else {
            mv.files(tree)?
        };
        for file in &files {
            if let Some(target) = mv.relocate(file) {
                tree.rename(file, &target)?;
            }
        }
        debug!("Moved {} file(s)", files.len());

        let new_manifest_path = mv
            .relocate(&manifest_path)
            .ok_or_else(|| MonotreeError::not_found("Manifest", manifest_path.to_string()))?;
        let new_manifest_dir = new_manifest_path
            .parent()
            .ok_or_else(|| MonotreeError::invalid_path(new_manifest_path.to_string(), "no parent"))?;
        let mut manifest = ProjectConfiguration::read(tree, &new_manifest_dir, settings)?;
        rewrite_own_manifest(&mut manifest, &mv);
        manifest.write(tree, settings)?;

        info!(
            "Project '{}' now lives at {} ({} reference(s) updated)",
            mv.new_name,
            mv.new_root,
            references.len()
        );

        Ok(RelocationReport {
            project: mv.old_name.clone(),
            new_name: mv.new_name.clone(),
            old_root: mv.old_root.clone(),
            new_root: mv.new_root.clone(),
            files_moved: files.len(),
            references,
        })
    }

    fn validate(
        &self,
        tree: &StagedTree,
        registry: &ProjectRegistry,
        project: &ProjectConfiguration,
        destination: &TreePath,
        new_name: &str,
    ) -> Result<()> {
        if destination.is_root() {
            return Err(MonotreeError::invalid_input(format!(
                "cannot move project '{}' to the workspace root",
                project.name
            )));
        }
        if !project.root.is_root() && destination != &project.root && destination.starts_with(&project.root) {
            return Err(MonotreeError::invalid_input(format!(
                "cannot move project '{}' into its own directory '{}'",
                project.name, destination
            )));
        }

        for other in registry.iter().filter(|other| other.name != project.name) {
            let overlaps = if other.root.is_root() {
                false
            } else {
                destination.starts_with(&other.root) || other.root.starts_with(destination)
            };
            if overlaps {
                return Err(MonotreeError::DestinationCollision {
                    project: project.name.clone(),
                    destination: destination.to_string(),
                    existing: other.name.clone(),
                });
            }
        }

        if destination != &project.root && tree.exists(destination) {
            return Err(MonotreeError::DestinationCollision {
                project: project.name.clone(),
                destination: destination.to_string(),
                existing: format!("existing path {}", destination),
            });
        }

        if new_name != project.name && registry.get(new_name).is_some() {
            return Err(MonotreeError::ProjectExists(new_name.to_string()));
        }

        Ok(())
    }
}

/// `@scope/old` becomes `@scope/<new name>`, anything else `<new name>`.
pub fn derive_import_path(old_import_path: &str, new_name: &str) -> String {
    match old_import_path.strip_prefix('@').and_then(|rest| rest.split_once('/')) {
        Some((scope, _)) => format!("@{}/{}", scope, new_name),
        None => new_name.to_string(),
    }
}

fn rewrite_own_manifest(manifest: &mut ProjectConfiguration, mv: &ProjectMove) {
    manifest.name = mv.new_name.clone();
    manifest.root = mv.new_root.clone();

    let rewrite = |value: &str| mv.rewrite_path_string(value);
    if let Some(source_root) = manifest.source_root.as_deref().and_then(rewrite) {
        manifest.source_root = Some(source_root);
    }

    for target in manifest.targets.values_mut() {
        if let Some(options) = target.options.as_mut() {
            for value in options.values_mut() {
                rewrite_strings(value, &rewrite);
            }
        }
        if let Some(configurations) = target.configurations.as_mut() {
            for configuration in configurations.values_mut() {
                for value in configuration.values_mut() {
                    rewrite_strings(value, &rewrite);
                }
            }
        }
        for value in target.extensions.values_mut() {
            rewrite_strings(value, &rewrite);
        }
    }
}
