//! Move vite build output settings into `vite.config.*`.
//!
//! Projects built with the vite build executor get `build.outDir` pointing
//! at the target's `outputPath` (relative to the project root), compressed
//! size reporting, and mixed ES module transformation for CommonJS
//! dependencies. Values a user already set are kept.
//!
//! `fileReplacements` declared on the build target become a
//! `replaceFiles([...])` entry in the config's `plugins`, imported from the
//! rollup replace-files plugin.

use super::MigrationReport;
use crate::locator::ObjectLocator;
use crate::patch::{apply_config_patches, CodemodTarget, ConfigPatch, PatchMode};
use crate::value::PatchValue;
use async_trait::async_trait;
use monotree_core::{Result, ToolConfig};
use monotree_tree::{StagedTree, TreePath};
use monotree_workspace::{
    Generator, PostCommitTask, ProjectConfiguration, ProjectRegistry, TargetConfiguration,
};
use serde_json::Value;
use tracing::{debug, info, warn};

pub const VITE_BUILD_EXECUTORS: &[&str] = &["@nx/vite:build", "@nrwl/vite:build"];

const VITE_CONFIG_FILES: &[&str] = &["vite.config.ts", "vite.config.mts", "vite.config.js"];

const REPLACE_FILES: &str = "replaceFiles";
const REPLACE_FILES_MODULE: &str = "@nx/vite/plugins/rollup-replace-files.plugin";

/// Stage the migration for every vite-built project in the tree.
///
/// Per-project failures are collected in the report; only failing to read
/// the workspace itself is an error.
pub fn update_vite_build_config(tree: &mut StagedTree, config: &ToolConfig) -> Result<MigrationReport> {
    let registry = ProjectRegistry::build(tree, config)?;

    let mut owners = Vec::new();
    let mut targets = Vec::new();
    for project in registry.iter() {
        let Some(build) = vite_build_target(project) else {
            continue;
        };
        let Some(output_path) = build.option_str("outputPath") else {
            continue;
        };
        let Some(file) = find_vite_config(tree, &project.root)? else {
            debug!(project = %project.name, "No vite config file, skipping");
            continue;
        };

        targets.push(CodemodTarget {
            file,
            locator: ObjectLocator::default_export_call("defineConfig"),
            patch: build_patch(&project.root, output_path, &file_replacements(build)),
        });
        owners.push(project.name.clone());
    }

    let mut report = MigrationReport::default();
    let results = apply_config_patches(tree, &targets);
    for (project, file_result) in owners.into_iter().zip(results) {
        match file_result.result {
            Ok(patched) if patched.changed => report.updated.push(project),
            Ok(_) => report.unchanged.push(project),
            Err(e) => report.failures.push((project, e)),
        }
    }

    info!(
        updated = report.updated.len(),
        unchanged = report.unchanged.len(),
        failed = report.failures.len(),
        "Vite build config migration staged"
    );
    Ok(report)
}

fn vite_build_target(project: &ProjectConfiguration) -> Option<&TargetConfiguration> {
    project
        .targets
        .values()
        .filter(|target| {
            target
                .executor
                .as_deref()
                .is_some_and(|executor| VITE_BUILD_EXECUTORS.contains(&executor))
        })
        .find(|target| target.option_str("outputPath").is_some())
}

/// `fileReplacements` of the target's options and every configuration, in
/// declaration order and without repeats.
fn file_replacements(target: &TargetConfiguration) -> Vec<Value> {
    let configurations = target.configurations.iter().flat_map(|configs| configs.values());
    let mut replacements: Vec<Value> = Vec::new();
    for options in target.options.iter().chain(configurations) {
        let Some(Value::Array(entries)) = options.get("fileReplacements") else {
            continue;
        };
        for entry in entries {
            if !replacements.contains(entry) {
                replacements.push(entry.clone());
            }
        }
    }
    replacements
}

fn find_vite_config(tree: &StagedTree, root: &TreePath) -> Result<Option<TreePath>> {
    for name in VITE_CONFIG_FILES {
        let candidate = root.join(name)?;
        if tree.is_file(&candidate) {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

fn build_patch(root: &TreePath, output_path: &str, replacements: &[Value]) -> ConfigPatch {
    let out_dir = format!("{}{}", root.offset_from_root(), output_path);
    let patch = ConfigPatch::new()
        .set_with_mode("build.outDir", PatchValue::literal(out_dir), PatchMode::Skip)
        .set_with_mode("build.reportCompressedSize", PatchValue::literal(true), PatchMode::Skip)
        .set_with_mode(
            "build.commonjsOptions.transformMixedEsModules",
            PatchValue::literal(true),
            PatchMode::Merge,
        );
    if replacements.is_empty() {
        return patch;
    }
    patch
        .append(
            "plugins",
            PatchValue::call(REPLACE_FILES, vec![Value::Array(replacements.to_vec())]),
        )
        .import(REPLACE_FILES, REPLACE_FILES_MODULE)
}

/// Generator wrapper around [`update_vite_build_config`]
pub struct ViteBuildConfigMigration {
    config: ToolConfig,
}

impl ViteBuildConfigMigration {
    pub fn new(config: ToolConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Generator for ViteBuildConfigMigration {
    fn name(&self) -> &str {
        "vite-build-config"
    }

    async fn generate(&self, tree: &mut StagedTree) -> Result<Vec<PostCommitTask>> {
        let report = update_vite_build_config(tree, &self.config)?;
        for (project, error) in &report.failures {
            warn!(project = %project, "Vite config needs manual migration: {}", error);
        }
        Ok(Vec::new())
    }
}
