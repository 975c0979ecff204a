//! CLI command implementations.
//!
//! Every mutating command builds one generator and hands it to a
//! [`GeneratorRunner`], so dry runs, commit and post-commit tasks behave the
//! same for all of them.

use crate::output::{self, OutputFormat};
use anyhow::{bail, Context, Result};
use monotree_codemod::{
    ConfigPatch, ConfigPatchGenerator, ObjectLocator, PatchMode, PatchValue, ViteBuildConfigMigration,
};
use monotree_core::ToolConfig;
use monotree_tree::{StagedTree, TreePath};
use monotree_workspace::{
    ConvertToMonorepoGenerator, Generator, GeneratorRunner, MoveGenerator, ProjectRegistry,
    RelocateRequest, RunReport,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Workspace, configuration and run flags shared by every command
pub struct Session {
    root: PathBuf,
    config: ToolConfig,
    format: OutputFormat,
    dry_run: bool,
    skip_tasks: bool,
}

impl Session {
    /// Resolve the workspace root and load its configuration.
    pub async fn open(root: &Path, config_path: Option<&Path>, format: OutputFormat) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("Workspace root {} does not exist", root.display()))?;

        let config = match config_path {
            Some(path) => ToolConfig::load_from_path(path).await,
            None => ToolConfig::load(&root).await,
        }
        .context("Failed to load configuration")?;

        Ok(Self {
            root,
            config,
            format,
            dry_run: false,
            skip_tasks: false,
        })
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn skip_tasks(mut self, skip_tasks: bool) -> Self {
        self.skip_tasks = skip_tasks;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    fn announce(&self, msg: impl std::fmt::Display) {
        if self.format == OutputFormat::Human {
            output::header(msg);
        }
    }

    fn tree(&self) -> StagedTree {
        StagedTree::with_commit_config(&self.root, self.config.commit.clone())
    }

    async fn run(&self, generators: Vec<Box<dyn Generator>>) -> Result<RunReport> {
        debug!(
            root = %self.root.display(),
            dry_run = self.dry_run,
            skip_tasks = self.skip_tasks,
            "Running {} generator(s)",
            generators.len()
        );
        let mut tree = self.tree();
        let report = GeneratorRunner::new()
            .dry_run(self.dry_run)
            .skip_tasks(self.skip_tasks)
            .run(&mut tree, &generators)
            .await?;
        self.print_run(&report)?;
        Ok(report)
    }

    fn print_run(&self, report: &RunReport) -> Result<()> {
        match self.format {
            OutputFormat::Json => output::json(report),
            OutputFormat::Human => {
                output::run_summary(report);
                Ok(())
            }
        }
    }
}

// ============================================================================
// Projects Command
// ============================================================================

/// List every project of the workspace
pub fn list_projects(session: &Session) -> Result<()> {
    let tree = session.tree();
    let registry = ProjectRegistry::build(&tree, &session.config)?;

    if session.format == OutputFormat::Json {
        let projects: Vec<_> = registry.iter().collect();
        return output::json(&projects);
    }

    if registry.is_empty() {
        output::info(format!("No projects found in {}", session.root.display()));
        return Ok(());
    }

    println!("{}", output::project_table(registry.iter()));
    Ok(())
}

// ============================================================================
// Generator Commands
// ============================================================================

/// Move (and optionally rename) one project
pub async fn move_project(session: &Session, request: RelocateRequest) -> Result<()> {
    session.announce(format!("Moving '{}' to {}", request.project, request.destination));
    let generator = MoveGenerator::new(session.config.clone(), request);
    session.run(vec![Box::new(generator)]).await?;
    Ok(())
}

/// Move every project of a single-root workspace into apps/libs
pub async fn convert_to_monorepo(session: &Session) -> Result<()> {
    session.announce("Converting to a monorepo layout");
    let generator = ConvertToMonorepoGenerator::new(session.config.clone());
    session.run(vec![Box::new(generator)]).await?;
    Ok(())
}

/// Move vite build settings into each project's vite config
pub async fn migrate_vite_build_config(session: &Session) -> Result<()> {
    session.announce("Updating vite build configuration");
    let generator = ViteBuildConfigMigration::new(session.config.clone());
    session.run(vec![Box::new(generator)]).await?;
    Ok(())
}

/// Patch one configuration object
pub async fn patch_file(
    session: &Session,
    file: &str,
    assignments: &[String],
    mode: PatchMode,
    locator: ObjectLocator,
) -> Result<()> {
    if assignments.is_empty() {
        bail!("Nothing to patch: pass at least one --set PATH=VALUE");
    }

    let file = TreePath::new(file)?;
    let mut patch = ConfigPatch::new();
    for assignment in assignments {
        let (path, value) = parse_assignment(assignment)?;
        patch = patch.set_with_mode(&path, value, mode);
    }

    session.announce(format!("Patching {} ({})", file, locator));
    let generator = ConfigPatchGenerator::new(file, locator, patch);
    session.run(vec![Box::new(generator)]).await?;
    Ok(())
}

/// Split `PATH=VALUE`; the value is JSON, or a plain string when it does
/// not parse as JSON.
pub fn parse_assignment(assignment: &str) -> Result<(String, PatchValue)> {
    let (path, raw) = assignment
        .split_once('=')
        .with_context(|| format!("Expected PATH=VALUE, got '{}'", assignment))?;
    let path = path.trim();
    if path.is_empty() {
        bail!("Missing property path in '{}'", assignment);
    }

    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((path.to_string(), PatchValue::Literal(value)))
}
