//! Generators and the driver that runs them.
//!
//! A generator mutates a staged tree and may hand back deferred tasks. The
//! runner executes generators in order against one tree, commits once, and
//! only then runs the collected tasks, strictly in the order they were
//! produced. Tasks are identified by label: when several generators ask for
//! the same task (installing packages, say) it runs once, at the position
//! of its first request.

use crate::monorepo::convert_to_monorepo;
use crate::relocate::{RelocateRequest, RelocationEngine};
use async_trait::async_trait;
use futures::future::BoxFuture;
use monotree_core::{MonotreeError, Result, ToolConfig};
use monotree_tree::{CommitReport, FileChange, StagedTree, TreePath};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info, warn};

type TaskFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

/// Work deferred until after the tree is committed, such as installing
/// packages
pub struct PostCommitTask {
    label: String,
    run: TaskFn,
}

impl PostCommitTask {
    pub fn new<F, Fut>(label: impl Into<String>, task: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            label: label.into(),
            run: Box::new(move || Box::pin(task())),
        }
    }

    /// Run an external program in `cwd`; a non-zero exit is a failure.
    pub fn command(
        label: impl Into<String>,
        program: impl Into<String>,
        args: Vec<String>,
        cwd: PathBuf,
    ) -> Self {
        let program = program.into();
        Self::new(label, move || async move {
            info!("Running {} {}", program, args.join(" "));
            let status = Command::new(&program)
                .args(&args)
                .current_dir(&cwd)
                .status()
                .await?;
            if !status.success() {
                return Err(MonotreeError::Other(anyhow::anyhow!(
                    "'{} {}' exited with {}",
                    program,
                    args.join(" "),
                    status
                )));
            }
            Ok::<(), MonotreeError>(())
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub async fn run(self) -> Result<()> {
        (self.run)().await
    }
}

impl fmt::Debug for PostCommitTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostCommitTask").field("label", &self.label).finish()
    }
}

/// A step that mutates a staged tree
#[async_trait]
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, tree: &mut StagedTree) -> Result<Vec<PostCommitTask>>;
}

/// What a run did
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub generators: Vec<String>,
    pub changes: Vec<FileChange>,
    /// `None` for dry runs
    pub commit: Option<CommitReport>,
    pub tasks_run: Vec<String>,
    pub tasks_skipped: Vec<String>,
}

/// Runs generators against one staged tree
#[derive(Debug, Clone, Default)]
pub struct GeneratorRunner {
    dry_run: bool,
    skip_tasks: bool,
}

impl GeneratorRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report changes without touching the disk or running tasks.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn skip_tasks(mut self, skip_tasks: bool) -> Self {
        self.skip_tasks = skip_tasks;
        self
    }

    pub async fn run(
        &self,
        tree: &mut StagedTree,
        generators: &[Box<dyn Generator>],
    ) -> Result<RunReport> {
        let mut report = RunReport::default();
        let mut tasks: Vec<PostCommitTask> = Vec::new();

        for generator in generators {
            info!("Running generator '{}'", generator.name());
            for task in generator.generate(tree).await? {
                if tasks.iter().any(|queued| queued.label() == task.label()) {
                    debug!("Task '{}' already queued", task.label());
                    continue;
                }
                tasks.push(task);
            }
            report.generators.push(generator.name().to_string());
        }

        report.changes = tree.changes();

        if self.dry_run {
            info!("Dry run: {} change(s) not written", report.changes.len());
            report.tasks_skipped = tasks.iter().map(|t| t.label().to_string()).collect();
            return Ok(report);
        }

        report.commit = Some(tree.commit()?);

        if self.skip_tasks {
            report.tasks_skipped = tasks.iter().map(|t| t.label().to_string()).collect();
            return Ok(report);
        }

        for task in tasks {
            let label = task.label().to_string();
            info!("Running task '{}'", label);
            if let Err(e) = task.run().await {
                warn!("Task '{}' failed: {}", label, e);
                return Err(MonotreeError::Other(anyhow::anyhow!(
                    "post-commit task '{}' failed: {}",
                    label,
                    e
                )));
            }
            report.tasks_run.push(label);
        }

        Ok(report)
    }
}

/// An install task when any staged change touches a `package.json`.
///
/// The package manager is picked from the lockfile present in the tree.
pub fn install_packages_task(tree: &StagedTree) -> Option<PostCommitTask> {
    let touches_manifest = tree
        .changes()
        .iter()
        .any(|change| change.path.file_name() == Some("package.json"));
    if !touches_manifest {
        return None;
    }

    let program = package_manager(tree);
    Some(PostCommitTask::command(
        "install packages",
        program,
        vec!["install".to_string()],
        tree.root().to_path_buf(),
    ))
}

fn package_manager(tree: &StagedTree) -> &'static str {
    const LOCKFILES: [(&str, &str); 4] = [
        ("pnpm-lock.yaml", "pnpm"),
        ("yarn.lock", "yarn"),
        ("bun.lockb", "bun"),
        ("package-lock.json", "npm"),
    ];
    LOCKFILES
        .iter()
        .find(|(lockfile, _)| TreePath::new(lockfile).is_ok_and(|path| tree.is_file(&path)))
        .map(|(_, program)| *program)
        .unwrap_or("npm")
}

/// Moves one project
pub struct MoveGenerator {
    config: ToolConfig,
    request: RelocateRequest,
}

impl MoveGenerator {
    pub fn new(config: ToolConfig, request: RelocateRequest) -> Self {
        Self { config, request }
    }
}

#[async_trait]
impl Generator for MoveGenerator {
    fn name(&self) -> &str {
        "move"
    }

    async fn generate(&self, tree: &mut StagedTree) -> Result<Vec<PostCommitTask>> {
        RelocationEngine::new(&self.config).relocate(tree, &self.request)?;
        Ok(install_packages_task(tree).into_iter().collect())
    }
}

/// Converts a single-root workspace to a multi-project layout
pub struct ConvertToMonorepoGenerator {
    config: ToolConfig,
}

impl ConvertToMonorepoGenerator {
    pub fn new(config: ToolConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Generator for ConvertToMonorepoGenerator {
    fn name(&self) -> &str {
        "convert-to-monorepo"
    }

    async fn generate(&self, tree: &mut StagedTree) -> Result<Vec<PostCommitTask>> {
        let report = convert_to_monorepo(tree, &self.config)?;
        info!("Relocated {} project(s)", report.relocations.len());
        Ok(install_packages_task(tree).into_iter().collect())
    }
}
