//! monotree - relocate projects and migrate configuration in JS/TS monorepos.
//!
//! # Usage
//!
//! ```bash
//! # List projects
//! monotree projects
//!
//! # Move a library, renaming it and its import path
//! monotree move shared-ui libs/ui --new-name ui --import-path @acme/ui
//!
//! # Preview turning a standalone app into an apps/libs workspace
//! monotree --dry-run convert-to-monorepo
//!
//! # Patch a config object
//! monotree patch apps/demo/vite.config.ts --set build.outDir=../../dist/apps/demo --callee defineConfig
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use monotree_cli::{commands, output, OutputFormat, Session};
use monotree_codemod::{ObjectLocator, PatchMode};
use monotree_workspace::RelocateRequest;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "monotree")]
#[command(about = "Relocate projects and migrate configuration in JS/TS monorepos", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Workspace root
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Configuration file path (defaults to monotree.toml in the root)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Show what would change without writing anything
    #[arg(long, global = true)]
    dry_run: bool,

    /// Do not run post-commit tasks such as package installs
    #[arg(long, global = true)]
    skip_tasks: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (human, json)
    #[arg(long, global = true, default_value = "human")]
    format: OutputFormatArg,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormatArg {
    Human,
    Json,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        OutputFormat::from_flag(matches!(arg, OutputFormatArg::Json))
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PatchModeArg {
    Merge,
    Skip,
    Replace,
    Append,
}

impl From<PatchModeArg> for PatchMode {
    fn from(arg: PatchModeArg) -> Self {
        match arg {
            PatchModeArg::Merge => PatchMode::Merge,
            PatchModeArg::Skip => PatchMode::Skip,
            PatchModeArg::Replace => PatchMode::Replace,
            PatchModeArg::Append => PatchMode::Append,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List projects
    Projects,

    /// Move a project and rewrite references to it
    Move {
        /// Project name
        project: String,

        /// New root, relative to the workspace root
        destination: String,

        /// Rename the project
        #[arg(long)]
        new_name: Option<String>,

        /// New import path (implies --update-import-path)
        #[arg(long)]
        import_path: Option<String>,

        /// Derive a new import path from the new name
        #[arg(long)]
        update_import_path: bool,

        /// Only move files, leave references untouched
        #[arg(long)]
        no_update_references: bool,
    },

    /// Move every project of a single-root workspace into apps/libs
    ConvertToMonorepo,

    /// Run a configuration migration
    #[command(subcommand)]
    Migrate(MigrateCommands),

    /// Set properties of a configuration object in a JS/TS file
    Patch {
        /// File relative to the workspace root
        file: String,

        /// PATH=VALUE, VALUE being JSON or a plain string (repeatable)
        #[arg(long = "set", value_name = "PATH=VALUE")]
        assignments: Vec<String>,

        /// What to do with existing different values
        #[arg(long, default_value = "merge")]
        mode: PatchModeArg,

        /// Patch the object passed to this call in the default export
        #[arg(long, conflicts_with = "variable")]
        callee: Option<String>,

        /// Patch the object assigned to this top-level variable
        #[arg(long)]
        variable: Option<String>,
    },
}

#[derive(Subcommand)]
enum MigrateCommands {
    /// Move vite build output settings into vite.config.*
    ViteBuildConfig,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        output::error(format!("{:#}", e));
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let session = Session::open(&cli.root, cli.config.as_deref(), cli.format.into())
        .await?
        .dry_run(cli.dry_run)
        .skip_tasks(cli.skip_tasks);

    init_logging(cli.verbose, &session.config().general.log_level);

    match cli.command {
        Commands::Projects => {
            commands::list_projects(&session)?;
        }

        Commands::Move {
            project,
            destination,
            new_name,
            import_path,
            update_import_path,
            no_update_references,
        } => {
            let mut request = RelocateRequest::new(project, destination)
                .with_update_references(!no_update_references)
                .with_update_import_path(update_import_path);
            if let Some(name) = new_name {
                request = request.with_new_name(name);
            }
            if let Some(path) = import_path {
                request = request.with_import_path(path);
            }
            commands::move_project(&session, request).await?;
        }

        Commands::ConvertToMonorepo => {
            commands::convert_to_monorepo(&session).await?;
        }

        Commands::Migrate(MigrateCommands::ViteBuildConfig) => {
            commands::migrate_vite_build_config(&session).await?;
        }

        Commands::Patch {
            file,
            assignments,
            mode,
            callee,
            variable,
        } => {
            let locator = match (callee, variable) {
                (_, Some(name)) => ObjectLocator::Variable { name },
                (callee, None) => ObjectLocator::DefaultExport { callee },
            };
            commands::patch_file(&session, &file, &assignments, mode.into(), locator).await?;
        }
    }

    Ok(())
}

/// Initialize logging based on verbosity level and the configured level
fn init_logging(verbose: bool, log_level: &str) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("monotree=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("monotree={},warn", log_level)))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}
