//! Workspace model and project relocation for monotree.
//!
//! This crate knows what a workspace is made of and how to rearrange it:
//! - `ProjectConfiguration` / `WorkspaceConfiguration`: manifests read and
//!   written with unknown fields preserved
//! - `ProjectRegistry`: snapshot of every project found in a staged tree
//! - `ReferenceIndex`: every import, path mapping, target option and name
//!   pointer that has to change when a project moves; source files are
//!   scanned with the tree-sitter grammars of `monotree-syntax`
//! - `RelocationEngine`: moves one project and rewrites its dependents
//! - `convert_to_monorepo`: moves every project of a single-root workspace
//!   into an apps/libs or packages layout
//! - `Generator` / `GeneratorRunner`: run steps against one tree, commit,
//!   then run post-commit tasks in order
//!
//! # Example
//!
//! ```no_run
//! use monotree_core::ToolConfig;
//! use monotree_tree::StagedTree;
//! use monotree_workspace::{RelocateRequest, RelocationEngine};
//!
//! # fn example() -> monotree_core::Result<()> {
//! let config = ToolConfig::default();
//! let mut tree = StagedTree::new("/home/user/workspace");
//!
//! let request = RelocateRequest::new("shared-ui", "libs/shared-ui");
//! let report = RelocationEngine::new(&config).relocate(&mut tree, &request)?;
//! println!("{} reference(s) rewritten", report.references.len());
//!
//! tree.commit()?;
//! # Ok(())
//! # }
//! ```

pub mod generator;
pub mod json;
pub mod manifest;
pub mod monorepo;
pub mod moves;
pub mod references;
pub mod registry;
pub mod relocate;
pub mod workspace_config;

pub use generator::{
    install_packages_task, ConvertToMonorepoGenerator, Generator, GeneratorRunner, MoveGenerator,
    PostCommitTask, RunReport,
};
pub use manifest::{ProjectConfiguration, ProjectType, TargetConfiguration};
pub use monorepo::{convert_to_monorepo, LayoutScheme, MonorepoReport};
pub use moves::ProjectMove;
pub use references::{apply_references, Reference, ReferenceIndex, ReferenceKind, ReferenceLocation};
pub use registry::ProjectRegistry;
pub use relocate::{RelocateRequest, RelocationEngine, RelocationReport};
pub use workspace_config::{PathMappings, WorkspaceConfiguration};
