//! Structural editing of JavaScript and TypeScript configuration files.
//!
//! Files are parsed with the tree-sitter parser from `monotree-syntax`, the
//! configuration object is found by shape (`export default
//! defineConfig({...})`, `module.exports = ...`, a named variable) and edited
//! in place:
//! - `ConfigPatch`: dotted property paths and the values they should hold,
//!   plus the named imports those values need
//! - `apply_config_patch`: idempotent, minimal-diff patch of one file in a
//!   staged tree
//! - `apply_config_patches`: the same over many files, collecting failures
//! - `migrations`: workspace migrations built on patches
//!
//! # Example
//!
//! ```no_run
//! use monotree_codemod::{apply_config_patch, ConfigPatch, ObjectLocator, PatchValue};
//! use monotree_tree::{StagedTree, TreePath};
//!
//! # fn example() -> monotree_core::Result<()> {
//! let mut tree = StagedTree::new("/home/user/workspace");
//! let file = TreePath::new("apps/demo/vite.config.ts")?;
//!
//! let patch = ConfigPatch::new().set("build.outDir", PatchValue::literal("../../dist/apps/demo"));
//! let report = apply_config_patch(
//!     &mut tree,
//!     &file,
//!     &ObjectLocator::default_export_call("defineConfig"),
//!     &patch,
//! )?;
//! if report.changed {
//!     tree.commit()?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod editor;
pub mod generator;
mod imports;
pub mod locator;
pub mod migrations;
pub mod patch;
pub mod style;
pub mod value;

pub use editor::{ConfigEditor, TextEdit};
pub use generator::ConfigPatchGenerator;
pub use locator::ObjectLocator;
pub use migrations::{update_vite_build_config, MigrationReport, ViteBuildConfigMigration};
pub use monotree_syntax::{SourceLanguage, SourceParser};
pub use patch::{
    apply_config_patch, apply_config_patches, patch_source, CodemodTarget, ConfigPatch,
    EntryOutcome, FileResult, NamedImport, PatchEntry, PatchMode, PatchOutcome, PatchReport,
};
pub use style::ObjectStyle;
pub use value::PatchValue;
