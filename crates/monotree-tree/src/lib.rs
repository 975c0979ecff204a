//! Staged virtual file tree for monotree.
//!
//! This crate provides the mutation substrate every generator works against:
//! - `TreePath`: normalized workspace-relative paths
//! - `StagedTree`: overlay of buffered writes, deletes and moves over a
//!   workspace directory, with merged reads and directory listings
//! - `StagedTree::commit`: single-pass, delete-before-write application of
//!   the overlay to disk
//!
//! # Example
//!
//! ```no_run
//! use monotree_tree::{StagedTree, TreePath};
//!
//! # fn example() -> monotree_core::Result<()> {
//! let mut tree = StagedTree::new("/home/user/workspace");
//!
//! let from = TreePath::new("libs/ui")?;
//! let to = TreePath::new("packages/ui")?;
//! tree.rename(&from, &to)?;
//!
//! // Nothing on disk has changed yet.
//! for change in tree.changes() {
//!     println!("{} {}", change.kind, change.path);
//! }
//!
//! tree.commit()?;
//! # Ok(())
//! # }
//! ```

pub mod commit;
pub mod path;
pub mod staged;
pub mod types;

pub use path::TreePath;
pub use staged::StagedTree;
pub use types::{ChangeKind, CommitReport, FileChange};
