//! Shared error taxonomy and tool configuration for monotree.
//!
//! Every library crate in the workspace reports failures through
//! [`MonotreeError`] and receives its settings as an explicit [`ToolConfig`]
//! value; nothing here is global.

pub mod config;
pub mod error;

pub use config::{
    CommitConfig, GeneralConfig, LayoutConfig, ToolConfig, WorkspaceSettings, CONFIG_FILE_NAME,
};
pub use error::{MonotreeError, Result};
