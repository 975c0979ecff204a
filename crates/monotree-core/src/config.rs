//! Tool configuration for monotree.
//!
//! Configuration lives in `monotree.toml` at the workspace root and every
//! section is optional; a workspace without the file runs on defaults.
//! The location can be overridden with `MONOTREE_CONFIG_PATH`, and a small
//! set of `MONOTREE_*` environment variables override individual values
//! after the file is loaded.
//!
//! # Example
//!
//! ```no_run
//! use monotree_core::ToolConfig;
//! use std::path::Path;
//!
//! # async fn example() -> monotree_core::Result<()> {
//! let config = ToolConfig::load(Path::new("/home/user/workspace")).await?;
//! println!("apps live in {}", config.layout.apps_dir);
//! # Ok(())
//! # }
//! ```

use crate::error::{MonotreeError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default configuration file name, looked up in the workspace root
pub const CONFIG_FILE_NAME: &str = "monotree.toml";

// Environment variable names
pub const ENV_CONFIG_PATH: &str = "MONOTREE_CONFIG_PATH";
pub const ENV_LOG_LEVEL: &str = "MONOTREE_LOG_LEVEL";
pub const ENV_APPS_DIR: &str = "MONOTREE_APPS_DIR";
pub const ENV_LIBS_DIR: &str = "MONOTREE_LIBS_DIR";
pub const ENV_PACKAGES_DIR: &str = "MONOTREE_PACKAGES_DIR";
pub const ENV_OUTPUT_DIR: &str = "MONOTREE_OUTPUT_DIR";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub general: GeneralConfig,
    pub workspace: WorkspaceSettings,
    pub layout: LayoutConfig,
    pub commit: CommitConfig,
}

/// General configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error
    pub log_level: String,
}

/// Where workspace files live and which ones are scanned
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceSettings {
    /// Per-project manifest file name
    pub manifest_file: String,
    /// Workspace-level configuration file (named inputs, default project)
    pub workspace_file: String,
    /// Root tsconfig files holding path mappings, first existing one wins
    pub tsconfig_candidates: Vec<String>,
    /// Directory names never descended into while scanning
    pub ignored_dirs: Vec<String>,
    /// Extensions of files scanned for import specifiers
    pub source_extensions: Vec<String>,
    /// Build output directory prefix used in target options
    pub output_dir: String,
    /// Entries of the workspace root that belong to a root project
    pub root_project_entries: Vec<String>,
}

/// Directory scheme used when converting to a multi-project layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub apps_dir: String,
    pub libs_dir: String,
    pub packages_dir: String,
}

/// Commit behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitConfig {
    /// Write each file to a temporary sibling and rename it into place
    pub atomic_writes: bool,
    /// Remove directories left empty by deletes
    pub prune_empty_dirs: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            manifest_file: "project.json".to_string(),
            workspace_file: "nx.json".to_string(),
            tsconfig_candidates: strings(&["tsconfig.base.json", "tsconfig.json"]),
            ignored_dirs: strings(&[
                "node_modules",
                ".git",
                "dist",
                "tmp",
                ".nx",
                ".angular",
                "coverage",
            ]),
            source_extensions: strings(&["ts", "tsx", "js", "jsx", "mts", "cts", "mjs", "cjs"]),
            output_dir: "dist".to_string(),
            root_project_entries: strings(&[
                "src",
                "public",
                "project.json",
                "tsconfig.json",
                "tsconfig.app.json",
                "tsconfig.lib.json",
                "tsconfig.spec.json",
                ".babelrc",
                ".eslintrc.json",
                "eslint.config.js",
                "index.html",
                "vite.config.ts",
                "vite.config.mts",
                "vitest.config.ts",
                "jest.config.ts",
                "jest.config.app.ts",
                "jest.config.lib.ts",
                "webpack.config.js",
                "next.config.js",
                "next-env.d.ts",
                "nuxt.config.ts",
                "postcss.config.js",
                "tailwind.config.js",
            ]),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            apps_dir: "apps".to_string(),
            libs_dir: "libs".to_string(),
            packages_dir: "packages".to_string(),
        }
    }
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            atomic_writes: true,
            prune_empty_dirs: true,
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

impl ToolConfig {
    /// Load configuration for the workspace at `workspace_root`.
    ///
    /// Falls back to defaults when no configuration file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed or
    /// validated
    pub async fn load(workspace_root: &Path) -> Result<Self> {
        let path = Self::config_path(workspace_root);
        if tokio::fs::try_exists(&path).await? {
            Self::load_from_path(&path).await
        } else {
            debug!("No configuration at {}, using defaults", path.display());
            let mut config = Self::default();
            config.merge_env_vars();
            config.validate()?;
            Ok(config)
        }
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub async fn load_from_path(path: &Path) -> Result<Self> {
        debug!("Loading configuration from: {}", path.display());

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| MonotreeError::config(format!("Failed to read config file: {}", e)))?;

        let mut config = Self::from_toml_str(&content)?;
        config.merge_env_vars();
        config.validate()?;

        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Parse configuration from TOML text without applying overrides
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| MonotreeError::config(format!("Failed to parse config file: {}", e)))
    }

    /// Resolve the configuration file location for a workspace
    pub fn config_path(workspace_root: &Path) -> PathBuf {
        match std::env::var(ENV_CONFIG_PATH) {
            Ok(path) => PathBuf::from(path),
            Err(_) => workspace_root.join(CONFIG_FILE_NAME),
        }
    }

    /// Merge environment variable overrides into the configuration
    pub fn merge_env_vars(&mut self) {
        if let Ok(log_level) = std::env::var(ENV_LOG_LEVEL) {
            debug!("Overriding log_level from environment: {}", log_level);
            self.general.log_level = log_level;
        }

        if let Ok(dir) = std::env::var(ENV_APPS_DIR) {
            debug!("Overriding apps_dir from environment: {}", dir);
            self.layout.apps_dir = dir;
        }

        if let Ok(dir) = std::env::var(ENV_LIBS_DIR) {
            debug!("Overriding libs_dir from environment: {}", dir);
            self.layout.libs_dir = dir;
        }

        if let Ok(dir) = std::env::var(ENV_PACKAGES_DIR) {
            debug!("Overriding packages_dir from environment: {}", dir);
            self.layout.packages_dir = dir;
        }

        if let Ok(dir) = std::env::var(ENV_OUTPUT_DIR) {
            debug!("Overriding output_dir from environment: {}", dir);
            self.workspace.output_dir = dir;
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<()> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.general.log_level.as_str()) {
            return Err(MonotreeError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.general.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if self.workspace.manifest_file.is_empty() {
            return Err(MonotreeError::config("manifest_file must not be empty"));
        }

        for (key, dir) in [
            ("apps_dir", &self.layout.apps_dir),
            ("libs_dir", &self.layout.libs_dir),
            ("packages_dir", &self.layout.packages_dir),
            ("output_dir", &self.workspace.output_dir),
        ] {
            if dir.is_empty() || dir.starts_with('/') || dir.split('/').any(|s| s == "..") {
                return Err(MonotreeError::config(format!(
                    "{} must be a non-empty workspace-relative directory, got '{}'",
                    key, dir
                )));
            }
        }

        debug!("Configuration validation passed");
        Ok(())
    }

    /// Whether a directory name is skipped while scanning
    pub fn is_ignored_dir(&self, name: &str) -> bool {
        self.workspace.ignored_dirs.iter().any(|d| d == name)
    }

    /// Whether a file extension marks a scanned source file
    pub fn is_source_extension(&self, ext: &str) -> bool {
        self.workspace.source_extensions.iter().any(|e| e == ext)
    }
}
