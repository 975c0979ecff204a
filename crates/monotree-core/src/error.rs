//! Error types for monotree.

/// Result type alias for monotree operations.
pub type Result<T> = std::result::Result<T, MonotreeError>;

/// Main error type shared by the tree, workspace and codemod crates.
#[derive(Debug, thiserror::Error)]
pub enum MonotreeError {
    /// A path, project or file is absent
    #[error("Not found: {resource} '{id}'")]
    NotFound { resource: String, id: String },

    /// A relocation target overlaps an existing project
    #[error("Cannot move project '{project}' to '{destination}': overlaps project '{existing}'")]
    DestinationCollision {
        project: String,
        destination: String,
        existing: String,
    },

    /// A project with the requested name already exists
    #[error("Project '{0}' already exists")]
    ProjectExists(String),

    /// The codemod could not locate the configuration object
    #[error("No object matching {locator} found in {path}")]
    TargetObjectNotFound { path: String, locator: String },

    /// A file could not be parsed
    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    /// A reference resolves to more than one project
    #[error("Reference '{specifier}' in {file} is ambiguous between projects: {}", .candidates.join(", "))]
    ReferenceRewriteAmbiguous {
        file: String,
        specifier: String,
        candidates: Vec<String>,
    },

    /// The staged tree was already committed
    #[error("Tree has already been committed")]
    AlreadyCommitted,

    /// A path is not a valid workspace-relative path
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Invalid input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Wrapped anyhow errors for compatibility
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MonotreeError {
    /// Create a new not found error
    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Create a new parse error
    pub fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new invalid path error
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error means the workspace needs manual attention
    /// rather than a retry.
    pub fn is_codemod_failure(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. } | Self::TargetObjectNotFound { .. }
        )
    }
}
