//! Error types for strata
//!
//! All modules use `StrataResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for strata operations
pub type StrataResult<T> = Result<T, StrataError>;

/// All errors that can occur in strata
#[derive(Error, Debug)]
pub enum StrataError {
    // Environment errors
    #[error("Container runtime not found: {binary}")]
    RuntimeNotFound { binary: String },

    #[error("Container runtime {binary} is not usable: {reason}")]
    RuntimeUnavailable { binary: String, reason: String },

    #[error("Unsupported container runtime: {0}. Use docker or podman.")]
    UnsupportedRuntime(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Project errors
    #[error("No strata.toml found in {0} or any parent directory")]
    ProjectNotFound(PathBuf),

    #[error("Invalid project file {path}: {reason}")]
    ProjectInvalid { path: PathBuf, reason: String },

    // Repository errors (signature computation)
    #[error("Repository {repo} did not report a commit: {reason}")]
    RepositoryCommit { repo: String, reason: String },

    #[error("Repository {repo} has invalid parameters: {reason}")]
    RepositoryParams { repo: String, reason: String },

    // Stage errors
    #[error("Stage not found: {0}")]
    StageNotFound(String),

    // Sidecar errors
    #[error("Failed to provision sidecar {name}: {reason}")]
    SidecarProvision { name: String, reason: String },

    // Image errors
    #[error("Image build failed for {tag}:\n{output}")]
    ImageBuild { tag: String, output: String },

    #[error("Image pull failed: {image}: {reason}")]
    ImagePull { image: String, reason: String },

    #[error("Failed to tag {source_image} as {tag}: {reason}")]
    ImageTag {
        source_image: String,
        tag: String,
        reason: String,
    },

    // Ledger errors
    #[error("Failed to write layer commit {path}: {reason}")]
    LedgerWrite { path: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl StrataError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Whether this error must abort the whole build.
    ///
    /// Ledger writes happen after the image is already cached, so losing one
    /// only costs reuse on the next build.
    pub fn is_fatal_for_build(&self) -> bool {
        !matches!(self, Self::LedgerWrite { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::RuntimeNotFound { .. } => {
                Some("Install docker or podman, or set runtime.binary in config.toml")
            }
            Self::ProjectNotFound(_) => Some("Create a strata.toml or pass --project"),
            Self::SidecarProvision { .. } => {
                Some("Check that the sidecar image can be pulled: strata sidecar ensure -v")
            }
            Self::RepositoryCommit { .. } => Some("Make sure the repository has at least one commit"),
            _ => None,
        }
    }
}
