//! Error types for deploy-tools.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of one external collaborator invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The program is not installed or not on `PATH`.
    #[error("{tool} not found")]
    NotFound { tool: String },

    /// The program exists but could not be started.
    #[error("failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited unsuccessfully.
    #[error("{tool} failed ({status}): {output}")]
    Failed {
        tool: String,
        status: String,
        output: String,
    },

    /// The program succeeded but its output could not be interpreted.
    #[error("{tool} produced unexpected output: {message}")]
    InvalidOutput { tool: String, message: String },
}

/// Conditions checked before any repository is touched.
#[derive(Debug, Error)]
pub enum PreflightError {
    /// A required binary is not resolvable.
    #[error("{tool} is missing: {hint}")]
    MissingDependency { tool: String, hint: &'static str },

    /// A sibling helper script does not exist.
    #[error("helper script not found at {path}")]
    MissingScript { path: PathBuf },

    /// The cache hook exists but is not executable.
    #[error("helper script at {path} is not executable")]
    ScriptNotExecutable { path: PathBuf },

    /// The owning group does not exist.
    #[error("group '{group}' does not exist; either use --group or create the group")]
    MissingGroup { group: String },

    /// The web root is absent or not a directory.
    #[error("{path} does not exist or is not a directory")]
    MissingWebroot { path: PathBuf },

    /// Resolving the group failed for another reason.
    #[error(transparent)]
    Tool(#[from] ToolError),
}
