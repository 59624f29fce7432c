//! Error types for deploy-pipeline.

use std::path::PathBuf;

use thiserror::Error;

use deploy_core::MetadataError;
use deploy_tools::ToolError;

/// All errors that can end one repository's deployment.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Package metadata was missing or malformed.
    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    /// An external collaborator failed.
    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Publish ledger JSON error.
    #[error("ledger JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The argument does not name a repository directory.
    #[error("invalid repository root: {path}")]
    NotARepository { path: PathBuf },

    /// `git log` returned a date chrono cannot read.
    #[error("invalid commit date '{date}': {source}")]
    CommitDate {
        date: String,
        #[source]
        source: chrono::ParseError,
    },

    /// A tool reported success but did not leave the expected file behind.
    #[error("expected output missing: {path}")]
    MissingArtifact { path: PathBuf },
}

/// Convenience constructor for [`PublishError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> PublishError {
    PublishError::Io {
        path: path.into(),
        source,
    }
}
