//! Error types for deploy-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading an ebook's package metadata.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// `content.opf` bytes were not valid UTF-8.
    #[error("package metadata is not valid UTF-8")]
    NotUtf8(#[from] std::string::FromUtf8Error),

    /// No `<dc:identifier id="uid">` element.
    #[error("package metadata has no canonical identifier")]
    MissingIdentifier,

    /// The identifier did not look like `url:<scheme>://<host>/ebooks/<path>`.
    #[error("unrecognized canonical identifier '{identifier}'")]
    UnrecognizedIdentifier { identifier: String },

    /// The identifier path after `/ebooks/` was empty.
    #[error("canonical identifier yields an empty ebook identifier")]
    EmptyIdentifier,

    /// The identifier path contained empty, `.` or `..` segments.
    #[error("invalid ebook identifier '{identifier}'")]
    InvalidIdentifier { identifier: String },

    /// No `<dc:title id="title">` element.
    #[error("package metadata has no work title")]
    MissingTitle,

    /// No `<meta property="dcterms:modified">` element to rewrite.
    #[error("package metadata has no dcterms:modified element")]
    MissingModified,
}

/// Errors raised while loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// An explicitly requested config file does not exist.
    #[error("config not found at {path}")]
    ConfigNotFound { path: PathBuf },
}

/// Convenience constructor for [`ConfigError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
