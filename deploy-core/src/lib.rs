//! Deploy core library: domain types, package metadata, configuration,
//! web layout, errors.
//!
//! - [`types`]: identifiers, toggles, gate modes
//! - [`metadata`]: `content.opf` extraction and the modified-date rewrite
//! - [`config`]: optional YAML configuration
//! - [`layout`]: web root and state directory paths
//! - [`error`]: [`MetadataError`], [`ConfigError`]

pub mod config;
pub mod error;
pub mod layout;
pub mod metadata;
pub mod types;

pub use config::{DeployConfig, ToolNames};
pub use error::{ConfigError, MetadataError};
pub use layout::WebLayout;
pub use metadata::PackageMetadata;
pub use types::{
    CommitHash, EbookIdentifier, FailurePolicy, GateMode, OwnerGroup, StageToggles,
};
