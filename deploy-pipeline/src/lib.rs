//! # deploy-pipeline
//!
//! Per-repository deployment and the batch around it.
//!
//! Call [`publish_repository`] to deploy a single repository, or
//! [`pipeline::run`] to deploy a batch and regenerate the catalogs.

pub mod build;
pub mod changeset;
pub mod error;
pub mod fsops;
pub mod gate;
pub mod hash_store;
pub mod images;
pub mod perms;
pub mod pipeline;
pub mod publish;
pub mod repository;
pub mod rewrite;
pub mod writer;

pub use error::PublishError;
pub use gate::{Decision, RebuildPlan};
pub use pipeline::{BatchReport, CatalogOutcome};
pub use repository::{publish_repository, PublishSettings, RepoOutcome, RepoReport, Stage};
pub use rewrite::RewriteSummary;
pub use writer::WriteResult;
