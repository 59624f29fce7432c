//! # deploy-tools
//!
//! The boundary between the deployment and the programs it drives.
//!
//! [`Toolchain`] names every external operation; [`SystemToolchain`] runs them
//! as processes; [`preflight::run`] verifies the environment before a batch.

pub mod error;
pub mod preflight;
pub mod system;
pub mod toolchain;

pub use error::{PreflightError, ToolError};
pub use system::SystemToolchain;
pub use toolchain::{BuildRequest, CatalogKind, Crop, RasterRequest, RecomposeRequest, Toolchain};
