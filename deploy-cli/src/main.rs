//! deploy-ebook-to-www: build ebook repositories and publish them to the
//! web root.
//!
//! # Usage
//!
//! ```text
//! deploy-ebook-to-www [-v] [-g GROUP] [--webroot PATH] [--weburl URL]
//!                     [--no-images] [--no-build] [--no-epubcheck] [--no-recompose]
//!                     [-l HASH | --skip-unchanged] [--fail-fast] [--config PATH]
//!                     DIRECTORY...
//! ```

mod commands;
mod report;

use anyhow::Result;
use clap::Parser;

use commands::deploy::DeployArgs;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "deploy-ebook-to-www",
    version,
    about = "Build ebook source repositories and deploy them to the web root",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    deploy: DeployArgs,
}

/// `RUST_LOG` wins; otherwise `info` with `--verbose`, `warn` without.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.deploy.verbose);
    cli.deploy.run()
}
