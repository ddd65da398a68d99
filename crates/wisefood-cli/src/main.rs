//! wisefood CLI
//!
//! Renders the Kubernetes manifests of a wisefood deployment.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wisefood_cli::{Cli, Result};

fn main() -> Result<()> {
    // Logs go to stderr so rendered manifests on stdout can be piped
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    cli.run()
}
