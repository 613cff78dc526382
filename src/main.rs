//! Metrix - Main Entry Point
//!
//! Tunes, trains and reports tree classifiers for EP_success.

use clap::Parser;
use metrix_ml::cli::{cmd_run, Cli};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "metrix=info".into()),
        )
        .init();

    let cli = Cli::parse();
    cmd_run(&cli)
}
