//! churnctl - command-line client for the customer-churn analytics API
//!
//! Every subcommand prints pretty JSON to stdout; logs go to stderr.

mod commands;

use anyhow::Result;
use clap::Parser;

use churnctl::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "churnctl=debug,warn" } else { "warn" };

    // Stdout carries only command output.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    commands::run(cli).await
}
