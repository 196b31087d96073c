use anyhow::Result;
use clap::Parser;

mod access;
mod auth;
mod cli;
mod coa;
mod config;
mod error;
mod handlers;
mod router;
mod schemas;
mod storage;
mod workflow;
mod zoho;

#[cfg(test)]
mod test_utils;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing; the log level is controlled via RUST_LOG
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    cli.run().await?;

    Ok(())
}
