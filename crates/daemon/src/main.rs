// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! floodgated - durable log ingestion daemon
//!
//! Producers POST events to `/ingest`; events are buffered with
//! consumer-group semantics and batch-upserted into the sink, with a local
//! WAL absorbing buffer outages.

use clap::{Parser, Subcommand};
use floodgate_daemon::{lifecycle, Config};

#[derive(Parser)]
#[command(name = "floodgated")]
#[command(about = "Floodgate - durable log ingestion pipeline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline (default)
    Serve,
    /// Print the resolved configuration and exit
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => lifecycle::run(config).await,
        Commands::Config => {
            println!("{config:#?}");
            Ok(())
        }
    }
}
