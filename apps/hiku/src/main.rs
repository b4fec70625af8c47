//! # hiku - graph query runner
//!
//! Loads a JSON dataset, builds a graph from it and executes queries.
//!
//! ## Usage
//!
//! ```bash
//! # Run a query and print the denormalized result
//! hiku query --data shop.json --query '["version", {"items": ["name"]}]'
//!
//! # Same query, normalized result on a thread pool
//! hiku --executor threads query -d shop.json -Q '[{"items": ["name"]}]' --normalized
//!
//! # Show the schema derived from a dataset
//! hiku schema --data shop.json
//! ```

use clap::Parser;
use hiku::cli;
use hiku::config::{Config, LogFormat};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    // HIKU_LOG_FORMAT wins over the config file.
    init_tracing(
        LogFormat::from_env().unwrap_or(config.log.format),
        cli.verbose,
    );

    if let Err(e) = cli::execute(cli, config).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Logs go to stderr so stdout carries only results.
fn init_tracing(format: LogFormat, verbose: bool) {
    let default = if verbose {
        "hiku=debug,hiku_core=debug"
    } else {
        "hiku=info,hiku_core=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default.into());

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
