//! # hiku CLI Module
//!
//! ## Available Commands
//!
//! - `query` - Execute a query against a dataset
//! - `schema` - Show the graph derived from a dataset

mod commands;

use crate::config::{Config, ExecutorKind};
use clap::{Parser, Subcommand};
use hiku_core::HikuError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// hiku - graph query runner
///
/// Executes hiku queries against a JSON dataset.
#[derive(Parser, Debug)]
#[command(name = "hiku")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Executor override: "sync", "threads" or "tokio"
    #[arg(short = 'x', long, global = true, value_enum)]
    pub executor: Option<ExecutorKind>,

    /// Worker count override for the threads and tokio executors
    #[arg(short, long, global = true)]
    pub workers: Option<usize>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a query and print the result as JSON
    Query {
        /// Path to the dataset file
        #[arg(short, long)]
        data: PathBuf,

        /// Query document, e.g. '["version", {"items": ["name"]}]'
        #[arg(short = 'Q', long)]
        query: String,

        /// Print the normalized result instead of the denormalized tree
        #[arg(short, long)]
        normalized: bool,
    },

    /// Show the nodes, fields and links derived from a dataset
    Schema {
        /// Path to the dataset file
        #[arg(short, long)]
        data: PathBuf,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli, config: Config) -> Result<(), HikuError> {
    let mut engine = config.engine;
    if let Some(executor) = cli.executor {
        engine.executor = executor;
    }
    if let Some(workers) = cli.workers {
        engine.workers = workers;
    }

    match cli.command {
        Commands::Query {
            data,
            query,
            normalized,
        } => cmd_query(&data, &query, normalized, engine).await,
        Commands::Schema { data } => cmd_schema(&data, cli.json_mode),
    }
}

// =============================================================================
// TESTS
// =============================================================================
