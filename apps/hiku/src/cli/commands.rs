//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::config::EngineConfig;
use crate::dataset::{Dataset, describe};
use hiku_core::{Context, HikuError, denormalize, query::read_str};
use serde_json::Value;
use std::path::{Path, PathBuf};

// =============================================================================
// PATH VALIDATION
// =============================================================================

/// Canonicalize an input path and ensure it names a regular file.
pub fn validate_file_path(path: &Path) -> Result<PathBuf, HikuError> {
    // Canonicalize resolves "..", symlinks, and validates existence
    let canonical = path.canonicalize().map_err(|e| {
        HikuError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(HikuError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

fn print_json(value: &Value) -> Result<(), HikuError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| HikuError::SerializationError(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

// =============================================================================
// QUERY COMMAND
// =============================================================================

/// Execute a query and print the result.
///
/// Execution blocks, so it runs on tokio's blocking pool; the tokio executor
/// then spawns its units of work onto the same runtime.
pub async fn cmd_query(
    data: &Path,
    query: &str,
    normalized: bool,
    engine: EngineConfig,
) -> Result<(), HikuError> {
    let data = validate_file_path(data)?;
    let query = query.to_string();

    let output = tokio::task::spawn_blocking(move || run_query(&data, &query, normalized, &engine))
        .await
        .map_err(|e| HikuError::IoError(format!("Query task failed: {}", e)))??;

    print_json(&output)
}

/// Load the dataset, execute `query` and return the (de)normalized result.
pub fn run_query(
    data: &Path,
    query: &str,
    normalized: bool,
    engine: &EngineConfig,
) -> Result<Value, HikuError> {
    let graph = Dataset::load(data)?.into_graph()?;
    let query = read_str(query)?;

    let store = engine.build()?.execute(&graph, &query, Context::new())?;
    tracing::info!(
        executor = ?engine.executor,
        items = query.items.len(),
        "query executed"
    );

    if normalized {
        Ok(store.to_json())
    } else {
        denormalize(&graph, &store, &query)
    }
}

// =============================================================================
// SCHEMA COMMAND
// =============================================================================

/// Show the graph derived from a dataset.
pub fn cmd_schema(data: &Path, json_mode: bool) -> Result<(), HikuError> {
    let data = validate_file_path(data)?;
    let graph = Dataset::load(&data)?.into_graph()?;
    let schema = describe(&graph);

    if json_mode {
        return print_json(&schema);
    }

    println!("hiku Schema");
    println!("===========");
    println!("Dataset: {}", data.display());
    let Value::Object(nodes) = &schema else {
        return Ok(());
    };
    for (name, node) in nodes {
        println!();
        println!("{}", name);
        if let Some(Value::Array(fields)) = node.get("fields") {
            let names: Vec<&str> = fields.iter().filter_map(Value::as_str).collect();
            println!("  fields: {}", names.join(", "));
        }
        if let Some(Value::Object(links)) = node.get("links") {
            for (link, spec) in links {
                let target = spec.get("node").and_then(Value::as_str).unwrap_or("?");
                let cardinality = spec.get("cardinality").and_then(Value::as_str).unwrap_or("?");
                match spec.get("requires").and_then(Value::as_str) {
                    Some(requires) => println!(
                        "  link {} -> {} ({}, requires {})",
                        link, target, cardinality, requires
                    ),
                    None => println!("  link {} -> {} ({})", link, target, cardinality),
                }
            }
        }
    }

    Ok(())
}
