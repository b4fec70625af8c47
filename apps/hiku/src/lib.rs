//! # hiku
//!
//! Command-line embedder of the hiku engine: loads a JSON dataset, exposes
//! it as a graph and runs queries against it.
//!
//! - `config`: TOML configuration (executor, log format)
//! - `dataset`: JSON records and links as a graph
//! - `cli`: command definitions and implementations

pub mod cli;
pub mod config;
pub mod dataset;
