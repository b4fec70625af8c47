//! # Engine Primitives
//!
//! Fixed constants shared by the engine components.

/// Name used for the unnamed root node in messages and denormalizer paths.
pub const ROOT_NODE_NAME: &str = "__root__";

/// Default number of worker threads for pooled executors.
///
/// Matches the number of concurrently running resolver calls a typical
/// backend (connection pool, HTTP client) is sized for.
pub const DEFAULT_WORKERS: usize = 4;
