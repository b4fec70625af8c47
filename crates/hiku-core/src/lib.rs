//! # hiku-core
//!
//! Graph query execution engine.
//!
//! Given a `Graph` schema (nodes made of fields and links, each backed by a
//! resolver) and a `QueryNode`, the engine resolves every requested value by
//! submitting batched resolver calls to an `Executor`, follows links into
//! other nodes, and returns a normalized `Store`. `denormalize` turns that
//! store back into the query-shaped JSON tree.
//!
//! ## Layout
//!
//! - `schema`: graph, nodes, fields, links, resolver contracts
//! - `query`: request tree, merge, JSON reader
//! - `split`: partitions a query against one schema node
//! - `result`: normalized result store and references
//! - `engine`: execution driver and task groups
//! - `executor`: sync, thread pool and tokio backends
//! - `denormalize`: store to plain JSON
//!
//! ## Determinism
//!
//! The store index is ordered (`BTreeMap`) and denormalized objects follow
//! query order, so the same query over the same data always produces the
//! same output, whatever the executor.

// =============================================================================
// MODULES
// =============================================================================

pub mod context;
pub mod denormalize;
pub mod engine;
pub mod executor;
pub mod primitives;
pub mod query;
pub mod result;
pub mod schema;
pub mod split;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use context::Context;
pub use types::{BoxError, Cardinality, HikuError, Ident};

// =============================================================================
// RE-EXPORTS: Schema & Query
// =============================================================================

pub use query::{Options, QueryField, QueryItem, QueryLink, QueryNode};
pub use schema::{
    Collect, Field, FieldFunc, FieldRows, FieldType, Graph, Link, LinkArgs, LinkFunc, LinkValue,
    Node, OptionSpec, Requires, SchemaItem, SubQuery,
};

// =============================================================================
// RE-EXPORTS: Execution
// =============================================================================

pub use denormalize::denormalize;
pub use engine::{Engine, Slot, TaskGroup};
#[cfg(feature = "tokio")]
pub use executor::TokioExecutor;
pub use executor::{Executor, Job, SyncExecutor, ThreadPoolExecutor};
pub use result::{Entry, Ref, RefView, Store, Stored};
pub use split::{Split, split};
