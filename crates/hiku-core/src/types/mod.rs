//! # Core Type Definitions
//!
//! This module contains the small vocabulary shared by every engine component:
//! - Node instance identities (`Ident`)
//! - Link multiplicity (`Cardinality`)
//! - Error types (`HikuError`, `BoxError`)
//!
//! ## Ordering Guarantees
//!
//! `Ident` implements `Ord` so the result index can use `BTreeMap` and
//! produce the same layout for the same query every time.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// IDENTITIES
// =============================================================================

/// Opaque key addressing one instance of a schema node.
///
/// Identities are produced by link resolvers and handed back to the field
/// resolvers of the linked node. The engine never interprets them beyond
/// equality and ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ident {
    /// Integer identity (database primary keys, counters).
    Int(i64),
    /// String identity (slugs, UUIDs, composite keys).
    Str(String),
}

impl Ident {
    /// Convert a resolved field value into an identity.
    ///
    /// Only integers and strings qualify; anything else returns `None`.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Int),
            Value::String(s) => Some(Self::Str(s.clone())),
            _ => None,
        }
    }

    /// The identity as a plain JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(i) => Value::from(*i),
            Self::Str(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{}", i),
            Self::Str(s) => write!(f, "{:?}", s),
        }
    }
}

/// Integer-looking keys parse as `Ident::Int`, everything else as `Ident::Str`.
impl FromStr for Ident {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.parse::<i64>()
            .map(Self::Int)
            .unwrap_or_else(|_| Self::Str(s.to_string())))
    }
}

impl From<i64> for Ident {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Ident {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for Ident {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Ident {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

// =============================================================================
// CARDINALITY
// =============================================================================

/// Multiplicity of a link between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    /// Zero or one target.
    Maybe,
    /// Exactly one target.
    One,
    /// Zero or more targets.
    Many,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Maybe => "Maybe",
            Self::One => "One",
            Self::Many => "Many",
        };
        f.write_str(name)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Error type returned by user-supplied resolvers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while executing a query.
///
/// Every variant is fatal for the query that raised it: the engine has no
/// partial-success mode and never retries.
#[derive(Debug, Error)]
pub enum HikuError {
    /// The query names a field or link the schema node does not declare.
    #[error("Field {name:?} is not implemented in the {node:?} node")]
    UnknownField { node: String, name: String },

    /// A link points to a node missing from the graph.
    #[error("Node {0:?} is not defined in the graph")]
    UnknownNode(String),

    /// An inline node was requested inside an identity-bearing node.
    #[error("Nested node {name:?} inside node {node:?} is not supported")]
    NestedNodeUnsupported { node: String, name: String },

    /// The query tree or query document is malformed.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A resolver returned data of the wrong shape.
    #[error(
        "Can't store {kind} values, node: {node:?}, {kind}s: {names:?}, expected: {expected}, returned: {returned}"
    )]
    ShapeViolation {
        node: String,
        kind: &'static str,
        names: Vec<String>,
        expected: String,
        returned: String,
    },

    /// A non-optional link resolved to nothing.
    #[error("Non-optional link {link:?} of node {node:?} should not return Nothing")]
    CardinalityViolation { node: String, link: String },

    /// A required option was not supplied in the query.
    #[error("Required option {option:?} for {item:?} was not provided")]
    MissingOption { option: String, item: String },

    /// The resolver asked for a context variable the caller did not supply.
    #[error("Context variable {0:?} is not specified in the query context")]
    ContextVariable(String),

    /// The context variable exists but holds a different type.
    #[error("Context variable {key:?} is not of type {expected}")]
    ContextType { key: String, expected: &'static str },

    /// A resolver failed; the original error is carried unchanged.
    #[error(transparent)]
    Resolver(BoxError),

    /// A unit of work panicked on a worker.
    #[error("Resolver panicked: {0}")]
    ResolverPanicked(String),

    /// The executor dropped a unit of work without running it.
    #[error("Executor shut down before all units of work completed")]
    ExecutorShutdown,

    /// The result store does not match the query being denormalized.
    #[error("Malformed result store: {0}")]
    MalformedStore(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl HikuError {
    /// Wrap a resolver error. Engine errors raised inside a resolver (a
    /// failed context lookup, say) are unwrapped back to themselves.
    pub fn resolver(err: BoxError) -> Self {
        match err.downcast::<Self>() {
            Ok(own) => *own,
            Err(other) => Self::Resolver(other),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
