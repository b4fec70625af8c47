//! # Graph Schema
//!
//! Static declaration of the graph the engine resolves queries against.
//!
//! - A `Graph` holds the unnamed root node and the named nodes
//! - A `Node` maps names to `SchemaItem`s: fields, links, or (at the root)
//!   inline nodes
//! - Fields and links carry their resolver handles and declared options
//!
//! The schema is read-only once built and is shared by every unit of work of
//! every query.

mod resolver;
mod types;

pub use resolver::{Collect, FieldFunc, FieldRows, LinkArgs, LinkFunc, LinkValue, Requires, SubQuery};
pub(crate) use resolver::FuncKey;
pub use types::FieldType;

use crate::primitives::ROOT_NODE_NAME;
use crate::query::Options;
use crate::{Cardinality, HikuError};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::BTreeMap;

// =============================================================================
// OPTIONS
// =============================================================================

/// A declared option of a field or link.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionSpec {
    pub name: String,
    /// Default value; `None` marks the option as required.
    pub default: Option<Value>,
}

impl OptionSpec {
    /// An option the query must always supply.
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }

    /// An option falling back to `default` when not supplied.
    pub fn optional(name: impl Into<String>, default: Value) -> Self {
        Self {
            name: name.into(),
            default: Some(default),
        }
    }
}

/// Resolve the options supplied for `item` against its declaration.
///
/// Supplied values win, then defaults; a required option with neither is an
/// error. Undeclared options are dropped.
pub(crate) fn resolve_options(
    item: &str,
    declared: &[OptionSpec],
    supplied: Option<&Options>,
) -> Result<Options, HikuError> {
    let mut resolved = Options::new();
    for spec in declared {
        let value = supplied
            .and_then(|s| s.get(&spec.name))
            .or(spec.default.as_ref())
            .ok_or_else(|| HikuError::MissingOption {
                option: spec.name.clone(),
                item: item.to_string(),
            })?;
        resolved.insert(spec.name.clone(), value.clone());
    }
    Ok(resolved)
}

// =============================================================================
// FIELD
// =============================================================================

/// A leaf-valued schema attribute.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub func: FieldFunc,
    pub options: Vec<OptionSpec>,
    /// Shape of the value, used when the field is projected with a sub-query.
    pub ty: FieldType,
    pub description: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, func: FieldFunc) -> Self {
        Self {
            name: name.into(),
            func,
            options: Vec::new(),
            ty: FieldType::Any,
            description: None,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: impl IntoIterator<Item = OptionSpec>) -> Self {
        self.options = options.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_type(mut self, ty: FieldType) -> Self {
        self.ty = ty;
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

// =============================================================================
// LINK
// =============================================================================

/// An edge from the declaring node to `node`.
#[derive(Debug, Clone)]
pub struct Link {
    pub name: String,
    /// Target node name.
    pub node: String,
    pub cardinality: Cardinality,
    /// Field of the declaring node whose value is handed to the resolver.
    pub requires: Option<String>,
    pub func: LinkFunc,
    pub options: Vec<OptionSpec>,
    pub description: Option<String>,
}

impl Link {
    pub fn new(
        name: impl Into<String>,
        cardinality: Cardinality,
        node: impl Into<String>,
        func: LinkFunc,
    ) -> Self {
        Self {
            name: name.into(),
            node: node.into(),
            cardinality,
            requires: None,
            func,
            options: Vec::new(),
            description: None,
        }
    }

    #[must_use]
    pub fn requires(mut self, field: impl Into<String>) -> Self {
        self.requires = Some(field.into());
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: impl IntoIterator<Item = OptionSpec>) -> Self {
        self.options = options.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

// =============================================================================
// NODE
// =============================================================================

/// Anything a node can expose under a name.
#[derive(Debug, Clone)]
pub enum SchemaItem {
    Field(Field),
    Link(Link),
    /// Inline node: recursed into without identities.
    Node(Node),
}

impl SchemaItem {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Field(f) => &f.name,
            Self::Link(l) => &l.name,
            Self::Node(n) => n.name.as_deref().unwrap_or(ROOT_NODE_NAME),
        }
    }
}

impl From<Field> for SchemaItem {
    fn from(value: Field) -> Self {
        Self::Field(value)
    }
}

impl From<Link> for SchemaItem {
    fn from(value: Link) -> Self {
        Self::Link(value)
    }
}

impl From<Node> for SchemaItem {
    fn from(value: Node) -> Self {
        Self::Node(value)
    }
}

/// A named collection of fields and links. The root node has no name.
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub name: Option<String>,
    items: IndexMap<String, SchemaItem>,
}

impl Node {
    pub fn new<I, T>(name: impl Into<String>, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<SchemaItem>,
    {
        Self::build(Some(name.into()), items)
    }

    pub fn root<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<SchemaItem>,
    {
        Self::build(None, items)
    }

    fn build<I, T>(name: Option<String>, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<SchemaItem>,
    {
        let items = items
            .into_iter()
            .map(|item| {
                let item = item.into();
                (item.name().to_string(), item)
            })
            .collect();
        Self { name, items }
    }

    /// Name used in messages (`__root__` for the root).
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(ROOT_NODE_NAME)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SchemaItem> {
        self.items.get(name)
    }

    /// Items in declaration order.
    pub fn items(&self) -> impl Iterator<Item = &SchemaItem> {
        self.items.values()
    }
}

// =============================================================================
// GRAPH
// =============================================================================

/// The complete schema: root node, named nodes and named data types.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    root: Node,
    nodes: BTreeMap<String, Node>,
    data_types: BTreeMap<String, FieldType>,
}

impl Graph {
    /// Build a graph. Unnamed nodes are merged into the root.
    pub fn new(nodes: impl IntoIterator<Item = Node>) -> Self {
        let mut graph = Self::default();
        for node in nodes {
            match node.name.clone() {
                Some(name) => {
                    graph.nodes.insert(name, node);
                }
                None => graph.root.items.extend(node.items),
            }
        }
        graph
    }

    /// Register a named data type referenced by `FieldType::TypeRef`.
    #[must_use]
    pub fn with_data_type(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.data_types.insert(name.into(), ty);
        self
    }

    #[must_use]
    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn node(&self, name: &str) -> Result<&Node, HikuError> {
        self.nodes
            .get(name)
            .ok_or_else(|| HikuError::UnknownNode(name.to_string()))
    }

    /// Named nodes in name order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    #[must_use]
    pub fn data_type(&self, name: &str) -> Option<&FieldType> {
        self.data_types.get(name)
    }
}

// =============================================================================
// TESTS
// =============================================================================
