//! # Query Module
//!
//! The caller-supplied request tree.
//!
//! - A `QueryNode` is an ordered list of requested items
//! - A `QueryField` asks for a leaf value
//! - A `QueryLink` asks to follow a link (or to project a complex field)
//!   and carries the nested `QueryNode`
//!
//! Queries mirror the schema shape but are validated against it only when
//! executed.

mod reader;

pub use reader::{read, read_str};

use serde_json::Value;
use std::collections::BTreeMap;

/// Options attached to a query item, keyed by option name.
pub type Options = BTreeMap<String, Value>;

/// A requested leaf value.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryField {
    /// Name of the schema field.
    pub name: String,
    /// Options supplied by the caller (resolved against the schema before
    /// the field resolver sees them).
    pub options: Option<Options>,
}

impl QueryField {
    /// Create a field request without options.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: None,
        }
    }

    /// Attach options.
    #[must_use]
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = Some(options);
        self
    }

    /// Look up a (resolved) option value.
    #[must_use]
    pub fn option(&self, name: &str) -> Option<&Value> {
        self.options.as_ref().and_then(|o| o.get(name))
    }
}

/// A request to follow a link into a nested query node.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryLink {
    /// Name of the schema link (or complex field).
    pub name: String,
    /// Sub-query evaluated against the link target.
    pub node: QueryNode,
    /// Options supplied by the caller.
    pub options: Option<Options>,
}

impl QueryLink {
    /// Create a link request without options.
    #[must_use]
    pub fn new(name: impl Into<String>, node: QueryNode) -> Self {
        Self {
            name: name.into(),
            node,
            options: None,
        }
    }

    /// Attach options.
    #[must_use]
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = Some(options);
        self
    }
}

/// One entry of a query node.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryItem {
    Field(QueryField),
    Link(QueryLink),
}

impl QueryItem {
    /// Shorthand for a plain field request.
    #[must_use]
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(QueryField::new(name))
    }

    /// Shorthand for a link request.
    #[must_use]
    pub fn link(name: impl Into<String>, node: QueryNode) -> Self {
        Self::Link(QueryLink::new(name, node))
    }

    /// Name of the requested schema item.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Field(f) => &f.name,
            Self::Link(l) => &l.name,
        }
    }

    /// Options supplied by the caller.
    #[must_use]
    pub fn options(&self) -> Option<&Options> {
        match self {
            Self::Field(f) => f.options.as_ref(),
            Self::Link(l) => l.options.as_ref(),
        }
    }
}

impl From<QueryField> for QueryItem {
    fn from(value: QueryField) -> Self {
        Self::Field(value)
    }
}

impl From<QueryLink> for QueryItem {
    fn from(value: QueryLink) -> Self {
        Self::Link(value)
    }
}

/// An ordered set of requested items for one schema node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryNode {
    /// Requested items, in request order.
    pub items: Vec<QueryItem>,
}

impl QueryNode {
    /// Create a query node from items.
    #[must_use]
    pub fn new(items: impl IntoIterator<Item = QueryItem>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }

    /// Create a query node requesting plain fields only.
    #[must_use]
    pub fn fields<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(names.into_iter().map(QueryItem::field))
    }

    /// Find a requested item by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&QueryItem> {
        self.items.iter().find(|i| i.name() == name)
    }

    /// Merge several query nodes into one.
    ///
    /// Fields are de-duplicated by name (first occurrence wins, including its
    /// options). Links with the same name are merged recursively. Item order
    /// follows first occurrence.
    #[must_use]
    pub fn merge<'a>(nodes: impl IntoIterator<Item = &'a QueryNode>) -> QueryNode {
        let mut order: Vec<String> = Vec::new();
        let mut fields: BTreeMap<String, QueryField> = BTreeMap::new();
        let mut links: BTreeMap<String, (Option<Options>, Vec<&'a QueryNode>)> = BTreeMap::new();

        for node in nodes {
            for item in &node.items {
                match item {
                    QueryItem::Field(f) => {
                        if !fields.contains_key(&f.name) && !links.contains_key(&f.name) {
                            order.push(f.name.clone());
                            fields.insert(f.name.clone(), f.clone());
                        }
                    }
                    QueryItem::Link(l) => {
                        if fields.contains_key(&l.name) {
                            continue;
                        }
                        let entry = links.entry(l.name.clone()).or_insert_with(|| {
                            order.push(l.name.clone());
                            (l.options.clone(), Vec::new())
                        });
                        entry.1.push(&l.node);
                    }
                }
            }
        }

        let items = order
            .into_iter()
            .filter_map(|name| {
                if let Some(field) = fields.remove(&name) {
                    return Some(QueryItem::Field(field));
                }
                links.remove(&name).map(|(options, nodes)| {
                    QueryItem::Link(QueryLink {
                        name,
                        node: QueryNode::merge(nodes),
                        options,
                    })
                })
            })
            .collect();

        QueryNode { items }
    }
}

// =============================================================================
// TESTS
// =============================================================================
