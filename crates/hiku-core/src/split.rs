//! # Pattern Splitter
//!
//! Partitions the items a query requests from one schema node into the three
//! kinds of work the driver schedules:
//!
//! - `fields`: fields to resolve, including fields implicitly required by
//!   requested links
//! - `links`: genuine links to other nodes
//! - `nodes`: inline nodes, recursed into without identities

use crate::query::{QueryField, QueryItem, QueryLink, QueryNode};
use crate::schema::{Field, Link, Node, SchemaItem};
use crate::HikuError;
use std::collections::BTreeSet;

/// Result of splitting one query node against one schema node.
#[derive(Debug, Default)]
pub struct Split<'a> {
    /// Schema field paired with the requested (or synthesized) query field.
    pub fields: Vec<(&'a Field, QueryField)>,
    /// Schema link paired with the requested query link.
    pub links: Vec<(&'a Link, &'a QueryLink)>,
    /// Inline schema node paired with its sub-query.
    pub nodes: Vec<(&'a Node, &'a QueryNode)>,
}

/// Split `query` against `node`.
///
/// Fails fast on names the node does not declare, on links requested without
/// a sub-query, and on inline nodes requested inside an identity-bearing node.
pub fn split<'a>(node: &'a Node, query: &'a QueryNode) -> Result<Split<'a>, HikuError> {
    let mut out = Split::default();

    for item in &query.items {
        let schema_item = node
            .get(item.name())
            .ok_or_else(|| HikuError::UnknownField {
                node: node.display_name().to_string(),
                name: item.name().to_string(),
            })?;

        match (schema_item, item) {
            (SchemaItem::Field(field), QueryItem::Field(query_field)) => {
                out.fields.push((field, query_field.clone()));
            }
            // complex field projected with a sub-query: resolved as a whole
            (SchemaItem::Field(field), QueryItem::Link(query_link)) => {
                let mut query_field = QueryField::new(query_link.name.as_str());
                query_field.options = query_link.options.clone();
                out.fields.push((field, query_field));
            }
            (SchemaItem::Link(link), QueryItem::Link(query_link)) => {
                out.links.push((link, query_link));
            }
            (SchemaItem::Node(inline), QueryItem::Link(query_link)) => {
                if node.name.is_some() {
                    return Err(HikuError::NestedNodeUnsupported {
                        node: node.display_name().to_string(),
                        name: query_link.name.clone(),
                    });
                }
                out.nodes.push((inline, &query_link.node));
            }
            (SchemaItem::Link(_) | SchemaItem::Node(_), QueryItem::Field(query_field)) => {
                return Err(HikuError::InvalidQuery(format!(
                    "{:?} of node {:?} must be requested with a sub-query",
                    query_field.name,
                    node.display_name()
                )));
            }
        }
    }

    let requested: BTreeSet<String> = out.fields.iter().map(|(f, _)| f.name.clone()).collect();
    let mut implied: BTreeSet<&str> = BTreeSet::new();
    for (link, _) in &out.links {
        let Some(requires) = link.requires.as_deref() else {
            continue;
        };
        if requested.contains(requires) || !implied.insert(requires) {
            continue;
        }
        match node.get(requires) {
            Some(SchemaItem::Field(field)) => {
                out.fields.push((field, QueryField::new(requires)));
            }
            _ => {
                return Err(HikuError::UnknownField {
                    node: node.display_name().to_string(),
                    name: requires.to_string(),
                });
            }
        }
    }

    Ok(out)
}

// =============================================================================
// TESTS
// =============================================================================
