//! # Denormalizer
//!
//! Rebuilds the plain, query-shaped JSON tree from a normalized `Store`.
//!
//! References are followed through the store index; complex fields are
//! projected using their declared `FieldType`. The pass never mutates the
//! store, so denormalizing twice yields equal output.

use crate::query::{QueryItem, QueryNode};
use crate::result::{Entry, Ref, Store, Stored};
use crate::schema::{FieldType, Graph, Link, Node, SchemaItem};
use crate::HikuError;
use serde_json::{Map, Value};

/// Denormalize `store` against the query that produced it.
///
/// The query is merged the same way execution merges it, so a repeated link
/// renders once with the union of its sub-queries.
pub fn denormalize(graph: &Graph, store: &Store, query: &QueryNode) -> Result<Value, HikuError> {
    let query = QueryNode::merge([query]);
    Denormalizer { graph, store }.object(graph.root(), store.root(), &query)
}

struct Denormalizer<'a> {
    graph: &'a Graph,
    store: &'a Store,
}

impl Denormalizer<'_> {
    fn object(&self, node: &Node, entry: &Entry, query: &QueryNode) -> Result<Value, HikuError> {
        let mut out = Map::new();
        for item in &query.items {
            let name = item.name();
            let schema_item = node.get(name).ok_or_else(|| HikuError::UnknownField {
                node: node.display_name().to_string(),
                name: name.to_string(),
            })?;
            let stored = entry.get(name).ok_or_else(|| {
                malformed(format!("{:?} of node {:?} is not stored", name, node.display_name()))
            })?;

            let value = match (schema_item, item, stored) {
                (SchemaItem::Field(_), QueryItem::Field(_), Stored::Value(v)) => v.clone(),
                (SchemaItem::Field(field), QueryItem::Link(sub), Stored::Value(v)) => {
                    self.project(&field.ty, v, &sub.node)?
                }
                (SchemaItem::Link(link), QueryItem::Link(sub), Stored::Links(refs)) => refs
                    .iter()
                    .map(|r| self.follow(link, r, &sub.node))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)?,
                (SchemaItem::Link(_), QueryItem::Link(_), Stored::Link(None)) => Value::Null,
                (SchemaItem::Link(link), QueryItem::Link(sub), Stored::Link(Some(r))) => {
                    self.follow(link, r, &sub.node)?
                }
                (SchemaItem::Node(inline), QueryItem::Link(sub), Stored::Node(scope)) => {
                    self.object(inline, scope, &sub.node)?
                }
                _ => {
                    return Err(malformed(format!(
                        "stored value of {:?} in node {:?} does not match the query",
                        name,
                        node.display_name()
                    )));
                }
            };
            out.insert(name.to_string(), value);
        }
        Ok(Value::Object(out))
    }

    fn follow(&self, link: &Link, reference: &Ref, query: &QueryNode) -> Result<Value, HikuError> {
        let target = self.graph.node(&link.node)?;
        match self.store.entry(reference) {
            Some(entry) => self.object(target, entry, query),
            // nothing was requested, so nothing was stored
            None if query.items.is_empty() => Ok(Value::Object(Map::new())),
            None => Err(malformed(format!("dangling reference {}", reference))),
        }
    }

    fn project(&self, ty: &FieldType, value: &Value, query: &QueryNode) -> Result<Value, HikuError> {
        match (ty, value) {
            (FieldType::Any, _) => Ok(value.clone()),
            (FieldType::Optional(_), Value::Null) => Ok(Value::Null),
            (FieldType::Optional(inner), _) => self.project(inner, value, query),
            (FieldType::Sequence(inner), Value::Array(items)) => items
                .iter()
                .map(|v| self.project(inner, v, query))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            (FieldType::Record(members), Value::Object(map)) => {
                let mut out = Map::new();
                for item in &query.items {
                    let name = item.name();
                    let member = members.get(name).ok_or_else(|| HikuError::UnknownField {
                        node: ty.to_string(),
                        name: name.to_string(),
                    })?;
                    let v = map
                        .get(name)
                        .ok_or_else(|| malformed(format!("record value has no member {:?}", name)))?;
                    let projected = match item {
                        QueryItem::Field(_) => v.clone(),
                        QueryItem::Link(sub) => self.project(member, v, &sub.node)?,
                    };
                    out.insert(name.to_string(), projected);
                }
                Ok(Value::Object(out))
            }
            (FieldType::TypeRef(name), _) => {
                let resolved = self
                    .graph
                    .data_type(name)
                    .ok_or_else(|| malformed(format!("data type {:?} is not defined", name)))?;
                self.project(resolved, value, query)
            }
            _ => Err(malformed(format!("value {} is not a {}", value, ty))),
        }
    }
}

fn malformed(message: String) -> HikuError {
    HikuError::MalformedStore(message)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, FieldFunc, FieldRows, LinkFunc, LinkValue};
    use crate::{Cardinality, Ident};
    use serde_json::json;

    fn noop_field(name: &str) -> Field {
        Field::new(name, FieldFunc::new(|_, _| Ok(FieldRows::Flat(vec![]))))
    }

    fn noop_link(name: &str, cardinality: Cardinality) -> Link {
        Link::new(
            name,
            cardinality,
            "user",
            LinkFunc::new(|_| Ok(LinkValue::Nothing)),
        )
    }

    fn graph() -> Graph {
        Graph::new([
            Node::new("user", [noop_field("name")]),
            Node::root([
                SchemaItem::from(noop_field("version")),
                SchemaItem::from(noop_link("me", Cardinality::Maybe)),
                SchemaItem::from(noop_link("users", Cardinality::Many)),
                SchemaItem::from(noop_field("point").with_type(FieldType::type_ref("Point"))),
                SchemaItem::from(noop_field("tags").with_type(FieldType::sequence(
                    FieldType::record([("label", FieldType::Any), ("weight", FieldType::Any)]),
                ))),
            ]),
        ])
        .with_data_type(
            "Point",
            FieldType::optional(FieldType::record([("x", FieldType::Any), ("y", FieldType::Any)])),
        )
    }

    fn user(store: &mut Store, g: &Graph, id: i64, name: &str) {
        store
            .store_fields(
                g.node("user").expect("user"),
                &["name".to_string()],
                Some(&[Ident::Int(id)]),
                FieldRows::Rows(vec![vec![json!(name)]]),
            )
            .expect("store");
    }

    #[test]
    fn links_and_fields() {
        let g = graph();
        let mut store = Store::new();
        let root = g.root();
        store
            .store_fields(root, &["version".to_string()], None, FieldRows::Flat(vec![json!(3)]))
            .expect("store");
        let users = match root.get("users") {
            Some(SchemaItem::Link(l)) => l,
            _ => unreachable!(),
        };
        store
            .store_links(root, users, None, &LinkValue::ids([1, 2]))
            .expect("links");
        let me = match root.get("me") {
            Some(SchemaItem::Link(l)) => l,
            _ => unreachable!(),
        };
        store
            .store_links(root, me, None, &LinkValue::Nothing)
            .expect("links");
        user(&mut store, &g, 1, "ann");
        user(&mut store, &g, 2, "bob");

        let query = QueryNode::new([
            QueryItem::field("version"),
            QueryItem::link("users", QueryNode::fields(["name"])),
            QueryItem::link("me", QueryNode::fields(["name"])),
        ]);
        let value = denormalize(&g, &store, &query).expect("denormalize");
        assert_eq!(
            value,
            json!({"version": 3, "users": [{"name": "ann"}, {"name": "bob"}], "me": null})
        );
        assert_eq!(denormalize(&g, &store, &query).expect("again"), value);
    }

    #[test]
    fn complex_fields_are_projected() {
        let g = graph();
        let mut store = Store::new();
        store
            .store_fields(
                g.root(),
                &["point".to_string(), "tags".to_string()],
                None,
                FieldRows::Flat(vec![
                    json!({"x": 1, "y": 2}),
                    json!([{"label": "a", "weight": 1}, {"label": "b", "weight": 2}]),
                ]),
            )
            .expect("store");

        let query = QueryNode::new([
            QueryItem::link("point", QueryNode::fields(["y"])),
            QueryItem::link("tags", QueryNode::fields(["label"])),
        ]);
        let value = denormalize(&g, &store, &query).expect("denormalize");
        assert_eq!(
            value,
            json!({"point": {"y": 2}, "tags": [{"label": "a"}, {"label": "b"}]})
        );
    }

    #[test]
    fn repeated_link_renders_merged() {
        let g = graph();
        let mut store = Store::new();
        let root = g.root();
        let users = match root.get("users") {
            Some(SchemaItem::Link(l)) => l,
            _ => unreachable!(),
        };
        store
            .store_links(root, users, None, &LinkValue::ids([1]))
            .expect("links");
        user(&mut store, &g, 1, "ann");
        store
            .store_fields(root, &["version".to_string()], None, FieldRows::Flat(vec![json!(3)]))
            .expect("store");

        let query = QueryNode::new([
            QueryItem::link("users", QueryNode::fields(["name"])),
            QueryItem::field("version"),
            QueryItem::link("users", QueryNode::default()),
        ]);
        assert_eq!(
            denormalize(&g, &store, &query).expect("denormalize"),
            json!({"users": [{"name": "ann"}], "version": 3})
        );
    }

    #[test]
    fn empty_inline_node_is_empty_object() {
        let g = Graph::new([Node::root([SchemaItem::from(Node::new(
            "status",
            [noop_field("up")],
        ))])]);
        let status = match g.root().get("status") {
            Some(SchemaItem::Node(n)) => n,
            _ => unreachable!(),
        };
        let mut store = Store::new();
        store.open_scope(status).expect("scope");
        let query = QueryNode::new([QueryItem::link("status", QueryNode::default())]);
        assert_eq!(
            denormalize(&g, &store, &query).expect("denormalize"),
            json!({"status": {}})
        );
    }

    #[test]
    fn optional_type_passes_null() {
        let g = graph();
        let mut store = Store::new();
        store
            .store_fields(g.root(), &["point".to_string()], None, FieldRows::Flat(vec![json!(null)]))
            .expect("store");
        let query = QueryNode::new([QueryItem::link("point", QueryNode::fields(["x"]))]);
        assert_eq!(
            denormalize(&g, &store, &query).expect("denormalize"),
            json!({"point": null})
        );
    }

    #[test]
    fn missing_value_is_malformed() {
        let g = graph();
        let store = Store::new();
        let query = QueryNode::fields(["version"]);
        assert!(matches!(
            denormalize(&g, &store, &query),
            Err(HikuError::MalformedStore(_))
        ));
    }

    #[test]
    fn dangling_reference_is_malformed() {
        let g = graph();
        let mut store = Store::new();
        let root = g.root();
        let users = match root.get("users") {
            Some(SchemaItem::Link(l)) => l,
            _ => unreachable!(),
        };
        store
            .store_links(root, users, None, &LinkValue::ids([9]))
            .expect("links");
        let query = QueryNode::new([QueryItem::link("users", QueryNode::fields(["name"]))]);
        assert!(matches!(
            denormalize(&g, &store, &query),
            Err(HikuError::MalformedStore(ref m)) if m.contains("user[9]")
        ));
    }
}
