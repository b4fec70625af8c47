//! # Dataset
//!
//! A JSON document of records and links, exposed as a hiku graph.
//!
//! ```json
//! {
//!   "root": {
//!     "fields": {"version": "1.0"},
//!     "links": {"items": {"node": "item", "cardinality": "many", "targets": [1, 2]}}
//!   },
//!   "nodes": {
//!     "item": {
//!       "records": {"1": {"name": "lamp", "owner_id": 10}},
//!       "links": {"owner": {"node": "user", "cardinality": "one", "requires": "owner_id"}}
//!     },
//!     "user": {"records": {"10": {"name": "ann"}}}
//!   }
//! }
//! ```
//!
//! Every node gets one field per record key (plus `id` when no record
//! defines it), all served by a single batched resolver. A link with
//! `requires` maps the required field's value to target identities; a link
//! without it always answers its fixed `targets`.

use hiku_core::{
    BoxError, Cardinality, Field, FieldFunc, FieldRows, Graph, HikuError, Ident, Link, LinkFunc,
    LinkValue, Node, Requires, SchemaItem,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

/// Maximum dataset file size (100 MB).
///
/// This prevents memory exhaustion from accidental large files.
pub const MAX_DATASET_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Field every node exposes for the identity of its records.
pub const ID_FIELD: &str = "id";

// =============================================================================
// DOCUMENT
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Dataset {
    #[serde(default)]
    pub root: RootSpec,
    #[serde(default)]
    pub nodes: BTreeMap<String, NodeSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RootSpec {
    pub fields: Map<String, Value>,
    pub links: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeSpec {
    /// Identity -> record object. Integer-looking keys become integer identities.
    pub records: Map<String, Value>,
    pub links: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkSpec {
    pub node: String,
    pub cardinality: Cardinality,
    #[serde(default)]
    pub requires: Option<String>,
    #[serde(default)]
    pub targets: Value,
}

type Records = BTreeMap<Ident, Map<String, Value>>;

impl Dataset {
    pub fn from_json(input: &str) -> Result<Self, HikuError> {
        serde_json::from_str(input)
            .map_err(|e| HikuError::SerializationError(format!("Invalid dataset: {}", e)))
    }

    /// Read and parse a dataset file.
    pub fn load(path: &Path) -> Result<Self, HikuError> {
        let metadata = std::fs::metadata(path)
            .map_err(|e| HikuError::IoError(format!("Cannot read file metadata: {}", e)))?;
        if metadata.len() > MAX_DATASET_FILE_SIZE {
            return Err(HikuError::SerializationError(format!(
                "File size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_DATASET_FILE_SIZE
            )));
        }
        let contents = std::fs::read_to_string(path).map_err(|e| {
            HikuError::IoError(format!("Cannot read dataset '{}': {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }

    /// Build the graph serving this dataset.
    ///
    /// Links must point at declared nodes and `requires` must name a field
    /// of the declaring node.
    pub fn into_graph(self) -> Result<Graph, HikuError> {
        let declared: BTreeSet<String> = self.nodes.keys().cloned().collect();
        let mut nodes = Vec::with_capacity(self.nodes.len() + 1);

        for (name, spec) in self.nodes {
            nodes.push(build_node(name, spec, &declared)?);
        }
        nodes.push(build_root(self.root, &declared)?);

        tracing::debug!(nodes = declared.len(), "dataset graph built");
        Ok(Graph::new(nodes))
    }
}

// =============================================================================
// GRAPH CONSTRUCTION
// =============================================================================

fn build_root(spec: RootSpec, declared: &BTreeSet<String>) -> Result<Node, HikuError> {
    let names: Vec<String> = spec.fields.keys().cloned().collect();
    let values = Arc::new(spec.fields);
    let func = FieldFunc::new(move |fields, _| {
        Ok(FieldRows::flat(fields.iter().map(|f| {
            values.get(&f.name).cloned().unwrap_or(Value::Null)
        })))
    });

    let mut items: Vec<SchemaItem> = names
        .into_iter()
        .map(|name| Field::new(name, func.clone()).into())
        .collect();
    for (name, raw) in spec.links {
        let link = parse_link(None, &name, raw, declared)?;
        if let Some(requires) = &link.requires {
            return Err(invalid(format!(
                "root link {:?} cannot require {:?}",
                name, requires
            )));
        }
        items.push(static_link(None, name, link)?.into());
    }
    Ok(Node::root(items))
}

fn build_node(
    name: String,
    spec: NodeSpec,
    declared: &BTreeSet<String>,
) -> Result<Node, HikuError> {
    let records = parse_records(&name, spec.records)?;

    let mut field_names: Vec<String> = Vec::new();
    for record in records.values() {
        for key in record.keys() {
            if !field_names.contains(key) {
                field_names.push(key.clone());
            }
        }
    }
    if !field_names.iter().any(|f| f == ID_FIELD) {
        field_names.insert(0, ID_FIELD.to_string());
    }

    let func = record_fields(name.clone(), records);
    let mut items: Vec<SchemaItem> = field_names
        .iter()
        .map(|f| Field::new(f.clone(), func.clone()).into())
        .collect();

    for (link_name, raw) in spec.links {
        let link = parse_link(Some(&name), &link_name, raw, declared)?;
        let item = match link.requires.clone() {
            Some(requires) => {
                if !field_names.contains(&requires) {
                    return Err(invalid(format!(
                        "link {:?} of node {:?} requires unknown field {:?}",
                        link_name, name, requires
                    )));
                }
                mapped_link(link_name, link, requires)
            }
            None => static_link(Some(&name), link_name, link)?,
        };
        items.push(item.into());
    }
    Ok(Node::new(name, items))
}

fn parse_records(node: &str, raw: Map<String, Value>) -> Result<Records, HikuError> {
    raw.into_iter()
        .map(|(key, value)| {
            let ident = key.parse::<Ident>().unwrap_or_else(|never| match never {});
            match value {
                Value::Object(record) => Ok((ident, record)),
                other => Err(invalid(format!(
                    "record {} of node {:?} is not an object: {}",
                    key, node, other
                ))),
            }
        })
        .collect()
}

fn parse_link(
    node: Option<&str>,
    name: &str,
    raw: Value,
    declared: &BTreeSet<String>,
) -> Result<LinkSpec, HikuError> {
    let owner = node.unwrap_or(hiku_core::primitives::ROOT_NODE_NAME);
    let spec: LinkSpec = serde_json::from_value(raw).map_err(|e| {
        invalid(format!("link {:?} of node {:?}: {}", name, owner, e))
    })?;
    if !declared.contains(&spec.node) {
        return Err(invalid(format!(
            "link {:?} of node {:?} points to undeclared node {:?}",
            name, owner, spec.node
        )));
    }
    Ok(spec)
}

/// One resolver for all fields of a node: looks up every requested id.
fn record_fields(node: String, records: Records) -> FieldFunc {
    FieldFunc::new(move |fields, ids| {
        let ids = ids.ok_or_else(|| format!("node {:?} queried without identities", node))?;
        let mut rows = Vec::with_capacity(ids.len());
        for id in ids {
            let record = records
                .get(id)
                .ok_or_else(|| format!("node {:?} has no record {}", node, id))?;
            rows.push(
                fields
                    .iter()
                    .map(|f| match record.get(&f.name) {
                        Some(v) => v.clone(),
                        None if f.name == ID_FIELD => id.to_value(),
                        None => Value::Null,
                    })
                    .collect(),
            );
        }
        Ok(FieldRows::Rows(rows))
    })
}

/// Link answering its fixed targets, once per call or once per id.
fn static_link(node: Option<&str>, name: String, spec: LinkSpec) -> Result<Link, HikuError> {
    let value = link_value(spec.cardinality, &spec.targets).map_err(|e| {
        invalid(format!(
            "targets of link {:?} in node {:?}: {}",
            name,
            node.unwrap_or(hiku_core::primitives::ROOT_NODE_NAME),
            e
        ))
    })?;
    Ok(Link::new(
        name,
        spec.cardinality,
        spec.node,
        LinkFunc::new(move |_| Ok(value.clone())),
    ))
}

/// Link whose targets are the values of the required field.
fn mapped_link(name: String, spec: LinkSpec, requires: String) -> Link {
    let cardinality = spec.cardinality;
    Link::new(
        name,
        cardinality,
        spec.node,
        LinkFunc::new(move |args| match &args.requires {
            Requires::Batch(values) => values
                .iter()
                .map(|v| link_value(cardinality, v))
                .collect::<Result<Vec<_>, _>>()
                .map(LinkValue::batch),
            Requires::Single(v) => link_value(cardinality, v),
            Requires::None => Err("link called without its required value".into()),
        }),
    )
    .requires(requires)
}

/// `null` is Nothing (or an empty list for Many); scalars are identities.
fn link_value(cardinality: Cardinality, value: &Value) -> Result<LinkValue, BoxError> {
    match (cardinality, value) {
        (Cardinality::Many, Value::Null) => Ok(LinkValue::List(Vec::new())),
        (Cardinality::Many, Value::Array(items)) => items
            .iter()
            .map(to_ident)
            .collect::<Result<Vec<_>, _>>()
            .map(LinkValue::ids),
        (Cardinality::Many, other) => {
            Err(format!("expected a list of identities, got {}", other).into())
        }
        (Cardinality::Maybe | Cardinality::One, Value::Null) => Ok(LinkValue::Nothing),
        (Cardinality::Maybe | Cardinality::One, other) => to_ident(other).map(LinkValue::Ident),
    }
}

fn to_ident(value: &Value) -> Result<Ident, BoxError> {
    Ident::from_value(value).ok_or_else(|| format!("{} is not an identity", value).into())
}

fn invalid(message: String) -> HikuError {
    HikuError::SerializationError(format!("Invalid dataset: {}", message))
}

// =============================================================================
// SCHEMA DESCRIPTION
// =============================================================================

/// Describe a graph's nodes, fields and links as JSON.
pub fn describe(graph: &Graph) -> Value {
    let mut out = Map::new();
    out.insert(
        graph.root().display_name().to_string(),
        describe_node(graph.root()),
    );
    for node in graph.nodes() {
        out.insert(node.display_name().to_string(), describe_node(node));
    }
    Value::Object(out)
}

fn describe_node(node: &Node) -> Value {
    let mut fields = Vec::new();
    let mut links = Map::new();
    for item in node.items() {
        match item {
            SchemaItem::Field(f) => fields.push(Value::from(f.name.as_str())),
            SchemaItem::Link(l) => {
                let mut link = Map::new();
                link.insert("node".to_string(), Value::from(l.node.as_str()));
                link.insert(
                    "cardinality".to_string(),
                    Value::from(l.cardinality.to_string().to_lowercase()),
                );
                if let Some(requires) = &l.requires {
                    link.insert("requires".to_string(), Value::from(requires.as_str()));
                }
                links.insert(l.name.clone(), Value::Object(link));
            }
            SchemaItem::Node(inline) => {
                links.insert(inline.display_name().to_string(), describe_node(inline));
            }
        }
    }
    serde_json::json!({"fields": fields, "links": links})
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use hiku_core::{Context, Engine, SyncExecutor, denormalize, query::read_str};
    use serde_json::json;

    fn shop() -> Dataset {
        Dataset::from_json(
            &json!({
                "root": {
                    "fields": {"version": "1.0"},
                    "links": {
                        "items": {"node": "item", "cardinality": "many", "targets": [1, 2]},
                        "featured": {"node": "item", "cardinality": "maybe", "targets": null}
                    }
                },
                "nodes": {
                    "item": {
                        "records": {
                            "1": {"name": "lamp", "owner_id": "ann", "tag_ids": [7]},
                            "2": {"name": "desk", "owner_id": null, "tag_ids": []}
                        },
                        "links": {
                            "owner": {"node": "user", "cardinality": "maybe", "requires": "owner_id"},
                            "tags": {"node": "tag", "cardinality": "many", "requires": "tag_ids"}
                        }
                    },
                    "user": {"records": {"ann": {"name": "Ann"}}},
                    "tag": {"records": {"7": {"label": "wood"}}}
                }
            })
            .to_string(),
        )
        .expect("dataset")
    }

    fn run(dataset: Dataset, query: &str) -> Result<Value, HikuError> {
        let graph = dataset.into_graph()?;
        let query = read_str(query)?;
        let store = Engine::new(SyncExecutor).execute(&graph, &query, Context::new())?;
        denormalize(&graph, &store, &query)
    }

    #[test]
    fn resolves_records_through_links() {
        let value = run(
            shop(),
            r#"["version", {"items": ["id", "name", {"owner": ["name"]}, {"tags": ["label"]}]}, {"featured": ["name"]}]"#,
        )
        .expect("run");
        assert_eq!(
            value,
            json!({
                "version": "1.0",
                "items": [
                    {"id": 1, "name": "lamp", "owner": {"name": "Ann"}, "tags": [{"label": "wood"}]},
                    {"id": 2, "name": "desk", "owner": null, "tags": []}
                ],
                "featured": null
            })
        );
    }

    #[test]
    fn missing_record_is_resolver_error() {
        let mut dataset = shop();
        dataset.root.links.insert(
            "ghost".to_string(),
            json!({"node": "user", "cardinality": "one", "targets": "bob"}),
        );
        let err = run(dataset, r#"[{"ghost": ["name"]}]"#);
        assert!(matches!(err, Err(HikuError::Resolver(ref e)) if e.to_string().contains("bob")));
    }

    #[test]
    fn link_to_undeclared_node_is_rejected() {
        let mut dataset = shop();
        dataset.root.links.insert(
            "nowhere".to_string(),
            json!({"node": "planet", "cardinality": "many", "targets": []}),
        );
        assert!(matches!(
            dataset.into_graph(),
            Err(HikuError::SerializationError(ref m)) if m.contains("planet")
        ));
    }

    #[test]
    fn requires_must_name_a_field() {
        let mut dataset = shop();
        if let Some(item) = dataset.nodes.get_mut("item") {
            item.links.insert(
                "maker".to_string(),
                json!({"node": "user", "cardinality": "one", "requires": "maker_id"}),
            );
        }
        assert!(matches!(
            dataset.into_graph(),
            Err(HikuError::SerializationError(ref m)) if m.contains("maker_id")
        ));
    }

    #[test]
    fn bad_static_targets_are_rejected() {
        let mut dataset = shop();
        dataset.root.links.insert(
            "odd".to_string(),
            json!({"node": "item", "cardinality": "many", "targets": 5}),
        );
        assert!(dataset.into_graph().is_err());
    }

    #[test]
    fn non_object_record_is_rejected() {
        let dataset =
            Dataset::from_json(r#"{"nodes": {"user": {"records": {"1": 42}}}}"#).expect("parse");
        assert!(matches!(
            dataset.into_graph(),
            Err(HikuError::SerializationError(_))
        ));
    }

    #[test]
    fn describe_lists_fields_and_links() {
        let graph = shop().into_graph().expect("graph");
        let schema = describe(&graph);
        assert_eq!(schema["user"]["fields"], json!(["id", "name"]));
        assert_eq!(
            schema["item"]["links"]["owner"],
            json!({"node": "user", "cardinality": "maybe", "requires": "owner_id"})
        );
        assert_eq!(
            schema["__root__"]["links"]["items"],
            json!({"node": "item", "cardinality": "many"})
        );
        assert_eq!(schema["__root__"]["fields"], json!(["version"]));
    }
}
