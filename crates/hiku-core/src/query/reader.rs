//! JSON query reader.
//!
//! ```text
//! ["title",                                   field
//!  {"items": ["name", "price"]},              link with sub-query
//!  {"avatar": {"options": {"size": 64}}},     field with options
//!  {"friends": {"options": {"limit": 5},
//!               "fields": ["name"]}}]         link with options
//! ```

use super::{Options, QueryField, QueryItem, QueryLink, QueryNode};
use crate::HikuError;
use serde_json::{Map, Value};

/// Parse a query document from a JSON string.
pub fn read_str(input: &str) -> Result<QueryNode, HikuError> {
    let value: Value = serde_json::from_str(input)
        .map_err(|e| HikuError::InvalidQuery(format!("not valid JSON: {}", e)))?;
    read(&value)
}

/// Parse a query document from a JSON value.
pub fn read(value: &Value) -> Result<QueryNode, HikuError> {
    let Value::Array(items) = value else {
        return Err(HikuError::InvalidQuery(format!(
            "query node must be a list, got {}",
            value
        )));
    };

    let mut node = QueryNode::default();
    for item in items {
        match item {
            Value::String(name) => node.items.push(QueryItem::field(name.as_str())),
            Value::Object(map) => {
                for (name, spec) in map {
                    node.items.push(read_item(name, spec)?);
                }
            }
            other => {
                return Err(HikuError::InvalidQuery(format!(
                    "unexpected query item {}",
                    other
                )));
            }
        }
    }
    Ok(node)
}

fn read_item(name: &str, spec: &Value) -> Result<QueryItem, HikuError> {
    match spec {
        Value::Array(_) => Ok(QueryItem::link(name, read(spec)?)),
        Value::Object(map) => {
            let options = read_options(name, map)?;
            match map.get("fields") {
                Some(fields) => {
                    let mut link = QueryLink::new(name, read(fields)?);
                    link.options = options;
                    Ok(link.into())
                }
                None => {
                    let mut field = QueryField::new(name);
                    field.options = options;
                    Ok(field.into())
                }
            }
        }
        other => Err(HikuError::InvalidQuery(format!(
            "item {:?} must map to a list or an object, got {}",
            name, other
        ))),
    }
}

fn read_options(name: &str, map: &Map<String, Value>) -> Result<Option<Options>, HikuError> {
    if let Some(key) = map.keys().find(|k| *k != "options" && *k != "fields") {
        return Err(HikuError::InvalidQuery(format!(
            "unknown key {:?} in item {:?}",
            key, name
        )));
    }
    match map.get("options") {
        None => Ok(None),
        Some(Value::Object(options)) => Ok(Some(
            options.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        )),
        Some(other) => Err(HikuError::InvalidQuery(format!(
            "options of {:?} must be an object, got {}",
            name, other
        ))),
    }
}
