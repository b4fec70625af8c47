//! # Result Store
//!
//! The normalized, graph-shaped output of one query execution.
//!
//! - `root`: values resolved without identities (root fields and links, and
//!   nested scopes for inline nodes)
//! - `index`: node name -> identity -> field/link name -> value
//!
//! Links are never stored as raw identities: they become `Ref`s, which are
//! pure locators dereferenced through the index at read time. Every write is
//! shape-checked against what the driver asked the resolver for.
//!
//! Each (node, identity, name) slot is written once. Two paths of a query
//! may reach the same slot; the second write must carry the same value, and
//! a differing one is rejected as `MalformedStore`.

use crate::schema::{FieldRows, Link, LinkValue, Node, Requires};
use crate::{Cardinality, HikuError, Ident};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

// =============================================================================
// REFERENCES
// =============================================================================

/// Locator of one node instance in the index.
///
/// Constructing a `Ref` never checks that the instance exists; the driver
/// guarantees that every referenced instance is written before the store is
/// handed out.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ref {
    pub node: Arc<str>,
    pub ident: Ident,
}

impl Ref {
    pub fn new(node: impl Into<Arc<str>>, ident: Ident) -> Self {
        Self {
            node: node.into(),
            ident,
        }
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.node, self.ident)
    }
}

// =============================================================================
// STORED VALUES
// =============================================================================

/// Field/link name -> stored value, for one node instance or scope.
pub type Entry = BTreeMap<String, Stored>;

/// A value held by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Stored {
    /// Resolved field value.
    Value(Value),
    /// Maybe/One link; `None` when a Maybe link resolved to nothing.
    Link(Option<Ref>),
    /// Many link.
    Links(Vec<Ref>),
    /// Scope of an inline node.
    Node(Entry),
}

impl Stored {
    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// Read-only view through a `Ref`.
#[derive(Debug, Clone, Copy)]
pub struct RefView<'a> {
    store: &'a Store,
    reference: &'a Ref,
}

impl<'a> RefView<'a> {
    /// Look up `key` on the referenced instance.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&'a Stored> {
        self.store
            .index
            .get(&*self.reference.node)
            .and_then(|idx| idx.get(&self.reference.ident))
            .and_then(|entry| entry.get(key))
    }

    #[must_use]
    pub fn entry(&self) -> Option<&'a Entry> {
        self.store.entry(self.reference)
    }
}

// =============================================================================
// STORE
// =============================================================================

/// Normalized query result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Store {
    root: Entry,
    index: BTreeMap<String, BTreeMap<Ident, Entry>>,
}

impl Store {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn root(&self) -> &Entry {
        &self.root
    }

    #[must_use]
    pub fn index(&self) -> &BTreeMap<String, BTreeMap<Ident, Entry>> {
        &self.index
    }

    /// Build a reference to `node[ident]`, without an existence check.
    #[must_use]
    pub fn reference(node: &str, ident: Ident) -> Ref {
        Ref::new(node, ident)
    }

    #[must_use]
    pub fn view<'a>(&'a self, reference: &'a Ref) -> RefView<'a> {
        RefView {
            store: self,
            reference,
        }
    }

    /// Instance entry a reference points to.
    #[must_use]
    pub fn entry(&self, reference: &Ref) -> Option<&Entry> {
        self.index
            .get(&*reference.node)
            .and_then(|idx| idx.get(&reference.ident))
    }

    /// Scope holding identity-less values of `node` (root or inline node).
    fn scope(&self, node: &Node) -> Option<&Entry> {
        match &node.name {
            None => Some(&self.root),
            Some(name) => match self.root.get(name) {
                Some(Stored::Node(entry)) => Some(entry),
                _ => None,
            },
        }
    }

    fn scope_mut(&mut self, node: &Node) -> Result<&mut Entry, HikuError> {
        let Some(name) = &node.name else {
            return Ok(&mut self.root);
        };
        match self
            .root
            .entry(name.clone())
            .or_insert_with(|| Stored::Node(Entry::new()))
        {
            Stored::Node(entry) => Ok(entry),
            _ => Err(HikuError::MalformedStore(format!(
                "root value {:?} is not an inline node scope",
                name
            ))),
        }
    }

    /// Create the scope of an inline node, so that it exists even when
    /// nothing is resolved in it.
    pub(crate) fn open_scope(&mut self, node: &Node) -> Result<(), HikuError> {
        self.scope_mut(node).map(|_| ())
    }

    /// Reject a write that would change an already stored value.
    fn check_write(
        &self,
        node: &Node,
        ident: Option<&Ident>,
        name: &str,
        value: &Stored,
    ) -> Result<(), HikuError> {
        let current = match ident {
            Some(ident) => node
                .name
                .as_deref()
                .and_then(|n| self.index.get(n))
                .and_then(|idx| idx.get(ident))
                .and_then(|entry| entry.get(name)),
            None => self.scope(node).and_then(|scope| scope.get(name)),
        };
        match current {
            Some(existing) if existing != value => {
                let location = match ident {
                    Some(ident) => format!("{}[{}]", node.display_name(), ident),
                    None => node.display_name().to_string(),
                };
                Err(HikuError::MalformedStore(format!(
                    "conflicting write of {:?} in {}: {:?} then {:?}",
                    name, location, existing, value
                )))
            }
            _ => Ok(()),
        }
    }

    fn node_index(&mut self, node: &Node) -> Result<&mut BTreeMap<Ident, Entry>, HikuError> {
        let name = node.name.as_ref().ok_or_else(|| {
            HikuError::MalformedStore("root node resolved with identities".to_string())
        })?;
        Ok(self.index.entry(name.clone()).or_default())
    }

    /// Store field values resolved for `names`.
    ///
    /// With identities, `rows` must hold one row per identity and one value
    /// per name in each row; without, one value per name.
    pub fn store_fields(
        &mut self,
        node: &Node,
        names: &[String],
        ids: Option<&[Ident]>,
        rows: FieldRows,
    ) -> Result<(), HikuError> {
        let violation = |expected: String, returned: &FieldRows| HikuError::ShapeViolation {
            node: node.display_name().to_string(),
            kind: "field",
            names: names.to_vec(),
            expected,
            returned: format!("{:?}", returned),
        };

        match (ids, rows) {
            (Some(ids), FieldRows::Rows(rows))
                if rows.len() == ids.len() && rows.iter().all(|r| r.len() == names.len()) =>
            {
                let rows: Vec<Vec<Stored>> = rows
                    .into_iter()
                    .map(|row| row.into_iter().map(Stored::Value).collect())
                    .collect();
                for (ident, row) in ids.iter().zip(&rows) {
                    for (name, value) in names.iter().zip(row) {
                        self.check_write(node, Some(ident), name, value)?;
                    }
                }
                let node_idx = self.node_index(node)?;
                for (ident, row) in ids.iter().zip(rows) {
                    let entry = node_idx.entry(ident.clone()).or_default();
                    for (name, value) in names.iter().zip(row) {
                        entry.insert(name.clone(), value);
                    }
                }
                Ok(())
            }
            (Some(ids), rows) => Err(violation(
                format!("list (len: {}) of lists (len: {})", ids.len(), names.len()),
                &rows,
            )),
            (None, FieldRows::Flat(values)) if values.len() == names.len() => {
                let values: Vec<Stored> = values.into_iter().map(Stored::Value).collect();
                for (name, value) in names.iter().zip(&values) {
                    self.check_write(node, None, name, value)?;
                }
                let scope = self.scope_mut(node)?;
                for (name, value) in names.iter().zip(values) {
                    scope.insert(name.clone(), value);
                }
                Ok(())
            }
            (None, rows) => Err(violation(format!("list (len: {})", names.len()), &rows)),
        }
    }

    /// Store a resolved link as references.
    ///
    /// The call is batched (one answer per identity) only when identities are
    /// present and the link requires a field; otherwise the single answer is
    /// shared by every identity. The whole answer is validated before anything
    /// is written.
    pub fn store_links(
        &mut self,
        node: &Node,
        link: &Link,
        ids: Option<&[Ident]>,
        value: &LinkValue,
    ) -> Result<(), HikuError> {
        match ids {
            Some(ids) if link.requires.is_some() => {
                let items = match value {
                    LinkValue::List(items) if items.len() == ids.len() => items,
                    _ => {
                        let expected = match link.cardinality {
                            Cardinality::Many => format!("list (len: {}) of lists", ids.len()),
                            _ => format!("list (len: {})", ids.len()),
                        };
                        return Err(link_violation(node, link, expected, value));
                    }
                };
                let stored = items
                    .iter()
                    .map(|item| to_stored(node, link, item))
                    .collect::<Result<Vec<_>, _>>()?;
                for (ident, stored) in ids.iter().zip(&stored) {
                    self.check_write(node, Some(ident), &link.name, stored)?;
                }
                let node_idx = self.node_index(node)?;
                for (ident, stored) in ids.iter().zip(stored) {
                    node_idx
                        .entry(ident.clone())
                        .or_default()
                        .insert(link.name.clone(), stored);
                }
            }
            Some(ids) => {
                let stored = to_stored(node, link, value)?;
                for ident in ids {
                    self.check_write(node, Some(ident), &link.name, &stored)?;
                }
                let node_idx = self.node_index(node)?;
                for ident in ids {
                    node_idx
                        .entry(ident.clone())
                        .or_default()
                        .insert(link.name.clone(), stored.clone());
                }
            }
            None => {
                let stored = to_stored(node, link, value)?;
                self.check_write(node, None, &link.name, &stored)?;
                self.scope_mut(node)?.insert(link.name.clone(), stored);
            }
        }
        Ok(())
    }

    /// Read back the values of the field `link` requires.
    pub fn link_reqs(
        &self,
        node: &Node,
        link: &Link,
        ids: Option<&[Ident]>,
    ) -> Result<Requires, HikuError> {
        let Some(requires) = link.requires.as_deref() else {
            return Ok(Requires::None);
        };
        let missing = || {
            HikuError::MalformedStore(format!(
                "field {:?} required by link {:?} of node {:?} is not stored",
                requires,
                link.name,
                node.display_name()
            ))
        };

        match ids {
            Some(ids) => {
                let name = node.name.as_deref().ok_or_else(missing)?;
                let node_idx = self.index.get(name).ok_or_else(missing)?;
                ids.iter()
                    .map(|ident| {
                        node_idx
                            .get(ident)
                            .and_then(|entry| entry.get(requires))
                            .and_then(Stored::as_value)
                            .cloned()
                            .ok_or_else(missing)
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Requires::Batch)
            }
            None => self
                .scope(node)
                .and_then(|scope| scope.get(requires))
                .and_then(Stored::as_value)
                .cloned()
                .map(Requires::Single)
                .ok_or_else(missing),
        }
    }
}

// =============================================================================
// JSON RENDERING
// =============================================================================

impl Store {
    /// Render the normalized result as `{"root": {..}, "index": {node: {id: {..}}}}`.
    ///
    /// References render as `{"node": .., "id": ..}`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let index: Map<String, Value> = self
            .index
            .iter()
            .map(|(node, entries)| {
                let entries = entries
                    .iter()
                    .map(|(ident, entry)| (ident_key(ident), entry_json(entry)))
                    .collect();
                (node.clone(), Value::Object(entries))
            })
            .collect();
        json!({"root": entry_json(&self.root), "index": index})
    }
}

fn ident_key(ident: &Ident) -> String {
    match ident {
        Ident::Int(i) => i.to_string(),
        Ident::Str(s) => s.clone(),
    }
}

fn entry_json(entry: &Entry) -> Value {
    Value::Object(
        entry
            .iter()
            .map(|(name, stored)| (name.clone(), stored_json(stored)))
            .collect(),
    )
}

fn stored_json(stored: &Stored) -> Value {
    match stored {
        Stored::Value(v) => v.clone(),
        Stored::Link(None) => Value::Null,
        Stored::Link(Some(r)) => ref_json(r),
        Stored::Links(refs) => Value::Array(refs.iter().map(ref_json).collect()),
        Stored::Node(entry) => entry_json(entry),
    }
}

fn ref_json(reference: &Ref) -> Value {
    json!({"node": &*reference.node, "id": reference.ident.to_value()})
}

// =============================================================================
// LINK HELPERS
// =============================================================================

fn link_violation(node: &Node, link: &Link, expected: String, value: &LinkValue) -> HikuError {
    HikuError::ShapeViolation {
        node: node.display_name().to_string(),
        kind: "link",
        names: vec![link.name.clone()],
        expected,
        returned: format!("{:?}", value),
    }
}

/// Convert one (non-batched) link answer into a stored value.
fn to_stored(node: &Node, link: &Link, value: &LinkValue) -> Result<Stored, HikuError> {
    let target = link.node.as_str();
    match (link.cardinality, value) {
        (Cardinality::Maybe | Cardinality::One, LinkValue::Ident(ident)) => {
            Ok(Stored::Link(Some(Ref::new(target, ident.clone()))))
        }
        (Cardinality::Maybe, LinkValue::Nothing) => Ok(Stored::Link(None)),
        (Cardinality::One, LinkValue::Nothing) => Err(HikuError::CardinalityViolation {
            node: node.display_name().to_string(),
            link: link.name.clone(),
        }),
        (Cardinality::Many, LinkValue::List(items)) => items
            .iter()
            .map(|item| match item {
                LinkValue::Ident(ident) => Ok(Ref::new(target, ident.clone())),
                _ => Err(link_violation(node, link, "list of identities".to_string(), value)),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Stored::Links),
        (Cardinality::Many, _) => Err(link_violation(node, link, "list".to_string(), value)),
        (_, LinkValue::List(_)) => Err(link_violation(
            node,
            link,
            "identity or Nothing".to_string(),
            value,
        )),
    }
}

/// Flatten a validated link answer into the identities to recurse into.
pub fn link_result_to_ids(
    node: &Node,
    link: &Link,
    batched: bool,
    value: &LinkValue,
) -> Result<Vec<Ident>, HikuError> {
    let answers: Vec<&LinkValue> = match (batched, value) {
        (true, LinkValue::List(items)) => items.iter().collect(),
        (true, _) => {
            return Err(link_violation(node, link, "list".to_string(), value));
        }
        (false, value) => vec![value],
    };

    let mut ids = Vec::new();
    for answer in answers {
        match (link.cardinality, answer) {
            (Cardinality::Maybe, LinkValue::Nothing) => {}
            (Cardinality::One, LinkValue::Nothing) => {
                return Err(HikuError::CardinalityViolation {
                    node: node.display_name().to_string(),
                    link: link.name.clone(),
                });
            }
            (Cardinality::Maybe | Cardinality::One, LinkValue::Ident(ident)) => {
                ids.push(ident.clone());
            }
            (Cardinality::Many, LinkValue::List(items)) => {
                for item in items {
                    match item {
                        LinkValue::Ident(ident) => ids.push(ident.clone()),
                        _ => {
                            return Err(link_violation(
                                node,
                                link,
                                "list of identities".to_string(),
                                value,
                            ));
                        }
                    }
                }
            }
            _ => {
                return Err(link_violation(
                    node,
                    link,
                    format!("{} answer", link.cardinality),
                    value,
                ));
            }
        }
    }
    Ok(ids)
}

// =============================================================================
// TESTS
// =============================================================================
