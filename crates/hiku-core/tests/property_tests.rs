//! # Property-Based Tests
//!
//! Invariants of the splitter, the result store and the denormalizer,
//! checked with proptest.

use hiku_core::{
    Cardinality, Context, Engine, Field, FieldFunc, FieldRows, Graph, Ident, Link, LinkFunc,
    LinkValue, Node, QueryItem, QueryNode, SchemaItem, Store, Stored, SyncExecutor, denormalize,
    split,
};
use proptest::collection::{btree_set, vec};
use proptest::prelude::*;
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

// =============================================================================
// FIXTURES
// =============================================================================

const FIELDS: [&str; 6] = ["f0", "f1", "f2", "f3", "f4", "f5"];

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z]{0,8}".prop_map(Value::from),
    ]
}

fn noop() -> FieldFunc {
    FieldFunc::new(|_, _| Ok(FieldRows::Flat(vec![])))
}

/// Node "thing" with fields f0..f5 and links requiring f0 and f1.
fn thing_node() -> Node {
    let mut items: Vec<SchemaItem> = FIELDS
        .iter()
        .map(|name| SchemaItem::from(Field::new(*name, noop())))
        .collect();
    items.push(
        Link::new(
            "l0",
            Cardinality::One,
            "thing",
            LinkFunc::new(|_| Ok(LinkValue::Nothing)),
        )
        .requires("f0")
        .into(),
    );
    items.push(
        Link::new(
            "l1",
            Cardinality::Many,
            "thing",
            LinkFunc::new(|_| Ok(LinkValue::List(vec![]))),
        )
        .requires("f1")
        .into(),
    );
    Node::new("thing", items)
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Split resolves exactly the requested fields plus the fields required
    /// by requested links.
    #[test]
    fn split_fields_are_requested_plus_required(
        requested in btree_set(0usize..FIELDS.len(), 0..FIELDS.len()),
        with_l0 in any::<bool>(),
        with_l1 in any::<bool>(),
    ) {
        let node = thing_node();
        let mut items: Vec<QueryItem> = requested.iter().map(|i| QueryItem::field(FIELDS[*i])).collect();
        let mut expected: BTreeSet<String> = requested.iter().map(|i| FIELDS[*i].to_string()).collect();
        if with_l0 {
            items.push(QueryItem::link("l0", QueryNode::default()));
            expected.insert("f0".to_string());
        }
        if with_l1 {
            items.push(QueryItem::link("l1", QueryNode::default()));
            expected.insert("f1".to_string());
        }
        let query = QueryNode::new(items);

        let parts = split(&node, &query).expect("split");
        let names: Vec<String> = parts.fields.iter().map(|(_, q)| q.name.clone()).collect();
        let unique: BTreeSet<String> = names.iter().cloned().collect();

        prop_assert_eq!(names.len(), unique.len());
        prop_assert_eq!(unique, expected);
    }

    /// Values stored for a batch read back unchanged through references.
    #[test]
    fn store_fields_round_trip(
        width in 1usize..FIELDS.len(),
        ids in btree_set(any::<i64>(), 1..20),
        seed in vec(value_strategy(), 120),
    ) {
        let node = thing_node();
        let names: Vec<String> = FIELDS[..width].iter().map(|s| s.to_string()).collect();
        let ids: Vec<Ident> = ids.into_iter().map(Ident::Int).collect();
        let rows: Vec<Vec<Value>> = (0..ids.len())
            .map(|i| (0..width).map(|j| seed[(i * width + j) % seed.len()].clone()).collect())
            .collect();

        let mut store = Store::new();
        store
            .store_fields(&node, &names, Some(&ids), FieldRows::Rows(rows.clone()))
            .expect("store");

        for (ident, row) in ids.iter().zip(&rows) {
            let reference = Store::reference("thing", ident.clone());
            let view = store.view(&reference);
            for (name, value) in names.iter().zip(row) {
                prop_assert_eq!(view.get(name), Some(&Stored::Value(value.clone())));
            }
        }
    }

    /// Ids answered with an empty list store [] and are never resolved.
    #[test]
    fn many_empty_stores_empty_list(
        answers in vec(vec(1i64..50, 0..4), 1..8),
    ) {
        let requested: Arc<Mutex<Vec<Ident>>> = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requested);
        let parents: Vec<i64> = (0..answers.len() as i64).map(|i| 1000 + i).collect();
        let batch = answers.clone();

        let graph = Graph::new([
            Node::new(
                "parent",
                [
                    SchemaItem::from(Field::new(
                        "key",
                        FieldFunc::new(|_, ids| {
                            Ok(FieldRows::rows(
                                ids.unwrap_or_default().iter().map(|id| [id.to_value()]),
                            ))
                        }),
                    )),
                    SchemaItem::from(
                        Link::new(
                            "children",
                            Cardinality::Many,
                            "child",
                            LinkFunc::new(move |args| match &args.requires {
                                hiku_core::Requires::Batch(keys) => Ok(LinkValue::batch(
                                    keys.iter().map(|k| {
                                        let index = k.as_i64().unwrap_or_default() - 1000;
                                        LinkValue::ids(batch[index as usize].clone())
                                    }),
                                )),
                                _ => Err("expected a batch".into()),
                            }),
                        )
                        .requires("key"),
                    ),
                ],
            ),
            Node::new(
                "child",
                [Field::new(
                    "n",
                    FieldFunc::new(move |_, ids| {
                        let ids = ids.unwrap_or_default();
                        if let Ok(mut seen) = seen.lock() {
                            seen.extend(ids.iter().cloned());
                        }
                        Ok(FieldRows::rows(ids.iter().map(|id| [id.to_value()])))
                    }),
                )],
            ),
            Node::root([Link::new(
                "parents",
                Cardinality::Many,
                "parent",
                LinkFunc::new(move |_| Ok(LinkValue::ids(parents.clone()))),
            )]),
        ]);

        let query = QueryNode::new([QueryItem::link(
            "parents",
            QueryNode::new([QueryItem::link("children", QueryNode::fields(["n"]))]),
        )]);
        let store = Engine::new(SyncExecutor)
            .execute(&graph, &query, Context::new())
            .expect("execute");

        for (i, answer) in answers.iter().enumerate() {
            let reference = Store::reference("parent", Ident::Int(1000 + i as i64));
            let stored = store.view(&reference).get("children").cloned();
            match stored {
                Some(Stored::Links(refs)) => prop_assert_eq!(refs.len(), answer.len()),
                other => prop_assert!(false, "unexpected {:?}", other),
            }
        }

        let expected: Vec<Ident> = answers.iter().flatten().map(|i| Ident::Int(*i)).collect();
        let resolved = requested.lock().map(|r| r.clone()).unwrap_or_default();
        prop_assert_eq!(resolved, expected);
    }

    /// Denormalizing the same store twice yields equal output.
    #[test]
    fn denormalize_is_idempotent(values in vec(value_strategy(), FIELDS.len())) {
        let rows = values.clone();
        let graph = Graph::new([Node::root(
            FIELDS
                .iter()
                .map(|name| {
                    let rows = rows.clone();
                    let index = FIELDS.iter().position(|f| f == name).unwrap_or_default();
                    Field::new(
                        *name,
                        FieldFunc::new(move |fields, _| {
                            Ok(FieldRows::flat(fields.iter().map(|_| rows[index].clone())))
                        }),
                    )
                })
                .collect::<Vec<_>>(),
        )]);
        let query = QueryNode::fields(FIELDS);
        let store = Engine::new(SyncExecutor)
            .execute(&graph, &query, Context::new())
            .expect("execute");

        let first = denormalize(&graph, &store, &query).expect("first");
        let second = denormalize(&graph, &store, &query).expect("second");
        prop_assert_eq!(&first, &second);

        let expected: serde_json::Map<String, Value> = FIELDS
            .iter()
            .zip(values)
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        prop_assert_eq!(first, json!(expected));
    }
}
