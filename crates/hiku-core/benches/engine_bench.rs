//! # Engine Benchmarks
//!
//! Performance benchmarks for query execution and denormalization.
//!
//! Run with: `cargo bench -p hiku-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use hiku_core::{
    Cardinality, Context, Engine, Field, FieldFunc, FieldRows, Graph, LinkFunc, LinkValue, Link,
    Node, QueryItem, QueryNode, SchemaItem, SyncExecutor, ThreadPoolExecutor, denormalize,
};
use serde_json::json;
use std::hint::black_box;

/// Root link `items` fanning out to `size` items, each linked to one owner.
fn create_fan_out_graph(size: i64) -> Graph {
    let item_fields = FieldFunc::new(|fields, ids| {
        Ok(FieldRows::rows(ids.unwrap_or_default().iter().map(|id| {
            fields.iter().map(move |f| match f.name.as_str() {
                "owner_id" => id.to_value(),
                _ => json!(format!("item {}", id)),
            })
        })))
    });
    let user_fields = FieldFunc::new(|fields, ids| {
        Ok(FieldRows::rows(
            ids.unwrap_or_default()
                .iter()
                .map(|id| fields.iter().map(move |_| json!(format!("user {}", id)))),
        ))
    });
    let owner = LinkFunc::new(|args| match &args.requires {
        hiku_core::Requires::Batch(keys) => Ok(LinkValue::batch(
            keys.iter()
                .map(|k| LinkValue::from(hiku_core::Ident::from_value(k))),
        )),
        _ => Err("expected a batch".into()),
    });

    Graph::new([
        Node::new(
            "item",
            [
                SchemaItem::from(Field::new("name", item_fields.clone())),
                SchemaItem::from(Field::new("owner_id", item_fields)),
                SchemaItem::from(Link::new("owner", Cardinality::One, "user", owner).requires("owner_id")),
            ],
        ),
        Node::new("user", [Field::new("name", user_fields)]),
        Node::root([Link::new(
            "items",
            Cardinality::Many,
            "item",
            LinkFunc::new(move |_| Ok(LinkValue::ids(0..size))),
        )]),
    ])
}

fn fan_out_query() -> QueryNode {
    QueryNode::new([QueryItem::link(
        "items",
        QueryNode::new([
            QueryItem::field("name"),
            QueryItem::link("owner", QueryNode::fields(["name"])),
        ]),
    )])
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_execute_sync(c: &mut Criterion) {
    let mut group = c.benchmark_group("execute_sync");
    let query = fan_out_query();

    for size in [10, 100, 1000].iter() {
        let graph = create_fan_out_graph(*size);
        let engine = Engine::new(SyncExecutor);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(engine.execute(&graph, &query, Context::new())));
        });
    }

    group.finish();
}

fn bench_execute_threads(c: &mut Criterion) {
    let mut group = c.benchmark_group("execute_threads");
    let query = fan_out_query();
    let engine = Engine::new(ThreadPoolExecutor::new(4).expect("pool"));

    for size in [10, 100, 1000].iter() {
        let graph = create_fan_out_graph(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(engine.execute(&graph, &query, Context::new())));
        });
    }

    group.finish();
}

fn bench_denormalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("denormalize");
    let query = fan_out_query();

    for size in [10, 100, 1000].iter() {
        let graph = create_fan_out_graph(*size);
        let store = Engine::new(SyncExecutor)
            .execute(&graph, &query, Context::new())
            .expect("execute");

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(denormalize(&graph, &store, &query)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_execute_sync,
    bench_execute_threads,
    bench_denormalize
);
criterion_main!(benches);
