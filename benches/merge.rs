//! Benchmarks for result merging

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hyprshard_core::merge::{MemoryQueryResult, Row};
use hyprshard_core::{annotate, LogicSql, MergeEngine, QueryResult, Value};

fn create_shards(shards: usize, rows_per_shard: usize) -> Vec<Box<dyn QueryResult>> {
    (0..shards)
        .map(|shard| {
            let rows: Vec<Row> = (0..rows_per_shard)
                .map(|i| {
                    let id = (i * shards + shard) as i64;
                    vec![Value::Int(id), Value::Int(id % 17), Value::Float(id as f64 * 0.5)]
                })
                .collect();
            MemoryQueryResult::from_rows(&["order_id", "user_id", "price"], rows).boxed()
        })
        .collect()
}

/// Per-shard partial sums, one row per user.
fn create_group_shards(shards: usize, users: usize) -> Vec<Box<dyn QueryResult>> {
    (0..shards)
        .map(|shard| {
            let rows: Vec<Row> = (0..users)
                .map(|user| vec![Value::Int(user as i64), Value::Float((user * shard) as f64)])
                .collect();
            MemoryQueryResult::from_rows(&["user_id", "total"], rows).boxed()
        })
        .collect()
}

fn drain(logic_sql: &LogicSql, results: Vec<Box<dyn QueryResult>>) -> usize {
    let mut merged = MergeEngine::new().merge(results, logic_sql).unwrap();
    merged.collect_rows().unwrap().len()
}

fn bench_order_by_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("order_by_stream");
    let logic_sql = annotate("SELECT order_id, user_id, price FROM t_order ORDER BY order_id", vec![]).unwrap();

    for shards in [2, 8, 32].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(shards), shards, |b, &shards| {
            b.iter(|| black_box(drain(&logic_sql, create_shards(shards, 1000))));
        });
    }
    group.finish();
}

fn bench_order_by_with_limit(c: &mut Criterion) {
    let logic_sql = annotate(
        "SELECT order_id, user_id, price FROM t_order ORDER BY order_id LIMIT 10 OFFSET 100",
        vec![],
    )
    .unwrap();
    c.bench_function("order_by_limit_8_shards", |b| {
        b.iter(|| black_box(drain(&logic_sql, create_shards(8, 1000))));
    });
}

fn bench_group_by_memory(c: &mut Criterion) {
    let mut group = c.benchmark_group("group_by_memory");
    let logic_sql = annotate(
        "SELECT user_id, SUM(price) AS total FROM t_order GROUP BY user_id ORDER BY total DESC",
        vec![],
    )
    .unwrap();

    for users in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(users), users, |b, &users| {
            b.iter(|| black_box(drain(&logic_sql, create_group_shards(4, users))));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_order_by_stream, bench_order_by_with_limit, bench_group_by_memory);
criterion_main!(benches);
