use hyprshard_core::error::MergeError;
use hyprshard_core::merge::{MemoryQueryResult, Row};
use hyprshard_core::{annotate, MergeEngine, QueryResult, Value};
use std::sync::atomic::Ordering;

fn int(v: i64) -> Value {
    Value::Int(v)
}

fn float(v: f64) -> Value {
    Value::Float(v)
}

fn text(v: &str) -> Value {
    Value::Text(v.to_string())
}

fn shard(columns: &[&str], rows: Vec<Row>) -> Box<dyn QueryResult> {
    MemoryQueryResult::from_rows(columns, rows).boxed()
}

/// Serves `healthy_rows` rows, then fails.
struct FailingResult {
    columns: Vec<String>,
    served: usize,
    healthy_rows: usize,
}

impl FailingResult {
    fn boxed(healthy_rows: usize) -> Box<dyn QueryResult> {
        Box::new(Self {
            columns: vec!["order_id".to_string()],
            served: 0,
            healthy_rows,
        })
    }
}

impl QueryResult for FailingResult {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> anyhow::Result<Option<Row>> {
        self.served += 1;
        if self.served > self.healthy_rows {
            anyhow::bail!("connection reset");
        }
        Ok(Some(vec![int(self.served as i64)]))
    }
}

#[test]
fn test_order_by_derived_column_is_hidden() {
    let logic_sql = annotate("SELECT order_id FROM t_order ORDER BY price DESC LIMIT 3", vec![]).unwrap();
    let columns = ["order_id", "ORDER_BY_DERIVED_0"];
    let results = vec![
        shard(&columns, vec![vec![int(1), float(9.0)], vec![int(2), float(5.0)], vec![int(3), float(1.0)]]),
        shard(&columns, vec![vec![int(4), float(8.0)], vec![int(5), float(7.0)]]),
    ];
    let mut merged = MergeEngine::new().merge(results, &logic_sql).unwrap();
    assert_eq!(merged.columns(), ["order_id".to_string()]);
    let rows = merged.collect_rows().unwrap();
    assert_eq!(rows, vec![vec![int(1)], vec![int(4)], vec![int(5)]]);
}

#[test]
fn test_group_by_stream_sums_per_user() {
    let logic_sql = annotate(
        "SELECT user_id, SUM(price) AS total FROM t_order GROUP BY user_id ORDER BY user_id",
        vec![],
    )
    .unwrap();
    let columns = ["user_id", "total"];
    let results = vec![
        shard(&columns, vec![vec![int(1), float(10.0)], vec![int(3), float(1.0)]]),
        shard(&columns, vec![vec![int(1), float(5.0)], vec![int(2), float(2.0)], vec![int(3), float(4.0)]]),
    ];
    let rows = MergeEngine::new().merge(results, &logic_sql).unwrap().collect_rows().unwrap();
    assert_eq!(
        rows,
        vec![
            vec![int(1), float(15.0)],
            vec![int(2), float(2.0)],
            vec![int(3), float(5.0)],
        ]
    );
}

#[test]
fn test_memory_group_avg_recomputed() {
    let logic_sql = annotate("SELECT status, AVG(price) AS avg_price FROM t_order GROUP BY status", vec![]).unwrap();
    let columns = ["status", "avg_price", "AVG_DERIVED_SUM_0", "AVG_DERIVED_COUNT_0"];
    let results = vec![
        shard(
            &columns,
            vec![
                vec![text("paid"), float(5.0), float(10.0), int(2)],
                vec![text("init"), float(1.0), float(1.0), int(1)],
            ],
        ),
        shard(&columns, vec![vec![text("paid"), float(20.0 / 3.0), float(20.0), int(3)]]),
    ];
    let mut merged = MergeEngine::new().merge(results, &logic_sql).unwrap();
    assert_eq!(merged.columns(), ["status".to_string(), "avg_price".to_string()]);
    let mut rows = merged.collect_rows().unwrap();
    rows.sort();
    assert_eq!(rows, vec![vec![text("init"), float(1.0)], vec![text("paid"), float(6.0)]]);
}

#[test]
fn test_distinct_removes_cross_shard_duplicates() {
    let logic_sql = annotate("SELECT DISTINCT status FROM t_order", vec![]).unwrap();
    let results = vec![
        shard(&["status"], vec![vec![text("paid")], vec![text("init")]]),
        shard(&["status"], vec![vec![text("paid")]]),
    ];
    let rows = MergeEngine::new().merge(results, &logic_sql).unwrap().collect_rows().unwrap();
    assert_eq!(rows.len(), 2);
}

#[test]
fn test_nulls_sort_first_ascending() {
    let logic_sql = annotate("SELECT price FROM t_order ORDER BY price", vec![]).unwrap();
    let results = vec![
        shard(&["price"], vec![vec![float(1.0)], vec![float(3.0)]]),
        shard(&["price"], vec![vec![Value::Null], vec![float(2.0)]]),
    ];
    let rows = MergeEngine::new().merge(results, &logic_sql).unwrap().collect_rows().unwrap();
    assert_eq!(
        rows,
        vec![vec![Value::Null], vec![float(1.0)], vec![float(2.0)], vec![float(3.0)]]
    );
}

#[test]
fn test_empty_shards_merge_to_nothing() {
    let logic_sql = annotate("SELECT order_id FROM t_order ORDER BY order_id LIMIT 10", vec![]).unwrap();
    let results = vec![shard(&["order_id"], vec![]), shard(&["order_id"], vec![])];
    let rows = MergeEngine::new().merge(results, &logic_sql).unwrap().collect_rows().unwrap();
    assert!(rows.is_empty());
}

#[test]
fn test_bad_order_index_closes_every_result() {
    let logic_sql = annotate("SELECT order_id FROM t_order ORDER BY 3", vec![]).unwrap();
    let first = MemoryQueryResult::from_rows(&["order_id"], vec![vec![int(1)]]);
    let second = MemoryQueryResult::from_rows(&["order_id"], vec![vec![int(2)]]);
    let handles = [first.close_handle(), second.close_handle()];
    let err = MergeEngine::new()
        .merge(vec![first.boxed(), second.boxed()], &logic_sql)
        .err()
        .unwrap();
    assert!(matches!(err, MergeError::ColumnIndexOutOfRange { index: 3, count: 1 }));
    assert!(handles.iter().all(|h| h.load(Ordering::SeqCst)));
}

#[test]
fn test_cursor_failure_surfaces_as_merge_error() {
    let logic_sql = annotate("SELECT order_id FROM t_order", vec![]).unwrap();
    let results: Vec<Box<dyn QueryResult>> = vec![shard(&["order_id"], vec![]), FailingResult::boxed(1)];
    let mut merged = MergeEngine::new().merge(results, &logic_sql).unwrap();
    assert_eq!(merged.next_row().unwrap(), Some(vec![int(1)]));
    assert!(matches!(merged.next_row(), Err(MergeError::Cursor(_))));
}

#[test]
fn test_cursor_failure_while_priming_closes_every_result() {
    for sql in [
        "SELECT order_id FROM t_order ORDER BY order_id",
        "SELECT order_id FROM t_order GROUP BY order_id ORDER BY order_id",
    ] {
        let logic_sql = annotate(sql, vec![]).unwrap();
        let healthy = MemoryQueryResult::from_rows(&["order_id"], vec![vec![int(1)], vec![int(2)]]);
        let handle = healthy.close_handle();
        let err = MergeEngine::new()
            .merge(vec![healthy.boxed(), FailingResult::boxed(0)], &logic_sql)
            .err()
            .unwrap();
        assert!(matches!(err, MergeError::Cursor(_)), "{}", sql);
        assert!(handle.load(Ordering::SeqCst), "{}", sql);
    }
}
