mod common;

use common::test_rule;
use hyprshard_core::execute::DataSourceMap;
use hyprshard_core::{
    annotate, ConnectionMode, ExecutionPlan, ExecutorEngine, HintContext, ShardingCondition, ShardingConditions,
    ShardingOrchestrator, Value,
};

fn orchestrator() -> ShardingOrchestrator {
    ShardingOrchestrator::new(test_rule(), DataSourceMap::new(), ExecutorEngine::new(1, ConnectionMode::Auto, 1))
}

fn plan(sql: &str, parameters: Vec<Value>, conditions: ShardingConditions) -> ExecutionPlan {
    let orchestrator = orchestrator();
    let logic_sql = orchestrator.prepare_statement(annotate(sql, parameters).unwrap());
    orchestrator.plan(&logic_sql, conditions, &HintContext::new()).unwrap()
}

fn user(id: i64) -> ShardingConditions {
    ShardingConditions::single(ShardingCondition::new().equal("t_order", "user_id", id))
}

#[test]
fn test_avg_gets_sum_and_count_columns() {
    let plan = plan(
        "SELECT user_id, AVG(price) AS avg_price FROM t_order GROUP BY user_id ORDER BY user_id",
        vec![],
        user(1),
    );
    assert_eq!(plan.units.len(), 2);
    assert_eq!(
        plan.units[0].sql,
        "SELECT user_id, AVG(price) AS avg_price, SUM(price) AS AVG_DERIVED_SUM_0, COUNT(price) AS AVG_DERIVED_COUNT_0 FROM t_order_0 GROUP BY user_id ORDER BY user_id"
    );
    assert!(plan.units[1].sql.contains("FROM t_order_1 "));
}

#[test]
fn test_order_by_column_outside_select_list() {
    let plan = plan("SELECT order_id FROM t_order ORDER BY price DESC", vec![], ShardingConditions::none());
    assert_eq!(plan.units.len(), 4);
    assert_eq!(
        plan.units[3].sql,
        "SELECT order_id, price AS ORDER_BY_DERIVED_0 FROM t_order_1 ORDER BY price DESC"
    );
    assert_eq!(plan.units[3].route_unit.data_source_name(), "ds_1");
}

#[test]
fn test_single_unit_is_only_renamed() {
    let plan = plan(
        "SELECT order_id FROM t_order WHERE user_id = ? AND order_id = ? ORDER BY price LIMIT 5 OFFSET 10",
        vec![Value::Int(2), Value::Int(5)],
        ShardingConditions::single(
            ShardingCondition::new()
                .equal("t_order", "user_id", 2)
                .equal("t_order", "order_id", 5),
        ),
    );
    assert_eq!(plan.units.len(), 1);
    assert_eq!(
        plan.units[0].sql,
        "SELECT order_id FROM t_order_1 WHERE user_id = ? AND order_id = ? ORDER BY price LIMIT 5 OFFSET 10"
    );
    assert_eq!(plan.units[0].parameters, vec![Value::Int(2), Value::Int(5)]);
}

#[test]
fn test_quoted_table_keeps_quotes() {
    let plan = plan("SELECT * FROM `t_order` WHERE user_id = 1", vec![], user(1));
    assert_eq!(plan.units[0].sql, "SELECT * FROM `t_order_0` WHERE user_id = 1");
}

#[test]
fn test_memory_group_merge_lifts_row_count() {
    let plan = plan(
        "SELECT status, COUNT(*) AS cnt FROM t_order GROUP BY status ORDER BY cnt DESC LIMIT 5 OFFSET 5",
        vec![],
        ShardingConditions::none(),
    );
    assert_eq!(
        plan.units[0].sql,
        format!(
            "SELECT status, COUNT(*) AS cnt FROM t_order_0 GROUP BY status ORDER BY cnt DESC LIMIT {} OFFSET 0",
            i64::MAX
        )
    );
}

#[test]
fn test_insert_value_groups_are_split_by_node() {
    let plan = plan(
        "INSERT INTO t_order (order_id, user_id, status) VALUES (?, ?, ?), (?, ?, ?)",
        vec![
            Value::Int(1),
            Value::Int(1),
            Value::from("a"),
            Value::Int(2),
            Value::Int(2),
            Value::from("b"),
        ],
        ShardingConditions::none(),
    );
    assert_eq!(plan.units.len(), 2);
    assert_eq!(
        plan.units[0].sql,
        "INSERT INTO t_order_0 (order_id, user_id, status) VALUES (?, ?, ?)"
    );
    assert_eq!(
        plan.units[0].parameters,
        vec![Value::Int(2), Value::Int(2), Value::from("b")]
    );
    assert_eq!(plan.units[1].route_unit.data_source_name(), "ds_1");
    assert_eq!(
        plan.units[1].parameters,
        vec![Value::Int(1), Value::Int(1), Value::from("a")]
    );
}

#[test]
fn test_insert_without_key_column_gets_generated_key() {
    let plan = plan("INSERT INTO t_order (user_id, status) VALUES (1, 'a')", vec![], ShardingConditions::none());
    assert_eq!(plan.units.len(), 1);
    let unit = &plan.units[0];
    assert_eq!(unit.route_unit.data_source_name(), "ds_1");
    assert!(unit.sql.starts_with("INSERT INTO t_order_"));
    assert!(unit.sql.contains("(user_id, status, order_id) VALUES (1, 'a', "));
}

#[test]
fn test_plan_serializes_to_json() {
    let plan = plan("SELECT * FROM t_order", vec![], ShardingConditions::none());
    let json = serde_json::to_value(&plan).unwrap();
    assert_eq!(json["route_context"]["route_type"], "standard");
    assert_eq!(json["units"].as_array().unwrap().len(), 4);
    assert_eq!(json["logic_sql"], "SELECT * FROM t_order");
}
