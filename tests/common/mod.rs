//! Common test utilities: a two-database, two-table-per-database layout

#![allow(dead_code)]

use hyprshard_core::{
    execute::DataSourceMap, ConnectionMode, DuckDbDataSource, ExecutorEngine, HyprshardConfig, ShardingOrchestrator,
    ShardingRule,
};
use std::sync::Arc;

/// `t_order` and `t_order_item` shard by `user_id % 2` across databases and
/// `order_id % 2` across tables. `t_config` is broadcast, `t_user` lives on `ds_1`.
pub const RULES_TOML: &str = r#"
[[data_sources]]
name = "ds_0"

[[data_sources]]
name = "ds_1"

[rules]
binding_groups = ["t_order, t_order_item"]
broadcast_tables = ["t_config"]

[rules.single_tables]
t_user = "ds_1"

[rules.algorithms.mod2]
type = "MOD"
props = { sharding-count = "2" }

[rules.tables.t_order]
actual_data_nodes = "ds_${0..1}.t_order_${0..1}"
database_strategy = { type = "standard", sharding_column = "user_id", algorithm_name = "mod2" }
table_strategy = { type = "standard", sharding_column = "order_id", algorithm_name = "mod2" }
key_generate_column = "order_id"

[rules.tables.t_order_item]
actual_data_nodes = "ds_${0..1}.t_order_item_${0..1}"
database_strategy = { type = "standard", sharding_column = "user_id", algorithm_name = "mod2" }
table_strategy = { type = "standard", sharding_column = "order_id", algorithm_name = "mod2" }
"#;

pub fn test_config() -> HyprshardConfig {
    HyprshardConfig::from_toml_str(RULES_TOML).unwrap()
}

pub fn test_rule() -> Arc<ShardingRule> {
    Arc::new(test_config().build_rule().unwrap())
}

/// Rule with full routes disabled.
pub fn strict_rule() -> Arc<ShardingRule> {
    let mut config = test_config();
    config.props.allow_full_route = false;
    Arc::new(config.build_rule().unwrap())
}

/// In-memory DuckDB data sources with every physical table created.
pub async fn create_test_data_sources() -> (DataSourceMap, Vec<Arc<DuckDbDataSource>>) {
    let mut map = DataSourceMap::new();
    let mut sources = Vec::new();
    for name in ["ds_0", "ds_1"] {
        let source = DuckDbDataSource::from_connection_string(name, ":memory:").unwrap();
        for suffix in 0..2 {
            source
                .execute_batch(&format!(
                    "CREATE TABLE t_order_{s} (order_id BIGINT, user_id BIGINT, status VARCHAR, price DOUBLE);
                     CREATE TABLE t_order_item_{s} (item_id BIGINT, order_id BIGINT, user_id BIGINT);",
                    s = suffix
                ))
                .await
                .unwrap();
        }
        source
            .execute_batch("CREATE TABLE t_config (k VARCHAR, v VARCHAR); CREATE TABLE t_user (user_id BIGINT, name VARCHAR);")
            .await
            .unwrap();
        map.insert(source.clone());
        sources.push(source);
    }
    (map, sources)
}

pub async fn create_test_orchestrator(mode: ConnectionMode) -> ShardingOrchestrator {
    let (data_sources, _) = create_test_data_sources().await;
    ShardingOrchestrator::new(test_rule(), data_sources, ExecutorEngine::new(4, mode, 1))
}
