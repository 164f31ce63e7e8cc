//! Sharding rule metadata.
//!
//! A [`ShardingRule`] is built once from configuration and shared read-only
//! by every statement: table layouts, strategies, binding groups, broadcast
//! and single tables, and the key generator.

pub mod binding;
pub mod inline;
pub mod table;

pub use binding::BindingTableRule;
pub use table::{DataNode, TableRule};

use crate::error::{Error, Result};
use crate::sharding::{
    AlgorithmConfig, KeyGenerator, ShardingAlgorithmRegistry, ShardingStrategy, SnowflakeKeyGenerator,
    StrategyConfig,
};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// `[rules.tables.<name>]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableRuleConfig {
    #[serde(default)]
    pub actual_data_nodes: String,
    #[serde(default)]
    pub database_strategy: Option<StrategyConfig>,
    #[serde(default)]
    pub table_strategy: Option<StrategyConfig>,
    #[serde(default)]
    pub key_generate_column: Option<String>,
}

/// `[rules]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    #[serde(default)]
    pub tables: BTreeMap<String, TableRuleConfig>,
    #[serde(default)]
    pub default_database_strategy: Option<StrategyConfig>,
    #[serde(default)]
    pub default_table_strategy: Option<StrategyConfig>,
    #[serde(default)]
    pub algorithms: HashMap<String, AlgorithmConfig>,
    #[serde(default)]
    pub binding_groups: Vec<String>,
    #[serde(default)]
    pub broadcast_tables: Vec<String>,
    /// Unsharded tables pinned to one data source.
    #[serde(default)]
    pub single_tables: BTreeMap<String, String>,
    #[serde(default)]
    pub worker_id: i64,
}

/// `[props]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleProps {
    #[serde(default = "default_true")]
    pub allow_full_route: bool,
    #[serde(default)]
    pub sql_show: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RuleProps {
    fn default() -> Self {
        Self {
            allow_full_route: true,
            sql_show: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShardingRule {
    data_source_names: Vec<String>,
    table_rules: BTreeMap<String, TableRule>,
    binding_rules: Vec<BindingTableRule>,
    broadcast_tables: BTreeSet<String>,
    single_tables: BTreeMap<String, String>,
    default_database_strategy: ShardingStrategy,
    default_table_strategy: ShardingStrategy,
    props: RuleProps,
    key_generator: Arc<dyn KeyGenerator>,
}

impl ShardingRule {
    pub fn new(config: &RuleConfig, data_source_names: Vec<String>, props: RuleProps) -> Result<Self> {
        if data_source_names.is_empty() {
            return Err(Error::Config("At least one data source must be configured".to_string()));
        }
        let registry = ShardingAlgorithmRegistry::from_config(&config.algorithms)?;
        let resolve = |strategy: &Option<StrategyConfig>| -> Result<Option<ShardingStrategy>> {
            strategy
                .as_ref()
                .map(|s| ShardingStrategy::from_config(s, &registry))
                .transpose()
        };

        let mut table_rules = BTreeMap::new();
        for (name, table_config) in &config.tables {
            let mut rule = TableRule::new(name, &table_config.actual_data_nodes, &data_source_names)?;
            rule.database_strategy = resolve(&table_config.database_strategy)?;
            rule.table_strategy = resolve(&table_config.table_strategy)?;
            rule.key_generate_column = table_config
                .key_generate_column
                .as_ref()
                .map(|c| c.trim().to_ascii_lowercase());
            debug!(table = %rule.logic_table, nodes = rule.data_nodes().len(), "Loaded table rule");
            table_rules.insert(rule.logic_table.clone(), rule);
        }

        let binding_rules: Vec<BindingTableRule> =
            config.binding_groups.iter().map(|g| BindingTableRule::parse(g)).collect();
        for group in &binding_rules {
            if let Some(missing) = group.tables().iter().find(|t| !table_rules.contains_key(*t)) {
                return Err(Error::Config(format!(
                    "Binding table '{}' has no table rule",
                    missing
                )));
            }
        }

        let broadcast_tables: BTreeSet<String> =
            config.broadcast_tables.iter().map(|t| t.trim().to_ascii_lowercase()).collect();
        let mut single_tables = BTreeMap::new();
        for (table, ds) in &config.single_tables {
            if !data_source_names.contains(ds) {
                return Err(Error::Config(format!(
                    "Single table '{}' references unknown data source '{}'",
                    table, ds
                )));
            }
            single_tables.insert(table.trim().to_ascii_lowercase(), ds.clone());
        }
        for table in broadcast_tables.iter().chain(single_tables.keys()) {
            if table_rules.contains_key(table) {
                return Err(Error::Config(format!(
                    "Table '{}' cannot be both sharded and broadcast/single",
                    table
                )));
            }
        }

        let rule = Self {
            data_source_names,
            table_rules,
            binding_rules,
            broadcast_tables,
            single_tables,
            default_database_strategy: resolve(&config.default_database_strategy)?.unwrap_or(ShardingStrategy::None),
            default_table_strategy: resolve(&config.default_table_strategy)?.unwrap_or(ShardingStrategy::None),
            props,
            key_generator: Arc::new(SnowflakeKeyGenerator::new(config.worker_id)?),
        };
        info!(
            data_sources = rule.data_source_names.len(),
            sharding_tables = rule.table_rules.len(),
            binding_groups = rule.binding_rules.len(),
            broadcast_tables = rule.broadcast_tables.len(),
            "Sharding rule ready"
        );
        Ok(rule)
    }

    pub fn with_key_generator(mut self, key_generator: Arc<dyn KeyGenerator>) -> Self {
        self.key_generator = key_generator;
        self
    }

    pub fn data_source_names(&self) -> &[String] {
        &self.data_source_names
    }

    pub fn props(&self) -> &RuleProps {
        &self.props
    }

    pub fn table_rules(&self) -> impl Iterator<Item = &TableRule> {
        self.table_rules.values()
    }

    pub fn table_rule(&self, logic_table: &str) -> Option<&TableRule> {
        self.table_rules.get(&logic_table.to_ascii_lowercase())
    }

    pub fn is_sharding_table(&self, logic_table: &str) -> bool {
        self.table_rule(logic_table).is_some()
    }

    pub fn is_broadcast_table(&self, logic_table: &str) -> bool {
        self.broadcast_tables.contains(&logic_table.to_ascii_lowercase())
    }

    pub fn broadcast_tables(&self) -> impl Iterator<Item = &String> {
        self.broadcast_tables.iter()
    }

    pub fn single_table_data_source(&self, logic_table: &str) -> Option<&str> {
        self.single_tables.get(&logic_table.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn binding_rule(&self, logic_table: &str) -> Option<&BindingTableRule> {
        self.binding_rules.iter().find(|r| r.contains(logic_table))
    }

    /// Whether all tables belong to one binding group.
    pub fn is_all_binding_tables(&self, logic_tables: &[String]) -> bool {
        match logic_tables.first().and_then(|t| self.binding_rule(t)) {
            Some(rule) => logic_tables.iter().all(|t| rule.contains(t)),
            None => false,
        }
    }

    pub fn database_strategy<'a>(&'a self, table_rule: &'a TableRule) -> &'a ShardingStrategy {
        table_rule
            .database_strategy
            .as_ref()
            .unwrap_or(&self.default_database_strategy)
    }

    pub fn table_strategy<'a>(&'a self, table_rule: &'a TableRule) -> &'a ShardingStrategy {
        table_rule.table_strategy.as_ref().unwrap_or(&self.default_table_strategy)
    }

    /// Sharding columns (database and table dimension) of a table, lower-cased.
    pub fn sharding_columns(&self, logic_table: &str) -> Vec<String> {
        let Some(rule) = self.table_rule(logic_table) else {
            return Vec::new();
        };
        let mut columns: Vec<String> = Vec::new();
        for column in self
            .database_strategy(rule)
            .sharding_columns()
            .into_iter()
            .chain(self.table_strategy(rule).sharding_columns())
        {
            if !columns.iter().any(|c| c == column) {
                columns.push(column.to_string());
            }
        }
        columns
    }

    pub fn generate_key(&self, logic_table: &str) -> Option<(String, Value)> {
        let column = self.table_rule(logic_table)?.key_generate_column.clone()?;
        Some((column, self.key_generator.generate_key()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RuleConfig {
        let mut config = RuleConfig::default();
        config.algorithms.insert("mod2".to_string(), AlgorithmConfig::new("MOD", &[("sharding-count", "2")]));
        for (name, nodes) in [
            ("t_order", "ds_${0..1}.t_order_${0..1}"),
            ("t_order_item", "ds_${0..1}.t_order_item_${0..1}"),
        ] {
            config.tables.insert(
                name.to_string(),
                TableRuleConfig {
                    actual_data_nodes: nodes.to_string(),
                    database_strategy: Some(StrategyConfig::Standard {
                        sharding_column: "user_id".to_string(),
                        algorithm_name: "mod2".to_string(),
                    }),
                    table_strategy: Some(StrategyConfig::Standard {
                        sharding_column: "order_id".to_string(),
                        algorithm_name: "mod2".to_string(),
                    }),
                    key_generate_column: Some("order_id".to_string()),
                },
            );
        }
        config.binding_groups.push("t_order, t_order_item".to_string());
        config.broadcast_tables.push("t_config".to_string());
        config.single_tables.insert("t_user".to_string(), "ds_1".to_string());
        config
    }

    fn names() -> Vec<String> {
        vec!["ds_0".to_string(), "ds_1".to_string()]
    }

    #[test]
    fn test_rule_classifies_tables() {
        let rule = ShardingRule::new(&config(), names(), RuleProps::default()).unwrap();
        assert!(rule.is_sharding_table("T_ORDER"));
        assert!(rule.is_broadcast_table("t_config"));
        assert_eq!(rule.single_table_data_source("t_user"), Some("ds_1"));
        assert!(rule.is_all_binding_tables(&["t_order".to_string(), "t_order_item".to_string()]));
        assert!(!rule.is_all_binding_tables(&["t_order".to_string(), "t_config".to_string()]));
        assert_eq!(rule.sharding_columns("t_order"), vec!["user_id", "order_id"]);
    }

    #[test]
    fn test_generate_key_for_configured_column() {
        let rule = ShardingRule::new(&config(), names(), RuleProps::default()).unwrap();
        let (column, key) = rule.generate_key("t_order").unwrap();
        assert_eq!(column, "order_id");
        assert!(key.as_i64().unwrap() > 0);
        assert!(rule.generate_key("t_config").is_none());
    }

    #[test]
    fn test_unknown_binding_member_rejected() {
        let mut config = config();
        config.binding_groups.push("t_order, t_missing".to_string());
        assert!(ShardingRule::new(&config, names(), RuleProps::default()).is_err());
    }

    #[test]
    fn test_single_table_on_unknown_data_source_rejected() {
        let mut config = config();
        config.single_tables.insert("t_audit".to_string(), "ds_7".to_string());
        assert!(ShardingRule::new(&config, names(), RuleProps::default()).is_err());
    }
}
