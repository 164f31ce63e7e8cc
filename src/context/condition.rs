//! Sharding conditions extracted from predicates.
//!
//! [`ShardingConditions`] is a disjunction of AND groups. Each group lists
//! equality, IN and range predicates on (table, column) pairs; the router
//! routes every group and unions the results.

use super::LogicSql;
use crate::error::RoutingError;
use crate::rule::ShardingRule;
use crate::sharding::{ColumnValues, ShardingRange};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConditionValue {
    Equal(Value),
    In(Vec<Value>),
    Range(ShardingRange),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardingConditionValue {
    pub table: String,
    pub column: String,
    pub value: ConditionValue,
}

/// One AND group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShardingCondition {
    pub values: Vec<ShardingConditionValue>,
}

impl ShardingCondition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn equal(self, table: &str, column: &str, value: impl Into<Value>) -> Self {
        self.with(table, column, ConditionValue::Equal(value.into()))
    }

    pub fn in_list(self, table: &str, column: &str, values: Vec<Value>) -> Self {
        self.with(table, column, ConditionValue::In(values))
    }

    pub fn range(self, table: &str, column: &str, range: ShardingRange) -> Self {
        self.with(table, column, ConditionValue::Range(range))
    }

    pub fn with(mut self, table: &str, column: &str, value: ConditionValue) -> Self {
        self.values.push(ShardingConditionValue {
            table: table.trim().to_ascii_lowercase(),
            column: column.trim().to_ascii_lowercase(),
            value,
        });
        self
    }

    /// Whether the group constrains any of `columns` on any of `tables`.
    pub fn constrains(&self, tables: &[String], columns: &[String]) -> bool {
        self.values
            .iter()
            .any(|v| tables.contains(&v.table) && columns.contains(&v.column))
    }

    /// Folds the predicates on `tables` into one value set or range per column.
    ///
    /// Repeated predicates on a column intersect; an empty intersection means
    /// the group can never match and fails with `ConflictingConditions`.
    pub fn resolve(&self, tables: &[String]) -> Result<HashMap<String, ColumnValues>, RoutingError> {
        let mut resolved: HashMap<String, ColumnValues> = HashMap::new();
        for condition in self.values.iter().filter(|v| tables.contains(&v.table)) {
            let incoming = match &condition.value {
                ConditionValue::Equal(v) => ColumnValues::Values(vec![v.clone()]),
                ConditionValue::In(values) => ColumnValues::Values(dedup(values.clone())),
                ConditionValue::Range(range) => ColumnValues::Range(range.clone()),
            };
            let merged = match resolved.remove(&condition.column) {
                None => Some(incoming),
                Some(existing) => intersect(existing, incoming),
            };
            match merged {
                Some(ColumnValues::Values(values)) if values.is_empty() => {
                    return Err(conflict(condition));
                }
                Some(values) => {
                    resolved.insert(condition.column.clone(), values);
                }
                None => return Err(conflict(condition)),
            }
        }
        Ok(resolved)
    }
}

fn conflict(condition: &ShardingConditionValue) -> RoutingError {
    RoutingError::ConflictingConditions {
        table: condition.table.clone(),
        column: condition.column.clone(),
    }
}

fn dedup(values: Vec<Value>) -> Vec<Value> {
    let mut unique: Vec<Value> = Vec::with_capacity(values.len());
    for value in values {
        if !unique.contains(&value) {
            unique.push(value);
        }
    }
    unique
}

fn intersect(a: ColumnValues, b: ColumnValues) -> Option<ColumnValues> {
    match (a, b) {
        (ColumnValues::Values(left), ColumnValues::Values(right)) => Some(ColumnValues::Values(
            left.into_iter().filter(|v| right.contains(v)).collect(),
        )),
        (ColumnValues::Values(values), ColumnValues::Range(range))
        | (ColumnValues::Range(range), ColumnValues::Values(values)) => Some(ColumnValues::Values(
            values.into_iter().filter(|v| range.contains(v)).collect(),
        )),
        (ColumnValues::Range(left), ColumnValues::Range(right)) => left.intersect(&right).map(ColumnValues::Range),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShardingConditions {
    pub groups: Vec<ShardingCondition>,
}

impl ShardingConditions {
    /// No predicates at all.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn single(condition: ShardingCondition) -> Self {
        Self {
            groups: vec![condition],
        }
    }

    /// Adds an OR branch.
    pub fn or(mut self, condition: ShardingCondition) -> Self {
        self.groups.push(condition);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|g| g.values.is_empty())
    }

    /// One group per VALUES row, built from sharding columns and generated keys.
    pub fn from_insert(logic_sql: &LogicSql, rule: &ShardingRule) -> Self {
        let Some(insert) = &logic_sql.insert else {
            return Self::none();
        };
        let columns = rule.sharding_columns(&insert.table);
        let groups = (0..insert.value_groups.len())
            .map(|group| {
                let mut condition = ShardingCondition::new();
                for column in &columns {
                    if let Some(value) = insert.value_of(group, column, &logic_sql.parameters) {
                        condition = condition.equal(&insert.table, column, value);
                    }
                }
                condition
            })
            .collect();
        Self { groups }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> Vec<String> {
        vec!["t_order".to_string()]
    }

    #[test]
    fn test_equal_and_in_intersect() {
        let condition = ShardingCondition::new()
            .in_list("t_order", "user_id", vec![Value::Int(1), Value::Int(2), Value::Int(1)])
            .equal("T_ORDER", "USER_ID", 2);
        let resolved = condition.resolve(&tables()).unwrap();
        assert_eq!(resolved.get("user_id"), Some(&ColumnValues::Values(vec![Value::Int(2)])));
    }

    #[test]
    fn test_disjoint_equalities_conflict() {
        let condition = ShardingCondition::new()
            .equal("t_order", "user_id", 1)
            .equal("t_order", "user_id", 2);
        assert!(matches!(
            condition.resolve(&tables()),
            Err(RoutingError::ConflictingConditions { .. })
        ));
    }

    #[test]
    fn test_range_filters_values_and_ranges_intersect() {
        let condition = ShardingCondition::new()
            .in_list("t_order", "order_id", vec![Value::Int(1), Value::Int(5), Value::Int(9)])
            .range("t_order", "order_id", ShardingRange::closed(2, 9));
        let resolved = condition.resolve(&tables()).unwrap();
        assert_eq!(
            resolved.get("order_id"),
            Some(&ColumnValues::Values(vec![Value::Int(5), Value::Int(9)]))
        );

        let ranges = ShardingCondition::new()
            .range("t_order", "order_id", ShardingRange::at_least(3))
            .range("t_order", "order_id", ShardingRange::at_most(1));
        assert!(ranges.resolve(&tables()).is_err());
    }

    #[test]
    fn test_other_tables_ignored() {
        let condition = ShardingCondition::new().equal("t_user", "user_id", 1);
        assert!(condition.resolve(&tables()).unwrap().is_empty());
        assert!(!condition.constrains(&tables(), &["user_id".to_string()]));
    }
}
