//! Binding table groups.
//!
//! Bound tables share a sharding key, so their partitions line up by
//! position: the `i`-th actual table of one member on a data source holds
//! the rows that relate to the `i`-th actual table of every other member.

use super::TableRule;
use crate::error::RoutingError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingTableRule {
    tables: Vec<String>,
}

impl BindingTableRule {
    /// Parses `"t_order, t_order_item"`.
    pub fn parse(group: &str) -> Self {
        Self {
            tables: group
                .split(',')
                .map(|t| t.trim().to_ascii_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    pub fn contains(&self, logic_table: &str) -> bool {
        self.tables.iter().any(|t| t.eq_ignore_ascii_case(logic_table))
    }

    /// Maps `primary_actual` of `primary` to the actual table of `target`
    /// at the same position on `data_source`.
    pub fn aligned_actual_table(
        primary: &TableRule,
        target: &TableRule,
        data_source: &str,
        primary_actual: &str,
    ) -> Result<String, RoutingError> {
        let inconsistent = |reason: String| RoutingError::BindingInconsistency {
            primary: primary.logic_table.clone(),
            secondary: target.logic_table.clone(),
            data_source: data_source.to_string(),
            reason,
        };
        let primary_tables = primary.actual_tables(data_source);
        let target_tables = target.actual_tables(data_source);
        if primary_tables.len() != target_tables.len() {
            return Err(inconsistent(format!(
                "{} actual tables versus {}",
                primary_tables.len(),
                target_tables.len()
            )));
        }
        let index = primary
            .actual_table_index(data_source, primary_actual)
            .ok_or_else(|| inconsistent(format!("'{}' is not an actual table of the primary", primary_actual)))?;
        target_tables
            .get(index)
            .cloned()
            .ok_or_else(|| inconsistent(format!("no actual table at position {}", index)))
    }
}
