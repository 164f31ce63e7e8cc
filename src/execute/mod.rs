//! Fan-out execution of rewritten units.
//!
//! Units are bucketed per data source into [`ExecutionGroup`]s. Each group
//! either opens one connection per unit (units run in parallel) or shares a
//! single connection and runs its units one after another.

pub mod datasource;
pub mod duckdb;
pub mod executor;

pub use self::duckdb::DuckDbDataSource;
pub use datasource::{Connection, DataSource, DataSourceMap};
pub use executor::ExecutorEngine;

use crate::merge::QueryResult;
use crate::rewrite::SqlRewriteUnit;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    OneConnectionPerUnit,
    OneConnectionPerDataSource,
    /// Per data source once a group exceeds `max_connections_per_query` units.
    Auto,
}

impl Default for ConnectionMode {
    fn default() -> Self {
        ConnectionMode::Auto
    }
}

impl FromStr for ConnectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "one_connection_per_unit" | "unit" => Ok(ConnectionMode::OneConnectionPerUnit),
            "one_connection_per_data_source" | "data_source" => Ok(ConnectionMode::OneConnectionPerDataSource),
            "auto" => Ok(ConnectionMode::Auto),
            other => Err(format!("unknown connection mode '{}'", other)),
        }
    }
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionMode::OneConnectionPerUnit => "one_connection_per_unit",
            ConnectionMode::OneConnectionPerDataSource => "one_connection_per_data_source",
            ConnectionMode::Auto => "auto",
        };
        f.write_str(name)
    }
}

/// Whether units return rows or affected-row counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementType {
    Query,
    Update,
}

/// One rewritten unit, tagged with its position in the route.
#[derive(Debug, Clone)]
pub struct ExecutionUnit {
    pub index: usize,
    pub unit: SqlRewriteUnit,
}

impl ExecutionUnit {
    pub fn data_source(&self) -> &str {
        self.unit.route_unit.data_source_name()
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionGroup {
    pub data_source: String,
    /// Effective mode; never `Auto`.
    pub mode: ConnectionMode,
    pub units: Vec<ExecutionUnit>,
}

/// Buckets units by data source, in order of first appearance.
pub fn group_units(units: Vec<SqlRewriteUnit>, mode: ConnectionMode, max_connections_per_query: usize) -> Vec<ExecutionGroup> {
    let mut groups: Vec<ExecutionGroup> = Vec::new();
    for (index, unit) in units.into_iter().enumerate() {
        let unit = ExecutionUnit { index, unit };
        match groups.iter_mut().find(|g| g.data_source == unit.data_source()) {
            Some(group) => group.units.push(unit),
            None => groups.push(ExecutionGroup {
                data_source: unit.data_source().to_string(),
                mode,
                units: vec![unit],
            }),
        }
    }
    for group in &mut groups {
        if group.mode == ConnectionMode::Auto {
            group.mode = if group.units.len() > max_connections_per_query.max(1) {
                ConnectionMode::OneConnectionPerDataSource
            } else {
                ConnectionMode::OneConnectionPerUnit
            };
        }
    }
    groups
}

/// What one unit produced.
pub enum ExecuteResult {
    Query(Box<dyn QueryResult>),
    Update(u64),
}

impl ExecuteResult {
    pub fn affected_rows(&self) -> Option<u64> {
        match self {
            ExecuteResult::Update(rows) => Some(*rows),
            ExecuteResult::Query(_) => None,
        }
    }

    pub fn into_query_result(self) -> Option<Box<dyn QueryResult>> {
        match self {
            ExecuteResult::Query(result) => Some(result),
            ExecuteResult::Update(_) => None,
        }
    }

    pub(crate) fn close(&mut self) {
        if let ExecuteResult::Query(result) = self {
            if let Err(e) = result.close() {
                tracing::warn!("Failed to close shard result: {}", e);
            }
        }
    }
}

impl fmt::Debug for ExecuteResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecuteResult::Query(result) => f.debug_tuple("Query").field(&result.columns()).finish(),
            ExecuteResult::Update(rows) => f.debug_tuple("Update").field(rows).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{RouteMapper, RouteUnit};

    fn unit(ds: &str, table: &str) -> SqlRewriteUnit {
        SqlRewriteUnit {
            route_unit: RouteUnit::new(ds, vec![RouteMapper::new("t_order", table)]),
            sql: format!("SELECT * FROM {}", table),
            parameters: vec![],
        }
    }

    #[test]
    fn test_group_units_by_data_source() {
        let units = vec![
            unit("ds_0", "t_order_0"),
            unit("ds_1", "t_order_0"),
            unit("ds_0", "t_order_1"),
        ];
        let groups = group_units(units, ConnectionMode::OneConnectionPerUnit, 1);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].data_source, "ds_0");
        let indexes: Vec<usize> = groups[0].units.iter().map(|u| u.index).collect();
        assert_eq!(indexes, vec![0, 2]);
    }

    #[test]
    fn test_auto_mode_resolution() {
        let units = vec![
            unit("ds_0", "t_order_0"),
            unit("ds_0", "t_order_1"),
            unit("ds_1", "t_order_0"),
        ];
        let groups = group_units(units, ConnectionMode::Auto, 1);
        assert_eq!(groups[0].mode, ConnectionMode::OneConnectionPerDataSource);
        assert_eq!(groups[1].mode, ConnectionMode::OneConnectionPerUnit);
    }

    #[test]
    fn test_connection_mode_parse() {
        assert_eq!(
            "one-connection-per-data-source".parse::<ConnectionMode>().unwrap(),
            ConnectionMode::OneConnectionPerDataSource
        );
        assert!("pooled".parse::<ConnectionMode>().is_err());
    }
}
