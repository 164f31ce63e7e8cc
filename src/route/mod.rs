//! Routing results.
//!
//! A [`RouteContext`] lists the physical targets of one statement. Each
//! [`RouteUnit`] is one data source plus the actual table chosen for every
//! logical table on it.

pub mod router;

pub use router::ShardingRouter;

use crate::rule::DataNode;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteMapper {
    pub logic_name: String,
    pub actual_name: String,
}

impl RouteMapper {
    pub fn new(logic_name: impl Into<String>, actual_name: impl Into<String>) -> Self {
        Self {
            logic_name: logic_name.into(),
            actual_name: actual_name.into(),
        }
    }

    pub fn identity(name: &str) -> Self {
        Self::new(name, name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteUnit {
    pub data_source: RouteMapper,
    pub table_mappers: Vec<RouteMapper>,
}

impl RouteUnit {
    pub fn new(data_source: &str, table_mappers: Vec<RouteMapper>) -> Self {
        Self {
            data_source: RouteMapper::identity(data_source),
            table_mappers,
        }
    }

    pub fn data_source_name(&self) -> &str {
        &self.data_source.actual_name
    }

    /// Actual table for `logic_table` in this unit.
    pub fn actual_table(&self, logic_table: &str) -> Option<&str> {
        self.table_mappers
            .iter()
            .find(|m| m.logic_name.eq_ignore_ascii_case(logic_table))
            .map(|m| m.actual_name.as_str())
    }

    pub fn actual_tables(&self) -> Vec<String> {
        self.table_mappers.iter().map(|m| m.actual_name.clone()).collect()
    }
}

impl fmt::Display for RouteUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.data_source_name())?;
        for (i, mapper) in self.table_mappers.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}->{}", mapper.logic_name, mapper.actual_name)?;
        }
        write!(f, "]")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteType {
    Standard,
    Complex,
    DatabaseBroadcast,
    TableBroadcast,
    Unicast,
    Single,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteContext {
    pub route_type: RouteType,
    pub units: Vec<RouteUnit>,
    /// For INSERTs, the data nodes each VALUES group routed to, by group index.
    pub original_data_nodes: Vec<Vec<DataNode>>,
}

impl RouteContext {
    pub fn new(route_type: RouteType, units: Vec<RouteUnit>) -> Self {
        Self {
            route_type,
            units,
            original_data_nodes: Vec::new(),
        }
    }

    pub fn is_single_unit(&self) -> bool {
        self.units.len() == 1
    }

    /// Distinct data sources, in unit order.
    pub fn data_source_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for unit in &self.units {
            if !names.iter().any(|n| n == unit.data_source_name()) {
                names.push(unit.data_source_name().to_string());
            }
        }
        names
    }

    /// Whether `unit` holds the given data node for `logic_table`.
    pub fn unit_contains(unit: &RouteUnit, logic_table: &str, node: &DataNode) -> bool {
        unit.data_source_name() == node.data_source && unit.actual_table(logic_table) == Some(node.table.as_str())
    }
}
