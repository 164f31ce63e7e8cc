//! Physical layout of one logical table.

use super::inline;
use crate::error::{Error, Result};
use crate::sharding::ShardingStrategy;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One physical partition: a table on a data source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataNode {
    pub data_source: String,
    pub table: String,
}

impl DataNode {
    pub fn new(data_source: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            data_source: data_source.into(),
            table: table.into(),
        }
    }

    /// Parses `ds.table`.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().split_once('.') {
            Some((ds, table)) if !ds.is_empty() && !table.is_empty() && !table.contains('.') => {
                Ok(Self::new(ds.trim(), table.trim()))
            }
            _ => Err(Error::Config(format!("Invalid data node '{}', expected 'data_source.table'", raw))),
        }
    }
}

impl fmt::Display for DataNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.data_source, self.table)
    }
}

/// A sharded logical table and the ordered actual tables behind it.
#[derive(Debug, Clone)]
pub struct TableRule {
    pub logic_table: String,
    /// Data sources in declaration order, each with its ordered actual tables.
    nodes: Vec<(String, Vec<String>)>,
    pub database_strategy: Option<ShardingStrategy>,
    pub table_strategy: Option<ShardingStrategy>,
    pub key_generate_column: Option<String>,
}

impl TableRule {
    /// Builds the layout from an inline data node expression. An empty
    /// expression places a same-named table on every data source.
    pub fn new(logic_table: &str, actual_data_nodes: &str, data_source_names: &[String]) -> Result<Self> {
        let logic_table = logic_table.trim().to_ascii_lowercase();
        let data_nodes = if actual_data_nodes.trim().is_empty() {
            data_source_names
                .iter()
                .map(|ds| DataNode::new(ds.clone(), logic_table.clone()))
                .collect::<Vec<_>>()
        } else {
            inline::expand(actual_data_nodes)?
                .iter()
                .map(|raw| DataNode::parse(raw))
                .collect::<Result<Vec<_>>>()?
        };
        if data_nodes.is_empty() {
            return Err(Error::Config(format!("Table '{}' has no actual data nodes", logic_table)));
        }

        let mut nodes: Vec<(String, Vec<String>)> = Vec::new();
        for node in data_nodes {
            if !data_source_names.is_empty() && !data_source_names.contains(&node.data_source) {
                return Err(Error::Config(format!(
                    "Table '{}' references unknown data source '{}'",
                    logic_table, node.data_source
                )));
            }
            match nodes.iter_mut().find(|(ds, _)| *ds == node.data_source) {
                Some((_, tables)) => {
                    if tables.contains(&node.table) {
                        return Err(Error::Config(format!("Table '{}' lists data node '{}' twice", logic_table, node)));
                    }
                    tables.push(node.table);
                }
                None => nodes.push((node.data_source, vec![node.table])),
            }
        }

        Ok(Self {
            logic_table,
            nodes,
            database_strategy: None,
            table_strategy: None,
            key_generate_column: None,
        })
    }

    pub fn data_source_names(&self) -> Vec<String> {
        self.nodes.iter().map(|(ds, _)| ds.clone()).collect()
    }

    /// Actual tables on `data_source`, in declaration order.
    pub fn actual_tables(&self, data_source: &str) -> &[String] {
        self.nodes
            .iter()
            .find(|(ds, _)| ds == data_source)
            .map(|(_, tables)| tables.as_slice())
            .unwrap_or(&[])
    }

    pub fn data_nodes(&self) -> Vec<DataNode> {
        self.nodes
            .iter()
            .flat_map(|(ds, tables)| tables.iter().map(move |t| DataNode::new(ds.clone(), t.clone())))
            .collect()
    }

    /// Position of `actual_table` within the tables of `data_source`.
    pub fn actual_table_index(&self, data_source: &str, actual_table: &str) -> Option<usize> {
        self.actual_tables(data_source).iter().position(|t| t == actual_table)
    }

    pub fn is_key_generate_column(&self, column: &str) -> bool {
        self.key_generate_column
            .as_deref()
            .map_or(false, |c| c.eq_ignore_ascii_case(column))
    }
}
