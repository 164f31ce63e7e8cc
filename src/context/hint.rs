//! Out-of-band routing values.
//!
//! A [`HintContext`] belongs to one statement. It is passed explicitly to the
//! router and never stored between statements.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HintContext {
    database_values: HashMap<String, Vec<Value>>,
    table_values: HashMap<String, Vec<Value>>,
    data_source: Option<String>,
}

impl HintContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces every table of the statement onto one data source.
    pub fn with_data_source(mut self, data_source: impl Into<String>) -> Self {
        self.data_source = Some(data_source.into());
        self
    }

    pub fn with_database_value(mut self, logic_table: &str, value: impl Into<Value>) -> Self {
        self.database_values
            .entry(logic_table.to_ascii_lowercase())
            .or_default()
            .push(value.into());
        self
    }

    pub fn with_table_value(mut self, logic_table: &str, value: impl Into<Value>) -> Self {
        self.table_values
            .entry(logic_table.to_ascii_lowercase())
            .or_default()
            .push(value.into());
        self
    }

    pub fn data_source(&self) -> Option<&str> {
        self.data_source.as_deref()
    }

    pub fn database_values(&self, logic_table: &str) -> Option<&[Value]> {
        self.database_values
            .get(&logic_table.to_ascii_lowercase())
            .map(Vec::as_slice)
    }

    pub fn table_values(&self, logic_table: &str) -> Option<&[Value]> {
        self.table_values.get(&logic_table.to_ascii_lowercase()).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.database_values.is_empty() && self.table_values.is_empty() && self.data_source.is_none()
    }
}
