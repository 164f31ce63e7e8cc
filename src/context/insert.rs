//! INSERT metadata: column list, value groups and generated keys.

use crate::value::Value;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InsertValue {
    Literal(Value),
    /// Index into the statement parameters.
    Parameter(usize),
    /// Anything that cannot be evaluated without a database, e.g. `NOW()`.
    Expression(String),
}

impl InsertValue {
    pub fn resolve(&self, parameters: &[Value]) -> Option<Value> {
        match self {
            InsertValue::Literal(v) => Some(v.clone()),
            InsertValue::Parameter(i) => parameters.get(*i).cloned(),
            InsertValue::Expression(_) => None,
        }
    }
}

/// One parenthesised VALUES row, spanning `[start, end)` of the SQL text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertValueGroup {
    pub start: usize,
    pub end: usize,
    pub values: Vec<InsertValue>,
}

/// Keys generated for a column the INSERT left out, one per value group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedKey {
    pub column: String,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsertContext {
    pub table: String,
    pub columns: Vec<String>,
    pub value_groups: Vec<InsertValueGroup>,
    pub generated_key: Option<GeneratedKey>,
}

impl InsertContext {
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(column))
    }

    /// Value of `column` in group `group`, falling back to the generated key.
    pub fn value_of(&self, group: usize, column: &str, parameters: &[Value]) -> Option<Value> {
        if let Some(index) = self.column_index(column) {
            return self
                .value_groups
                .get(group)
                .and_then(|g| g.values.get(index))
                .and_then(|v| v.resolve(parameters));
        }
        match &self.generated_key {
            Some(key) if key.column.eq_ignore_ascii_case(column) => key.values.get(group).cloned(),
            _ => None,
        }
    }
}
