//! The logic statement handed to the pipeline.
//!
//! A [`LogicSql`] carries the original SQL text, the logical tables it
//! touches, position-tagged rewrite tokens, the parameters of one invocation
//! and the SELECT/INSERT metadata that rewriting and merging need. Build one
//! by hand or with [`annotate`](annotate::annotate).

pub mod annotate;
pub mod condition;
pub mod hint;
pub mod insert;
pub mod select;
pub mod token;

pub use annotate::annotate;
pub use condition::{ConditionValue, ShardingCondition, ShardingConditionValue, ShardingConditions};
pub use hint::HintContext;
pub use insert::{GeneratedKey, InsertContext, InsertValue, InsertValueGroup};
pub use select::{
    AggregationKind, DerivedColumn, DerivedKind, ItemRef, NullsOrder, OrderByItem, OrderDirection, Pagination,
    PaginationValue, Projection, SelectContext,
};
pub use token::SqlToken;

use crate::rule::ShardingRule;
use crate::value::Value;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    /// CREATE / ALTER / DROP / TRUNCATE
    Ddl,
    /// SHOW / DESCRIBE / SET / USE
    Dal,
    /// BEGIN / COMMIT / ROLLBACK
    Tcl,
}

impl StatementKind {
    pub fn is_query(&self) -> bool {
        matches!(self, StatementKind::Select | StatementKind::Dal)
    }

    pub fn is_dml_write(&self) -> bool {
        matches!(self, StatementKind::Insert | StatementKind::Update | StatementKind::Delete)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicSql {
    pub kind: StatementKind,
    pub sql: String,
    /// Logical tables in order of first appearance, lower-cased.
    pub tables: Vec<String>,
    pub tokens: Vec<SqlToken>,
    /// Byte offset of every `?` placeholder, in order.
    pub parameter_markers: Vec<usize>,
    pub parameters: Vec<Value>,
    pub select: Option<SelectContext>,
    pub insert: Option<InsertContext>,
}

impl LogicSql {
    pub fn new(kind: StatementKind, sql: impl Into<String>) -> Self {
        Self {
            kind,
            sql: sql.into(),
            tables: Vec::new(),
            tokens: Vec::new(),
            parameter_markers: Vec::new(),
            parameters: Vec::new(),
            select: None,
            insert: None,
        }
    }

    pub fn with_tables(mut self, tables: &[&str]) -> Self {
        self.tables = tables.iter().map(|t| t.to_ascii_lowercase()).collect();
        self
    }

    pub fn with_parameters(mut self, parameters: Vec<Value>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_tokens(mut self, tokens: Vec<SqlToken>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_select(mut self, select: SelectContext) -> Self {
        self.select = Some(select);
        self
    }

    /// Fills keys for the table's key-generate column when the INSERT omits it.
    pub fn with_generated_keys(mut self, rule: &ShardingRule) -> Self {
        if let Some(insert) = self.insert.as_mut() {
            let omitted = match rule.table_rule(&insert.table).and_then(|t| t.key_generate_column.clone()) {
                Some(column) if !insert.columns.is_empty() && insert.column_index(&column).is_none() => Some(column),
                _ => None,
            };
            if let Some(column) = omitted {
                let values = insert
                    .value_groups
                    .iter()
                    .filter_map(|_| rule.generate_key(&insert.table).map(|(_, key)| key))
                    .collect();
                insert.generated_key = Some(GeneratedKey { column, values });
            }
        }
        self
    }

    pub fn pagination(&self) -> Option<&Pagination> {
        self.select.as_ref().and_then(|s| s.pagination.as_ref())
    }
}
