//! Position-tagged rewrite tokens.
//!
//! Positions are byte offsets into the logic SQL. Replacing tokens cover the
//! half-open range `[start, end)`; insertion tokens have `start == end`.

use super::select::PaginationValue;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlToken {
    TableName {
        start: usize,
        end: usize,
        logic_table: String,
        quote: Option<char>,
    },
    /// Where derived columns are appended to the select list.
    Projections { position: usize },
    Offset {
        start: usize,
        end: usize,
        value: PaginationValue,
    },
    RowCount {
        start: usize,
        end: usize,
        value: PaginationValue,
    },
    /// Just before the `)` closing an INSERT column list.
    InsertColumns { position: usize },
    /// Every VALUES group of an INSERT.
    InsertValues { start: usize, end: usize },
}

impl SqlToken {
    pub fn start(&self) -> usize {
        match self {
            SqlToken::TableName { start, .. }
            | SqlToken::Offset { start, .. }
            | SqlToken::RowCount { start, .. }
            | SqlToken::InsertValues { start, .. } => *start,
            SqlToken::Projections { position } | SqlToken::InsertColumns { position } => *position,
        }
    }

    pub fn end(&self) -> usize {
        match self {
            SqlToken::TableName { end, .. }
            | SqlToken::Offset { end, .. }
            | SqlToken::RowCount { end, .. }
            | SqlToken::InsertValues { end, .. } => *end,
            SqlToken::Projections { position } | SqlToken::InsertColumns { position } => *position,
        }
    }

    pub fn is_insertion(&self) -> bool {
        self.start() == self.end()
    }
}

/// Wraps an identifier in the quote style it was written with.
pub fn quote_identifier(name: &str, quote: Option<char>) -> String {
    match quote {
        Some('[') => format!("[{}]", name),
        Some(q) => format!("{}{}{}", q, name, q),
        None => name.to_string(),
    }
}
