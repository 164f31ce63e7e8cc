//! Assembles the SQL text and parameters of one rewrite unit.

use super::RewritePlan;
use crate::context::token::quote_identifier;
use crate::context::{InsertContext, LogicSql, PaginationValue, SqlToken};
use crate::error::RewriteError;
use crate::route::{RouteContext, RouteUnit};
use crate::value::Value;

pub(super) struct UnitBuilder<'a> {
    logic_sql: &'a LogicSql,
    plan: &'a RewritePlan,
    sql: String,
    parameters: Vec<Value>,
    next_marker: usize,
}

impl<'a> UnitBuilder<'a> {
    pub(super) fn new(logic_sql: &'a LogicSql, plan: &'a RewritePlan) -> Self {
        Self {
            logic_sql,
            plan,
            sql: String::with_capacity(logic_sql.sql.len() + 32),
            parameters: Vec::new(),
            next_marker: 0,
        }
    }

    pub(super) fn build(mut self, unit: &RouteUnit, route_context: &RouteContext) -> Result<(String, Vec<Value>), RewriteError> {
        let source = self.logic_sql.sql.as_str();
        let mut cursor = 0;
        for token in &self.logic_sql.tokens {
            self.copy(cursor, token.start())?;
            self.emit(token, unit, route_context)?;
            cursor = token.end();
        }
        self.copy(cursor, source.len())?;

        if self.logic_sql.parameter_markers.is_empty() {
            // No marker positions: hand the parameters through untouched.
            self.parameters = self.logic_sql.parameters.clone();
        }
        Ok((self.sql, self.parameters))
    }

    /// Copies original text, carrying along the parameters of its placeholders.
    fn copy(&mut self, start: usize, end: usize) -> Result<(), RewriteError> {
        self.sql.push_str(&self.logic_sql.sql[start..end]);
        self.take_parameters(start, end)
    }

    fn take_parameters(&mut self, start: usize, end: usize) -> Result<(), RewriteError> {
        let markers = &self.logic_sql.parameter_markers;
        while let Some(&position) = markers.get(self.next_marker) {
            if position >= end {
                break;
            }
            if position >= start {
                let index = self.next_marker;
                let value = self
                    .logic_sql
                    .parameters
                    .get(index)
                    .cloned()
                    .ok_or(RewriteError::MissingParameter {
                        index,
                        count: self.logic_sql.parameters.len(),
                    })?;
                self.parameters.push(value);
            }
            self.next_marker += 1;
        }
        Ok(())
    }

    /// Drops the placeholders of `[start, end)` without emitting their parameters.
    fn skip_parameters(&mut self, end: usize) {
        let markers = &self.logic_sql.parameter_markers;
        while markers.get(self.next_marker).map_or(false, |&p| p < end) {
            self.next_marker += 1;
        }
    }

    fn emit(&mut self, token: &SqlToken, unit: &RouteUnit, route_context: &RouteContext) -> Result<(), RewriteError> {
        match token {
            SqlToken::TableName {
                start,
                end,
                logic_table,
                quote,
            } => match unit.actual_table(logic_table) {
                Some(actual) => self.sql.push_str(&quote_identifier(actual, *quote)),
                None => self.copy(*start, *end)?,
            },
            SqlToken::Projections { .. } => {
                for derived in &self.plan.derived_columns {
                    self.sql
                        .push_str(&format!(", {} AS {}", derived.expression, derived.alias));
                }
            }
            SqlToken::Offset { start, end, value } => match self.plan.revised_offset {
                Some(revised) => self.emit_pagination(*value, revised, *end),
                None => self.copy(*start, *end)?,
            },
            SqlToken::RowCount { start, end, value } => match self.plan.revised_row_count {
                Some(revised) => self.emit_pagination(*value, revised, *end),
                None => self.copy(*start, *end)?,
            },
            SqlToken::InsertColumns { .. } => {
                if let Some(key) = self.insert().and_then(|i| i.generated_key.as_ref()) {
                    let column = format!(", {}", key.column);
                    self.sql.push_str(&column);
                }
            }
            SqlToken::InsertValues { end, .. } => self.emit_value_groups(*end, unit, route_context)?,
        }
        Ok(())
    }

    fn insert(&self) -> Option<&'a InsertContext> {
        self.logic_sql.insert.as_ref()
    }

    fn emit_pagination(&mut self, original: PaginationValue, revised: u64, end: usize) {
        let revised = revised.min(i64::MAX as u64) as i64;
        match original {
            PaginationValue::Literal(_) => self.sql.push_str(&revised.to_string()),
            PaginationValue::Parameter(_) => {
                self.sql.push('?');
                self.parameters.push(Value::Int(revised));
            }
        }
        self.skip_parameters(end);
    }

    fn emit_value_groups(&mut self, end: usize, unit: &RouteUnit, route_context: &RouteContext) -> Result<(), RewriteError> {
        let Some(insert) = self.insert() else {
            return Ok(());
        };
        let parameterised = !self.logic_sql.parameter_markers.is_empty();
        let mut first = true;
        for (index, group) in insert.value_groups.iter().enumerate() {
            let keep = route_context.original_data_nodes.is_empty()
                || route_context
                    .original_data_nodes
                    .get(index)
                    .map_or(false, |nodes| {
                        nodes
                            .iter()
                            .any(|node| RouteContext::unit_contains(unit, &insert.table, node))
                    });
            if !keep {
                self.skip_parameters(group.end);
                continue;
            }
            if !first {
                self.sql.push_str(", ");
            }
            first = false;

            let generated = insert.generated_key.as_ref().and_then(|k| k.values.get(index));
            match generated {
                Some(key) => {
                    // the group ends with ')'; the key goes just before it
                    self.copy(group.start, group.end - 1)?;
                    if parameterised {
                        self.sql.push_str(", ?");
                        self.parameters.push(key.clone());
                    } else {
                        self.sql.push_str(&format!(", {}", key.to_sql_literal()));
                    }
                    self.copy(group.end - 1, group.end)?;
                }
                None => self.copy(group.start, group.end)?,
            }
        }
        self.skip_parameters(end);
        Ok(())
    }
}
