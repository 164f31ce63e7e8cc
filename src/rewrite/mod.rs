//! Rewrite engine: one SQL text and parameter list per route unit.
//!
//! Rewriting is a pure function of the logic statement and the route
//! context. Tokens are applied in position order over the original text;
//! text between tokens is copied verbatim together with the parameters of
//! the placeholders it contains.

mod builder;

use crate::context::{DerivedColumn, LogicSql, SqlToken};
use crate::error::RewriteError;
use crate::route::{RouteContext, RouteUnit};
use crate::value::Value;
use builder::UnitBuilder;
use serde::Serialize;
use std::fmt;
use tracing::{debug, instrument};

/// Per-shard row count used when grouping happens in memory: every shard
/// row is needed, whatever the logical LIMIT.
pub const MEMORY_GROUP_ROW_COUNT: u64 = i64::MAX as u64;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlRewriteUnit {
    pub route_unit: RouteUnit,
    pub sql: String,
    pub parameters: Vec<Value>,
}

impl fmt::Display for SqlRewriteUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ::: {}", self.route_unit.data_source_name(), self.sql)?;
        if !self.parameters.is_empty() {
            let rendered: Vec<String> = self.parameters.iter().map(ToString::to_string).collect();
            write!(f, " ::: [{}]", rendered.join(", "))?;
        }
        Ok(())
    }
}

/// Statement-wide rewrite decisions shared by every unit.
#[derive(Debug, Default)]
pub(crate) struct RewritePlan {
    derived_columns: Vec<DerivedColumn>,
    revised_offset: Option<u64>,
    revised_row_count: Option<u64>,
}

impl RewritePlan {
    fn new(logic_sql: &LogicSql, route_context: &RouteContext) -> Self {
        let mut plan = RewritePlan::default();
        // one unit needs no merge, so the statement stays as written
        if route_context.is_single_unit() {
            return plan;
        }
        let Some(select) = &logic_sql.select else {
            return plan;
        };
        plan.derived_columns = select.derived_columns();
        if let Some(pagination) = &select.pagination {
            let offset = pagination.offset(&logic_sql.parameters);
            if pagination.offset.is_some() {
                plan.revised_offset = Some(0);
            }
            if let Some(row_count) = pagination.row_count(&logic_sql.parameters) {
                plan.revised_row_count = Some(if select.needs_memory_group_merge() {
                    MEMORY_GROUP_ROW_COUNT
                } else {
                    offset.saturating_add(row_count)
                });
            }
        }
        plan
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SqlRewriteEngine;

impl SqlRewriteEngine {
    pub fn new() -> Self {
        Self
    }

    #[instrument(name = "rewriter.rewrite", skip_all, fields(units = route_context.units.len()))]
    pub fn rewrite(&self, logic_sql: &LogicSql, route_context: &RouteContext) -> Result<Vec<SqlRewriteUnit>, RewriteError> {
        validate_tokens(logic_sql)?;
        validate_value_groups(logic_sql, route_context)?;
        let plan = RewritePlan::new(logic_sql, route_context);
        if !plan.derived_columns.is_empty() {
            debug!(derived = plan.derived_columns.len(), "Adding derived projections");
        }

        route_context
            .units
            .iter()
            .map(|unit| {
                let (sql, parameters) = UnitBuilder::new(logic_sql, &plan).build(unit, route_context)?;
                Ok(SqlRewriteUnit {
                    route_unit: unit.clone(),
                    sql,
                    parameters,
                })
            })
            .collect()
    }
}

/// Tokens must lie inside the statement, on character boundaries, and
/// must not overlap.
fn validate_tokens(logic_sql: &LogicSql) -> Result<(), RewriteError> {
    let sql = &logic_sql.sql;
    let mut previous_end = 0;
    let mut previous: Option<&SqlToken> = None;
    for token in &logic_sql.tokens {
        let (start, end) = (token.start(), token.end());
        if start > end || end > sql.len() || !sql.is_char_boundary(start) || !sql.is_char_boundary(end) {
            return Err(RewriteError::TokenPositionConflict {
                position: start,
                reason: format!("token [{}, {}) is outside the {}-byte statement", start, end, sql.len()),
            });
        }
        if previous.is_some() && start < previous_end {
            return Err(RewriteError::TokenPositionConflict {
                position: start,
                reason: format!("token starts before the previous token ends at {}", previous_end),
            });
        }
        previous_end = end;
        previous = Some(token);
    }
    Ok(())
}

/// Every INSERT value group must land on some unit.
fn validate_value_groups(logic_sql: &LogicSql, route_context: &RouteContext) -> Result<(), RewriteError> {
    let Some(insert) = &logic_sql.insert else {
        return Ok(());
    };
    if route_context.original_data_nodes.is_empty() {
        return Ok(());
    }
    for index in 0..insert.value_groups.len() {
        let routed = route_context.original_data_nodes.get(index).map_or(false, |nodes| {
            nodes.iter().any(|node| {
                route_context
                    .units
                    .iter()
                    .any(|unit| RouteContext::unit_contains(unit, &insert.table, node))
            })
        });
        if !routed {
            return Err(RewriteError::UnroutableValueGroup { index });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::annotate;
    use crate::route::{RouteMapper, RouteType};
    use crate::rule::DataNode;

    fn unit(ds: &str, logic: &str, actual: &str) -> RouteUnit {
        RouteUnit::new(ds, vec![RouteMapper::new(logic, actual)])
    }

    #[test]
    fn test_single_unit_keeps_pagination() {
        let logic_sql = annotate("SELECT * FROM t_order ORDER BY order_id LIMIT 10 OFFSET 20", vec![]).unwrap();
        let context = RouteContext::new(RouteType::Standard, vec![unit("ds_0", "t_order", "t_order_1")]);
        let units = SqlRewriteEngine::new().rewrite(&logic_sql, &context).unwrap();
        assert_eq!(units[0].sql, "SELECT * FROM t_order_1 ORDER BY order_id LIMIT 10 OFFSET 20");
    }

    #[test]
    fn test_multi_unit_revises_pagination() {
        let logic_sql = annotate(
            "SELECT order_id FROM t_order WHERE user_id = ? ORDER BY order_id LIMIT ? OFFSET ?",
            vec![Value::Int(1), Value::Int(10), Value::Int(20)],
        )
        .unwrap();
        let context = RouteContext::new(
            RouteType::Standard,
            vec![unit("ds_0", "t_order", "t_order_0"), unit("ds_0", "t_order", "t_order_1")],
        );
        let units = SqlRewriteEngine::new().rewrite(&logic_sql, &context).unwrap();
        assert_eq!(
            units[1].sql,
            "SELECT order_id FROM t_order_1 WHERE user_id = ? ORDER BY order_id LIMIT ? OFFSET ?"
        );
        assert_eq!(units[1].parameters, vec![Value::Int(1), Value::Int(30), Value::Int(0)]);
    }

    #[test]
    fn test_rewrite_is_repeatable() {
        let logic_sql = annotate(
            "SELECT user_id, AVG(price) AS avg_price FROM t_order WHERE status = ? GROUP BY user_id LIMIT 5",
            vec![Value::from("paid")],
        )
        .unwrap();
        let context = RouteContext::new(
            RouteType::Standard,
            vec![unit("ds_0", "t_order", "t_order_0"), unit("ds_1", "t_order", "t_order_1")],
        );
        let engine = SqlRewriteEngine::new();
        let first = engine.rewrite(&logic_sql, &context).unwrap();
        let second = engine.rewrite(&logic_sql, &context).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_overlapping_tokens_rejected() {
        let logic_sql = annotate("SELECT * FROM t_order", vec![])
            .unwrap()
            .with_tokens(vec![
                SqlToken::TableName {
                    start: 14,
                    end: 21,
                    logic_table: "t_order".to_string(),
                    quote: None,
                },
                SqlToken::Offset {
                    start: 18,
                    end: 19,
                    value: crate::context::PaginationValue::Literal(1),
                },
            ]);
        let context = RouteContext::new(RouteType::Standard, vec![unit("ds_0", "t_order", "t_order_0")]);
        let err = SqlRewriteEngine::new().rewrite(&logic_sql, &context).unwrap_err();
        assert!(matches!(err, RewriteError::TokenPositionConflict { position: 18, .. }));
    }

    #[test]
    fn test_unroutable_value_group() {
        let logic_sql = annotate("INSERT INTO t_order (order_id) VALUES (1), (2)", vec![]).unwrap();
        let mut context = RouteContext::new(RouteType::Standard, vec![unit("ds_0", "t_order", "t_order_1")]);
        context.original_data_nodes = vec![
            vec![DataNode::new("ds_0", "t_order_1")],
            vec![DataNode::new("ds_1", "t_order_0")],
        ];
        let err = SqlRewriteEngine::new().rewrite(&logic_sql, &context).unwrap_err();
        assert!(matches!(err, RewriteError::UnroutableValueGroup { index: 1 }));
    }

    #[test]
    fn test_missing_parameter() {
        let logic_sql = annotate("SELECT * FROM t_order WHERE order_id = ?", vec![]).unwrap();
        let context = RouteContext::new(RouteType::Standard, vec![unit("ds_0", "t_order", "t_order_0")]);
        let err = SqlRewriteEngine::new().rewrite(&logic_sql, &context).unwrap_err();
        assert!(matches!(err, RewriteError::MissingParameter { index: 0, count: 0 }));
    }
}
