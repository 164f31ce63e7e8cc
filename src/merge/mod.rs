//! Result merging.
//!
//! The [`MergeEngine`] turns the per-unit cursors of one statement into a
//! single logical cursor. Strategy selection, most specific first:
//!
//! - one result: pass-through
//! - grouping that cannot stream (or DISTINCT, or aggregates): memory merge
//! - GROUP BY equal to ORDER BY: group-by stream merge
//! - ORDER BY: order-by stream merge over a heap
//! - otherwise: iterator (concatenation)
//!
//! Pagination and derived-column hiding are applied as decorators.

pub mod aggregation;
pub mod compare;
pub mod decorator;
pub mod layout;
pub mod memory;
pub mod result;
pub mod stream;

pub use decorator::{LogicalProjectionMergedResult, PaginationDecoratorMergedResult};
pub use layout::MergeLayout;
pub use memory::GroupByMemoryMergedResult;
pub use result::{MemoryQueryResult, MergedResult, QueryResult, Row};
pub use stream::{GroupByStreamMergedResult, IteratorMergedResult, OrderByStreamMergedResult, PassThroughMergedResult};

use crate::context::{LogicSql, StatementKind};
use crate::error::MergeError;
use futures::Stream;
use result::close_all;
use tracing::{debug, instrument};

#[derive(Debug, Default, Clone, Copy)]
pub struct MergeEngine;

impl MergeEngine {
    pub fn new() -> Self {
        Self
    }

    /// Builds the logical cursor. Statement errors (unknown columns,
    /// aggregates without a combination rule) surface here, before any row.
    #[instrument(name = "merger.merge", skip_all, fields(results = results.len(), strategy = tracing::field::Empty))]
    pub fn merge(&self, mut results: Vec<Box<dyn QueryResult>>, logic_sql: &LogicSql) -> Result<Box<dyn MergedResult>, MergeError> {
        if results.len() == 1 {
            tracing::Span::current().record("strategy", "pass_through");
            if let Some(result) = results.pop() {
                return Ok(Box::new(PassThroughMergedResult::new(result)));
            }
        }
        let select = match &logic_sql.select {
            Some(select) if logic_sql.kind == StatementKind::Select && !results.is_empty() => select,
            _ => {
                tracing::Span::current().record("strategy", "iterator");
                return Ok(Box::new(IteratorMergedResult::new(results)));
            }
        };

        let derived = select.derived_columns();
        let columns = results[0].columns().to_vec();
        let layout = match MergeLayout::new(select, columns, &derived) {
            Ok(layout) => layout,
            Err(e) => {
                if let Err(close_error) = close_all(&mut results) {
                    debug!("Failed to close results after merge error: {}", close_error);
                }
                return Err(e);
            }
        };

        let (strategy, mut merged): (&str, Box<dyn MergedResult>) = if select.needs_group_merge() {
            if select.needs_memory_group_merge() {
                (
                    "group_by_memory",
                    Box::new(GroupByMemoryMergedResult::new(results, select, &layout)?),
                )
            } else {
                ("group_by_stream", Box::new(GroupByStreamMergedResult::new(results, &layout)?))
            }
        } else if !layout.order_keys.is_empty() {
            (
                "order_by_stream",
                Box::new(OrderByStreamMergedResult::new(results, layout.order_keys.clone())?),
            )
        } else {
            ("iterator", Box::new(IteratorMergedResult::new(results)))
        };
        tracing::Span::current().record("strategy", strategy);

        if let Some(pagination) = &select.pagination {
            let offset = pagination.offset(&logic_sql.parameters);
            let row_count = pagination.row_count(&logic_sql.parameters);
            debug!(offset, ?row_count, "Applying pagination decorator");
            merged = Box::new(PaginationDecoratorMergedResult::new(merged, offset, row_count));
        }
        if !derived.is_empty() {
            merged = Box::new(LogicalProjectionMergedResult::new(merged, layout.visible));
        }
        Ok(merged)
    }
}

/// Affected rows of a write. Sharded tables accumulate across units;
/// broadcast and single tables report one unit's count.
pub fn merge_update(affected: &[u64], accumulate: bool) -> u64 {
    if accumulate {
        affected.iter().sum()
    } else {
        affected.first().copied().unwrap_or(0)
    }
}

/// Adapts a merged cursor into a stream of rows, closing it once drained.
pub fn into_row_stream(mut merged: Box<dyn MergedResult>) -> impl Stream<Item = Result<Row, MergeError>> + Send {
    async_stream::try_stream! {
        while let Some(row) = merged.next_row()? {
            yield row;
        }
        merged.close()?;
    }
}
