//! Memory merge: materialise every shard row, then group, dedupe and sort.

use super::compare::{compare_rows, key_of};
use super::layout::MergeLayout;
use super::result::{close_all, MergedResult, QueryResult, Row};
use super::stream::GroupAccumulator;
use crate::context::SelectContext;
use crate::error::MergeError;
use crate::value::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

pub struct GroupByMemoryMergedResult {
    columns: Vec<String>,
    rows: VecDeque<Row>,
}

impl GroupByMemoryMergedResult {
    /// Consumes and closes every shard result before returning.
    pub fn new(
        mut results: Vec<Box<dyn QueryResult>>,
        select: &SelectContext,
        layout: &MergeLayout,
    ) -> Result<Self, MergeError> {
        let loaded = load_groups(&mut results, select, layout);
        let closed = close_all(&mut results);
        let mut rows = loaded?;
        closed?;

        if select.distinct {
            let visible = layout.visible_columns();
            let mut seen: HashSet<Vec<Value>> = HashSet::new();
            rows.retain(|row| seen.insert(key_of(row, &visible)));
        }
        if !layout.order_keys.is_empty() {
            rows.sort_by(|a, b| compare_rows(a, b, &layout.order_keys));
        }
        debug!(rows = rows.len(), "Memory merge complete");
        Ok(Self {
            columns: layout.columns.clone(),
            rows: rows.into(),
        })
    }
}

/// Groups rows by the GROUP BY columns in first-seen order. With aggregates
/// and no GROUP BY everything falls in one group; with neither, rows pass through.
fn load_groups(
    results: &mut [Box<dyn QueryResult>],
    select: &SelectContext,
    layout: &MergeLayout,
) -> Result<Vec<Row>, MergeError> {
    let grouping = !select.group_by.is_empty() || !layout.aggregations.is_empty();
    let group_columns = layout.group_columns();
    let mut order: Vec<GroupAccumulator> = Vec::new();
    let mut index: HashMap<Vec<Value>, usize> = HashMap::new();
    let mut plain: Vec<Row> = Vec::new();

    for result in results.iter_mut() {
        while let Some(row) = result.next_row()? {
            if !grouping {
                plain.push(row);
                continue;
            }
            let key = key_of(&row, &group_columns);
            match index.get(&key) {
                Some(&slot) => order[slot].merge(&row, &layout.aggregations),
                None => {
                    index.insert(key, order.len());
                    order.push(GroupAccumulator::new(row, &layout.aggregations));
                }
            }
        }
    }
    if !grouping {
        return Ok(plain);
    }
    Ok(order
        .into_iter()
        .map(|group| group.finish(&layout.aggregations))
        .collect())
}

impl MergedResult for GroupByMemoryMergedResult {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Row>, MergeError> {
        Ok(self.rows.pop_front())
    }

    fn close(&mut self) -> Result<(), MergeError> {
        self.rows.clear();
        Ok(())
    }
}
