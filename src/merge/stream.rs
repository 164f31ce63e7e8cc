//! Streaming merge strategies: rows are pulled from shard cursors on demand.

use super::aggregation::AggregationUnit;
use super::compare::{compare_rows, key_of, SortKey};
use super::layout::{AggregationColumn, MergeLayout};
use super::result::{close_all, MergedResult, QueryResult, Row};
use crate::error::MergeError;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use tracing::debug;

/// Wraps the only shard result unchanged.
pub struct PassThroughMergedResult {
    result: Box<dyn QueryResult>,
}

impl PassThroughMergedResult {
    pub fn new(result: Box<dyn QueryResult>) -> Self {
        Self { result }
    }
}

impl MergedResult for PassThroughMergedResult {
    fn columns(&self) -> &[String] {
        self.result.columns()
    }

    fn next_row(&mut self) -> Result<Option<Row>, MergeError> {
        Ok(self.result.next_row()?)
    }

    fn close(&mut self) -> Result<(), MergeError> {
        Ok(self.result.close()?)
    }
}

/// Drains shard results one after another.
pub struct IteratorMergedResult {
    columns: Vec<String>,
    results: Vec<Box<dyn QueryResult>>,
    current: usize,
}

impl IteratorMergedResult {
    pub fn new(results: Vec<Box<dyn QueryResult>>) -> Self {
        let columns = results.first().map(|r| r.columns().to_vec()).unwrap_or_default();
        Self {
            columns,
            results,
            current: 0,
        }
    }
}

impl MergedResult for IteratorMergedResult {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Row>, MergeError> {
        while let Some(result) = self.results.get_mut(self.current) {
            if let Some(row) = result.next_row()? {
                return Ok(Some(row));
            }
            self.current += 1;
        }
        Ok(None)
    }

    fn close(&mut self) -> Result<(), MergeError> {
        close_all(&mut self.results)
    }
}

/// Current row of one shard cursor inside the heap.
struct HeapEntry {
    row: Row,
    shard: usize,
    keys: Arc<[SortKey]>,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    // BinaryHeap is a max-heap; reverse so the smallest row surfaces first.
    // Ties go to the lower shard index to keep output deterministic.
    fn cmp(&self, other: &Self) -> Ordering {
        compare_rows(&self.row, &other.row, &self.keys)
            .then(self.shard.cmp(&other.shard))
            .reverse()
    }
}

/// Merges locally ordered shard results through a min-heap keyed by ORDER BY.
pub struct OrderByStreamMergedResult {
    columns: Vec<String>,
    results: Vec<Box<dyn QueryResult>>,
    heap: BinaryHeap<HeapEntry>,
    keys: Arc<[SortKey]>,
}

impl OrderByStreamMergedResult {
    pub fn new(mut results: Vec<Box<dyn QueryResult>>, keys: Vec<SortKey>) -> Result<Self, MergeError> {
        let columns = results.first().map(|r| r.columns().to_vec()).unwrap_or_default();
        let keys: Arc<[SortKey]> = keys.into();
        let heap = match prime_heap(&mut results, &keys) {
            Ok(heap) => heap,
            Err(e) => {
                if let Err(close_error) = close_all(&mut results) {
                    debug!("Failed to close results after cursor error: {}", close_error);
                }
                return Err(e);
            }
        };
        Ok(Self {
            columns,
            results,
            heap,
            keys,
        })
    }

    /// The row the next call to `next_row` will return.
    fn peek(&self) -> Option<&Row> {
        self.heap.peek().map(|e| &e.row)
    }
}

/// Reads the first row of every shard.
fn prime_heap(results: &mut [Box<dyn QueryResult>], keys: &Arc<[SortKey]>) -> Result<BinaryHeap<HeapEntry>, MergeError> {
    let mut heap = BinaryHeap::with_capacity(results.len());
    for (shard, result) in results.iter_mut().enumerate() {
        if let Some(row) = result.next_row()? {
            heap.push(HeapEntry {
                row,
                shard,
                keys: Arc::clone(keys),
            });
        }
    }
    Ok(heap)
}

impl MergedResult for OrderByStreamMergedResult {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Row>, MergeError> {
        let Some(HeapEntry { row, shard, .. }) = self.heap.pop() else {
            return Ok(None);
        };
        if let Some(next) = self.results[shard].next_row()? {
            self.heap.push(HeapEntry {
                row: next,
                shard,
                keys: Arc::clone(&self.keys),
            });
        }
        Ok(Some(row))
    }

    fn close(&mut self) -> Result<(), MergeError> {
        self.heap.clear();
        close_all(&mut self.results)
    }
}

/// Combines one group's aggregate partials into its first row.
pub(crate) struct GroupAccumulator {
    row: Row,
    units: Vec<AggregationUnit>,
}

impl GroupAccumulator {
    pub(crate) fn new(row: Row, aggregations: &[AggregationColumn]) -> Self {
        let mut accumulator = Self {
            units: aggregations.iter().map(|a| AggregationUnit::new(a.kind)).collect(),
            row: Vec::new(),
        };
        accumulator.merge(&row, aggregations);
        accumulator.row = row;
        accumulator
    }

    pub(crate) fn merge(&mut self, row: &Row, aggregations: &[AggregationColumn]) {
        for (unit, aggregation) in self.units.iter_mut().zip(aggregations) {
            let inputs: Row = key_of(row, &aggregation.inputs);
            unit.merge(&inputs);
        }
    }

    pub(crate) fn finish(mut self, aggregations: &[AggregationColumn]) -> Row {
        for (unit, aggregation) in self.units.iter().zip(aggregations) {
            if let Some(cell) = self.row.get_mut(aggregation.column) {
                *cell = unit.result();
            }
        }
        self.row
    }
}

/// GROUP BY whose items equal the ORDER BY items: each group arrives contiguously
/// from the order-by heap and is folded as it streams past.
pub struct GroupByStreamMergedResult {
    inner: OrderByStreamMergedResult,
    group_columns: Vec<usize>,
    aggregations: Vec<AggregationColumn>,
}

impl GroupByStreamMergedResult {
    pub fn new(results: Vec<Box<dyn QueryResult>>, layout: &MergeLayout) -> Result<Self, MergeError> {
        Ok(Self {
            inner: OrderByStreamMergedResult::new(results, layout.order_keys.clone())?,
            group_columns: layout.group_columns(),
            aggregations: layout.aggregations.clone(),
        })
    }
}

impl MergedResult for GroupByStreamMergedResult {
    fn columns(&self) -> &[String] {
        self.inner.columns()
    }

    fn next_row(&mut self) -> Result<Option<Row>, MergeError> {
        let Some(first) = self.inner.next_row()? else {
            return Ok(None);
        };
        let key = key_of(&first, &self.group_columns);
        let mut group = GroupAccumulator::new(first, &self.aggregations);
        while self
            .inner
            .peek()
            .map_or(false, |next| key_of(next, &self.group_columns) == key)
        {
            if let Some(row) = self.inner.next_row()? {
                group.merge(&row, &self.aggregations);
            }
        }
        Ok(Some(group.finish(&self.aggregations)))
    }

    fn close(&mut self) -> Result<(), MergeError> {
        self.inner.close()
    }
}
