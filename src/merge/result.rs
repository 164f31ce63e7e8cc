//! Cursor contracts between execution and merging.

use crate::error::MergeError;
use crate::value::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub type Row = Vec<Value>;

/// Rows returned by one execution unit. Forward-only, single pass.
pub trait QueryResult: Send {
    /// Column labels as reported by the backend.
    fn columns(&self) -> &[String];

    fn next_row(&mut self) -> anyhow::Result<Option<Row>>;

    fn close(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// The single logical cursor handed to the caller.
pub trait MergedResult: Send {
    fn columns(&self) -> &[String];

    fn next_row(&mut self) -> Result<Option<Row>, MergeError>;

    /// Closes every underlying shard cursor.
    fn close(&mut self) -> Result<(), MergeError>;

    /// Drains the cursor, then closes it.
    fn collect_rows(&mut self) -> Result<Vec<Row>, MergeError> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row()? {
            rows.push(row);
        }
        self.close()?;
        Ok(rows)
    }
}

/// A fully materialised shard result.
#[derive(Debug, Clone)]
pub struct MemoryQueryResult {
    columns: Vec<String>,
    rows: VecDeque<Row>,
    closed: Arc<AtomicBool>,
}

impl MemoryQueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows: rows.into(),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shorthand for tests and fixtures.
    pub fn from_rows(columns: &[&str], rows: Vec<Row>) -> Self {
        Self::new(columns.iter().map(|c| c.to_string()).collect(), rows)
    }

    /// Observes whether the result has been closed.
    pub fn close_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }

    pub fn boxed(self) -> Box<dyn QueryResult> {
        Box::new(self)
    }
}

impl QueryResult for MemoryQueryResult {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> anyhow::Result<Option<Row>> {
        if self.closed.load(Ordering::Acquire) {
            anyhow::bail!("result already closed");
        }
        Ok(self.rows.pop_front())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.rows.clear();
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Closes every result, reporting the first failure after trying them all.
pub(crate) fn close_all(results: &mut [Box<dyn QueryResult>]) -> Result<(), MergeError> {
    let mut first = None;
    for result in results.iter_mut() {
        if let Err(e) = result.close() {
            first.get_or_insert(e);
        }
    }
    match first {
        Some(e) => Err(MergeError::Cursor(e)),
        None => Ok(()),
    }
}
