//! Decorators layered over a merge strategy.

use super::result::{MergedResult, Row};
use crate::error::MergeError;

/// Skips `offset` logical rows, then yields at most `row_count`.
pub struct PaginationDecoratorMergedResult {
    inner: Box<dyn MergedResult>,
    offset: u64,
    row_count: Option<u64>,
    skipped: bool,
    returned: u64,
}

impl PaginationDecoratorMergedResult {
    pub fn new(inner: Box<dyn MergedResult>, offset: u64, row_count: Option<u64>) -> Self {
        Self {
            inner,
            offset,
            row_count,
            skipped: false,
            returned: 0,
        }
    }
}

impl MergedResult for PaginationDecoratorMergedResult {
    fn columns(&self) -> &[String] {
        self.inner.columns()
    }

    fn next_row(&mut self) -> Result<Option<Row>, MergeError> {
        if !self.skipped {
            self.skipped = true;
            for _ in 0..self.offset {
                if self.inner.next_row()?.is_none() {
                    return Ok(None);
                }
            }
        }
        if self.row_count.map_or(false, |limit| self.returned >= limit) {
            return Ok(None);
        }
        let row = self.inner.next_row()?;
        if row.is_some() {
            self.returned += 1;
        }
        Ok(row)
    }

    fn close(&mut self) -> Result<(), MergeError> {
        self.inner.close()
    }
}

/// Hides the derived columns appended for merging.
pub struct LogicalProjectionMergedResult {
    inner: Box<dyn MergedResult>,
    columns: Vec<String>,
}

impl LogicalProjectionMergedResult {
    pub fn new(inner: Box<dyn MergedResult>, visible: usize) -> Self {
        let columns = inner.columns().iter().take(visible).cloned().collect();
        Self { inner, columns }
    }
}

impl MergedResult for LogicalProjectionMergedResult {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Row>, MergeError> {
        Ok(self.inner.next_row()?.map(|mut row| {
            row.truncate(self.columns.len());
            row
        }))
    }

    fn close(&mut self) -> Result<(), MergeError> {
        self.inner.close()
    }
}
