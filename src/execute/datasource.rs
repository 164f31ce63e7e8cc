//! Backend contracts. Errors cross this boundary as `anyhow::Error` and are
//! tagged with the failing unit by the executor.

use crate::merge::QueryResult;
use crate::value::Value;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// One physical connection. Never shared between units running at the same time.
#[async_trait]
pub trait Connection: Send {
    /// Runs a query. The returned cursor must not borrow the connection.
    async fn query(&mut self, sql: &str, parameters: &[Value]) -> anyhow::Result<Box<dyn QueryResult>>;

    /// Runs a write or DDL statement, returning affected rows.
    async fn execute(&mut self, sql: &str, parameters: &[Value]) -> anyhow::Result<u64>;

    async fn close(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[async_trait]
pub trait DataSource: Send + Sync {
    fn name(&self) -> &str;

    async fn connection(&self) -> anyhow::Result<Box<dyn Connection>>;
}

/// Data sources keyed by name.
#[derive(Clone, Default)]
pub struct DataSourceMap {
    sources: BTreeMap<String, Arc<dyn DataSource>>,
}

impl DataSourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: Arc<dyn DataSource>) {
        self.sources.insert(source.name().to_string(), source);
    }

    pub fn with(mut self, source: Arc<dyn DataSource>) -> Self {
        self.insert(source);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DataSource>> {
        self.sources.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.sources.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl fmt::Debug for DataSourceMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSourceMap").field("sources", &self.names()).finish()
    }
}
