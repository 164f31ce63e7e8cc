//! DuckDB-backed data source.
//!
//! Every connection handed out is a clone of one root connection, so all
//! units of a data source see the same database. Rows are materialised
//! before the connection is released.

use super::{Connection, DataSource};
use crate::merge::{MemoryQueryResult, QueryResult, Row};
use crate::value::Value;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use duckdb::types::{TimeUnit, ToSqlOutput, Value as DuckValue};
use duckdb::{params_from_iter, ToSql};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct DuckDbDataSource {
    name: String,
    root: Mutex<duckdb::Connection>,
}

impl DuckDbDataSource {
    pub fn open_in_memory(name: &str) -> anyhow::Result<Self> {
        Ok(Self {
            name: name.to_string(),
            root: Mutex::new(duckdb::Connection::open_in_memory()?),
        })
    }

    pub fn open(name: &str, path: impl AsRef<Path>) -> anyhow::Result<Self> {
        Ok(Self {
            name: name.to_string(),
            root: Mutex::new(duckdb::Connection::open(path)?),
        })
    }

    /// Opens from a connection string: `:memory:` or a database file path.
    pub fn from_connection_string(name: &str, connection: &str) -> anyhow::Result<Arc<Self>> {
        let source = if connection.is_empty() || connection == ":memory:" {
            Self::open_in_memory(name)?
        } else {
            Self::open(name, connection)?
        };
        Ok(Arc::new(source))
    }

    /// Runs setup statements directly against the database.
    pub async fn execute_batch(&self, sql: &str) -> anyhow::Result<()> {
        let root = self.root.lock().await;
        root.execute_batch(sql)?;
        Ok(())
    }
}

#[async_trait]
impl DataSource for DuckDbDataSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connection(&self) -> anyhow::Result<Box<dyn Connection>> {
        let root = self.root.lock().await;
        Ok(Box::new(DuckDbConnection {
            conn: root.try_clone()?,
        }))
    }
}

struct DuckDbConnection {
    conn: duckdb::Connection,
}

#[async_trait]
impl Connection for DuckDbConnection {
    async fn query(&mut self, sql: &str, parameters: &[Value]) -> anyhow::Result<Box<dyn QueryResult>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(parameters.iter()))?;
        let mut data: Vec<Row> = Vec::new();
        while let Some(row) = rows.next()? {
            let count = row.as_ref().column_count();
            let mut values = Vec::with_capacity(count);
            for index in 0..count {
                values.push(from_duckdb(row.get::<_, DuckValue>(index)?));
            }
            data.push(values);
        }
        drop(rows);
        let columns = stmt.column_names();
        Ok(MemoryQueryResult::new(columns, data).boxed())
    }

    async fn execute(&mut self, sql: &str, parameters: &[Value]) -> anyhow::Result<u64> {
        let affected = self.conn.execute(sql, params_from_iter(parameters.iter()))?;
        Ok(affected as u64)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        let value = match self {
            Value::Null => DuckValue::Null,
            Value::Bool(b) => DuckValue::Boolean(*b),
            Value::Int(i) => DuckValue::BigInt(*i),
            Value::Float(f) => DuckValue::Double(*f),
            Value::Text(s) => DuckValue::Text(s.clone()),
            Value::Timestamp(ts) => DuckValue::Timestamp(TimeUnit::Microsecond, ts.and_utc().timestamp_micros()),
        };
        Ok(ToSqlOutput::Owned(value))
    }
}

fn timestamp(unit: TimeUnit, raw: i64) -> Option<NaiveDateTime> {
    let micros = match unit {
        TimeUnit::Second => raw.checked_mul(1_000_000)?,
        TimeUnit::Millisecond => raw.checked_mul(1_000)?,
        TimeUnit::Microsecond => raw,
        TimeUnit::Nanosecond => raw / 1_000,
    };
    DateTime::from_timestamp_micros(micros).map(|dt| dt.naive_utc())
}

fn from_duckdb(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(b) => Value::Bool(b),
        DuckValue::TinyInt(i) => Value::Int(i.into()),
        DuckValue::SmallInt(i) => Value::Int(i.into()),
        DuckValue::Int(i) => Value::Int(i.into()),
        DuckValue::BigInt(i) => Value::Int(i),
        DuckValue::UTinyInt(i) => Value::Int(i.into()),
        DuckValue::USmallInt(i) => Value::Int(i.into()),
        DuckValue::UInt(i) => Value::Int(i.into()),
        DuckValue::UBigInt(i) => i64::try_from(i).map(Value::Int).unwrap_or(Value::Float(i as f64)),
        DuckValue::HugeInt(i) => i64::try_from(i).map(Value::Int).unwrap_or(Value::Float(i as f64)),
        DuckValue::Float(f) => Value::Float(f.into()),
        DuckValue::Double(f) => Value::Float(f),
        DuckValue::Decimal(d) => d.to_string().parse().map(Value::Float).unwrap_or(Value::Null),
        DuckValue::Text(s) => Value::Text(s),
        DuckValue::Timestamp(unit, raw) => timestamp(unit, raw).map(Value::Timestamp).unwrap_or(Value::Null),
        DuckValue::Date32(days) => NaiveDate::from_num_days_from_ce_opt(days + 719_163)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(Value::Timestamp)
            .unwrap_or(Value::Null),
        other => Value::Text(format!("{:?}", other)),
    }
}
