//! Concurrent execution engine.

use super::{group_units, ConnectionMode, DataSourceMap, ExecuteResult, ExecutionGroup, ExecutionUnit, StatementType};
use crate::error::ExecutionError;
use crate::rewrite::SqlRewriteUnit;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

enum Outcome {
    Done(Result<ExecuteResult, ExecutionError>),
    /// Skipped because another unit already failed.
    Cancelled,
}

type UnitOutcome = (usize, Outcome);

/// Runs execution groups as tokio tasks, at most `max_in_flight` units at a
/// time. The first unit failure stops units that have not started yet; every
/// task is joined before returning.
#[derive(Debug, Clone)]
pub struct ExecutorEngine {
    semaphore: Arc<Semaphore>,
    max_in_flight: usize,
    mode: ConnectionMode,
    max_connections_per_query: usize,
}

impl ExecutorEngine {
    pub fn new(max_in_flight: usize, mode: ConnectionMode, max_connections_per_query: usize) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
            mode,
            max_connections_per_query: max_connections_per_query.max(1),
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    pub fn mode(&self) -> ConnectionMode {
        self.mode
    }

    /// Executes every unit and returns the results in unit order.
    #[instrument(name = "executor.execute", skip_all, fields(units = units.len(), groups = tracing::field::Empty))]
    pub async fn execute(
        &self,
        data_sources: &DataSourceMap,
        units: Vec<SqlRewriteUnit>,
        statement_type: StatementType,
    ) -> Result<Vec<ExecuteResult>, ExecutionError> {
        let unit_count = units.len();
        let groups = group_units(units, self.mode, self.max_connections_per_query);
        tracing::Span::current().record("groups", groups.len());

        // Resolve every data source up front so nothing starts on a bad route.
        let mut resolved = Vec::with_capacity(groups.len());
        for group in groups {
            let source = data_sources
                .get(&group.data_source)
                .ok_or_else(|| ExecutionError::DataSourceNotFound(group.data_source.clone()))?;
            resolved.push((source, group));
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        let mut tasks: JoinSet<Vec<UnitOutcome>> = JoinSet::new();
        for (source, group) in resolved {
            let semaphore = Arc::clone(&self.semaphore);
            let cancelled = Arc::clone(&cancelled);
            debug!(data_source = %group.data_source, mode = %group.mode, units = group.units.len(), "Dispatching execution group");
            match group.mode {
                ConnectionMode::OneConnectionPerDataSource => {
                    tasks.spawn(run_serial(source, group, statement_type, semaphore, cancelled));
                }
                _ => {
                    let ExecutionGroup { units, .. } = group;
                    for unit in units {
                        let source = Arc::clone(&source);
                        let semaphore = Arc::clone(&semaphore);
                        let cancelled = Arc::clone(&cancelled);
                        tasks.spawn(async move {
                            vec![run_unit(source, unit, statement_type, semaphore, cancelled).await]
                        });
                    }
                }
            }
        }

        let mut slots: Vec<Option<ExecuteResult>> = (0..unit_count).map(|_| None).collect();
        let mut first_error: Option<ExecutionError> = None;
        while let Some(joined) = tasks.join_next().await {
            let outcomes = match joined {
                Ok(outcomes) => outcomes,
                Err(e) => {
                    cancelled.store(true, Ordering::Release);
                    first_error.get_or_insert(ExecutionError::Task(e.to_string()));
                    continue;
                }
            };
            for (index, outcome) in outcomes {
                match outcome {
                    Outcome::Done(Ok(result)) => {
                        if let Some(slot) = slots.get_mut(index) {
                            *slot = Some(result);
                        }
                    }
                    Outcome::Done(Err(e)) => {
                        cancelled.store(true, Ordering::Release);
                        warn!("Execution unit {} failed: {}", index, e);
                        first_error.get_or_insert(e);
                    }
                    Outcome::Cancelled => debug!(index, "Execution unit cancelled"),
                }
            }
        }

        if let Some(error) = first_error {
            let mut closed = 0;
            for result in slots.iter_mut().flatten() {
                result.close();
                closed += 1;
            }
            warn!(closed, "Statement aborted, closed completed unit results");
            return Err(error);
        }

        let results: Vec<ExecuteResult> = slots.into_iter().flatten().collect();
        if results.len() != unit_count {
            return Err(ExecutionError::Task(format!(
                "{} of {} units produced no result",
                unit_count - results.len(),
                unit_count
            )));
        }
        info!(units = unit_count, "Statement executed");
        Ok(results)
    }
}

fn backend_error(unit: &ExecutionUnit, source: anyhow::Error) -> ExecutionError {
    ExecutionError::Backend {
        data_source: unit.data_source().to_string(),
        actual_tables: unit.unit.route_unit.actual_tables(),
        source,
    }
}

async fn run_on(
    connection: &mut dyn super::Connection,
    unit: &ExecutionUnit,
    statement_type: StatementType,
) -> Result<ExecuteResult, ExecutionError> {
    let sql = &unit.unit.sql;
    let parameters = &unit.unit.parameters;
    debug!(index = unit.index, data_source = unit.data_source(), sql = %sql, "Executing unit");
    match statement_type {
        StatementType::Query => connection
            .query(sql, parameters)
            .await
            .map(ExecuteResult::Query)
            .map_err(|e| backend_error(unit, e)),
        StatementType::Update => connection
            .execute(sql, parameters)
            .await
            .map(ExecuteResult::Update)
            .map_err(|e| backend_error(unit, e)),
    }
}

async fn run_unit(
    source: Arc<dyn super::DataSource>,
    unit: ExecutionUnit,
    statement_type: StatementType,
    semaphore: Arc<Semaphore>,
    cancelled: Arc<AtomicBool>,
) -> UnitOutcome {
    let _permit = match semaphore.acquire_owned().await {
        Ok(permit) => permit,
        Err(e) => return (unit.index, Outcome::Done(Err(ExecutionError::Task(e.to_string())))),
    };
    if cancelled.load(Ordering::Acquire) {
        return (unit.index, Outcome::Cancelled);
    }
    let mut connection = match source.connection().await {
        Ok(connection) => connection,
        Err(e) => {
            return (
                unit.index,
                Outcome::Done(Err(ExecutionError::Connection {
                    data_source: unit.data_source().to_string(),
                    source: e,
                })),
            )
        }
    };
    let outcome = run_on(connection.as_mut(), &unit, statement_type).await;
    if outcome.is_err() {
        cancelled.store(true, Ordering::Release);
    }
    if let Err(e) = connection.close().await {
        warn!("Failed to close connection to '{}': {}", unit.data_source(), e);
    }
    (unit.index, Outcome::Done(outcome))
}

async fn run_serial(
    source: Arc<dyn super::DataSource>,
    group: ExecutionGroup,
    statement_type: StatementType,
    semaphore: Arc<Semaphore>,
    cancelled: Arc<AtomicBool>,
) -> Vec<UnitOutcome> {
    let mut outcomes = Vec::with_capacity(group.units.len());
    let mut connection = match source.connection().await {
        Ok(connection) => connection,
        Err(e) => {
            let mut units = group.units.iter();
            if let Some(first) = units.next() {
                outcomes.push((
                    first.index,
                    Outcome::Done(Err(ExecutionError::Connection {
                        data_source: group.data_source.clone(),
                        source: e,
                    })),
                ));
            }
            outcomes.extend(units.map(|u| (u.index, Outcome::Cancelled)));
            return outcomes;
        }
    };
    for unit in &group.units {
        if cancelled.load(Ordering::Acquire) {
            outcomes.push((unit.index, Outcome::Cancelled));
            continue;
        }
        let outcome = match semaphore.acquire().await {
            Ok(_permit) => run_on(connection.as_mut(), unit, statement_type).await,
            Err(e) => Err(ExecutionError::Task(e.to_string())),
        };
        if outcome.is_err() {
            cancelled.store(true, Ordering::Release);
        }
        outcomes.push((unit.index, Outcome::Done(outcome)));
    }
    if let Err(e) = connection.close().await {
        warn!("Failed to close connection to '{}': {}", group.data_source, e);
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execute::{Connection, DataSource};
    use crate::merge::{MemoryQueryResult, QueryResult};
    use crate::route::{RouteMapper, RouteUnit};
    use crate::value::Value;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct FakeSource {
        name: String,
        fail_on: Option<String>,
        opened: Arc<AtomicUsize>,
    }

    struct FakeConnection {
        fail_on: Option<String>,
    }

    #[async_trait]
    impl Connection for FakeConnection {
        async fn query(&mut self, sql: &str, _parameters: &[Value]) -> anyhow::Result<Box<dyn QueryResult>> {
            if self.fail_on.as_deref().map_or(false, |t| sql.contains(t)) {
                anyhow::bail!("table missing");
            }
            Ok(MemoryQueryResult::from_rows(&["sql"], vec![vec![Value::from(sql)]]).boxed())
        }

        async fn execute(&mut self, _sql: &str, _parameters: &[Value]) -> anyhow::Result<u64> {
            Ok(2)
        }
    }

    #[async_trait]
    impl DataSource for FakeSource {
        fn name(&self) -> &str {
            &self.name
        }

        async fn connection(&self) -> anyhow::Result<Box<dyn Connection>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeConnection {
                fail_on: self.fail_on.clone(),
            }))
        }
    }

    fn sources(fail_on: Option<&str>, opened: &Arc<AtomicUsize>) -> DataSourceMap {
        let mut map = DataSourceMap::new();
        for name in ["ds_0", "ds_1"] {
            map.insert(Arc::new(FakeSource {
                name: name.to_string(),
                fail_on: fail_on.map(str::to_string),
                opened: Arc::clone(opened),
            }));
        }
        map
    }

    fn units() -> Vec<SqlRewriteUnit> {
        let mut units = Vec::new();
        for ds in ["ds_0", "ds_1"] {
            for table in ["t_order_0", "t_order_1"] {
                units.push(SqlRewriteUnit {
                    route_unit: RouteUnit::new(ds, vec![RouteMapper::new("t_order", table)]),
                    sql: format!("SELECT * FROM {} /* {} */", table, ds),
                    parameters: vec![],
                });
            }
        }
        units
    }

    #[tokio::test]
    async fn test_results_keep_unit_order() {
        let opened = Arc::new(AtomicUsize::new(0));
        let engine = ExecutorEngine::new(2, ConnectionMode::OneConnectionPerUnit, 1);
        let results = engine
            .execute(&sources(None, &opened), units(), StatementType::Query)
            .await
            .unwrap();
        assert_eq!(results.len(), 4);
        let mut first = results.into_iter().next().unwrap().into_query_result().unwrap();
        assert_eq!(
            first.next_row().unwrap().unwrap(),
            vec![Value::from("SELECT * FROM t_order_0 /* ds_0 */")]
        );
        assert_eq!(opened.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_one_connection_per_data_source() {
        let opened = Arc::new(AtomicUsize::new(0));
        let engine = ExecutorEngine::new(4, ConnectionMode::OneConnectionPerDataSource, 1);
        let results = engine
            .execute(&sources(None, &opened), units(), StatementType::Update)
            .await
            .unwrap();
        let total: u64 = results.iter().filter_map(ExecuteResult::affected_rows).sum();
        assert_eq!(total, 8);
        assert_eq!(opened.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_is_tagged_with_unit() {
        let opened = Arc::new(AtomicUsize::new(0));
        let engine = ExecutorEngine::new(1, ConnectionMode::OneConnectionPerDataSource, 1);
        let err = engine
            .execute(&sources(Some("t_order_1"), &opened), units(), StatementType::Query)
            .await
            .unwrap_err();
        match err {
            ExecutionError::Backend {
                data_source,
                actual_tables,
                ..
            } => {
                assert!(data_source.starts_with("ds_"));
                assert_eq!(actual_tables, vec!["t_order_1".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_data_source() {
        let opened = Arc::new(AtomicUsize::new(0));
        let engine = ExecutorEngine::new(1, ConnectionMode::Auto, 1);
        let mut bad = units();
        bad[0].route_unit = RouteUnit::new("ds_9", vec![RouteMapper::new("t_order", "t_order_0")]);
        let err = engine
            .execute(&sources(None, &opened), bad, StatementType::Query)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::DataSourceNotFound(name) if name == "ds_9"));
        assert_eq!(opened.load(Ordering::SeqCst), 0);
    }
}
