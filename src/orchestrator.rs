//! Statement orchestration: Route → Rewrite → Execute → Merge.
//!
//! Every call builds fresh per-statement state; the orchestrator itself only
//! holds the shared rule, router and data sources.

use crate::context::{HintContext, LogicSql, ShardingConditions, StatementKind};
use crate::error::{Error, Result};
use crate::execute::{DataSourceMap, ExecuteResult, ExecutorEngine, StatementType};
use crate::merge::{merge_update, MergeEngine, MergedResult};
use crate::rewrite::{SqlRewriteEngine, SqlRewriteUnit};
use crate::route::{RouteContext, ShardingRouter};
use crate::rule::ShardingRule;
use crate::value::Value;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Outcome of a write statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateResult {
    pub affected_rows: u64,
    /// Keys generated for an INSERT that omitted the key column.
    pub generated_keys: Vec<Value>,
}

/// Route and rewrite output of one statement, before execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionPlan {
    pub logic_sql: String,
    pub route_context: RouteContext,
    pub units: Vec<SqlRewriteUnit>,
}

pub enum StatementOutcome {
    Query(Box<dyn MergedResult>),
    Update(UpdateResult),
}

impl fmt::Debug for StatementOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementOutcome::Query(merged) => f.debug_tuple("Query").field(&merged.columns()).finish(),
            StatementOutcome::Update(result) => f.debug_tuple("Update").field(result).finish(),
        }
    }
}

pub struct ShardingOrchestrator {
    router: ShardingRouter,
    rewriter: SqlRewriteEngine,
    executor: ExecutorEngine,
    merger: MergeEngine,
    data_sources: DataSourceMap,
}

impl ShardingOrchestrator {
    /// Create an orchestrator over the given rule and data sources
    pub fn new(rule: Arc<ShardingRule>, data_sources: DataSourceMap, executor: ExecutorEngine) -> Self {
        info!(
            data_sources = data_sources.len(),
            max_in_flight = executor.max_in_flight(),
            mode = %executor.mode(),
            "Creating ShardingOrchestrator"
        );
        Self {
            router: ShardingRouter::new(rule),
            rewriter: SqlRewriteEngine::new(),
            executor,
            merger: MergeEngine::new(),
            data_sources,
        }
    }

    pub fn rule(&self) -> &Arc<ShardingRule> {
        self.router.rule()
    }

    pub fn data_sources(&self) -> &DataSourceMap {
        &self.data_sources
    }

    /// Fill generated keys for INSERTs that omit the key column.
    pub fn prepare_statement(&self, logic_sql: LogicSql) -> LogicSql {
        let needs_keys = logic_sql.insert.as_ref().map_or(false, |i| i.generated_key.is_none());
        if needs_keys {
            logic_sql.with_generated_keys(self.rule())
        } else {
            logic_sql
        }
    }

    /// INSERTs route by their value groups when no conditions were supplied.
    fn effective_conditions(&self, logic_sql: &LogicSql, conditions: ShardingConditions) -> ShardingConditions {
        if logic_sql.kind == StatementKind::Insert && conditions.is_empty() {
            ShardingConditions::from_insert(logic_sql, self.rule())
        } else {
            conditions
        }
    }

    /// Route and rewrite a prepared statement without executing it
    #[instrument(name = "orchestrator.plan", skip_all, fields(kind = ?logic_sql.kind))]
    pub fn plan(&self, logic_sql: &LogicSql, conditions: ShardingConditions, hint: &HintContext) -> Result<ExecutionPlan> {
        let conditions = self.effective_conditions(logic_sql, conditions);
        let route_context = self.router.route(logic_sql, &conditions, hint)?;
        let units = self.rewriter.rewrite(logic_sql, &route_context)?;

        if self.rule().props().sql_show {
            info!("Logic SQL: {}", logic_sql.sql);
            for unit in &units {
                info!("Actual SQL: {}", unit);
            }
        } else {
            debug!(route_type = ?route_context.route_type, units = units.len(), "Statement planned");
        }
        Ok(ExecutionPlan {
            logic_sql: logic_sql.sql.clone(),
            route_context,
            units,
        })
    }

    /// Run a query and return its merged cursor
    #[instrument(name = "orchestrator.query", skip_all, fields(sql_len = logic_sql.sql.len()))]
    pub async fn query(
        &self,
        logic_sql: LogicSql,
        conditions: ShardingConditions,
        hint: &HintContext,
    ) -> Result<Box<dyn MergedResult>> {
        if !logic_sql.kind.is_query() {
            return Err(Error::Validation(format!("{:?} statement is not a query", logic_sql.kind)));
        }
        let plan = self.plan(&logic_sql, conditions, hint)?;
        let results = self
            .executor
            .execute(&self.data_sources, plan.units, StatementType::Query)
            .await?;
        let results = results.into_iter().filter_map(ExecuteResult::into_query_result).collect();
        Ok(self.merger.merge(results, &logic_sql)?)
    }

    /// Run a write, DDL or transaction-control statement
    #[instrument(name = "orchestrator.update", skip_all, fields(sql_len = logic_sql.sql.len()))]
    pub async fn update(
        &self,
        logic_sql: LogicSql,
        conditions: ShardingConditions,
        hint: &HintContext,
    ) -> Result<UpdateResult> {
        if logic_sql.kind.is_query() {
            return Err(Error::Validation(format!("{:?} statement returns rows", logic_sql.kind)));
        }
        let logic_sql = self.prepare_statement(logic_sql);
        let plan = self.plan(&logic_sql, conditions, hint)?;
        let results = self
            .executor
            .execute(&self.data_sources, plan.units, StatementType::Update)
            .await?;
        let affected: Vec<u64> = results.iter().filter_map(ExecuteResult::affected_rows).collect();
        let accumulate = logic_sql.tables.iter().any(|t| self.rule().is_sharding_table(t));
        let generated_keys = logic_sql
            .insert
            .as_ref()
            .and_then(|i| i.generated_key.as_ref())
            .map(|k| k.values.clone())
            .unwrap_or_default();
        Ok(UpdateResult {
            affected_rows: merge_update(&affected, accumulate),
            generated_keys,
        })
    }

    /// Dispatch on statement kind
    pub async fn execute(
        &self,
        logic_sql: LogicSql,
        conditions: ShardingConditions,
        hint: &HintContext,
    ) -> Result<StatementOutcome> {
        if logic_sql.kind.is_query() {
            Ok(StatementOutcome::Query(self.query(logic_sql, conditions, hint).await?))
        } else {
            Ok(StatementOutcome::Update(self.update(logic_sql, conditions, hint).await?))
        }
    }
}
