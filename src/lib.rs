//! Hyprshard: the core of a database sharding middleware.
//!
//! A logical statement flows through four stages:
//! 1. [`route`] maps logical tables to physical data nodes
//! 2. [`rewrite`] produces one physical statement per route unit
//! 3. [`execute`] fans the units out to the data sources
//! 4. [`merge`] combines the per-shard cursors into one logical result
//!
//! [`ShardingOrchestrator`] wires the stages together.

pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod execute;
pub mod merge;
pub mod orchestrator;
pub mod rewrite;
pub mod route;
pub mod rule;
pub mod sharding;
pub mod value;

// Re-export commonly used types
pub use config::HyprshardConfig;
pub use context::{annotate, HintContext, LogicSql, ShardingCondition, ShardingConditions, StatementKind};
pub use error::{Error, Result};
pub use execute::{ConnectionMode, DataSource, DataSourceMap, DuckDbDataSource, ExecutorEngine};
pub use merge::{MergeEngine, MergedResult, QueryResult};
pub use orchestrator::{ExecutionPlan, ShardingOrchestrator, StatementOutcome, UpdateResult};
pub use rewrite::{SqlRewriteEngine, SqlRewriteUnit};
pub use route::{RouteContext, RouteType, RouteUnit, ShardingRouter};
pub use rule::{RuleConfig, RuleProps, ShardingRule};
pub use value::Value;
