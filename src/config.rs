//! Configuration management for Hyprshard.
//!
//! Configuration is loaded from several sources, later ones overriding
//! earlier ones:
//! 1. Default configuration (embedded in binary)
//! 2. User-specified configuration file
//! 3. Environment variables (prefixed with `HYPRSHARD_`, nested keys joined with `__`)
//! 4. Command-line arguments
//!
//! # Environment Variables
//!
//! - `HYPRSHARD_EXECUTOR__MAX_IN_FLIGHT_UNITS` - Concurrent unit limit
//! - `HYPRSHARD_EXECUTOR__CONNECTION_MODE` - `one_connection_per_unit`, `one_connection_per_data_source` or `auto`
//! - `HYPRSHARD_PROPS__SQL_SHOW` - Log logic and actual SQL
//! - `HYPRSHARD_PROPS__ALLOW_FULL_ROUTE` - Allow statements without sharding conditions to scan every shard

use crate::error::{Error, Result};
use crate::execute::{ConnectionMode, DataSourceMap, DuckDbDataSource, ExecutorEngine};
use crate::orchestrator::ShardingOrchestrator;
use crate::rule::{RuleConfig, RuleProps, ShardingRule};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Command-line arguments
#[derive(Debug, Clone, Default, Parser)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, env = "HYPRSHARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Maximum number of units executing at once
    #[arg(long = "max-in-flight")]
    pub max_in_flight: Option<usize>,

    /// Connection mode (one_connection_per_unit, one_connection_per_data_source, auto)
    #[arg(long = "connection-mode")]
    pub connection_mode: Option<ConnectionMode>,

    /// Allow statements without sharding conditions to route to every shard
    #[arg(long = "allow-full-route")]
    pub allow_full_route: Option<bool>,

    /// Log logic and rewritten SQL
    #[arg(long = "sql-show")]
    pub sql_show: bool,
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HyprshardConfig {
    /// Execution settings
    pub executor: ExecutorConfig,
    /// Routing properties
    #[serde(default)]
    pub props: RuleProps,
    /// Physical data sources
    #[serde(default)]
    pub data_sources: Vec<DataSourceConfig>,
    /// Sharding rules
    #[serde(default)]
    pub rules: RuleConfig,
}

/// Execution engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Maximum concurrent units (0 means one per CPU)
    #[serde(default)]
    pub max_in_flight_units: usize,
    #[serde(default)]
    pub connection_mode: ConnectionMode,
    /// Units per data source above which `auto` shares one connection
    #[serde(default = "default_max_connections_per_query")]
    pub max_connections_per_query: usize,
}

fn default_max_connections_per_query() -> usize {
    1
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_in_flight_units: 0,
            connection_mode: ConnectionMode::default(),
            max_connections_per_query: default_max_connections_per_query(),
        }
    }
}

impl ExecutorConfig {
    pub fn effective_max_in_flight(&self) -> usize {
        if self.max_in_flight_units == 0 {
            num_cpus::get()
        } else {
            self.max_in_flight_units
        }
    }

    pub fn build(&self) -> ExecutorEngine {
        ExecutorEngine::new(
            self.effective_max_in_flight(),
            self.connection_mode,
            self.max_connections_per_query,
        )
    }
}

/// One physical data source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceConfig {
    pub name: String,
    /// `:memory:` or a DuckDB database file
    #[serde(default = "default_connection")]
    pub connection: String,
}

fn default_connection() -> String {
    ":memory:".to_string()
}

impl HyprshardConfig {
    /// Load configuration from all sources
    pub fn load(args: &Args) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml));

        if let Some(path) = &args.config {
            if !path.exists() {
                return Err(Error::Config(format!("Configuration file not found: {}", path.display())));
            }
            builder = builder.add_source(config::File::from(path.as_path()));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("HYPRSHARD")
                .prefix_separator("_")
                .separator("__"),
        );

        let mut config: HyprshardConfig = builder.build()?.try_deserialize()?;
        config.apply_args(args);
        config.validate()?;
        debug!(data_sources = config.data_sources.len(), tables = config.rules.tables.len(), "Configuration loaded");
        Ok(config)
    }

    /// Parse a TOML document layered over the defaults, without env or args.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: HyprshardConfig = config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_args(&mut self, args: &Args) {
        if let Some(max) = args.max_in_flight {
            self.executor.max_in_flight_units = max;
        }
        if let Some(mode) = args.connection_mode {
            self.executor.connection_mode = mode;
        }
        if let Some(allow) = args.allow_full_route {
            self.props.allow_full_route = allow;
        }
        if args.sql_show {
            self.props.sql_show = true;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut names: Vec<&str> = self.data_sources.iter().map(|d| d.name.as_str()).collect();
        names.sort_unstable();
        if let Some(pair) = names.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(Error::Config(format!("Data source '{}' is configured twice", pair[0])));
        }
        if self.executor.max_connections_per_query == 0 {
            return Err(Error::Config("executor.max_connections_per_query must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn data_source_names(&self) -> Vec<String> {
        self.data_sources.iter().map(|d| d.name.clone()).collect()
    }

    /// Build the sharding rule over the configured data sources
    pub fn build_rule(&self) -> Result<ShardingRule> {
        ShardingRule::new(&self.rules, self.data_source_names(), self.props.clone())
    }

    /// Open every configured data source with the DuckDB backend
    pub fn open_data_sources(&self) -> Result<DataSourceMap> {
        let mut map = DataSourceMap::new();
        for source in &self.data_sources {
            let opened = DuckDbDataSource::from_connection_string(&source.name, &source.connection)
                .map_err(|e| Error::Config(format!("Failed to open data source '{}': {}", source.name, e)))?;
            map.insert(opened);
        }
        Ok(map)
    }

    /// Build a ready-to-use orchestrator
    pub fn build_orchestrator(&self) -> Result<ShardingOrchestrator> {
        let rule = Arc::new(self.build_rule()?);
        let data_sources = self.open_data_sources()?;
        info!(data_sources = data_sources.len(), "Data sources opened");
        Ok(ShardingOrchestrator::new(rule, data_sources, self.executor.build()))
    }
}
