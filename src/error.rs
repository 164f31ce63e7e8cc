//! Error types for the Hyprshard pipeline.
//!
//! Each pipeline stage owns its error enum; [`Error`] unifies them for callers
//! that drive a whole statement through the orchestrator.

use std::error::Error as StdError;
use std::fmt;
use std::result;
use thiserror::Error;

/// A specialized Result type for Hyprshard operations.
pub type Result<T> = result::Result<T, Error>;

/// Failures raised while computing a statement's route.
#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("No route target found for table '{table}': {reason}")]
    NoTargetFound { table: String, reason: String },

    #[error("Binding tables '{primary}' and '{secondary}' are inconsistent on data source '{data_source}': {reason}")]
    BindingInconsistency {
        primary: String,
        secondary: String,
        data_source: String,
        reason: String,
    },

    #[error("Table '{table}' is routed by hint but no hint value was supplied")]
    HintRequiredButMissing { table: String },

    #[error("Full route of table '{table}' rejected: statement has no sharding condition")]
    FullRouteRejected { table: String },

    #[error("Sharding conditions on '{table}.{column}' never agree")]
    ConflictingConditions { table: String, column: String },

    #[error("Algorithm routed table '{table}' to unknown target '{target}'")]
    InvalidTarget { table: String, target: String },

    #[error("Tables {tables:?} share no data source; statement needs federation")]
    FederationRequired { tables: Vec<String> },
}

/// Failures raised while rewriting a routed statement.
#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("Insert value group {index} does not route to any unit")]
    UnroutableValueGroup { index: usize },

    #[error("Token at position {position} conflicts: {reason}")]
    TokenPositionConflict { position: usize, reason: String },

    #[error("Statement references parameter {index} but only {count} were supplied")]
    MissingParameter { index: usize, count: usize },
}

/// Failures raised by physical execution, tagged with the failing unit.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Execution failed on data source '{data_source}' (tables {actual_tables:?}): {source}")]
    Backend {
        data_source: String,
        actual_tables: Vec<String>,
        #[source]
        source: anyhow::Error,
    },

    #[error("Data source '{0}' is not registered")]
    DataSourceNotFound(String),

    #[error("Failed to acquire connection for data source '{data_source}': {source}")]
    Connection {
        data_source: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Execution task failed: {0}")]
    Task(String),
}

/// Failures raised while combining shard results.
#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Aggregate '{function}' cannot be combined across shards")]
    UnsupportedAggregateCombination { function: String },

    #[error("Column '{0}' not found in result set")]
    ColumnNotFound(String),

    #[error("Column index {index} out of range for {count} columns")]
    ColumnIndexOutOfRange { index: usize, count: usize },

    #[error("Result cursor failed: {0}")]
    Cursor(#[from] anyhow::Error),
}

/// The error type for Hyprshard operations.
#[derive(Debug)]
pub enum Error {
    /// Routing errors
    Routing(RoutingError),
    /// Rewrite errors
    Rewrite(RewriteError),
    /// Physical execution errors
    Execution(ExecutionError),
    /// Merge errors
    Merge(MergeError),
    /// Configuration errors
    Config(String),
    /// I/O errors
    Io(std::io::Error),
    /// Serialization/deserialization errors
    Serialization(String),
    /// Validation errors
    Validation(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Routing(err) => write!(f, "Routing error: {}", err),
            Error::Rewrite(err) => write!(f, "Rewrite error: {}", err),
            Error::Execution(err) => write!(f, "Execution error: {}", err),
            Error::Merge(err) => write!(f, "Merge error: {}", err),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            Error::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Routing(err) => Some(err),
            Error::Rewrite(err) => Some(err),
            Error::Execution(err) => Some(err),
            Error::Merge(err) => Some(err),
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RoutingError> for Error {
    fn from(err: RoutingError) -> Self {
        Error::Routing(err)
    }
}

impl From<RewriteError> for Error {
    fn from(err: RewriteError) -> Self {
        Error::Rewrite(err)
    }
}

impl From<ExecutionError> for Error {
    fn from(err: ExecutionError) -> Self {
        Error::Execution(err)
    }
}

impl From<MergeError> for Error {
    fn from(err: MergeError) -> Self {
        Error::Merge(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
