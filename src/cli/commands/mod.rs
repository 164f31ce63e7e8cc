pub mod config;
pub mod query;
pub mod route;

pub use config::LoggingConfig;
pub use query::QueryCommand;
pub use route::{CheckCommand, RouteCommand};

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Validate the sharding rules and list every data node
    Check(CheckCommand),
    /// Route and rewrite a statement, printing the plan as JSON
    Route(RouteCommand),
    /// Run a statement against the configured data sources
    Query(QueryCommand),
}

impl Commands {
    pub fn logging(&self) -> &LoggingConfig {
        match self {
            Commands::Check(cmd) => &cmd.logging,
            Commands::Route(cmd) => &cmd.logging,
            Commands::Query(cmd) => &cmd.logging,
        }
    }
}
