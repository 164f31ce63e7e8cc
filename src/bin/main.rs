//! Hyprshard binary.
//!
//! Command-line entry point for inspecting sharding rules, printing route
//! plans and running statements against the configured data sources.

use clap::Parser;
use hyprshard_core::cli::{handle_check, handle_query, handle_route, Commands};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let logging = cli.command.logging();
    let level = logging.get_effective_level();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.parse().unwrap_or(Level::INFO).into())
                .parse_lossy(logging.log_filter.as_deref().unwrap_or("hyprshard_core=info")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Hyprshard starting up");

    match cli.command {
        Commands::Check(cmd) => handle_check(cmd.config).await?,
        Commands::Route(cmd) => handle_route(cmd.config, cmd.statement).await?,
        Commands::Query(cmd) => handle_query(cmd.config, cmd.statement, cmd.max_rows).await?,
    }

    Ok(())
}
