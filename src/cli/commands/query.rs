use super::route::StatementArgs;
use super::LoggingConfig;
use crate::config::Args as ConfigArgs;
use clap::Args;

#[derive(Args)]
pub struct QueryCommand {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(flatten)]
    pub statement: StatementArgs,

    /// Maximum rows to print
    #[arg(long = "max-rows", default_value_t = 1000)]
    pub max_rows: usize,

    #[command(flatten)]
    pub logging: LoggingConfig,
}
