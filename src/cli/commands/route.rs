use super::LoggingConfig;
use crate::config::Args as ConfigArgs;
use clap::Args;

#[derive(Args)]
pub struct CheckCommand {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(flatten)]
    pub logging: LoggingConfig,
}

/// Statement input shared by `route` and `query`
#[derive(Debug, Clone, Args)]
pub struct StatementArgs {
    /// SQL statement
    #[arg(value_name = "SQL")]
    pub sql: String,

    /// Positional parameter value, repeatable (NULL, true/false, numbers, or text)
    #[arg(short = 'p', long = "param", value_name = "VALUE")]
    pub params: Vec<String>,

    /// Sharding condition `table.column=value` or `table.column=v1,v2`, repeatable
    #[arg(long = "condition", value_name = "TABLE.COLUMN=VALUES")]
    pub conditions: Vec<String>,

    /// Force every table onto one data source
    #[arg(long = "hint-data-source", value_name = "NAME")]
    pub hint_data_source: Option<String>,

    /// Hint value for a table's table strategy, `table=value`, repeatable
    #[arg(long = "hint-table-value", value_name = "TABLE=VALUE")]
    pub hint_table_values: Vec<String>,

    /// Hint value for a table's database strategy, `table=value`, repeatable
    #[arg(long = "hint-database-value", value_name = "TABLE=VALUE")]
    pub hint_database_values: Vec<String>,
}

#[derive(Args)]
pub struct RouteCommand {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(flatten)]
    pub statement: StatementArgs,

    #[command(flatten)]
    pub logging: LoggingConfig,
}
