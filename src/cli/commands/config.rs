use clap::Args;
use serde::Deserialize;

/// Logging configuration that can be set via CLI or env vars
#[derive(Debug, Clone, Default, Args, Deserialize)]
pub struct LoggingConfig {
    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    #[serde(skip)]
    pub verbose: u8,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long = "log-level", env = "HYPRSHARD_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log filter directives
    #[arg(long = "log-filter", env = "HYPRSHARD_LOG_FILTER")]
    pub log_filter: Option<String>,
}

impl LoggingConfig {
    pub fn get_effective_level(&self) -> &str {
        match (self.verbose, self.log_level.as_deref()) {
            (v, _) if v >= 2 => "trace", // -vv flag
            (1, _) => "debug",           // -v flag
            (0, Some(level)) => level,   // Configured level
            _ => "info",                 // Default
        }
    }
}
