mod common;

use clap::Parser;
use common::RULES_TOML;
use hyprshard_core::cli::commands::config::LoggingConfig;
use hyprshard_core::cli::handlers::{build_hint, parse_conditions};
use hyprshard_core::cli::{handle_check, handle_route, Commands};
use hyprshard_core::{ConnectionMode, Value};
use std::fs;
use tempfile::TempDir;

#[derive(Parser)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

fn write_config(dir: &TempDir) -> String {
    let path = dir.path().join("hyprshard.toml");
    fs::write(&path, RULES_TOML).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_logging_config() {
    // Test default values
    let default_config = LoggingConfig::default();
    assert_eq!(default_config.verbose, 0);
    assert_eq!(default_config.get_effective_level(), "info");
    assert!(default_config.log_level.is_none());
    assert!(default_config.log_filter.is_none());

    // Test -v flag (debug level)
    let debug_config = LoggingConfig {
        verbose: 1,
        log_level: None,
        log_filter: None,
    };
    assert_eq!(debug_config.get_effective_level(), "debug");

    // Test that -vv overrides explicit level
    let override_config = LoggingConfig {
        verbose: 2,
        log_level: Some("warn".to_string()),
        log_filter: None,
    };
    assert_eq!(override_config.get_effective_level(), "trace");

    // Test explicit log level with filter
    let filter_config = LoggingConfig {
        verbose: 0,
        log_level: Some("warn".to_string()),
        log_filter: Some("hyprshard_core::route=debug".to_string()),
    };
    assert_eq!(filter_config.get_effective_level(), "warn");
    assert_eq!(filter_config.log_filter.as_deref(), Some("hyprshard_core::route=debug"));
}

#[test]
fn test_route_command_parsing() {
    let cli = Cli::try_parse_from([
        "hyprshard",
        "route",
        "--config",
        "rules.toml",
        "--connection-mode",
        "data-source",
        "-vv",
        "SELECT * FROM t_order WHERE user_id = ?",
        "-p",
        "7",
        "--condition",
        "t_order.user_id=7",
        "--hint-table-value",
        "t_order=1",
    ])
    .unwrap();
    let Commands::Route(cmd) = cli.command else {
        panic!("expected route command");
    };
    assert_eq!(cmd.config.config.as_deref(), Some(std::path::Path::new("rules.toml")));
    assert_eq!(cmd.config.connection_mode, Some(ConnectionMode::OneConnectionPerDataSource));
    assert_eq!(cmd.logging.get_effective_level(), "trace");
    assert_eq!(cmd.statement.params, vec!["7"]);

    let conditions = parse_conditions(&cmd.statement.conditions).unwrap();
    assert_eq!(conditions.groups[0].values.len(), 1);
    let hint = build_hint(&cmd.statement).unwrap();
    assert_eq!(hint.table_values("t_order"), Some(&[Value::Int(1)][..]));
}

#[test]
fn test_query_command_requires_sql() {
    assert!(Cli::try_parse_from(["hyprshard", "query"]).is_err());
    let cli = Cli::try_parse_from(["hyprshard", "query", "--max-rows", "5", "SELECT 1"]).unwrap();
    let Commands::Query(cmd) = cli.command else {
        panic!("expected query command");
    };
    assert_eq!(cmd.max_rows, 5);
    assert_eq!(cmd.statement.sql, "SELECT 1");
}

#[tokio::test]
async fn test_check_and_route_with_config_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir);

    let cli = Cli::try_parse_from(["hyprshard", "check", "--config", &path]).unwrap();
    let Commands::Check(cmd) = cli.command else {
        panic!("expected check command");
    };
    handle_check(cmd.config).await.unwrap();

    let cli = Cli::try_parse_from([
        "hyprshard",
        "route",
        "--config",
        &path,
        "SELECT * FROM t_order WHERE user_id = 1",
        "--condition",
        "t_order.user_id=1",
    ])
    .unwrap();
    let Commands::Route(cmd) = cli.command else {
        panic!("expected route command");
    };
    handle_route(cmd.config, cmd.statement).await.unwrap();
}

#[tokio::test]
async fn test_missing_config_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.toml");
    let cli = Cli::try_parse_from(["hyprshard", "check", "--config", missing.to_str().unwrap()]).unwrap();
    let Commands::Check(cmd) = cli.command else {
        panic!("expected check command");
    };
    assert!(handle_check(cmd.config).await.is_err());
}
