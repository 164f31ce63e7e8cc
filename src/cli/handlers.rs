use crate::config::{Args, HyprshardConfig};
use crate::context::{annotate, HintContext, ShardingCondition, ShardingConditions};
use crate::merge::MergedResult;
use crate::orchestrator::StatementOutcome;
use crate::value::Value;
use super::commands::route::StatementArgs;
use anyhow::{anyhow, bail, Context, Result};
use tracing::{debug, info};

/// Parse a command-line literal into a value.
pub fn parse_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return Value::Float(f);
    }
    Value::Text(trimmed.to_string())
}

/// Parse `table.column=value` (or `=v1,v2`) flags into a single AND group.
pub fn parse_conditions(raw: &[String]) -> Result<ShardingConditions> {
    if raw.is_empty() {
        return Ok(ShardingConditions::none());
    }
    let mut condition = ShardingCondition::new();
    for entry in raw {
        let (target, values) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid condition '{}', expected table.column=value", entry))?;
        let (table, column) = target
            .split_once('.')
            .ok_or_else(|| anyhow!("Invalid condition target '{}', expected table.column", target))?;
        let values: Vec<Value> = values.split(',').map(parse_value).collect();
        condition = if values.len() == 1 {
            condition.equal(table, column, values.into_iter().next().unwrap_or(Value::Null))
        } else {
            condition.in_list(table, column, values)
        };
    }
    Ok(ShardingConditions::single(condition))
}

fn parse_table_value(entry: &str) -> Result<(&str, Value)> {
    let (table, value) = entry
        .split_once('=')
        .ok_or_else(|| anyhow!("Invalid hint '{}', expected table=value", entry))?;
    Ok((table.trim(), parse_value(value)))
}

/// Build the hint context from the statement flags.
pub fn build_hint(statement: &StatementArgs) -> Result<HintContext> {
    let mut hint = HintContext::new();
    if let Some(ds) = &statement.hint_data_source {
        hint = hint.with_data_source(ds.clone());
    }
    for entry in &statement.hint_database_values {
        let (table, value) = parse_table_value(entry)?;
        hint = hint.with_database_value(table, value);
    }
    for entry in &statement.hint_table_values {
        let (table, value) = parse_table_value(entry)?;
        hint = hint.with_table_value(table, value);
    }
    Ok(hint)
}

/// Validate the configured rules and print every data node
pub async fn handle_check(args: Args) -> Result<()> {
    let config = HyprshardConfig::load(&args).context("Failed to load configuration")?;
    let rule = config.build_rule().context("Invalid sharding rules")?;

    println!("Data sources: {}", rule.data_source_names().join(", "));
    for table in rule.table_rules() {
        let nodes: Vec<String> = table.data_nodes().iter().map(|n| n.to_string()).collect();
        println!("{}: {}", table.logic_table, nodes.join(", "));
    }
    for table in rule.broadcast_tables() {
        println!("{}: broadcast", table);
    }
    info!("Configuration is valid");
    Ok(())
}

/// Route and rewrite a statement, printing the plan as JSON
pub async fn handle_route(args: Args, statement: StatementArgs) -> Result<()> {
    validate_statement(&statement)?;
    let config = HyprshardConfig::load(&args).context("Failed to load configuration")?;
    let orchestrator = config.build_orchestrator()?;

    let parameters = statement.params.iter().map(|p| parse_value(p)).collect();
    let logic_sql = orchestrator.prepare_statement(annotate(&statement.sql, parameters)?);
    let conditions = parse_conditions(&statement.conditions)?;
    let hint = build_hint(&statement)?;

    let plan = orchestrator.plan(&logic_sql, conditions, &hint)?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

/// Execute a statement and print the merged rows or the affected row count
pub async fn handle_query(args: Args, statement: StatementArgs, max_rows: usize) -> Result<()> {
    validate_statement(&statement)?;
    let config = HyprshardConfig::load(&args).context("Failed to load configuration")?;
    let orchestrator = config.build_orchestrator()?;

    let parameters = statement.params.iter().map(|p| parse_value(p)).collect();
    let logic_sql = annotate(&statement.sql, parameters)?;
    let conditions = parse_conditions(&statement.conditions)?;
    let hint = build_hint(&statement)?;

    match orchestrator.execute(logic_sql, conditions, &hint).await? {
        StatementOutcome::Query(merged) => print_rows(merged, max_rows),
        StatementOutcome::Update(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
    }
}

fn print_rows(mut merged: Box<dyn MergedResult>, max_rows: usize) -> Result<()> {
    println!("{}", merged.columns().join("\t"));
    let mut printed = 0;
    while printed < max_rows {
        let Some(row) = merged.next_row()? else {
            break;
        };
        let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        println!("{}", cells.join("\t"));
        printed += 1;
    }
    merged.close()?;
    debug!(rows = printed, "Rows printed");
    if printed == max_rows {
        eprintln!("(output truncated at {} rows)", max_rows);
    }
    Ok(())
}

/// Reject an empty statement before any configuration work.
fn validate_statement(statement: &StatementArgs) -> Result<()> {
    if statement.sql.trim().is_empty() {
        bail!("SQL statement is empty");
    }
    Ok(())
}
