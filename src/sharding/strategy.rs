//! Sharding strategies: which column(s) feed which algorithm.

use super::{
    ComplexKeysShardingAlgorithm, ComplexKeysShardingValue, HintShardingAlgorithm, HintShardingValue,
    PreciseShardingValue, RangeShardingValue, ShardingAlgorithm, ShardingAlgorithmRegistry, ShardingRange,
    StandardShardingAlgorithm,
};
use crate::error::{Error, Result, RoutingError};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// The resolved condition on one sharding column within one AND group.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    /// Equality or IN: the column takes one of these values.
    Values(Vec<Value>),
    /// BETWEEN / comparison predicates.
    Range(ShardingRange),
}

/// Strategy declaration as written in the rule configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    Standard { sharding_column: String, algorithm_name: String },
    Complex { sharding_columns: String, algorithm_name: String },
    Hint { algorithm_name: String },
    None,
}

#[derive(Debug, Clone)]
pub enum ShardingStrategy {
    Standard {
        column: String,
        algorithm: Arc<dyn StandardShardingAlgorithm>,
    },
    Complex {
        columns: Vec<String>,
        algorithm: Arc<dyn ComplexKeysShardingAlgorithm>,
    },
    Hint {
        algorithm: Arc<dyn HintShardingAlgorithm>,
    },
    None,
}

impl ShardingStrategy {
    pub fn from_config(config: &StrategyConfig, registry: &ShardingAlgorithmRegistry) -> Result<Self> {
        let mismatch = |name: &str, expected: &str, actual: &str| {
            Error::Config(format!(
                "{} strategy cannot use algorithm '{}' of type {}",
                expected, name, actual
            ))
        };
        match config {
            StrategyConfig::Standard {
                sharding_column,
                algorithm_name,
            } => match registry.get(algorithm_name)? {
                ShardingAlgorithm::Standard(algorithm) => Ok(ShardingStrategy::Standard {
                    column: sharding_column.trim().to_ascii_lowercase(),
                    algorithm,
                }),
                other => Err(mismatch(algorithm_name, "standard", other.type_name())),
            },
            StrategyConfig::Complex {
                sharding_columns,
                algorithm_name,
            } => match registry.get(algorithm_name)? {
                ShardingAlgorithm::Complex(algorithm) => Ok(ShardingStrategy::Complex {
                    columns: sharding_columns
                        .split(',')
                        .map(|c| c.trim().to_ascii_lowercase())
                        .filter(|c| !c.is_empty())
                        .collect(),
                    algorithm,
                }),
                other => Err(mismatch(algorithm_name, "complex", other.type_name())),
            },
            StrategyConfig::Hint { algorithm_name } => match registry.get(algorithm_name)? {
                ShardingAlgorithm::Hint(algorithm) => Ok(ShardingStrategy::Hint { algorithm }),
                other => Err(mismatch(algorithm_name, "hint", other.type_name())),
            },
            StrategyConfig::None => Ok(ShardingStrategy::None),
        }
    }

    /// Lower-cased sharding columns this strategy reads from predicates.
    pub fn sharding_columns(&self) -> Vec<&str> {
        match self {
            ShardingStrategy::Standard { column, .. } => vec![column.as_str()],
            ShardingStrategy::Complex { columns, .. } => columns.iter().map(String::as_str).collect(),
            ShardingStrategy::Hint { .. } | ShardingStrategy::None => Vec::new(),
        }
    }

    pub fn is_hint(&self) -> bool {
        matches!(self, ShardingStrategy::Hint { .. })
    }

    /// Picks targets from `available_targets`.
    ///
    /// `conditions` is keyed by lower-cased column name. A strategy whose
    /// columns carry no condition routes to every available target. Output
    /// keeps the order of `available_targets`.
    pub fn do_sharding(
        &self,
        available_targets: &[String],
        logic_table: &str,
        conditions: &HashMap<String, ColumnValues>,
        hint: Option<&[Value]>,
    ) -> std::result::Result<Vec<String>, RoutingError> {
        let routed = match self {
            ShardingStrategy::Standard { column, algorithm } => {
                let precise = hint.filter(|values| !values.is_empty()).or_else(|| match conditions.get(column) {
                    Some(ColumnValues::Values(values)) => Some(values.as_slice()),
                    _ => None,
                });
                match (precise, conditions.get(column)) {
                    (Some(values), _) => values
                        .iter()
                        .filter_map(|value| {
                            algorithm.do_precise_sharding(
                                available_targets,
                                &PreciseShardingValue {
                                    logic_table,
                                    column,
                                    value,
                                },
                            )
                        })
                        .collect(),
                    (None, Some(ColumnValues::Range(range))) => algorithm.do_range_sharding(
                        available_targets,
                        &RangeShardingValue {
                            logic_table,
                            column,
                            range,
                        },
                    ),
                    (None, _) => available_targets.to_vec(),
                }
            }
            ShardingStrategy::Complex { columns, algorithm } => {
                let mut value = ComplexKeysShardingValue {
                    logic_table: logic_table.to_string(),
                    ..Default::default()
                };
                for column in columns {
                    match conditions.get(column) {
                        Some(ColumnValues::Values(values)) => {
                            value.values.insert(column.clone(), values.clone());
                        }
                        Some(ColumnValues::Range(range)) => {
                            value.ranges.insert(column.clone(), range.clone());
                        }
                        None => {}
                    }
                }
                if value.values.is_empty() && value.ranges.is_empty() {
                    available_targets.to_vec()
                } else {
                    algorithm.do_sharding(available_targets, &value)
                }
            }
            ShardingStrategy::Hint { algorithm } => match hint {
                Some(values) if !values.is_empty() => algorithm.do_sharding(
                    available_targets,
                    &HintShardingValue {
                        logic_table,
                        values,
                    },
                ),
                _ => {
                    return Err(RoutingError::HintRequiredButMissing {
                        table: logic_table.to_string(),
                    })
                }
            },
            ShardingStrategy::None => available_targets.to_vec(),
        };

        if let Some(unknown) = routed.iter().find(|t| !available_targets.contains(t)) {
            return Err(RoutingError::InvalidTarget {
                table: logic_table.to_string(),
                target: unknown.clone(),
            });
        }
        Ok(available_targets
            .iter()
            .filter(|t| routed.contains(t))
            .cloned()
            .collect())
    }
}
