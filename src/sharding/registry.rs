//! Typed algorithm registry.
//!
//! Algorithms are declared by name in the rule configuration and resolved to
//! instances once, when the [`ShardingRule`](crate::rule::ShardingRule) is built.

use super::algorithm::{
    BoundaryRangeShardingAlgorithm, ComplexModShardingAlgorithm, HashModShardingAlgorithm, HintValueShardingAlgorithm,
    IntervalShardingAlgorithm, ListShardingAlgorithm, ModShardingAlgorithm, VolumeRangeShardingAlgorithm,
};
use super::ShardingAlgorithm;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Declaration of one named algorithm: its type plus string properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub props: HashMap<String, String>,
}

impl AlgorithmConfig {
    pub fn new(kind: impl Into<String>, props: &[(&str, &str)]) -> Self {
        Self {
            kind: kind.into(),
            props: props.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ShardingAlgorithmRegistry {
    algorithms: HashMap<String, ShardingAlgorithm>,
}

impl ShardingAlgorithmRegistry {
    pub fn from_config(configs: &HashMap<String, AlgorithmConfig>) -> Result<Self> {
        let mut algorithms = HashMap::with_capacity(configs.len());
        for (name, config) in configs {
            let algorithm = create(config).map_err(|e| match e {
                Error::Config(msg) => Error::Config(format!("algorithm '{}': {}", name, msg)),
                other => other,
            })?;
            debug!(name = %name, kind = algorithm.type_name(), "Registered sharding algorithm");
            algorithms.insert(name.clone(), algorithm);
        }
        Ok(Self { algorithms })
    }

    pub fn register(&mut self, name: impl Into<String>, algorithm: ShardingAlgorithm) {
        self.algorithms.insert(name.into(), algorithm);
    }

    pub fn get(&self, name: &str) -> Result<ShardingAlgorithm> {
        self.algorithms
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Config(format!("Sharding algorithm '{}' is not defined", name)))
    }

    pub fn len(&self) -> usize {
        self.algorithms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.algorithms.is_empty()
    }
}

/// Instantiates a built-in algorithm by type name (case-insensitive).
pub fn create(config: &AlgorithmConfig) -> Result<ShardingAlgorithm> {
    let props = &config.props;
    let algorithm = match config.kind.to_ascii_uppercase().as_str() {
        ModShardingAlgorithm::TYPE => ShardingAlgorithm::Standard(Arc::new(ModShardingAlgorithm::from_props(props)?)),
        HashModShardingAlgorithm::TYPE => {
            ShardingAlgorithm::Standard(Arc::new(HashModShardingAlgorithm::from_props(props)?))
        }
        BoundaryRangeShardingAlgorithm::TYPE => {
            ShardingAlgorithm::Standard(Arc::new(BoundaryRangeShardingAlgorithm::from_props(props)?))
        }
        VolumeRangeShardingAlgorithm::TYPE => {
            ShardingAlgorithm::Standard(Arc::new(VolumeRangeShardingAlgorithm::from_props(props)?))
        }
        IntervalShardingAlgorithm::TYPE => {
            ShardingAlgorithm::Standard(Arc::new(IntervalShardingAlgorithm::from_props(props)?))
        }
        ListShardingAlgorithm::TYPE => ShardingAlgorithm::Standard(Arc::new(ListShardingAlgorithm::from_props(props)?)),
        ComplexModShardingAlgorithm::TYPE => {
            ShardingAlgorithm::Complex(Arc::new(ComplexModShardingAlgorithm::from_props(props)?))
        }
        HintValueShardingAlgorithm::TYPE => {
            ShardingAlgorithm::Hint(Arc::new(HintValueShardingAlgorithm::from_props(props)?))
        }
        other => return Err(Error::Config(format!("Unknown sharding algorithm type '{}'", other))),
    };
    Ok(algorithm)
}
