//! Hint-driven routing (`HINT_VALUE`).

use super::parse_prop_or;
use crate::error::Result;
use crate::sharding::{find_target_by_suffix, HintShardingAlgorithm, HintShardingValue};
use std::collections::HashMap;

/// Routes each hint value to the target with that suffix. With
/// `sharding-count` set, integer hints are reduced modulo the count first.
#[derive(Debug, Clone, Default)]
pub struct HintValueShardingAlgorithm {
    sharding_count: Option<u64>,
}

impl HintValueShardingAlgorithm {
    pub const TYPE: &'static str = "HINT_VALUE";

    pub fn from_props(props: &HashMap<String, String>) -> Result<Self> {
        let count: u64 = parse_prop_or(props, "sharding-count", Self::TYPE, 0)?;
        Ok(Self {
            sharding_count: if count == 0 { None } else { Some(count) },
        })
    }
}

impl HintShardingAlgorithm for HintValueShardingAlgorithm {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn do_sharding(&self, available_targets: &[String], value: &HintShardingValue<'_>) -> Vec<String> {
        let mut result = Vec::new();
        for hint in value.values {
            let suffix = match (self.sharding_count, hint.as_i64()) {
                (Some(count), Some(v)) => v.rem_euclid(count as i64).to_string(),
                _ => hint.to_string(),
            };
            let target = available_targets
                .iter()
                .find(|t| **t == suffix)
                .cloned()
                .or_else(|| find_target_by_suffix(available_targets, &suffix));
            if let Some(target) = target {
                if !result.contains(&target) {
                    result.push(target);
                }
            }
        }
        result
    }
}
