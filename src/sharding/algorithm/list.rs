//! Explicit value lists (`LIST`).
//!
//! `lists = "0:beijing,shanghai;1:guangzhou,shenzhen"` sends the listed values
//! to the target with the given suffix. Range predicates cannot be narrowed.

use super::required_prop;
use crate::error::{Error, Result};
use crate::sharding::{find_target_by_suffix, PreciseShardingValue, RangeShardingValue, StandardShardingAlgorithm};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ListShardingAlgorithm {
    partitions: HashMap<String, String>,
}

impl ListShardingAlgorithm {
    pub const TYPE: &'static str = "LIST";

    pub fn from_props(props: &HashMap<String, String>) -> Result<Self> {
        let raw = required_prop(props, "lists", Self::TYPE)?;
        let mut partitions = HashMap::new();
        for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (suffix, values) = entry
                .split_once(':')
                .ok_or_else(|| Error::Config(format!("{} entry '{}' must look like 'suffix:v1,v2'", Self::TYPE, entry)))?;
            for value in values.split(',').map(str::trim).filter(|v| !v.is_empty()) {
                if let Some(previous) = partitions.insert(value.to_string(), suffix.trim().to_string()) {
                    return Err(Error::Config(format!(
                        "{} value '{}' is listed for both '{}' and '{}'",
                        Self::TYPE,
                        value,
                        previous,
                        suffix.trim()
                    )));
                }
            }
        }
        if partitions.is_empty() {
            return Err(Error::Config(format!("{} algorithm has an empty 'lists' property", Self::TYPE)));
        }
        Ok(Self { partitions })
    }
}

impl StandardShardingAlgorithm for ListShardingAlgorithm {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn do_precise_sharding(&self, available_targets: &[String], value: &PreciseShardingValue<'_>) -> Option<String> {
        let suffix = self.partitions.get(&value.value.to_string())?;
        find_target_by_suffix(available_targets, suffix)
    }

    fn do_range_sharding(&self, available_targets: &[String], _value: &RangeShardingValue<'_>) -> Vec<String> {
        available_targets.to_vec()
    }
}
