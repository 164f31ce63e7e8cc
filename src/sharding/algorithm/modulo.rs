//! Modulo-based algorithms: `MOD` and `HASH_MOD`.

use super::parse_prop;
use crate::error::{Error, Result};
use crate::sharding::{find_target_by_suffix, PreciseShardingValue, RangeShardingValue, StandardShardingAlgorithm};
use crate::value::Value;
use std::collections::HashMap;

/// Routes integer value `v` to the target suffixed `v % sharding-count`.
#[derive(Debug, Clone)]
pub struct ModShardingAlgorithm {
    sharding_count: u64,
}

impl ModShardingAlgorithm {
    pub const TYPE: &'static str = "MOD";

    pub fn new(sharding_count: u64) -> Result<Self> {
        if sharding_count == 0 {
            return Err(Error::Config("MOD algorithm requires a positive 'sharding-count'".to_string()));
        }
        Ok(Self { sharding_count })
    }

    pub fn from_props(props: &HashMap<String, String>) -> Result<Self> {
        Self::new(parse_prop(props, "sharding-count", Self::TYPE)?)
    }

    fn suffix(&self, value: i64) -> u64 {
        value.rem_euclid(self.sharding_count as i64) as u64
    }
}

impl StandardShardingAlgorithm for ModShardingAlgorithm {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn do_precise_sharding(&self, available_targets: &[String], value: &PreciseShardingValue<'_>) -> Option<String> {
        let v = value.value.as_i64()?;
        find_target_by_suffix(available_targets, &self.suffix(v).to_string())
    }

    fn do_range_sharding(&self, available_targets: &[String], value: &RangeShardingValue<'_>) -> Vec<String> {
        let (lower, upper) = match value.range.integer_endpoints() {
            Some(bounds) => bounds,
            None => return available_targets.to_vec(),
        };
        if upper < lower {
            return Vec::new();
        }
        if i128::from(upper) - i128::from(lower) + 1 >= i128::from(self.sharding_count) {
            return available_targets.to_vec();
        }
        let mut result = Vec::new();
        for v in lower..=upper {
            if let Some(target) = find_target_by_suffix(available_targets, &self.suffix(v).to_string()) {
                if !result.contains(&target) {
                    result.push(target);
                }
            }
        }
        result
    }
}

/// Routes by `abs(hash(value)) % sharding-count`, with `hash` matching the JVM
/// `hashCode` of the boxed value (`Long`, `Boolean`, otherwise `String`).
#[derive(Debug, Clone)]
pub struct HashModShardingAlgorithm {
    sharding_count: u64,
}

impl HashModShardingAlgorithm {
    pub const TYPE: &'static str = "HASH_MOD";

    pub fn from_props(props: &HashMap<String, String>) -> Result<Self> {
        let sharding_count: u64 = parse_prop(props, "sharding-count", Self::TYPE)?;
        if sharding_count == 0 {
            return Err(Error::Config(format!("{} algorithm requires a positive 'sharding-count'", Self::TYPE)));
        }
        Ok(Self { sharding_count })
    }

    fn hash(value: &Value) -> i32 {
        match value {
            Value::Int(v) => (*v ^ ((*v as u64) >> 32) as i64) as i32,
            Value::Bool(b) => {
                if *b {
                    1231
                } else {
                    1237
                }
            }
            other => other
                .to_string()
                .encode_utf16()
                .fold(0i32, |h, c| h.wrapping_mul(31).wrapping_add(i32::from(c))),
        }
    }
}

impl StandardShardingAlgorithm for HashModShardingAlgorithm {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn do_precise_sharding(&self, available_targets: &[String], value: &PreciseShardingValue<'_>) -> Option<String> {
        if value.value.is_null() {
            return None;
        }
        let hash = i64::from(Self::hash(value.value));
        let suffix = (hash % self.sharding_count as i64).abs();
        find_target_by_suffix(available_targets, &suffix.to_string())
    }

    fn do_range_sharding(&self, available_targets: &[String], _value: &RangeShardingValue<'_>) -> Vec<String> {
        available_targets.to_vec()
    }
}
