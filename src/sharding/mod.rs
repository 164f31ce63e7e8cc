//! Sharding algorithm contract.
//!
//! Algorithms are pure functions from a sharding value to one or more of the
//! targets they are offered (data source names or actual table names). They
//! hold no per-statement state and are resolved once, at configuration time,
//! through the [`registry`].

pub mod algorithm;
pub mod keygen;
pub mod registry;
pub mod strategy;

pub use keygen::{KeyGenerator, SnowflakeKeyGenerator};
pub use registry::{AlgorithmConfig, ShardingAlgorithmRegistry};
pub use strategy::{ColumnValues, ShardingStrategy, StrategyConfig};

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::Bound;
use std::sync::Arc;

/// A (possibly half-open) interval of sharding values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardingRange {
    pub lower: Bound<Value>,
    pub upper: Bound<Value>,
}

impl ShardingRange {
    pub fn closed(lower: impl Into<Value>, upper: impl Into<Value>) -> Self {
        Self {
            lower: Bound::Included(lower.into()),
            upper: Bound::Included(upper.into()),
        }
    }

    pub fn at_least(lower: impl Into<Value>) -> Self {
        Self {
            lower: Bound::Included(lower.into()),
            upper: Bound::Unbounded,
        }
    }

    pub fn at_most(upper: impl Into<Value>) -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Included(upper.into()),
        }
    }

    pub fn contains(&self, value: &Value) -> bool {
        let above = match &self.lower {
            Bound::Included(l) => value >= l,
            Bound::Excluded(l) => value > l,
            Bound::Unbounded => true,
        };
        let below = match &self.upper {
            Bound::Included(u) => value <= u,
            Bound::Excluded(u) => value < u,
            Bound::Unbounded => true,
        };
        above && below
    }

    /// Intersection of two ranges, `None` when they are disjoint.
    pub fn intersect(&self, other: &ShardingRange) -> Option<ShardingRange> {
        let lower = tighter_lower(&self.lower, &other.lower);
        let upper = tighter_upper(&self.upper, &other.upper);
        let range = ShardingRange { lower, upper };
        if range.is_empty() {
            None
        } else {
            Some(range)
        }
    }

    fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Bound::Included(l), Bound::Included(u)) => l > u,
            (Bound::Included(l), Bound::Excluded(u))
            | (Bound::Excluded(l), Bound::Included(u))
            | (Bound::Excluded(l), Bound::Excluded(u)) => l >= u,
            _ => false,
        }
    }

    /// Inclusive integer endpoints, when both ends are bounded integers.
    pub fn integer_endpoints(&self) -> Option<(i64, i64)> {
        let lower = match &self.lower {
            Bound::Included(v) => v.as_i64()?,
            Bound::Excluded(v) => v.as_i64()?.checked_add(1)?,
            Bound::Unbounded => return None,
        };
        let upper = match &self.upper {
            Bound::Included(v) => v.as_i64()?,
            Bound::Excluded(v) => v.as_i64()?.checked_sub(1)?,
            Bound::Unbounded => return None,
        };
        Some((lower, upper))
    }
}

fn tighter_lower(a: &Bound<Value>, b: &Bound<Value>) -> Bound<Value> {
    match (a, b) {
        (Bound::Unbounded, other) | (other, Bound::Unbounded) => other.clone(),
        (Bound::Included(x), Bound::Included(y)) => Bound::Included(x.max(y).clone()),
        (Bound::Excluded(x), Bound::Excluded(y)) => Bound::Excluded(x.max(y).clone()),
        (Bound::Included(i), Bound::Excluded(e)) | (Bound::Excluded(e), Bound::Included(i)) => {
            if i > e {
                Bound::Included(i.clone())
            } else {
                Bound::Excluded(e.clone())
            }
        }
    }
}

fn tighter_upper(a: &Bound<Value>, b: &Bound<Value>) -> Bound<Value> {
    match (a, b) {
        (Bound::Unbounded, other) | (other, Bound::Unbounded) => other.clone(),
        (Bound::Included(x), Bound::Included(y)) => Bound::Included(x.min(y).clone()),
        (Bound::Excluded(x), Bound::Excluded(y)) => Bound::Excluded(x.min(y).clone()),
        (Bound::Included(i), Bound::Excluded(e)) | (Bound::Excluded(e), Bound::Included(i)) => {
            if i < e {
                Bound::Included(i.clone())
            } else {
                Bound::Excluded(e.clone())
            }
        }
    }
}

/// A single equality value for a sharding column.
#[derive(Debug, Clone)]
pub struct PreciseShardingValue<'a> {
    pub logic_table: &'a str,
    pub column: &'a str,
    pub value: &'a Value,
}

/// A range predicate on a sharding column.
#[derive(Debug, Clone)]
pub struct RangeShardingValue<'a> {
    pub logic_table: &'a str,
    pub column: &'a str,
    pub range: &'a ShardingRange,
}

/// Values for several sharding columns at once.
#[derive(Debug, Clone, Default)]
pub struct ComplexKeysShardingValue {
    pub logic_table: String,
    pub values: HashMap<String, Vec<Value>>,
    pub ranges: HashMap<String, ShardingRange>,
}

/// Values supplied out-of-band through a hint.
#[derive(Debug, Clone)]
pub struct HintShardingValue<'a> {
    pub logic_table: &'a str,
    pub values: &'a [Value],
}

/// Maps one value (or one range) of a single column to targets.
pub trait StandardShardingAlgorithm: Send + Sync + fmt::Debug {
    fn type_name(&self) -> &'static str;

    /// Returns the single target for an equality value, `None` when no target matches.
    fn do_precise_sharding(&self, available_targets: &[String], value: &PreciseShardingValue<'_>) -> Option<String>;

    /// Returns every target a range of values may fall into.
    fn do_range_sharding(&self, available_targets: &[String], value: &RangeShardingValue<'_>) -> Vec<String>;
}

/// Maps values of several columns to targets.
pub trait ComplexKeysShardingAlgorithm: Send + Sync + fmt::Debug {
    fn type_name(&self) -> &'static str;

    fn do_sharding(&self, available_targets: &[String], value: &ComplexKeysShardingValue) -> Vec<String>;
}

/// Maps hint values to targets.
pub trait HintShardingAlgorithm: Send + Sync + fmt::Debug {
    fn type_name(&self) -> &'static str;

    fn do_sharding(&self, available_targets: &[String], value: &HintShardingValue<'_>) -> Vec<String>;
}

/// A resolved algorithm instance, tagged by the capability it provides.
#[derive(Debug, Clone)]
pub enum ShardingAlgorithm {
    Standard(Arc<dyn StandardShardingAlgorithm>),
    Complex(Arc<dyn ComplexKeysShardingAlgorithm>),
    Hint(Arc<dyn HintShardingAlgorithm>),
}

impl ShardingAlgorithm {
    pub fn type_name(&self) -> &'static str {
        match self {
            ShardingAlgorithm::Standard(a) => a.type_name(),
            ShardingAlgorithm::Complex(a) => a.type_name(),
            ShardingAlgorithm::Hint(a) => a.type_name(),
        }
    }
}

/// Finds the target whose suffix matches, e.g. `t_order_1` for suffix `1`.
///
/// Numeric suffixes compare by value so zero-padded names (`t_order_01`) match.
pub fn find_target_by_suffix(available_targets: &[String], suffix: &str) -> Option<String> {
    let numeric = suffix.parse::<u64>().ok();
    available_targets
        .iter()
        .find(|target| {
            if target.as_str() == suffix || target.ends_with(&format!("_{}", suffix)) {
                return true;
            }
            match (numeric, trailing_number(target)) {
                (Some(expected), Some(actual)) => expected == actual,
                _ => false,
            }
        })
        .cloned()
}

fn trailing_number(target: &str) -> Option<u64> {
    let digits: String = target
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}
