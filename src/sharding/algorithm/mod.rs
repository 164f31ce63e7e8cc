//! Built-in sharding algorithms.

pub mod complex;
pub mod hint;
pub mod interval;
pub mod list;
pub mod modulo;
pub mod range;

pub use complex::ComplexModShardingAlgorithm;
pub use hint::HintValueShardingAlgorithm;
pub use interval::IntervalShardingAlgorithm;
pub use list::ListShardingAlgorithm;
pub use modulo::{HashModShardingAlgorithm, ModShardingAlgorithm};
pub use range::{BoundaryRangeShardingAlgorithm, VolumeRangeShardingAlgorithm};

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::str::FromStr;

/// Reads a required algorithm property.
pub(crate) fn required_prop<'a>(props: &'a HashMap<String, String>, key: &str, algorithm: &str) -> Result<&'a str> {
    props
        .get(key)
        .map(|v| v.trim())
        .ok_or_else(|| Error::Config(format!("{} algorithm requires property '{}'", algorithm, key)))
}

/// Reads and parses a required algorithm property.
pub(crate) fn parse_prop<T: FromStr>(props: &HashMap<String, String>, key: &str, algorithm: &str) -> Result<T> {
    let raw = required_prop(props, key, algorithm)?;
    raw.parse()
        .map_err(|_| Error::Config(format!("{} algorithm property '{}' is invalid: '{}'", algorithm, key, raw)))
}

/// Reads an optional property, falling back to `default`.
pub(crate) fn parse_prop_or<T: FromStr>(props: &HashMap<String, String>, key: &str, algorithm: &str, default: T) -> Result<T> {
    if props.contains_key(key) {
        parse_prop(props, key, algorithm)
    } else {
        Ok(default)
    }
}

#[cfg(test)]
pub(crate) fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[cfg(test)]
pub(crate) fn targets(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{}{}", prefix, i)).collect()
}
