//! Range partition algorithms: `BOUNDARY_RANGE` and `VOLUME_RANGE`.
//!
//! Both map a value to the index of the partition it falls into. With
//! boundaries `b0 < b1 < ... < bn`, partition `0` holds values below `b0`,
//! partition `i` holds `[b(i-1), bi)`, and partition `n + 1` holds values at
//! or above `bn`.

use super::{parse_prop, required_prop};
use crate::error::{Error, Result};
use crate::sharding::{find_target_by_suffix, PreciseShardingValue, RangeShardingValue, StandardShardingAlgorithm};
use crate::value::Value;
use std::collections::HashMap;
use std::ops::Bound;

#[derive(Debug, Clone)]
struct Partitions {
    boundaries: Vec<Value>,
}

impl Partitions {
    fn new(boundaries: Vec<Value>, algorithm: &str) -> Result<Self> {
        if boundaries.is_empty() {
            return Err(Error::Config(format!("{} algorithm needs at least one boundary", algorithm)));
        }
        if boundaries.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::Config(format!("{} algorithm boundaries must be strictly increasing", algorithm)));
        }
        Ok(Self { boundaries })
    }

    fn partition_of(&self, value: &Value) -> usize {
        self.boundaries.iter().take_while(|b| *b <= value).count()
    }

    fn last_partition(&self) -> usize {
        self.boundaries.len()
    }

    fn precise(&self, available_targets: &[String], value: &Value) -> Option<String> {
        if value.as_f64().is_none() {
            return None;
        }
        find_target_by_suffix(available_targets, &self.partition_of(value).to_string())
    }

    fn range(&self, available_targets: &[String], lower: &Bound<Value>, upper: &Bound<Value>) -> Vec<String> {
        let first = match lower {
            Bound::Included(v) | Bound::Excluded(v) => self.partition_of(v),
            Bound::Unbounded => 0,
        };
        let last = match upper {
            Bound::Included(v) => self.partition_of(v),
            // An excluded upper bound sitting on a boundary never reaches that partition.
            Bound::Excluded(v) => {
                let p = self.partition_of(v);
                if p > 0 && self.boundaries.get(p - 1) == Some(v) {
                    p - 1
                } else {
                    p
                }
            }
            Bound::Unbounded => self.last_partition(),
        };
        (first..=last)
            .filter_map(|p| find_target_by_suffix(available_targets, &p.to_string()))
            .collect()
    }
}

fn parse_boundary(raw: &str) -> Option<Value> {
    let raw = raw.trim();
    if let Ok(v) = raw.parse::<i64>() {
        return Some(Value::Int(v));
    }
    raw.parse::<f64>().ok().map(Value::Float)
}

/// Partitions by an explicit, comma-separated `sharding-ranges` list.
#[derive(Debug, Clone)]
pub struct BoundaryRangeShardingAlgorithm {
    partitions: Partitions,
}

impl BoundaryRangeShardingAlgorithm {
    pub const TYPE: &'static str = "BOUNDARY_RANGE";

    pub fn from_props(props: &HashMap<String, String>) -> Result<Self> {
        let raw = required_prop(props, "sharding-ranges", Self::TYPE)?;
        let boundaries = raw
            .split(',')
            .map(|part| {
                parse_boundary(part)
                    .ok_or_else(|| Error::Config(format!("{} boundary '{}' is not numeric", Self::TYPE, part.trim())))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            partitions: Partitions::new(boundaries, Self::TYPE)?,
        })
    }
}

impl StandardShardingAlgorithm for BoundaryRangeShardingAlgorithm {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn do_precise_sharding(&self, available_targets: &[String], value: &PreciseShardingValue<'_>) -> Option<String> {
        self.partitions.precise(available_targets, value.value)
    }

    fn do_range_sharding(&self, available_targets: &[String], value: &RangeShardingValue<'_>) -> Vec<String> {
        self.partitions.range(available_targets, &value.range.lower, &value.range.upper)
    }
}

/// Partitions `[range-lower, range-upper)` into fixed `sharding-volume` slices.
#[derive(Debug, Clone)]
pub struct VolumeRangeShardingAlgorithm {
    partitions: Partitions,
}

impl VolumeRangeShardingAlgorithm {
    pub const TYPE: &'static str = "VOLUME_RANGE";

    pub fn from_props(props: &HashMap<String, String>) -> Result<Self> {
        let lower: i64 = parse_prop(props, "range-lower", Self::TYPE)?;
        let upper: i64 = parse_prop(props, "range-upper", Self::TYPE)?;
        let volume: i64 = parse_prop(props, "sharding-volume", Self::TYPE)?;
        if volume <= 0 || upper <= lower {
            return Err(Error::Config(format!(
                "{} requires range-lower < range-upper and a positive sharding-volume",
                Self::TYPE
            )));
        }
        let mut boundaries = Vec::new();
        let mut cursor = lower;
        while cursor < upper {
            boundaries.push(Value::Int(cursor));
            cursor = match cursor.checked_add(volume) {
                Some(next) => next,
                None => break,
            };
        }
        boundaries.push(Value::Int(upper));
        Ok(Self {
            partitions: Partitions::new(boundaries, Self::TYPE)?,
        })
    }
}

impl StandardShardingAlgorithm for VolumeRangeShardingAlgorithm {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn do_precise_sharding(&self, available_targets: &[String], value: &PreciseShardingValue<'_>) -> Option<String> {
        self.partitions.precise(available_targets, value.value)
    }

    fn do_range_sharding(&self, available_targets: &[String], value: &RangeShardingValue<'_>) -> Vec<String> {
        self.partitions.range(available_targets, &value.range.lower, &value.range.upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sharding::algorithm::{props, targets};
    use crate::sharding::ShardingRange;

    fn precise(algorithm: &dyn StandardShardingAlgorithm, available: &[String], v: i64) -> Option<String> {
        let value = Value::Int(v);
        algorithm.do_precise_sharding(
            available,
            &PreciseShardingValue {
                logic_table: "t_order",
                column: "order_id",
                value: &value,
            },
        )
    }

    #[test]
    fn test_boundary_range_precise() {
        let algorithm = BoundaryRangeShardingAlgorithm::from_props(&props(&[("sharding-ranges", "1, 5, 10")])).unwrap();
        let available = targets("t_order_", 4);
        assert_eq!(precise(&algorithm, &available, 0), Some("t_order_0".to_string()));
        assert_eq!(precise(&algorithm, &available, 1), Some("t_order_1".to_string()));
        assert_eq!(precise(&algorithm, &available, 9), Some("t_order_2".to_string()));
        assert_eq!(precise(&algorithm, &available, 100), Some("t_order_3".to_string()));
    }

    #[test]
    fn test_boundary_range_value_outside_configured_targets() {
        let algorithm = BoundaryRangeShardingAlgorithm::from_props(&props(&[("sharding-ranges", "10, 20")])).unwrap();
        // Only two actual tables exist, so values at or above 20 have no target.
        let available = targets("t_order_", 2);
        assert_eq!(precise(&algorithm, &available, 25), None);
    }

    #[test]
    fn test_boundary_range_rejects_unsorted() {
        assert!(BoundaryRangeShardingAlgorithm::from_props(&props(&[("sharding-ranges", "5, 1")])).is_err());
    }

    #[test]
    fn test_volume_range_near_integer_limit() {
        let upper = i64::MAX.to_string();
        let volume = (i64::MAX / 2 + 1).to_string();
        let algorithm = VolumeRangeShardingAlgorithm::from_props(&props(&[
            ("range-lower", "0"),
            ("range-upper", upper.as_str()),
            ("sharding-volume", volume.as_str()),
        ]))
        .unwrap();
        let available = targets("t_order_", 4);
        assert_eq!(precise(&algorithm, &available, -1), Some("t_order_0".to_string()));
        assert_eq!(precise(&algorithm, &available, 1), Some("t_order_1".to_string()));
        assert_eq!(precise(&algorithm, &available, i64::MAX / 2 + 1), Some("t_order_2".to_string()));
    }

    #[test]
    fn test_volume_range() {
        let algorithm = VolumeRangeShardingAlgorithm::from_props(&props(&[
            ("range-lower", "10"),
            ("range-upper", "40"),
            ("sharding-volume", "10"),
        ]))
        .unwrap();
        let available = targets("t_order_", 5);
        assert_eq!(precise(&algorithm, &available, 5), Some("t_order_0".to_string()));
        assert_eq!(precise(&algorithm, &available, 15), Some("t_order_1".to_string()));
        assert_eq!(precise(&algorithm, &available, 39), Some("t_order_3".to_string()));
        assert_eq!(precise(&algorithm, &available, 40), Some("t_order_4".to_string()));

        let range = ShardingRange {
            lower: Bound::Included(Value::Int(12)),
            upper: Bound::Excluded(Value::Int(30)),
        };
        let routed = algorithm.do_range_sharding(
            &available,
            &RangeShardingValue {
                logic_table: "t_order",
                column: "order_id",
                range: &range,
            },
        );
        assert_eq!(routed, vec!["t_order_1".to_string(), "t_order_2".to_string()]);
    }
}
