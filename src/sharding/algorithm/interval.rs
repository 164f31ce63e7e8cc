//! Time-interval sharding (`INTERVAL`).
//!
//! Time is cut into consecutive intervals starting at `datetime-lower`. Each
//! interval maps to the target whose suffix is the interval start formatted
//! with `sharding-suffix-pattern`. Patterns use chrono `strftime` syntax.

use super::{parse_prop_or, required_prop};
use crate::error::{Error, Result};
use crate::sharding::{PreciseShardingValue, RangeShardingValue, StandardShardingAlgorithm};
use chrono::{Duration, Months, NaiveDateTime};
use std::collections::HashMap;
use std::ops::Bound;

const DEFAULT_DATETIME_PATTERN: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

impl std::str::FromStr for IntervalUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "seconds" => Ok(IntervalUnit::Seconds),
            "minutes" => Ok(IntervalUnit::Minutes),
            "hours" => Ok(IntervalUnit::Hours),
            "days" => Ok(IntervalUnit::Days),
            "weeks" => Ok(IntervalUnit::Weeks),
            "months" => Ok(IntervalUnit::Months),
            "years" => Ok(IntervalUnit::Years),
            other => Err(Error::Config(format!("Unsupported datetime-interval-unit '{}'", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntervalShardingAlgorithm {
    datetime_pattern: String,
    lower: NaiveDateTime,
    upper: NaiveDateTime,
    suffix_pattern: String,
    amount: u32,
    unit: IntervalUnit,
}

impl IntervalShardingAlgorithm {
    pub const TYPE: &'static str = "INTERVAL";

    pub fn from_props(props: &HashMap<String, String>) -> Result<Self> {
        let datetime_pattern = props
            .get("datetime-pattern")
            .cloned()
            .unwrap_or_else(|| DEFAULT_DATETIME_PATTERN.to_string());
        let parse = |key: &str| -> Result<NaiveDateTime> {
            let raw = required_prop(props, key, Self::TYPE)?;
            NaiveDateTime::parse_from_str(raw, &datetime_pattern)
                .map_err(|e| Error::Config(format!("{} property '{}' = '{}' does not match pattern: {}", Self::TYPE, key, raw, e)))
        };
        let lower = parse("datetime-lower")?;
        let upper = parse("datetime-upper")?;
        if upper < lower {
            return Err(Error::Config(format!("{} datetime-upper precedes datetime-lower", Self::TYPE)));
        }
        let suffix_pattern = required_prop(props, "sharding-suffix-pattern", Self::TYPE)?.to_string();
        let amount: u32 = parse_prop_or(props, "datetime-interval-amount", Self::TYPE, 1)?;
        if amount == 0 {
            return Err(Error::Config(format!("{} datetime-interval-amount must be positive", Self::TYPE)));
        }
        let unit = match props.get("datetime-interval-unit") {
            Some(raw) => raw.parse()?,
            None => IntervalUnit::Days,
        };
        Ok(Self {
            datetime_pattern,
            lower,
            upper,
            suffix_pattern,
            amount,
            unit,
        })
    }

    fn step(&self, from: NaiveDateTime) -> Option<NaiveDateTime> {
        let amount = i64::from(self.amount);
        match self.unit {
            IntervalUnit::Seconds => from.checked_add_signed(Duration::seconds(amount)),
            IntervalUnit::Minutes => from.checked_add_signed(Duration::minutes(amount)),
            IntervalUnit::Hours => from.checked_add_signed(Duration::hours(amount)),
            IntervalUnit::Days => from.checked_add_signed(Duration::days(amount)),
            IntervalUnit::Weeks => from.checked_add_signed(Duration::weeks(amount)),
            IntervalUnit::Months => from.checked_add_months(Months::new(self.amount)),
            IntervalUnit::Years => from.checked_add_months(Months::new(self.amount.saturating_mul(12))),
        }
    }

    /// Interval starts between `lower` and `upper`, inclusive of the interval containing `upper`.
    fn interval_starts(&self) -> impl Iterator<Item = (NaiveDateTime, Option<NaiveDateTime>)> + '_ {
        let mut cursor = Some(self.lower);
        std::iter::from_fn(move || {
            let start = cursor?;
            if start > self.upper {
                return None;
            }
            let next = self.step(start);
            cursor = next;
            Some((start, next))
        })
    }

    fn target_for(&self, available_targets: &[String], start: NaiveDateTime) -> Option<String> {
        let suffix = start.format(&self.suffix_pattern).to_string();
        available_targets.iter().find(|t| t.ends_with(&suffix)).cloned()
    }
}

impl StandardShardingAlgorithm for IntervalShardingAlgorithm {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn do_precise_sharding(&self, available_targets: &[String], value: &PreciseShardingValue<'_>) -> Option<String> {
        let ts = value.value.as_datetime(&self.datetime_pattern)?;
        if ts < self.lower || ts > self.upper {
            return None;
        }
        let (start, _) = self
            .interval_starts()
            .find(|(start, next)| *start <= ts && next.map_or(true, |n| ts < n))?;
        self.target_for(available_targets, start)
    }

    fn do_range_sharding(&self, available_targets: &[String], value: &RangeShardingValue<'_>) -> Vec<String> {
        let bound = |b: &Bound<crate::value::Value>| -> Option<Bound<NaiveDateTime>> {
            match b {
                Bound::Included(v) => v.as_datetime(&self.datetime_pattern).map(Bound::Included),
                Bound::Excluded(v) => v.as_datetime(&self.datetime_pattern).map(Bound::Excluded),
                Bound::Unbounded => Some(Bound::Unbounded),
            }
        };
        let (lower, upper) = match (bound(&value.range.lower), bound(&value.range.upper)) {
            (Some(l), Some(u)) => (l, u),
            _ => return available_targets.to_vec(),
        };
        let mut result = Vec::new();
        for (start, next) in self.interval_starts() {
            // interval is [start, next)
            let ends_before_lower = match (&lower, next) {
                (Bound::Included(l), Some(n)) | (Bound::Excluded(l), Some(n)) => n <= *l,
                _ => false,
            };
            let starts_after_upper = match &upper {
                Bound::Included(u) => start > *u,
                Bound::Excluded(u) => start >= *u,
                Bound::Unbounded => false,
            };
            if ends_before_lower || starts_after_upper {
                continue;
            }
            if let Some(target) = self.target_for(available_targets, start) {
                if !result.contains(&target) {
                    result.push(target);
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sharding::algorithm::props;
    use crate::sharding::ShardingRange;
    use crate::value::Value;

    fn monthly() -> (IntervalShardingAlgorithm, Vec<String>) {
        let algorithm = IntervalShardingAlgorithm::from_props(&props(&[
            ("datetime-lower", "2016-01-01 00:00:00"),
            ("datetime-upper", "2021-12-31 00:00:00"),
            ("sharding-suffix-pattern", "%Y%m"),
            ("datetime-interval-unit", "Months"),
        ]))
        .unwrap();
        let mut available = Vec::new();
        for year in 2016..=2020 {
            for month in 1..=12 {
                available.push(format!("t_order_{:04}{:02}", year, month));
            }
        }
        (algorithm, available)
    }

    fn precise(algorithm: &IntervalShardingAlgorithm, available: &[String], raw: &str) -> Option<String> {
        let value = Value::from(raw);
        algorithm.do_precise_sharding(
            available,
            &PreciseShardingValue {
                logic_table: "t_order",
                column: "create_time",
                value: &value,
            },
        )
    }

    #[test]
    fn test_precise_by_month() {
        let (algorithm, available) = monthly();
        assert_eq!(precise(&algorithm, &available, "2020-01-01 00:00:01"), Some("t_order_202001".to_string()));
        assert_eq!(precise(&algorithm, &available, "2019-07-31 23:59:59"), Some("t_order_201907".to_string()));
        assert_eq!(precise(&algorithm, &available, "2030-01-01 00:00:01"), None);
    }

    #[test]
    fn test_range_by_month() {
        let (algorithm, available) = monthly();
        let range = ShardingRange::closed("2019-10-15 10:59:08", "2020-04-08 10:59:08");
        let routed = algorithm.do_range_sharding(
            &available,
            &RangeShardingValue {
                logic_table: "t_order",
                column: "create_time",
                range: &range,
            },
        );
        assert_eq!(routed.len(), 7);
        assert_eq!(routed.first().map(String::as_str), Some("t_order_201910"));
        assert_eq!(routed.last().map(String::as_str), Some("t_order_202004"));
    }

    #[test]
    fn test_day_step() {
        let algorithm = IntervalShardingAlgorithm::from_props(&props(&[
            ("datetime-lower", "2021-06-01 00:00:00"),
            ("datetime-upper", "2021-07-31 00:00:00"),
            ("sharding-suffix-pattern", "%Y%m%d"),
            ("datetime-interval-amount", "2"),
        ]))
        .unwrap();
        let available = vec!["t_order_20210601".to_string(), "t_order_20210603".to_string()];
        assert_eq!(precise(&algorithm, &available, "2021-06-02 12:00:00"), Some("t_order_20210601".to_string()));
        assert_eq!(precise(&algorithm, &available, "2021-06-03 00:00:00"), Some("t_order_20210603".to_string()));
    }

    #[test]
    fn test_invalid_unit_rejected() {
        let result = IntervalShardingAlgorithm::from_props(&props(&[
            ("datetime-lower", "2021-06-01 00:00:00"),
            ("datetime-upper", "2021-07-31 00:00:00"),
            ("sharding-suffix-pattern", "%Y%m%d"),
            ("datetime-interval-unit", "fortnights"),
        ]));
        assert!(result.is_err());
    }
}
