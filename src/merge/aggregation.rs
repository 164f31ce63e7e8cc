//! Cross-shard combination of aggregate partials.
//!
//! COUNT and SUM add up, MAX and MIN keep the extreme value, and AVG is
//! recomputed from the summed SUM and COUNT helpers.

use crate::context::AggregationKind;
use crate::value::Value;

#[derive(Debug, Clone)]
pub enum AggregationUnit {
    Accumulate(Value),
    Comparable { keep_greater: bool, value: Value },
    Average { sum: Value, count: Value },
}

impl AggregationUnit {
    pub fn new(kind: AggregationKind) -> Self {
        match kind {
            AggregationKind::Count | AggregationKind::Sum => AggregationUnit::Accumulate(Value::Null),
            AggregationKind::Max => AggregationUnit::Comparable {
                keep_greater: true,
                value: Value::Null,
            },
            AggregationKind::Min => AggregationUnit::Comparable {
                keep_greater: false,
                value: Value::Null,
            },
            AggregationKind::Avg => AggregationUnit::Average {
                sum: Value::Null,
                count: Value::Null,
            },
        }
    }

    /// Folds one shard partial in. `values` is `[partial]`, or `[sum, count]` for AVG.
    pub fn merge(&mut self, values: &[Value]) {
        match self {
            AggregationUnit::Accumulate(total) => {
                if let Some(v) = values.first() {
                    *total = total.add(v);
                }
            }
            AggregationUnit::Comparable { keep_greater, value } => {
                if let Some(v) = values.first().filter(|v| !v.is_null()) {
                    let replace = value.is_null() || if *keep_greater { *v > *value } else { *v < *value };
                    if replace {
                        *value = v.clone();
                    }
                }
            }
            AggregationUnit::Average { sum, count } => {
                if let [partial_sum, partial_count, ..] = values {
                    *sum = sum.add(partial_sum);
                    *count = count.add(partial_count);
                }
            }
        }
    }

    pub fn result(&self) -> Value {
        match self {
            AggregationUnit::Accumulate(total) => total.clone(),
            AggregationUnit::Comparable { value, .. } => value.clone(),
            AggregationUnit::Average { sum, count } => match (sum.as_f64(), count.as_f64()) {
                (Some(s), Some(c)) if c != 0.0 => Value::Float(s / c),
                _ => Value::Null,
            },
        }
    }
}
