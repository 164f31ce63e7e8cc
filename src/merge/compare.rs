//! Row comparison for ORDER BY / GROUP BY merging.

use super::result::Row;
use crate::context::{NullsOrder, OrderDirection};
use crate::value::Value;
use std::cmp::Ordering;

/// A resolved sort item: which column, which way, where NULLs go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub column: usize,
    pub direction: OrderDirection,
    pub nulls: NullsOrder,
}

impl SortKey {
    pub fn asc(column: usize) -> Self {
        Self {
            column,
            direction: OrderDirection::Asc,
            nulls: NullsOrder::First,
        }
    }

    pub fn desc(column: usize) -> Self {
        Self {
            column,
            direction: OrderDirection::Desc,
            nulls: NullsOrder::Last,
        }
    }
}

pub fn compare_values(a: &Value, b: &Value, direction: OrderDirection, nulls: NullsOrder) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => match nulls {
            NullsOrder::First => Ordering::Less,
            NullsOrder::Last => Ordering::Greater,
        },
        (false, true) => match nulls {
            NullsOrder::First => Ordering::Greater,
            NullsOrder::Last => Ordering::Less,
        },
        (false, false) => match direction {
            OrderDirection::Asc => a.cmp(b),
            OrderDirection::Desc => b.cmp(a),
        },
    }
}

pub fn compare_rows(a: &Row, b: &Row, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let left = a.get(key.column).unwrap_or(&Value::Null);
        let right = b.get(key.column).unwrap_or(&Value::Null);
        let ordering = compare_values(left, right, key.direction, key.nulls);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Values of the given columns, used as a grouping key.
pub fn key_of(row: &Row, columns: &[usize]) -> Vec<Value> {
    columns
        .iter()
        .map(|&c| row.get(c).cloned().unwrap_or(Value::Null))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nulls_follow_placement_not_direction() {
        let null = Value::Null;
        let one = Value::Int(1);
        assert_eq!(
            compare_values(&null, &one, OrderDirection::Asc, NullsOrder::First),
            Ordering::Less
        );
        assert_eq!(
            compare_values(&null, &one, OrderDirection::Desc, NullsOrder::Last),
            Ordering::Greater
        );
        assert_eq!(
            compare_values(&null, &one, OrderDirection::Desc, NullsOrder::First),
            Ordering::Less
        );
    }

    #[test]
    fn test_compare_rows_uses_later_keys_on_ties() {
        let a = vec![Value::Int(1), Value::from("b")];
        let b = vec![Value::Int(1), Value::from("a")];
        let keys = [SortKey::asc(0), SortKey::desc(1)];
        assert_eq!(compare_rows(&a, &b, &keys), Ordering::Less);
        assert_eq!(compare_rows(&a, &b, &keys[..1]), Ordering::Equal);
    }

    #[test]
    fn test_mixed_numeric_comparison() {
        assert_eq!(
            compare_values(&Value::Int(2), &Value::Float(1.5), OrderDirection::Asc, NullsOrder::First),
            Ordering::Greater
        );
    }
}
