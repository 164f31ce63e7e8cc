//! Multi-column modulo (`COMPLEX_MOD`).
//!
//! Each configured column contributes `value % sharding-count`; the target
//! suffix joins the per-column remainders with `_`, e.g. `t_order_1_0` for
//! `user_id = 3, order_id = 4` and a count of 2. A column with no equality
//! values contributes every remainder.

use super::{parse_prop, required_prop};
use crate::error::{Error, Result};
use crate::sharding::{ComplexKeysShardingAlgorithm, ComplexKeysShardingValue};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone)]
pub struct ComplexModShardingAlgorithm {
    columns: Vec<String>,
    sharding_count: u64,
}

impl ComplexModShardingAlgorithm {
    pub const TYPE: &'static str = "COMPLEX_MOD";

    pub fn from_props(props: &HashMap<String, String>) -> Result<Self> {
        let columns: Vec<String> = required_prop(props, "sharding-columns", Self::TYPE)?
            .split(',')
            .map(|c| c.trim().to_ascii_lowercase())
            .filter(|c| !c.is_empty())
            .collect();
        if columns.is_empty() {
            return Err(Error::Config(format!("{} needs at least one sharding column", Self::TYPE)));
        }
        let sharding_count: u64 = parse_prop(props, "sharding-count", Self::TYPE)?;
        if sharding_count == 0 {
            return Err(Error::Config(format!("{} requires a positive 'sharding-count'", Self::TYPE)));
        }
        Ok(Self { columns, sharding_count })
    }

    fn remainders(&self, value: &ComplexKeysShardingValue, column: &str) -> Vec<u64> {
        let known = value
            .values
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, values)| values);
        match known {
            Some(values) if !values.is_empty() => {
                let set: BTreeSet<u64> = values
                    .iter()
                    .filter_map(|v| v.as_i64())
                    .map(|v| v.rem_euclid(self.sharding_count as i64) as u64)
                    .collect();
                set.into_iter().collect()
            }
            _ => (0..self.sharding_count).collect(),
        }
    }
}

impl ComplexKeysShardingAlgorithm for ComplexModShardingAlgorithm {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn do_sharding(&self, available_targets: &[String], value: &ComplexKeysShardingValue) -> Vec<String> {
        let mut suffixes = vec![String::new()];
        for column in &self.columns {
            let remainders = self.remainders(value, column);
            suffixes = suffixes
                .iter()
                .flat_map(|prefix| {
                    remainders.iter().map(move |r| {
                        if prefix.is_empty() {
                            r.to_string()
                        } else {
                            format!("{}_{}", prefix, r)
                        }
                    })
                })
                .collect();
        }
        available_targets
            .iter()
            .filter(|target| suffixes.iter().any(|s| target.ends_with(&format!("_{}", s))))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sharding::algorithm::props;
    use crate::value::Value;

    fn available() -> Vec<String> {
        vec![
            "t_order_0_0".to_string(),
            "t_order_0_1".to_string(),
            "t_order_1_0".to_string(),
            "t_order_1_1".to_string(),
        ]
    }

    fn algorithm() -> ComplexModShardingAlgorithm {
        ComplexModShardingAlgorithm::from_props(&props(&[
            ("sharding-columns", "user_id, order_id"),
            ("sharding-count", "2"),
        ]))
        .unwrap()
    }

    #[test]
    fn test_both_columns_known() {
        let mut value = ComplexKeysShardingValue {
            logic_table: "t_order".to_string(),
            ..Default::default()
        };
        value.values.insert("user_id".to_string(), vec![Value::Int(3)]);
        value.values.insert("order_id".to_string(), vec![Value::Int(4)]);
        assert_eq!(algorithm().do_sharding(&available(), &value), vec!["t_order_1_0".to_string()]);
    }

    #[test]
    fn test_missing_column_fans_out() {
        let mut value = ComplexKeysShardingValue {
            logic_table: "t_order".to_string(),
            ..Default::default()
        };
        value.values.insert("USER_ID".to_string(), vec![Value::Int(2)]);
        assert_eq!(
            algorithm().do_sharding(&available(), &value),
            vec!["t_order_0_0".to_string(), "t_order_0_1".to_string()]
        );
    }
}
