//! Distributed key generation for auto-increment columns omitted from INSERTs.

use crate::error::{Error, Result};
use crate::value::Value;
use chrono::Utc;
use parking_lot::Mutex;
use std::fmt;

pub trait KeyGenerator: Send + Sync + fmt::Debug {
    fn type_name(&self) -> &'static str;

    fn generate_key(&self) -> Value;
}

/// 2016-11-01T00:00:00Z in epoch milliseconds.
pub const SNOWFLAKE_EPOCH_MILLIS: i64 = 1_477_958_400_000;

const SEQUENCE_BITS: u32 = 12;
const WORKER_ID_BITS: u32 = 10;
const SEQUENCE_MASK: i64 = (1 << SEQUENCE_BITS) - 1;
const WORKER_ID_SHIFT: u32 = SEQUENCE_BITS;
const TIMESTAMP_SHIFT: u32 = SEQUENCE_BITS + WORKER_ID_BITS;
pub const MAX_WORKER_ID: i64 = (1 << WORKER_ID_BITS) - 1;

#[derive(Debug, Default)]
struct SnowflakeState {
    last_millis: i64,
    sequence: i64,
}

/// 64-bit keys laid out as `timestamp(41) | worker(10) | sequence(12)`.
///
/// Keys are strictly increasing per generator. When the sequence wraps
/// within one millisecond, or the clock moves backwards, the generator
/// keeps using the last timestamp it issued.
#[derive(Debug)]
pub struct SnowflakeKeyGenerator {
    worker_id: i64,
    state: Mutex<SnowflakeState>,
}

impl SnowflakeKeyGenerator {
    pub const TYPE: &'static str = "SNOWFLAKE";

    pub fn new(worker_id: i64) -> Result<Self> {
        if !(0..=MAX_WORKER_ID).contains(&worker_id) {
            return Err(Error::Config(format!(
                "Snowflake worker id {} is outside 0..={}",
                worker_id, MAX_WORKER_ID
            )));
        }
        Ok(Self {
            worker_id,
            state: Mutex::new(SnowflakeState::default()),
        })
    }

    pub fn worker_id(&self) -> i64 {
        self.worker_id
    }

    fn next_id(&self) -> i64 {
        let now = Utc::now().timestamp_millis() - SNOWFLAKE_EPOCH_MILLIS;
        let mut state = self.state.lock();
        if now > state.last_millis {
            state.last_millis = now;
            state.sequence = 0;
        } else {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                // borrow the next millisecond
                state.last_millis += 1;
            }
        }
        (state.last_millis << TIMESTAMP_SHIFT) | (self.worker_id << WORKER_ID_SHIFT) | state.sequence
    }
}

impl KeyGenerator for SnowflakeKeyGenerator {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn generate_key(&self) -> Value {
        Value::Int(self.next_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_strictly_increase() {
        let generator = SnowflakeKeyGenerator::new(1).unwrap();
        let mut previous = -1;
        for _ in 0..10_000 {
            let key = generator.generate_key().as_i64().unwrap();
            assert!(key > previous);
            previous = key;
        }
    }

    #[test]
    fn test_worker_id_is_encoded() {
        let generator = SnowflakeKeyGenerator::new(513).unwrap();
        let key = generator.generate_key().as_i64().unwrap();
        assert_eq!((key >> WORKER_ID_SHIFT) & MAX_WORKER_ID, 513);
    }

    #[test]
    fn test_worker_id_range() {
        assert!(SnowflakeKeyGenerator::new(-1).is_err());
        assert!(SnowflakeKeyGenerator::new(MAX_WORKER_ID + 1).is_err());
    }
}
