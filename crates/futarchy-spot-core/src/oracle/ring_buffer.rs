//! Fixed-capacity circular buffer of price observations
//!
//! Writes go to `write_index`, which wraps around once the buffer is full, so
//! the oldest observation is overwritten first. Two writes at the same
//! timestamp collapse into one slot holding the latest price.

use crate::constants::MAX_OBSERVATION_CAPACITY;
use crate::errors::{SpotError, SpotResult};
use crate::math::big_int::{checked_add_u256, div_u256_to_u128, widening_mul, U256};
use crate::Timestamp;
use serde::{Deserialize, Serialize};

/// Single price observation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub timestamp: Timestamp,
    /// Spot price scaled by `PRICE_SCALE`
    pub price: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRingBufferOracle")]
pub struct RingBufferOracle {
    observations: Vec<PriceObservation>,
    /// Next slot to write
    write_index: usize,
    /// Number of valid observations (saturates at capacity)
    observation_count: usize,
}

/// Persisted form, checked before it becomes a [`RingBufferOracle`]
#[derive(Deserialize)]
struct RawRingBufferOracle {
    observations: Vec<PriceObservation>,
    write_index: usize,
    observation_count: usize,
}

impl TryFrom<RawRingBufferOracle> for RingBufferOracle {
    type Error = SpotError;

    fn try_from(raw: RawRingBufferOracle) -> SpotResult<Self> {
        let capacity = raw.observations.len();
        if capacity == 0 || capacity > MAX_OBSERVATION_CAPACITY {
            return Err(SpotError::InvalidParameter("observation_capacity"));
        }
        if raw.write_index >= capacity || raw.observation_count > capacity {
            return Err(SpotError::InvalidParameter("observations"));
        }
        // Until the buffer fills, writes land at the next unused slot
        if raw.observation_count < capacity && raw.write_index != raw.observation_count {
            return Err(SpotError::InvalidParameter("observations"));
        }

        Ok(Self {
            observations: raw.observations,
            write_index: raw.write_index,
            observation_count: raw.observation_count,
        })
    }
}

impl RingBufferOracle {
    pub fn new(capacity: usize) -> SpotResult<Self> {
        if capacity == 0 || capacity > MAX_OBSERVATION_CAPACITY {
            return Err(SpotError::InvalidParameter("observation_capacity"));
        }
        Ok(Self {
            observations: vec![PriceObservation::default(); capacity],
            write_index: 0,
            observation_count: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.observations.len()
    }

    pub fn len(&self) -> usize {
        self.observation_count
    }

    pub fn is_empty(&self) -> bool {
        self.observation_count == 0
    }

    fn newest_index(&self) -> usize {
        (self.write_index + self.capacity() - 1) % self.capacity()
    }

    /// Most recent observation
    pub fn latest(&self) -> Option<PriceObservation> {
        if self.is_empty() {
            None
        } else {
            Some(self.observations[self.newest_index()])
        }
    }

    /// Fail if `timestamp` precedes the newest observation
    pub fn check_timestamp(&self, timestamp: Timestamp) -> SpotResult<()> {
        match self.latest() {
            Some(latest) if timestamp < latest.timestamp => Err(SpotError::TimestampRegression {
                last: latest.timestamp,
                now: timestamp,
            }),
            _ => Ok(()),
        }
    }

    /// Record `price` at `timestamp`
    pub fn record(&mut self, timestamp: Timestamp, price: u128) -> SpotResult<()> {
        self.check_timestamp(timestamp)?;
        if let Some(latest) = self.latest() {
            if timestamp == latest.timestamp {
                let index = self.newest_index();
                self.observations[index].price = price;
                return Ok(());
            }
        }

        let index = self.write_index;
        self.observations[index] = PriceObservation { timestamp, price };
        self.write_index = (index + 1) % self.capacity();
        if self.observation_count < self.capacity() {
            self.observation_count += 1;
        }
        Ok(())
    }

    /// Valid observations from oldest to newest
    pub fn observations(&self) -> impl Iterator<Item = PriceObservation> + '_ {
        let capacity = self.capacity();
        let start = (self.write_index + capacity - self.observation_count) % capacity;
        (0..self.observation_count).map(move |offset| self.observations[(start + offset) % capacity])
    }

    /// Time-weighted average over `[now - window_ms, now]`
    ///
    /// Each observation's price holds until the next one; the newest holds
    /// until `now`. Time before the oldest observation is not counted.
    pub fn get_twap(&self, window_ms: Timestamp, now: Timestamp) -> SpotResult<u128> {
        let latest = self.latest().ok_or(SpotError::InsufficientObservations)?;
        self.check_timestamp(now)?;

        let window_start = now.saturating_sub(window_ms);
        let mut weighted = U256::ZERO;
        let mut total: Timestamp = 0;
        let mut segment_end = now;

        let ordered: Vec<PriceObservation> = self.observations().collect();
        for observation in ordered.iter().rev() {
            let segment_start = observation.timestamp.max(window_start);
            if segment_end > segment_start {
                let duration = segment_end - segment_start;
                weighted = checked_add_u256(weighted, widening_mul(observation.price, duration as u128))?;
                total += duration;
            }
            if observation.timestamp <= window_start {
                break;
            }
            segment_end = observation.timestamp;
        }

        if total == 0 {
            return Ok(latest.price);
        }
        div_u256_to_u128(weighted, total as u128)
    }
}
