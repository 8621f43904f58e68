//! # Rolling Window TWAP Oracle
//!
//! Keeps `∫ price dt` over the trailing three days in a 256-bit accumulator.
//!
//! Sliding the window forward removes the oldest time from the integral. That
//! removal uses `last_window_twap`, the average computed at the previous
//! advance, and never `last_price`. A price spiked for a single update
//! therefore only contributes `spike × its own duration` and cannot be used to
//! erase a large slice of honest history during a slide.

use crate::constants::THREE_DAYS_MS;
use crate::errors::{SpotError, SpotResult};
use crate::math::big_int::{checked_add_u256, div_u256_to_u128, widening_mul, U256};
use crate::Timestamp;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Rolling three-day TWAP accumulator embedded in every market
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollingWindowOracle {
    /// Set by the first deposit, never cleared
    pub initialized_at: Option<Timestamp>,
    /// Most recent price (scaled by `PRICE_SCALE`)
    pub last_price: u128,
    /// Timestamp at which `last_price` started to apply
    pub last_timestamp: Timestamp,
    /// Left edge of the accumulation window
    pub window_start_timestamp: Timestamp,
    /// `Σ price × elapsed_ms` since `window_start_timestamp`
    #[serde(with = "ethnum::serde::decimal")]
    pub window_cumulative_price: U256,
    /// Window average at the last advance; reference for the next slide
    pub last_window_twap: u128,
    /// Last time a slide underflow replaced the accumulator. Only history
    /// from this point on is still held in `window_cumulative_price`.
    #[serde(default)]
    pub last_reset_timestamp: Option<Timestamp>,
}

impl Default for RollingWindowOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl RollingWindowOracle {
    pub fn new() -> Self {
        Self {
            initialized_at: None,
            last_price: 0,
            last_timestamp: 0,
            window_start_timestamp: 0,
            window_cumulative_price: U256::ZERO,
            last_window_twap: 0,
            last_reset_timestamp: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized_at.is_some()
    }

    /// Start the oracle at `now` with `price`
    pub fn initialize(&mut self, now: Timestamp, price: u128) -> SpotResult<()> {
        if self.is_initialized() {
            return Err(SpotError::AlreadyInitialized);
        }

        self.initialized_at = Some(now);
        self.last_price = price;
        self.last_timestamp = now;
        self.window_start_timestamp = now;
        self.window_cumulative_price = U256::ZERO;
        self.last_window_twap = price;

        Ok(())
    }

    /// Reject timestamps earlier than the last recorded one
    pub fn check_timestamp(&self, now: Timestamp) -> SpotResult<()> {
        if now < self.last_timestamp {
            warn!(
                last = self.last_timestamp,
                now, "rejecting timestamp regression"
            );
            return Err(SpotError::TimestampRegression {
                last: self.last_timestamp,
                now,
            });
        }
        Ok(())
    }

    /// Accumulate the time since the last update at `last_price`, slide the
    /// window if it grew past three days, then record `spot_price` as the
    /// price from `now` onwards.
    ///
    /// Calling twice with the same `now` is a no-op.
    pub fn advance(&mut self, now: Timestamp, spot_price: u128) -> SpotResult<()> {
        if !self.is_initialized() {
            return Err(SpotError::OracleNotInitialized);
        }
        self.check_timestamp(now)?;
        if now == self.last_timestamp {
            return Ok(());
        }

        let elapsed = now - self.last_timestamp;
        let contribution = widening_mul(self.last_price, elapsed as u128);
        let mut cumulative = checked_add_u256(self.window_cumulative_price, contribution)?;
        let mut window_start = self.window_start_timestamp;
        let mut reset_at = self.last_reset_timestamp;

        if now - window_start > THREE_DAYS_MS {
            let new_start = now - THREE_DAYS_MS;
            let removed = new_start - window_start;
            let stale = widening_mul(self.last_window_twap, removed as u128);

            cumulative = match cumulative.checked_sub(stale) {
                Some(remaining) => remaining,
                None => {
                    warn!(
                        removed,
                        reference = self.last_window_twap,
                        "window slide underflow, resetting accumulator to last price"
                    );
                    reset_at = Some(now);
                    widening_mul(self.last_price, THREE_DAYS_MS as u128)
                }
            };
            debug!(from = window_start, to = new_start, "window slid");
            window_start = new_start;
        }

        // window_start <= last_timestamp < now, so the duration is non-zero
        let duration = (now - window_start).min(THREE_DAYS_MS);
        let window_twap = div_u256_to_u128(cumulative, duration as u128)?;

        self.window_cumulative_price = cumulative;
        self.window_start_timestamp = window_start;
        self.last_reset_timestamp = reset_at;
        self.last_window_twap = window_twap;
        self.last_price = spot_price;
        self.last_timestamp = now;

        debug!(now, elapsed, window_twap, spot_price, "oracle advanced");
        Ok(())
    }

    /// Record the price produced by a reserve change at `last_timestamp`
    pub fn observe_price(&mut self, price: u128) {
        self.last_price = price;
    }

    /// Whether a full window of history exists at `now`
    pub fn is_ready(&self, now: Timestamp) -> bool {
        match self.initialized_at {
            Some(initialized_at) => now.saturating_sub(initialized_at) >= THREE_DAYS_MS,
            None => false,
        }
    }

    /// Copy of the oracle advanced to `now` at the current `last_price`
    pub fn projected(&self, now: Timestamp) -> SpotResult<Self> {
        let mut projected = self.clone();
        projected.advance(now, self.last_price)?;
        Ok(projected)
    }

    /// Average over the current window, assuming the oracle is at `now`
    fn window_average(&self, now: Timestamp) -> SpotResult<u128> {
        let duration = now
            .saturating_sub(self.window_start_timestamp)
            .min(THREE_DAYS_MS);
        if duration == 0 {
            return Ok(self.last_price);
        }
        div_u256_to_u128(self.window_cumulative_price, duration as u128)
    }

    fn ensure_ready(&self, now: Timestamp) -> SpotResult<()> {
        if !self.is_initialized() {
            return Err(SpotError::OracleNotInitialized);
        }
        self.check_timestamp(now)?;
        if !self.is_ready(now) {
            return Err(SpotError::TwapNotReady);
        }
        Ok(())
    }

    /// Three-day TWAP at `now` without mutating the oracle
    pub fn get_twap(&self, now: Timestamp) -> SpotResult<u128> {
        self.ensure_ready(now)?;
        self.projected(now)?.window_average(now)
    }

    /// Three-day TWAP at `now`, advancing the oracle with `spot_price`
    pub fn get_twap_mut(&mut self, now: Timestamp, spot_price: u128) -> SpotResult<u128> {
        self.ensure_ready(now)?;
        self.advance(now, spot_price)?;
        self.window_average(now)
    }

    /// Bridge `[since, now]`, during which the market held no liquidity, as if
    /// it had traded at `winning_twap` throughout. Afterwards the oracle
    /// continues from `winning_price`, with `winning_twap` as the slide
    /// reference.
    ///
    /// Returns the integral added for the gap (zero for an empty gap).
    pub fn backfill_gap(
        &mut self,
        since: Timestamp,
        now: Timestamp,
        winning_twap: u128,
        winning_price: u128,
    ) -> SpotResult<U256> {
        if !self.is_initialized() {
            return Err(SpotError::OracleNotInitialized);
        }
        self.check_timestamp(now)?;
        if now < since {
            return Err(SpotError::TimestampRegression { last: since, now });
        }

        let gap = now - since;
        let gap_cumulative = widening_mul(winning_twap, gap as u128);
        let mut cumulative = self.window_cumulative_price;
        let mut window_start = self.window_start_timestamp;
        let mut reset_at = self.last_reset_timestamp;

        if gap >= THREE_DAYS_MS {
            // The whole window now lies inside the gap
            cumulative = widening_mul(winning_twap, THREE_DAYS_MS as u128);
            window_start = now - THREE_DAYS_MS;
            reset_at = Some(since);
        } else if gap > 0 {
            cumulative = checked_add_u256(cumulative, gap_cumulative)?;

            if now - window_start > THREE_DAYS_MS {
                let new_start = now - THREE_DAYS_MS;
                let removed = new_start - window_start;
                let stale = widening_mul(self.last_window_twap, removed as u128);

                cumulative = match cumulative.checked_sub(stale) {
                    Some(remaining) => remaining,
                    None => {
                        warn!(removed, "gap backfill slide underflow, resetting to winning twap");
                        reset_at = Some(since);
                        widening_mul(winning_twap, THREE_DAYS_MS as u128)
                    }
                };
                window_start = new_start;
            }
        }

        self.window_cumulative_price = cumulative;
        self.window_start_timestamp = window_start;
        self.last_reset_timestamp = reset_at;
        self.last_timestamp = now;
        self.last_price = winning_price;
        self.last_window_twap = winning_twap;

        debug!(since, now, gap, winning_twap, "gap backfilled");
        Ok(gap_cumulative)
    }
}
