//! # Proposal Regime
//!
//! While a governance vote runs, the spot market's liquidity sits in the
//! conditional markets and the spot oracle stops advancing. When the vote
//! resolves, the gap is bridged with the winning conditional market's TWAP.
//! A [`HistoricalSegment`] records each bridged gap so composite queries can
//! tell conditional history apart from spot history.
//!
//! ```text
//!   Active ──mark_liquidity_to_proposal──▶ Locked { since }
//!     ▲                                        │
//!     └────────fill_twap_gap_from_proposal─────┘
//! ```

use crate::constants::THREE_DAYS_MS;
use crate::errors::{SpotError, SpotResult};
use crate::market::pool::SpotMarket;
use crate::math::big_int::{checked_add_u256, div_u256_to_u128, scale_u256, widening_mul, U256};
use crate::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// Whether the market's liquidity is currently out in a proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegimeState {
    Active,
    Locked { since: Timestamp },
}

/// A bridged period priced at a conditional market's TWAP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalSegment {
    pub start_timestamp: Timestamp,
    pub end_timestamp: Timestamp,
    /// `avg_price × (end - start)`
    #[serde(with = "ethnum::serde::decimal")]
    pub cumulative_price: U256,
    pub avg_price: u128,
}

impl HistoricalSegment {
    /// Milliseconds of this segment inside `[window_start, window_end]`
    pub fn overlap(&self, window_start: Timestamp, window_end: Timestamp) -> Timestamp {
        let start = self.start_timestamp.max(window_start);
        let end = self.end_timestamp.min(window_end);
        end.saturating_sub(start)
    }
}

/// Regime state plus the ledger of bridged segments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegimeTransitionController {
    state: RegimeState,
    /// Ordered by start, non-overlapping, trimmed to the trailing window
    historical_segments: VecDeque<HistoricalSegment>,
}

impl Default for RegimeTransitionController {
    fn default() -> Self {
        Self::new()
    }
}

impl RegimeTransitionController {
    pub fn new() -> Self {
        Self {
            state: RegimeState::Active,
            historical_segments: VecDeque::new(),
        }
    }

    pub fn state(&self) -> RegimeState {
        self.state
    }

    pub fn is_locked(&self) -> bool {
        matches!(self.state, RegimeState::Locked { .. })
    }

    pub fn locked_since(&self) -> Option<Timestamp> {
        match self.state {
            RegimeState::Locked { since } => Some(since),
            RegimeState::Active => None,
        }
    }

    pub fn segments(&self) -> impl Iterator<Item = &HistoricalSegment> {
        self.historical_segments.iter()
    }

    pub fn lock(&mut self, now: Timestamp) -> SpotResult<()> {
        if self.is_locked() {
            return Err(SpotError::MarketLocked);
        }
        self.state = RegimeState::Locked { since: now };
        Ok(())
    }

    /// Return to `Active`, appending `segment` if the lock lasted any time
    pub fn unlock(&mut self, segment: Option<HistoricalSegment>, now: Timestamp) -> SpotResult<()> {
        if !self.is_locked() {
            return Err(SpotError::MarketNotLocked);
        }
        if let Some(segment) = &segment {
            if segment.end_timestamp <= segment.start_timestamp {
                return Err(SpotError::InvalidParameter("segment"));
            }
            if let Some(previous) = self.historical_segments.back() {
                if segment.start_timestamp < previous.end_timestamp {
                    return Err(SpotError::TimestampRegression {
                        last: previous.end_timestamp,
                        now: segment.start_timestamp,
                    });
                }
            }
        }

        if let Some(segment) = segment {
            self.historical_segments.push_back(segment);
        }
        self.state = RegimeState::Active;
        self.prune(now);
        Ok(())
    }

    /// Drop segments that ended before the trailing window
    pub fn prune(&mut self, now: Timestamp) {
        let cutoff = now.saturating_sub(THREE_DAYS_MS);
        while let Some(front) = self.historical_segments.front() {
            if front.end_timestamp >= cutoff {
                break;
            }
            self.historical_segments.pop_front();
        }
    }

    /// `(Σ avg × overlap, Σ overlap)` over segments clipped to the window
    pub fn conditional_contribution(
        &self,
        window_start: Timestamp,
        window_end: Timestamp,
    ) -> SpotResult<(U256, Timestamp)> {
        self.conditional_contribution_since(window_start, window_end, 0)
    }

    /// Like [`Self::conditional_contribution`], counting only segments that
    /// start at or after `from`
    pub fn conditional_contribution_since(
        &self,
        window_start: Timestamp,
        window_end: Timestamp,
        from: Timestamp,
    ) -> SpotResult<(U256, Timestamp)> {
        let mut weighted = U256::ZERO;
        let mut duration: Timestamp = 0;
        for segment in &self.historical_segments {
            if segment.start_timestamp < from {
                continue;
            }
            let overlap = segment.overlap(window_start, window_end);
            if overlap == 0 {
                continue;
            }
            weighted = checked_add_u256(weighted, widening_mul(segment.avg_price, overlap as u128))?;
            duration += overlap;
        }
        Ok((weighted, duration))
    }
}

/// Trailing-window TWAP split into conditional and spot parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwapBreakdown {
    pub window_start: Timestamp,
    pub conditional_weighted: U256,
    pub conditional_duration: Timestamp,
    pub spot_weighted: U256,
    pub spot_duration: Timestamp,
    /// False when the oracle's accumulator held less than the segments it
    /// should contain; the spot part then falls back to the window average
    pub accumulator_consistent: bool,
    pub twap: u128,
}

impl SpotMarket {
    /// Freeze the market for a proposal: one last oracle advance, then lock.
    ///
    /// The caller is expected to have moved the reserves out already.
    pub fn mark_liquidity_to_proposal(&mut self, now: Timestamp) -> SpotResult<()> {
        if !self.oracle.is_initialized() {
            return Err(SpotError::OracleNotInitialized);
        }
        self.ensure_active()?;

        let oracle = self.staged_oracle(now)?;
        self.observations.check_timestamp(now)?;
        self.regime.lock(now)?;

        let price = oracle.last_price;
        self.oracle = oracle;
        self.observations.record(now, price)?;

        info!(now, price, "liquidity moved to proposal, market locked");
        Ok(())
    }

    /// Move both reserves out for a proposal and lock the market
    pub fn withdraw_all_for_proposal(&mut self, now: Timestamp) -> SpotResult<(u64, u64)> {
        self.mark_liquidity_to_proposal(now)?;

        let withdrawn = (self.asset_reserve, self.stable_reserve);
        self.asset_reserve = 0;
        self.stable_reserve = 0;

        debug!(asset = withdrawn.0, stable = withdrawn.1, "reserves withdrawn for proposal");
        Ok(withdrawn)
    }

    /// Bridge the locked period with `winning_twap` and unlock.
    ///
    /// No-op when the market is not locked.
    pub fn fill_twap_gap_from_proposal(
        &mut self,
        winning_twap: u128,
        winning_price: u128,
        now: Timestamp,
    ) -> SpotResult<()> {
        let since = match self.regime.state() {
            RegimeState::Active => return Ok(()),
            RegimeState::Locked { since } => since,
        };
        if winning_twap == 0 {
            return Err(SpotError::InvalidParameter("winning_twap"));
        }
        if winning_price == 0 {
            return Err(SpotError::InvalidParameter("winning_price"));
        }

        let mut oracle = self.oracle.clone();
        let gap_cumulative = oracle.backfill_gap(since, now, winning_twap, winning_price)?;
        self.observations.check_timestamp(now)?;

        let segment = (now > since).then(|| HistoricalSegment {
            start_timestamp: since,
            end_timestamp: now,
            cumulative_price: gap_cumulative,
            avg_price: winning_twap,
        });
        self.regime.unlock(segment, now)?;

        self.oracle = oracle;
        self.observations.record(now, winning_price)?;

        info!(since, now, winning_twap, winning_price, "proposal gap filled, market unlocked");
        Ok(())
    }

    /// Same as [`SpotMarket::fill_twap_gap_from_proposal`]
    pub fn integrate_conditional_twap(
        &mut self,
        winning_twap: u128,
        winning_price: u128,
        now: Timestamp,
    ) -> SpotResult<()> {
        self.fill_twap_gap_from_proposal(winning_twap, winning_price, now)
    }

    /// Put liquidity back from the winning conditional market and fill the gap
    pub fn return_liquidity_from_proposal(
        &mut self,
        asset_amount: u64,
        stable_amount: u64,
        winning_twap: u128,
        winning_price: u128,
        now: Timestamp,
    ) -> SpotResult<()> {
        if !self.regime.is_locked() {
            return Err(SpotError::MarketNotLocked);
        }
        let asset_reserve = self
            .asset_reserve
            .checked_add(asset_amount)
            .ok_or(SpotError::MathOverflow)?;
        let stable_reserve = self
            .stable_reserve
            .checked_add(stable_amount)
            .ok_or(SpotError::MathOverflow)?;

        self.fill_twap_gap_from_proposal(winning_twap, winning_price, now)?;
        self.asset_reserve = asset_reserve;
        self.stable_reserve = stable_reserve;

        debug!(asset_amount, stable_amount, "liquidity returned from proposal");
        Ok(())
    }

    /// Trailing-window TWAP with the bridged segments broken out.
    ///
    /// Every segment in the window contributes `avg × overlap`. The spot part
    /// is whatever the oracle's accumulator holds beyond the segments it still
    /// contains, spread over the spot time. A slide reset drops older segments
    /// from the accumulator, so only segments starting at or after
    /// `last_reset_timestamp` are subtracted from it.
    pub fn twap_breakdown(&self, now: Timestamp) -> SpotResult<TwapBreakdown> {
        if !self.oracle.is_initialized() {
            return Err(SpotError::OracleNotInitialized);
        }
        self.ensure_active()?;

        let projected = self.oracle.projected(now)?;
        let window_start = projected.window_start_timestamp;
        let duration = now - window_start;
        if duration == 0 {
            return Ok(TwapBreakdown {
                window_start,
                conditional_weighted: U256::ZERO,
                conditional_duration: 0,
                spot_weighted: U256::ZERO,
                spot_duration: 0,
                accumulator_consistent: true,
                twap: projected.last_price,
            });
        }

        let total = projected.window_cumulative_price;
        let (conditional_weighted, conditional_duration) =
            self.regime.conditional_contribution(window_start, now)?;
        let reset_at = projected.last_reset_timestamp.unwrap_or(0);
        let (tracked_weighted, tracked_duration) = self
            .regime
            .conditional_contribution_since(window_start, now, reset_at)?;

        let spot_duration = duration.saturating_sub(conditional_duration);
        // Segments dropped by a reset count as spot time inside the accumulator
        let accumulated_spot_duration = duration.saturating_sub(tracked_duration);
        let accumulated_spot = total.checked_sub(tracked_weighted);
        let accumulator_consistent = accumulated_spot.is_some();

        let spot_weighted = match accumulated_spot {
            _ if spot_duration == 0 => U256::ZERO,
            Some(spot) => scale_u256(spot, spot_duration, accumulated_spot_duration)?,
            None => {
                warn!(
                    now,
                    window_start,
                    "accumulator below bridged segments, pricing spot time at the window average"
                );
                scale_u256(total, spot_duration, duration)?
            }
        };

        let composite = checked_add_u256(conditional_weighted, spot_weighted)?;
        Ok(TwapBreakdown {
            window_start,
            conditional_weighted,
            conditional_duration,
            spot_weighted,
            spot_duration,
            accumulator_consistent,
            twap: div_u256_to_u128(composite, duration as u128)?,
        })
    }

    /// Trailing-window average over spot and bridged history.
    ///
    /// Returns `last_price` while locked, since the window cannot be
    /// completed until the winning TWAP is known.
    pub fn get_twap_with_conditionals(&self, now: Timestamp) -> SpotResult<u128> {
        if !self.oracle.is_initialized() {
            return Err(SpotError::OracleNotInitialized);
        }
        if self.regime.is_locked() {
            return Ok(self.oracle.last_price);
        }
        Ok(self.twap_breakdown(now)?.twap)
    }

    /// Starting price for a new conditional market: the three-day TWAP once
    /// mature, the spot price before that
    pub fn get_twap_for_conditional_amm(&self, now: Timestamp) -> SpotResult<u128> {
        if !self.oracle.is_initialized() {
            return Err(SpotError::OracleNotInitialized);
        }
        if self.oracle.is_ready(now) {
            self.get_twap_with_conditionals(now)
        } else {
            Ok(self.current_price())
        }
    }
}
