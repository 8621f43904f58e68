//! # Constant-Product Pool
//!
//! `asset_reserve × stable_reserve` pricing with a fee taken from the swap
//! input. The fee stays in the input reserve, so `k` grows on every swap.
//!
//! Every mutating operation follows the same shape:
//! 1. check the regime and the inputs
//! 2. advance a copy of the oracle to `now`
//! 3. compute the new reserves with checked math
//! 4. commit the reserves, the oracle copy and the ring buffer observation
//!
//! Nothing is written before step 4, so a failed call leaves the market as it
//! was.

use crate::config::MarketConfig;
use crate::constants::{
    DEFAULT_OBSERVATION_CAPACITY, IMBALANCE_TOLERANCE_DIVISOR, MAX_FEE_BPS, MINIMUM_LIQUIDITY,
    PRICE_SCALE,
};
use crate::errors::{SpotError, SpotResult};
use crate::market::regime::RegimeTransitionController;
use crate::math::big_int::{mul_div_u128, mul_div_u64};
use crate::math::safe_math::{
    fee_amount, min_u64, safe_add_u64, safe_cast_u128_to_u64, safe_sub_u64, sqrt_product_u64,
};
use crate::oracle::{RingBufferOracle, RollingWindowOracle};
use crate::Timestamp;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Side of the pool the input is paid into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapDirection {
    AssetToStable,
    StableToAsset,
}

/// Result of pricing a swap against current reserves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapQuote {
    pub amount_out: u64,
    /// Part of the input retained by the pool
    pub fee: u64,
}

/// Spot market for one asset/stable pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotMarket {
    pub(crate) asset_reserve: u64,
    pub(crate) stable_reserve: u64,
    /// Includes the `MINIMUM_LIQUIDITY` units nobody can redeem
    pub(crate) lp_supply: u64,
    pub(crate) fee_bps: u16,
    pub(crate) oracle: RollingWindowOracle,
    pub(crate) regime: RegimeTransitionController,
    pub(crate) observations: RingBufferOracle,
}

/// `stable / asset` scaled by `PRICE_SCALE`, `None` for an empty asset side
fn price_from_reserves(asset_reserve: u64, stable_reserve: u64) -> Option<u128> {
    if asset_reserve == 0 {
        return None;
    }
    // u64 × 1e12 stays below 2^104
    Some(stable_reserve as u128 * PRICE_SCALE / asset_reserve as u128)
}

impl SpotMarket {
    /// Create an empty market charging `fee_bps` on swap input
    pub fn new(fee_bps: u16) -> SpotResult<Self> {
        Self::with_observation_capacity(fee_bps, DEFAULT_OBSERVATION_CAPACITY)
    }

    pub fn from_config(config: &MarketConfig) -> SpotResult<Self> {
        config.validate()?;
        Self::with_observation_capacity(config.fee_bps, config.observation_capacity)
    }

    fn with_observation_capacity(fee_bps: u16, capacity: usize) -> SpotResult<Self> {
        if fee_bps > MAX_FEE_BPS {
            return Err(SpotError::InvalidFee(fee_bps));
        }

        Ok(Self {
            asset_reserve: 0,
            stable_reserve: 0,
            lp_supply: 0,
            fee_bps,
            oracle: RollingWindowOracle::new(),
            regime: RegimeTransitionController::new(),
            observations: RingBufferOracle::new(capacity)?,
        })
    }

    // ------------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------------

    pub fn reserves(&self) -> (u64, u64) {
        (self.asset_reserve, self.stable_reserve)
    }

    pub fn lp_supply(&self) -> u64 {
        self.lp_supply
    }

    pub fn fee_bps(&self) -> u16 {
        self.fee_bps
    }

    /// Reserve product
    pub fn k(&self) -> u128 {
        self.asset_reserve as u128 * self.stable_reserve as u128
    }

    /// Current price from reserves, `None` while the asset side is empty
    pub fn spot_price(&self) -> Option<u128> {
        price_from_reserves(self.asset_reserve, self.stable_reserve)
    }

    pub fn oracle(&self) -> &RollingWindowOracle {
        &self.oracle
    }

    pub fn regime(&self) -> &RegimeTransitionController {
        &self.regime
    }

    pub fn observations(&self) -> &RingBufferOracle {
        &self.observations
    }

    pub fn is_locked(&self) -> bool {
        self.regime.is_locked()
    }

    pub fn locked_since(&self) -> Option<Timestamp> {
        self.regime.locked_since()
    }

    /// Spot price, or the oracle's last price when reserves are empty
    pub(crate) fn current_price(&self) -> u128 {
        self.spot_price().unwrap_or(self.oracle.last_price)
    }

    pub(crate) fn ensure_active(&self) -> SpotResult<()> {
        if self.regime.is_locked() {
            return Err(SpotError::MarketLocked);
        }
        Ok(())
    }

    /// Oracle copy advanced to `now` at the current price
    pub(crate) fn staged_oracle(&self, now: Timestamp) -> SpotResult<RollingWindowOracle> {
        let mut oracle = self.oracle.clone();
        oracle.advance(now, self.current_price())?;
        Ok(oracle)
    }

    // ------------------------------------------------------------------------
    // Quotes
    // ------------------------------------------------------------------------

    /// Price a swap without touching state
    pub fn quote_swap(&self, amount_in: u64, direction: SwapDirection) -> SpotResult<SwapQuote> {
        if amount_in == 0 {
            return Err(SpotError::ZeroAmount);
        }

        let (reserve_in, reserve_out) = match direction {
            SwapDirection::AssetToStable => (self.asset_reserve, self.stable_reserve),
            SwapDirection::StableToAsset => (self.stable_reserve, self.asset_reserve),
        };
        if reserve_in == 0 || reserve_out == 0 {
            return Err(SpotError::InsufficientLiquidity);
        }

        let fee = fee_amount(amount_in, self.fee_bps)?;
        let amount_after_fee = amount_in - fee;

        // out = after_fee × reserve_out / (reserve_in + after_fee)
        let denominator = reserve_in as u128 + amount_after_fee as u128;
        let amount_out = safe_cast_u128_to_u64(mul_div_u128(
            amount_after_fee as u128,
            reserve_out as u128,
            denominator,
        )?)?;

        if amount_out == 0 {
            return Err(SpotError::ZeroOutput);
        }
        if amount_out >= reserve_out {
            return Err(SpotError::InsufficientLiquidity);
        }

        Ok(SwapQuote { amount_out, fee })
    }

    /// Pro-rata reserves redeemable for `lp_amount`, rounded down
    pub fn preview_remove_liquidity(&self, lp_amount: u64) -> SpotResult<(u64, u64)> {
        if lp_amount == 0 {
            return Err(SpotError::ZeroAmount);
        }
        if self.lp_supply == 0 || lp_amount > self.lp_supply {
            return Err(SpotError::InsufficientLiquidity);
        }

        let asset_out = mul_div_u64(lp_amount, self.asset_reserve, self.lp_supply)?;
        let stable_out = mul_div_u64(lp_amount, self.stable_reserve, self.lp_supply)?;
        Ok((asset_out, stable_out))
    }

    // ------------------------------------------------------------------------
    // Liquidity
    // ------------------------------------------------------------------------

    /// Deposit both sides and mint LP units
    pub fn add_liquidity(
        &mut self,
        asset_in: u64,
        stable_in: u64,
        min_lp_out: u64,
        now: Timestamp,
    ) -> SpotResult<u64> {
        self.ensure_active()?;
        if asset_in == 0 || stable_in == 0 {
            return Err(SpotError::ZeroAmount);
        }

        if self.lp_supply == 0 {
            return self.add_initial_liquidity(asset_in, stable_in, min_lp_out, now);
        }

        let mut oracle = self.staged_oracle(now)?;

        let lp_from_asset = mul_div_u64(asset_in, self.lp_supply, self.asset_reserve)?;
        let lp_from_stable =
            mul_div_u64(stable_in, self.lp_supply, self.stable_reserve)?;

        // Candidates must agree within 1% of their average (truncating)
        let average = (lp_from_asset as u128 + lp_from_stable as u128) / 2;
        let tolerance = average / IMBALANCE_TOLERANCE_DIVISOR;
        if lp_from_asset.abs_diff(lp_from_stable) as u128 > tolerance {
            return Err(SpotError::ImbalancedDeposit {
                asset_share: lp_from_asset,
                stable_share: lp_from_stable,
            });
        }

        let minted = min_u64(lp_from_asset, lp_from_stable);
        if minted == 0 {
            return Err(SpotError::InsufficientLiquidity);
        }
        if minted < min_lp_out {
            return Err(SpotError::SlippageExceeded {
                minimum: min_lp_out,
                actual: minted,
            });
        }

        let asset_reserve = safe_add_u64(self.asset_reserve, asset_in)?;
        let stable_reserve = safe_add_u64(self.stable_reserve, stable_in)?;
        let lp_supply = safe_add_u64(self.lp_supply, minted)?;
        let price = price_from_reserves(asset_reserve, stable_reserve).unwrap_or(oracle.last_price);
        oracle.observe_price(price);
        self.observations.check_timestamp(now)?;

        self.asset_reserve = asset_reserve;
        self.stable_reserve = stable_reserve;
        self.lp_supply = lp_supply;
        self.oracle = oracle;
        self.observations.record(now, price)?;

        debug!(asset_in, stable_in, minted, price, "liquidity added");
        Ok(minted)
    }

    fn add_initial_liquidity(
        &mut self,
        asset_in: u64,
        stable_in: u64,
        min_lp_out: u64,
        now: Timestamp,
    ) -> SpotResult<u64> {
        let root = sqrt_product_u64(asset_in, stable_in)?;
        if root <= MINIMUM_LIQUIDITY {
            return Err(SpotError::InsufficientLiquidity);
        }

        let minted = root - MINIMUM_LIQUIDITY;
        if minted < min_lp_out {
            return Err(SpotError::SlippageExceeded {
                minimum: min_lp_out,
                actual: minted,
            });
        }

        let price = price_from_reserves(asset_in, stable_in).ok_or(SpotError::ZeroAmount)?;
        let mut oracle = self.oracle.clone();
        oracle.initialize(now, price)?;
        self.observations.check_timestamp(now)?;

        self.asset_reserve = asset_in;
        self.stable_reserve = stable_in;
        self.lp_supply = root;
        self.oracle = oracle;
        self.observations.record(now, price)?;

        info!(asset_in, stable_in, minted, price, now, "market initialized");
        Ok(minted)
    }

    /// Burn `lp_amount` and return the pro-rata reserves
    pub fn remove_liquidity(
        &mut self,
        lp_amount: u64,
        min_asset_out: u64,
        min_stable_out: u64,
        now: Timestamp,
    ) -> SpotResult<(u64, u64)> {
        self.ensure_active()?;
        if lp_amount == 0 {
            return Err(SpotError::ZeroAmount);
        }

        let remaining = self
            .lp_supply
            .checked_sub(lp_amount)
            .ok_or(SpotError::InsufficientLiquidity)?;
        if remaining <= MINIMUM_LIQUIDITY {
            return Err(SpotError::InsufficientLiquidity);
        }

        let (asset_out, stable_out) = self.preview_remove_liquidity(lp_amount)?;
        if asset_out < min_asset_out {
            return Err(SpotError::SlippageExceeded {
                minimum: min_asset_out,
                actual: asset_out,
            });
        }
        if stable_out < min_stable_out {
            return Err(SpotError::SlippageExceeded {
                minimum: min_stable_out,
                actual: stable_out,
            });
        }

        let mut oracle = if self.oracle.is_initialized() {
            self.staged_oracle(now)?
        } else {
            self.oracle.clone()
        };

        let asset_reserve = safe_sub_u64(self.asset_reserve, asset_out)?;
        let stable_reserve = safe_sub_u64(self.stable_reserve, stable_out)?;
        let price = price_from_reserves(asset_reserve, stable_reserve).unwrap_or(oracle.last_price);
        oracle.observe_price(price);
        self.observations.check_timestamp(now)?;

        self.asset_reserve = asset_reserve;
        self.stable_reserve = stable_reserve;
        self.lp_supply = remaining;
        self.oracle = oracle;
        self.observations.record(now, price)?;

        debug!(lp_amount, asset_out, stable_out, price, "liquidity removed");
        Ok((asset_out, stable_out))
    }

    // ------------------------------------------------------------------------
    // Swaps
    // ------------------------------------------------------------------------

    /// Swap `amount_in` in `direction`, returning the amount paid out
    pub fn swap(
        &mut self,
        amount_in: u64,
        min_out: u64,
        direction: SwapDirection,
        now: Timestamp,
    ) -> SpotResult<u64> {
        self.ensure_active()?;
        if amount_in == 0 {
            return Err(SpotError::ZeroAmount);
        }
        if !self.oracle.is_initialized() {
            return Err(SpotError::OracleNotInitialized);
        }

        let mut oracle = self.staged_oracle(now)?;
        let quote = self.quote_swap(amount_in, direction)?;
        if quote.amount_out < min_out {
            return Err(SpotError::SlippageExceeded {
                minimum: min_out,
                actual: quote.amount_out,
            });
        }

        // The full input, fee included, stays in the pool
        let (asset_reserve, stable_reserve) = match direction {
            SwapDirection::AssetToStable => (
                safe_add_u64(self.asset_reserve, amount_in)?,
                safe_sub_u64(self.stable_reserve, quote.amount_out)?,
            ),
            SwapDirection::StableToAsset => (
                safe_sub_u64(self.asset_reserve, quote.amount_out)?,
                safe_add_u64(self.stable_reserve, amount_in)?,
            ),
        };
        let price = price_from_reserves(asset_reserve, stable_reserve).unwrap_or(oracle.last_price);
        oracle.observe_price(price);
        self.observations.check_timestamp(now)?;

        self.asset_reserve = asset_reserve;
        self.stable_reserve = stable_reserve;
        self.oracle = oracle;
        self.observations.record(now, price)?;

        debug!(
            ?direction,
            amount_in,
            amount_out = quote.amount_out,
            fee = quote.fee,
            price,
            "swap executed"
        );
        Ok(quote.amount_out)
    }

    // ------------------------------------------------------------------------
    // TWAP
    // ------------------------------------------------------------------------

    /// Three-day TWAP at `now`, read-only
    pub fn get_twap(&self, now: Timestamp) -> SpotResult<u128> {
        self.oracle.get_twap(now)
    }

    /// Three-day TWAP at `now`, advancing the oracle
    pub fn get_twap_mut(&mut self, now: Timestamp) -> SpotResult<u128> {
        self.ensure_active()?;
        let price = self.current_price();
        self.oracle.get_twap_mut(now, price)
    }

    pub fn is_twap_ready(&self, now: Timestamp) -> bool {
        self.oracle.is_ready(now)
    }
}
