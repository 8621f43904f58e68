//! Protocol constants for the spot market and its oracles

use crate::Timestamp;

// Price constants
/// Prices are stable units per asset unit multiplied by this scale.
pub const PRICE_SCALE: u128 = 1_000_000_000_000;

// Oracle window
/// Length of the rolling TWAP window (3 days in milliseconds).
pub const THREE_DAYS_MS: Timestamp = 259_200_000;

// Fee constants
pub const MAX_FEE_BPS: u16 = 10_000;
pub const BPS_DENOMINATOR: u64 = 10_000;
pub const DEFAULT_FEE_BPS: u16 = 30;

// Liquidity constants
/// LP units minted to no one on the first deposit; never redeemable.
pub const MINIMUM_LIQUIDITY: u64 = 1_000;

/// Deposits whose two mint candidates differ by more than
/// `average / IMBALANCE_TOLERANCE_DIVISOR` are rejected (1%).
pub const IMBALANCE_TOLERANCE_DIVISOR: u128 = 100;

// Ring buffer constants
pub const DEFAULT_OBSERVATION_CAPACITY: usize = 64;
pub const MAX_OBSERVATION_CAPACITY: usize = 1_024;
