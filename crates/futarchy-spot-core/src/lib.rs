//! # Futarchy Spot Core
//!
//! Pricing and oracle core for the spot market that backs futarchy governance.
//! It provides:
//!
//! - A constant-product market between an asset and a stable balance
//! - A rolling three-day TWAP oracle that survives liquidity leaving the
//!   market for a governance vote and coming back
//! - A short-horizon ring buffer of price observations
//! - Configuration, constants and error types shared by callers
//!
//! Every [`SpotMarket`] is an independent value. The host is expected to
//! serialize operations on a single market and to pass non-decreasing
//! timestamps (milliseconds).

pub mod config;
pub mod constants;
pub mod errors;
pub mod market;
pub mod math;
pub mod oracle;

// Re-export commonly used items
pub use config::MarketConfig;
pub use constants::*;
pub use errors::{ErrorCategory, SpotError, SpotResult};
pub use market::{
    HistoricalSegment, RegimeState, RegimeTransitionController, SpotMarket, SwapDirection,
    SwapQuote, TwapBreakdown,
};
pub use oracle::{PriceObservation, RingBufferOracle, RollingWindowOracle};

/// Millisecond timestamp supplied by the host.
pub type Timestamp = u64;
