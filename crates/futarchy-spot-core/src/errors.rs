//! # Core Error Types
//!
//! Every fallible operation in the crate returns [`SpotError`]. Operations
//! evaluate all of their checks before writing state, so an error always
//! means the market was left untouched.

use crate::Timestamp;
use thiserror::Error;

/// Errors raised by the spot market, its oracles and its configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpotError {
    // ========================================================================
    // Validation Errors
    // ========================================================================
    #[error("Zero amount")]
    ZeroAmount,

    #[error("Fee of {0} bps exceeds the 10000 bps maximum")]
    InvalidFee(u16),

    #[error("Invalid parameter '{0}'")]
    InvalidParameter(&'static str),

    #[error("Failed to load configuration: {0}")]
    ConfigError(String),

    // ========================================================================
    // Liquidity Errors
    // ========================================================================
    #[error("Insufficient liquidity")]
    InsufficientLiquidity,

    #[error("Imbalanced deposit: asset share {asset_share} vs stable share {stable_share}")]
    ImbalancedDeposit { asset_share: u64, stable_share: u64 },

    #[error("Slippage exceeded: expected at least {minimum}, got {actual}")]
    SlippageExceeded { minimum: u64, actual: u64 },

    #[error("Swap output rounds to zero")]
    ZeroOutput,

    // ========================================================================
    // State Errors
    // ========================================================================
    #[error("Oracle not initialized")]
    OracleNotInitialized,

    #[error("Oracle already initialized")]
    AlreadyInitialized,

    #[error("TWAP not ready: window needs 3 days of history")]
    TwapNotReady,

    #[error("Market liquidity is locked in a proposal")]
    MarketLocked,

    #[error("Market is not locked in a proposal")]
    MarketNotLocked,

    #[error("Timestamp {now} is earlier than last recorded {last}")]
    TimestampRegression { last: Timestamp, now: Timestamp },

    #[error("No price observations recorded")]
    InsufficientObservations,

    // ========================================================================
    // Arithmetic Errors
    // ========================================================================
    #[error("Math overflow")]
    MathOverflow,

    #[error("Math underflow")]
    MathUnderflow,

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Conversion error")]
    ConversionError,
}

/// Result type using core errors
pub type SpotResult<T> = Result<T, SpotError>;

/// Broad class of a [`SpotError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Liquidity,
    State,
    Arithmetic,
}

impl SpotError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SpotError::ZeroAmount
            | SpotError::InvalidFee(_)
            | SpotError::InvalidParameter(_)
            | SpotError::ConfigError(_) => ErrorCategory::Validation,
            SpotError::InsufficientLiquidity
            | SpotError::ImbalancedDeposit { .. }
            | SpotError::SlippageExceeded { .. }
            | SpotError::ZeroOutput => ErrorCategory::Liquidity,
            SpotError::OracleNotInitialized
            | SpotError::AlreadyInitialized
            | SpotError::TwapNotReady
            | SpotError::MarketLocked
            | SpotError::MarketNotLocked
            | SpotError::TimestampRegression { .. }
            | SpotError::InsufficientObservations => ErrorCategory::State,
            SpotError::MathOverflow
            | SpotError::MathUnderflow
            | SpotError::DivisionByZero
            | SpotError::ConversionError => ErrorCategory::Arithmetic,
        }
    }

    /// True when the same call could succeed with different parameters
    /// (amounts, minimums), false when the operation is unavailable in the
    /// market's current state.
    pub fn is_retryable_with_new_params(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Validation | ErrorCategory::Liquidity
        )
    }
}
