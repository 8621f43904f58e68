//! # Mathematical Functions
//!
//! Pure integer math used by the market and the oracles.

pub mod big_int;
pub mod safe_math;

// Re-export commonly used functions
pub use big_int::*;
pub use safe_math::*;
