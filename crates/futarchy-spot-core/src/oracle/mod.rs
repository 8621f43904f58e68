//! # Oracle Module
//!
//! Price oracles maintained by the spot market:
//!
//! - [`RollingWindowOracle`]: three-day cumulative price accumulator used for
//!   governance decisions
//! - [`RingBufferOracle`]: short-horizon observation log for lending-style
//!   consumers

pub mod ring_buffer;
pub mod rolling_window;

pub use ring_buffer::*;
pub use rolling_window::*;
