//! # Spot Market
//!
//! Constant-product market ([`pool`]) and the proposal regime that takes its
//! liquidity away and brings it back ([`regime`]).

pub mod pool;
pub mod regime;

pub use pool::*;
pub use regime::*;
