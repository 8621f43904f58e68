//! Shared helpers for integration tests

#![allow(dead_code)]

pub mod builders;
pub mod tracing;

pub use builders::*;
pub use self::tracing::init_test_tracing;

pub const HOUR_MS: u64 = 3_600_000;
pub const DAY_MS: u64 = 24 * HOUR_MS;
