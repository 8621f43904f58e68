//! Wide integer operations for high-precision math
//!
//! `U256` comes from `ethnum`. It backs the oracle's cumulative price-time
//! integral, where `price (scaled 1e12) × milliseconds` quickly exceeds u128.
//! Every division here rounds down.

use crate::errors::{SpotError, SpotResult};
pub use ethnum::U256;

/// `floor(a × b / denominator)` with a u128 intermediate
pub fn mul_div_u64(a: u64, b: u64, denominator: u64) -> SpotResult<u64> {
    if denominator == 0 {
        return Err(SpotError::DivisionByZero);
    }

    let product = (a as u128) * (b as u128);
    u64::try_from(product / (denominator as u128)).map_err(|_| SpotError::ConversionError)
}

/// `floor(a × b / denominator)` with a 256-bit intermediate
pub fn mul_div_u128(a: u128, b: u128, denominator: u128) -> SpotResult<u128> {
    if denominator == 0 {
        return Err(SpotError::DivisionByZero);
    }
    u256_to_u128(widening_mul(a, b) / U256::from(denominator))
}

/// Full 256-bit product of two u128 values (cannot overflow)
pub fn widening_mul(a: u128, b: u128) -> U256 {
    U256::from(a) * U256::from(b)
}

/// Narrow a U256 back to u128, failing instead of truncating
pub fn u256_to_u128(value: U256) -> SpotResult<u128> {
    let (hi, lo) = value.into_words();
    if hi != 0 {
        return Err(SpotError::ConversionError);
    }
    Ok(lo)
}

pub fn checked_add_u256(a: U256, b: U256) -> SpotResult<U256> {
    a.checked_add(b).ok_or(SpotError::MathOverflow)
}

/// `value / divisor` with the quotient narrowed to u128
pub fn div_u256_to_u128(value: U256, divisor: u128) -> SpotResult<u128> {
    if divisor == 0 {
        return Err(SpotError::DivisionByZero);
    }
    u256_to_u128(value / U256::from(divisor))
}

/// `floor(value × numerator / denominator)` kept in 256 bits
pub fn scale_u256(value: U256, numerator: u64, denominator: u64) -> SpotResult<U256> {
    if denominator == 0 {
        return Err(SpotError::DivisionByZero);
    }
    let product = value
        .checked_mul(U256::from(numerator as u128))
        .ok_or(SpotError::MathOverflow)?;
    Ok(product / U256::from(denominator as u128))
}
