//! # Safe Math Operations
//!
//! Overflow-checked arithmetic, integer square root and small helpers.

use crate::constants::BPS_DENOMINATOR;
use crate::errors::{SpotError, SpotResult};
use crate::math::big_int::mul_div_u64;
use integer_sqrt::IntegerSquareRoot;

/// Macro to generate safe arithmetic functions
macro_rules! safe_arith {
    // Narrowing conversions (listed first so `cast_max` is never taken as a name)
    (cast_max, $fn_name:ident, $from_type:ty, $to_type:ty) => {
        pub fn $fn_name(value: $from_type) -> SpotResult<$to_type> {
            <$to_type>::try_from(value).map_err(|_| SpotError::ConversionError)
        }
    };

    // Binary operations with checked methods
    ($fn_name:ident, $type:ty, $checked_method:ident, $error:expr) => {
        pub fn $fn_name(a: $type, b: $type) -> SpotResult<$type> {
            a.$checked_method(b).ok_or($error)
        }
    };
}

safe_arith!(safe_add_u64, u64, checked_add, SpotError::MathOverflow);
safe_arith!(safe_sub_u64, u64, checked_sub, SpotError::MathUnderflow);

safe_arith!(cast_max, safe_cast_u128_to_u64, u128, u64);

/// Floor of the square root of a u128
pub fn sqrt_u128(n: u128) -> u128 {
    n.integer_sqrt()
}

/// `floor(sqrt(a * b))` narrowed back to u64
pub fn sqrt_product_u64(a: u64, b: u64) -> SpotResult<u64> {
    let product = (a as u128) * (b as u128);
    safe_cast_u128_to_u64(sqrt_u128(product))
}

/// Portion of `amount` taken by a fee of `fee_bps`, rounded down
pub fn fee_amount(amount: u64, fee_bps: u16) -> SpotResult<u64> {
    if fee_bps as u64 > BPS_DENOMINATOR {
        return Err(SpotError::InvalidFee(fee_bps));
    }
    mul_div_u64(amount, fee_bps as u64, BPS_DENOMINATOR)
}

pub const fn min_u64(a: u64, b: u64) -> u64 {
    if a < b {
        a
    } else {
        b
    }
}
