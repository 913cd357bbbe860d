//! Fixed-point boundary encoding.
//!
//! Callers speak unsigned integers scaled by an explicit number of decimals
//! (6 for collateral, the oracle's decimals for prices). Inside the engine
//! everything is `Decimal`. These two functions are the only place the
//! representations meet.

use rust_decimal::{Decimal, RoundingStrategy};

/// Largest scale `Decimal` can carry.
pub const MAX_DECIMALS: u32 = 28;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FixedPointError {
    #[error("decimals {0} exceeds maximum of {MAX_DECIMALS}")]
    TooManyDecimals(u32),

    #[error("value {0} cannot be encoded as an unsigned integer")]
    Negative(Decimal),

    #[error("fixed-point value overflows at {decimals} decimals")]
    Overflow { decimals: u32 },
}

/// Raw integer with `decimals` implied places -> `Decimal`.
pub fn to_decimal(raw: u128, decimals: u32) -> Result<Decimal, FixedPointError> {
    if decimals > MAX_DECIMALS {
        return Err(FixedPointError::TooManyDecimals(decimals));
    }
    let raw = i128::try_from(raw).map_err(|_| FixedPointError::Overflow { decimals })?;
    Decimal::try_from_i128_with_scale(raw, decimals)
        .map(|d| d.normalize())
        .map_err(|_| FixedPointError::Overflow { decimals })
}

/// `Decimal` -> raw integer with `decimals` implied places, truncating toward zero.
pub fn from_decimal(value: Decimal, decimals: u32) -> Result<u128, FixedPointError> {
    if decimals > MAX_DECIMALS {
        return Err(FixedPointError::TooManyDecimals(decimals));
    }
    if value.is_sign_negative() && !value.is_zero() {
        return Err(FixedPointError::Negative(value));
    }

    let mut scaled = value.round_dp_with_strategy(decimals, RoundingStrategy::ToZero);
    scaled.rescale(decimals);
    // rescale silently gives up scale when the mantissa would not fit
    if scaled.scale() != decimals {
        return Err(FixedPointError::Overflow { decimals });
    }

    u128::try_from(scaled.mantissa()).map_err(|_| FixedPointError::Negative(value))
}

/// Signed variant for rates and pnl deltas.
pub fn from_decimal_signed(value: Decimal, decimals: u32) -> Result<i128, FixedPointError> {
    let magnitude = from_decimal(value.abs(), decimals)?;
    let magnitude = i128::try_from(magnitude).map_err(|_| FixedPointError::Overflow { decimals })?;
    Ok(if value.is_sign_negative() { -magnitude } else { magnitude })
}
