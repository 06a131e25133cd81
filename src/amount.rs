//! Conversion between human-readable token amounts and integer base units.

use alloy::primitives::U256;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use thiserror::Error;

/// USDC decimals, also the StarkEx collateral asset resolution exponent.
pub const USDC_DECIMALS: u8 = 6;

/// Ether decimals.
pub const ETH_DECIMALS: u8 = 18;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount must be positive, got {0}")]
    NotPositive(Decimal),
    #[error("amount {amount} has more precision than {decimals} decimals allow")]
    TooPrecise { amount: Decimal, decimals: u8 },
    #[error("amount {amount} overflows at {decimals} decimals")]
    Overflow { amount: Decimal, decimals: u8 },
}

fn scale_factor(decimals: u8) -> Option<Decimal> {
    10i128
        .checked_pow(u32::from(decimals))
        .and_then(|factor| Decimal::try_from_i128_with_scale(factor, 0).ok())
}

/// Scale a positive human amount to integer base units, rejecting any
/// remainder below the token's resolution.
pub fn to_base_units(amount: Decimal, decimals: u8) -> Result<U256, AmountError> {
    if amount <= Decimal::ZERO {
        return Err(AmountError::NotPositive(amount));
    }
    let scaled = scale_factor(decimals)
        .and_then(|factor| amount.checked_mul(factor))
        .ok_or(AmountError::Overflow { amount, decimals })?;
    if !scaled.fract().is_zero() {
        return Err(AmountError::TooPrecise { amount, decimals });
    }
    let units = scaled
        .trunc()
        .to_u128()
        .ok_or(AmountError::Overflow { amount, decimals })?;
    Ok(U256::from(units))
}

/// Same as [`to_base_units`] for quantities that must fit in 64 bits.
pub fn to_base_units_u64(amount: Decimal, decimals: u8) -> Result<u64, AmountError> {
    let units = to_base_units(amount, decimals)?;
    u64::try_from(units).map_err(|_| AmountError::Overflow { amount, decimals })
}

/// Format integer base units as a human amount. Values beyond `Decimal`
/// range saturate to `None`.
pub fn from_base_units(units: U256, decimals: u8) -> Option<Decimal> {
    let raw = u128::try_from(units).ok()?;
    let raw = i128::try_from(raw).ok()?;
    Decimal::try_from_i128_with_scale(raw, u32::from(decimals))
        .ok()
        .map(|d| d.normalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn scales_usdc_amounts() {
        assert_eq!(to_base_units(dec!(25), USDC_DECIMALS).unwrap(), U256::from(25_000_000u64));
        assert_eq!(to_base_units(dec!(1.5), USDC_DECIMALS).unwrap(), U256::from(1_500_000u64));
        assert_eq!(to_base_units(dec!(0.000001), USDC_DECIMALS).unwrap(), U256::from(1u64));
        assert_eq!(to_base_units_u64(dec!(10), USDC_DECIMALS).unwrap(), 10_000_000);
    }

    #[test]
    fn scales_ether_amounts() {
        assert_eq!(
            to_base_units(dec!(0.01), ETH_DECIMALS).unwrap(),
            U256::from(10_000_000_000_000_000u64)
        );
    }

    #[test]
    fn rejects_sub_resolution_amounts() {
        assert_eq!(
            to_base_units(dec!(0.0000001), USDC_DECIMALS),
            Err(AmountError::TooPrecise {
                amount: dec!(0.0000001),
                decimals: USDC_DECIMALS
            })
        );
    }

    #[test]
    fn rejects_non_positive_amounts() {
        assert!(matches!(
            to_base_units(Decimal::ZERO, USDC_DECIMALS),
            Err(AmountError::NotPositive(_))
        ));
        assert!(matches!(
            to_base_units(dec!(-1), USDC_DECIMALS),
            Err(AmountError::NotPositive(_))
        ));
    }

    #[test]
    fn formats_base_units() {
        assert_eq!(from_base_units(U256::from(1_500_000u64), USDC_DECIMALS), Some(dec!(1.5)));
        assert_eq!(from_base_units(U256::ZERO, USDC_DECIMALS), Some(Decimal::ZERO));
        assert_eq!(from_base_units(U256::MAX, USDC_DECIMALS), None);
    }
}
