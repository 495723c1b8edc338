//! Fixed-point arithmetic for interest, prices and ratios
//!
//! `Decimal` carries 18 decimal places in a `u128` and is used wherever
//! sub-unit precision matters (per-second rates, compounding factors, oracle
//! prices). Health ratios use the coarser 6-decimal `u64` representation
//! (`ONE = 1_000_000`). Every operation is checked and reports
//! `ArithmeticOverflow` instead of wrapping.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::program_error::ProgramError;

use crate::{constants::BPS, error::LendingError};

/// 10^18
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// 1.0 in 6-decimal ratio fixed point
pub const ONE: u64 = 1_000_000;

/// Unsigned 18-decimal fixed-point number
#[derive(
    BorshSerialize, BorshDeserialize, Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord,
)]
pub struct Decimal {
    pub raw: u128,
}

impl Decimal {
    pub const ZERO: Self = Self { raw: 0 };
    pub const ONE: Self = Self { raw: WAD };

    pub const fn from_raw(raw: u128) -> Self {
        Self { raw }
    }

    pub fn from_num(value: u64) -> Self {
        // u64::MAX * 10^18 < u128::MAX
        Self {
            raw: value as u128 * WAD,
        }
    }

    pub fn from_bps(bps: u64) -> Self {
        Self {
            raw: bps as u128 * WAD / BPS as u128,
        }
    }

    /// `numerator / denominator`, rounded down
    pub fn from_fraction(numerator: u128, denominator: u128) -> Result<Self, ProgramError> {
        Ok(Self {
            raw: mul_div_floor(numerator, WAD, denominator)?,
        })
    }

    pub fn is_zero(&self) -> bool {
        self.raw == 0
    }

    pub fn checked_add(&self, other: Decimal) -> Result<Decimal, ProgramError> {
        self.raw
            .checked_add(other.raw)
            .map(Decimal::from_raw)
            .ok_or_else(|| LendingError::ArithmeticOverflow.into())
    }

    pub fn checked_sub(&self, other: Decimal) -> Result<Decimal, ProgramError> {
        self.raw
            .checked_sub(other.raw)
            .map(Decimal::from_raw)
            .ok_or_else(|| LendingError::ArithmeticOverflow.into())
    }

    /// Product rounded down
    pub fn checked_mul(&self, other: Decimal) -> Result<Decimal, ProgramError> {
        Ok(Decimal::from_raw(mul_div_floor(self.raw, other.raw, WAD)?))
    }

    /// Quotient rounded down
    pub fn checked_div(&self, other: Decimal) -> Result<Decimal, ProgramError> {
        Ok(Decimal::from_raw(mul_div_floor(self.raw, WAD, other.raw)?))
    }

    /// Integer power by repeated squaring
    pub fn checked_pow(&self, mut exp: u64) -> Result<Decimal, ProgramError> {
        let mut base = *self;
        let mut result = Decimal::ONE;

        while exp > 0 {
            if exp & 1 == 1 {
                result = result.checked_mul(base)?;
            }
            exp >>= 1;
            if exp > 0 {
                base = base.checked_mul(base)?;
            }
        }

        Ok(result)
    }

    /// `amount * self`, rounded down to an integer amount
    pub fn mul_u64_floor(&self, amount: u64) -> Result<u64, ProgramError> {
        to_u64(mul_div_floor(amount as u128, self.raw, WAD)?)
    }

    /// `amount * self`, rounded up to an integer amount
    pub fn mul_u64_ceil(&self, amount: u64) -> Result<u64, ProgramError> {
        to_u64(mul_div_ceil(amount as u128, self.raw, WAD)?)
    }
}

/// `a * b / c`, rounded down
pub fn mul_div_floor(a: u128, b: u128, c: u128) -> Result<u128, ProgramError> {
    if c == 0 {
        return Err(LendingError::ArithmeticOverflow.into());
    }
    a.checked_mul(b)
        .map(|product| product / c)
        .ok_or_else(|| LendingError::ArithmeticOverflow.into())
}

/// `a * b / c`, rounded up
pub fn mul_div_ceil(a: u128, b: u128, c: u128) -> Result<u128, ProgramError> {
    if c == 0 {
        return Err(LendingError::ArithmeticOverflow.into());
    }
    let product = a
        .checked_mul(b)
        .ok_or::<ProgramError>(LendingError::ArithmeticOverflow.into())?;
    let quotient = product / c;
    if product % c == 0 {
        Ok(quotient)
    } else {
        quotient
            .checked_add(1)
            .ok_or_else(|| LendingError::ArithmeticOverflow.into())
    }
}

pub fn to_u64(value: u128) -> Result<u64, ProgramError> {
    u64::try_from(value).map_err(|_| LendingError::ArithmeticOverflow.into())
}

pub fn checked_pow10(exp: u32) -> Result<u128, ProgramError> {
    10u128
        .checked_pow(exp)
        .ok_or_else(|| LendingError::ArithmeticOverflow.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_operations() {
        let two = Decimal::from_num(2);
        let three = Decimal::from_num(3);

        assert_eq!(two.checked_add(three).unwrap(), Decimal::from_num(5));
        assert_eq!(three.checked_sub(two).unwrap(), Decimal::ONE);
        assert_eq!(two.checked_mul(three).unwrap(), Decimal::from_num(6));
        assert_eq!(
            Decimal::from_num(6).checked_div(three).unwrap(),
            Decimal::from_num(2)
        );
        assert!(two.checked_sub(three).is_err());
    }

    #[test]
    fn test_bps_conversion() {
        assert_eq!(Decimal::from_bps(10_000), Decimal::ONE);
        assert_eq!(Decimal::from_bps(5_000).raw, WAD / 2);
        assert_eq!(Decimal::from_bps(1).raw, WAD / 10_000);
    }

    #[test]
    fn test_pow() {
        let two = Decimal::from_num(2);
        assert_eq!(two.checked_pow(0).unwrap(), Decimal::ONE);
        assert_eq!(two.checked_pow(1).unwrap(), two);
        assert_eq!(two.checked_pow(10).unwrap(), Decimal::from_num(1024));

        let one_and_a_half = Decimal::from_raw(WAD + WAD / 2);
        assert_eq!(
            one_and_a_half.checked_pow(2).unwrap(),
            Decimal::from_raw(2 * WAD + WAD / 4)
        );
    }

    #[test]
    fn test_pow_overflow_is_reported() {
        let big = Decimal::from_num(1_000_000);
        assert_eq!(
            big.checked_pow(10),
            Err(LendingError::ArithmeticOverflow.into())
        );
    }

    #[test]
    fn test_rounding_direction() {
        let third = Decimal::from_fraction(1, 3).unwrap();
        assert_eq!(third.mul_u64_floor(10).unwrap(), 3);
        assert_eq!(third.mul_u64_ceil(10).unwrap(), 4);

        assert_eq!(mul_div_floor(7, 3, 2).unwrap(), 10);
        assert_eq!(mul_div_ceil(7, 3, 2).unwrap(), 11);
        assert_eq!(mul_div_ceil(8, 3, 2).unwrap(), 12);
    }

    #[test]
    fn test_division_by_zero_is_an_error() {
        assert!(mul_div_floor(1, 1, 0).is_err());
        assert!(Decimal::ONE.checked_div(Decimal::ZERO).is_err());
    }

    #[test]
    fn test_to_u64_bounds() {
        assert_eq!(to_u64(u64::MAX as u128).unwrap(), u64::MAX);
        assert!(to_u64(u64::MAX as u128 + 1).is_err());
    }
}
