use solana_program::{msg, program_error::ProgramError};

use crate::{
    constants::BPS,
    error::LendingError,
    math::{checked_pow10, mul_div_ceil, mul_div_floor, to_u64, Decimal, ONE},
};

/// Health ratio of a position without debt
pub const HEALTH_INFINITE: u64 = u64::MAX;

/// An amount of one asset together with what is needed to value it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetAmount {
    /// Base units
    pub amount: u64,
    /// Quote units per whole token
    pub price: Decimal,
    /// Mint decimals
    pub decimals: u8,
}

/// Outcome of sizing a liquidation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidationAmounts {
    /// Debt repaid by the liquidator
    pub repay: u64,
    /// Collateral paid out to the liquidator
    pub seize: u64,
    /// Whether the bonus was cut short by the borrower's collateral
    pub clamped: bool,
}

/// Collateral valuation and health checks
pub struct SolvencyEngine;

impl SolvencyEngine {
    /// Quote value of an asset amount (18 decimals), rounded down
    pub fn token_value(asset: &AssetAmount) -> Result<u128, ProgramError> {
        mul_div_floor(
            asset.amount as u128,
            asset.price.raw,
            checked_pow10(asset.decimals as u32)?,
        )
    }

    /// Quote value of an asset amount (18 decimals), rounded up
    pub fn token_value_ceil(asset: &AssetAmount) -> Result<u128, ProgramError> {
        mul_div_ceil(
            asset.amount as u128,
            asset.price.raw,
            checked_pow10(asset.decimals as u32)?,
        )
    }

    /// Risk-adjusted collateral value over debt value, 6 decimals
    ///
    /// `(collateral × collateral_price × threshold) / (debt × debt_price)`.
    /// Collateral is valued rounding down and debt rounding up. A position
    /// without debt reports `HEALTH_INFINITE`; ratios above `u64::MAX`
    /// saturate to it. Outstanding debt priced at zero is an error.
    pub fn health_ratio(
        collateral: &AssetAmount,
        debt: &AssetAmount,
        liquidation_threshold: u16,
    ) -> Result<u64, ProgramError> {
        if debt.amount == 0 {
            return Ok(HEALTH_INFINITE);
        }

        let debt_value = Self::token_value_ceil(debt)?;
        if debt_value == 0 {
            msg!("Debt of {} is priced at zero", debt.amount);
            return Err(LendingError::InvalidPrice.into());
        }

        let collateral_value = Self::token_value(collateral)?;
        let weighted = mul_div_floor(
            collateral_value,
            liquidation_threshold as u128,
            BPS as u128,
        )?;
        let ratio = mul_div_floor(weighted, ONE as u128, debt_value)?;

        Ok(u64::try_from(ratio).unwrap_or(HEALTH_INFINITE))
    }

    pub fn is_liquidatable(health_ratio: u64) -> bool {
        health_ratio < ONE
    }

    pub fn admits_borrow(health_ratio: u64) -> bool {
        health_ratio >= ONE
    }

    /// Size a liquidation of `debt` against `collateral`
    ///
    /// The liquidator repays up to `close_factor` of the debt (the whole debt
    /// when that share rounds to nothing) and receives collateral worth the
    /// repaid value plus `liquidation_bonus`, capped at `collateral.amount`.
    pub fn liquidation_amounts(
        collateral: &AssetAmount,
        debt: &AssetAmount,
        close_factor: u16,
        liquidation_bonus: u16,
    ) -> Result<LiquidationAmounts, ProgramError> {
        let closable = to_u64(mul_div_floor(
            debt.amount as u128,
            close_factor as u128,
            BPS as u128,
        )?)?;
        let repay = if closable == 0 {
            debt.amount
        } else {
            closable.min(debt.amount)
        };

        let repay_value = Self::token_value(&AssetAmount {
            amount: repay,
            ..*debt
        })?;
        let reward_value = mul_div_floor(
            repay_value,
            BPS as u128 + liquidation_bonus as u128,
            BPS as u128,
        )?;
        let owed = to_u64(mul_div_floor(
            reward_value,
            checked_pow10(collateral.decimals as u32)?,
            collateral.price.raw,
        )?)?;

        let clamped = owed > collateral.amount;
        if clamped {
            msg!(
                "Liquidation reward {} exceeds collateral {}, paying available collateral",
                owed,
                collateral.amount
            );
        }

        Ok(LiquidationAmounts {
            repay,
            seize: owed.min(collateral.amount),
            clamped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usdc(amount: u64) -> AssetAmount {
        AssetAmount {
            amount,
            price: Decimal::ONE,
            decimals: 6,
        }
    }

    fn sol(amount: u64, price: u64) -> AssetAmount {
        AssetAmount {
            amount,
            price: Decimal::from_num(price),
            decimals: 9,
        }
    }

    #[test]
    fn test_zero_debt_is_infinitely_healthy() {
        let ratio = SolvencyEngine::health_ratio(&usdc(1_000_000), &sol(0, 150), 8_000).unwrap();
        assert_eq!(ratio, HEALTH_INFINITE);
        assert!(!SolvencyEngine::is_liquidatable(ratio));

        // No collateral and no debt is still healthy
        let ratio = SolvencyEngine::health_ratio(&usdc(0), &sol(0, 150), 8_000).unwrap();
        assert_eq!(ratio, HEALTH_INFINITE);
    }

    #[test]
    fn test_health_ratio_formula() {
        // 1000 USDC at 80% against 4 SOL at $100 = 800 / 400 = 2.0
        let ratio = SolvencyEngine::health_ratio(
            &usdc(1_000_000_000),
            &sol(4_000_000_000, 100),
            8_000,
        )
        .unwrap();
        assert_eq!(ratio, 2 * ONE);

        // Same debt at $250 = 800 / 1000 = 0.8
        let ratio = SolvencyEngine::health_ratio(
            &usdc(1_000_000_000),
            &sol(4_000_000_000, 250),
            8_000,
        )
        .unwrap();
        assert_eq!(ratio, 800_000);
        assert!(SolvencyEngine::is_liquidatable(ratio));
        assert!(!SolvencyEngine::admits_borrow(ratio));
    }

    #[test]
    fn test_ratio_of_exactly_one_admits_borrow() {
        let ratio =
            SolvencyEngine::health_ratio(&usdc(1_000_000), &usdc(800_000), 8_000).unwrap();
        assert_eq!(ratio, ONE);
        assert!(SolvencyEngine::admits_borrow(ratio));
        assert!(!SolvencyEngine::is_liquidatable(ratio));
    }

    #[test]
    fn test_no_collateral_with_debt_is_zero() {
        let ratio = SolvencyEngine::health_ratio(&usdc(0), &usdc(1), 8_000).unwrap();
        assert_eq!(ratio, 0);
    }

    #[test]
    fn test_zero_priced_debt_is_rejected() {
        let free = AssetAmount {
            amount: 1_000_000,
            price: Decimal::ZERO,
            decimals: 6,
        };
        assert_eq!(
            SolvencyEngine::health_ratio(&usdc(1), &free, 8_000),
            Err(LendingError::InvalidPrice.into())
        );
    }

    #[test]
    fn test_liquidation_applies_close_factor_and_bonus() {
        // 400 USDC of debt, 50% close factor, 5% bonus, collateral SOL at $100
        let amounts = SolvencyEngine::liquidation_amounts(
            &sol(10_000_000_000, 100),
            &usdc(400_000_000),
            5_000,
            500,
        )
        .unwrap();

        assert_eq!(amounts.repay, 200_000_000);
        // 200 USDC * 1.05 / $100 = 2.1 SOL
        assert_eq!(amounts.seize, 2_100_000_000);
        assert!(!amounts.clamped);
    }

    #[test]
    fn test_liquidation_clamps_to_available_collateral() {
        let amounts = SolvencyEngine::liquidation_amounts(
            &sol(1_000_000_000, 100),
            &usdc(400_000_000),
            5_000,
            500,
        )
        .unwrap();

        assert_eq!(amounts.repay, 200_000_000);
        assert_eq!(amounts.seize, 1_000_000_000);
        assert!(amounts.clamped);
    }

    #[test]
    fn test_dust_debt_is_repaid_in_full() {
        let amounts =
            SolvencyEngine::liquidation_amounts(&usdc(1_000), &usdc(1), 5_000, 500).unwrap();
        assert_eq!(amounts.repay, 1);
        assert_eq!(amounts.seize, 1);
    }
}
