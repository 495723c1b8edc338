//! Ledger transitions
//!
//! Each operation takes the current banks and position by reference, accrues
//! the banks it touches and returns the complete post-state together with
//! the token amounts to move. Nothing is written until the caller has
//! performed the transfers, so a failed check anywhere leaves every account
//! untouched.

use solana_program::{msg, program_error::ProgramError};

use crate::{
    constants::BPS,
    engine::{accrue, AssetAmount, SolvencyEngine},
    error::LendingError,
    math::Decimal,
    state::{Bank, UserPosition},
};

/// Prices of both legs of a position, quote units per whole token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionPrices {
    pub collateral: Decimal,
    pub debt: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositOutcome {
    pub bank: Bank,
    pub position: UserPosition,
    pub shares_minted: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawOutcome {
    pub bank: Bank,
    /// Accrued debt bank when the position is in debt
    pub debt_bank: Option<Bank>,
    pub position: UserPosition,
    pub shares_burned: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowOutcome {
    pub debt_bank: Bank,
    pub collateral_bank: Bank,
    pub position: UserPosition,
    pub shares_minted: u64,
    pub health_ratio: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepayOutcome {
    pub bank: Bank,
    pub position: UserPosition,
    pub shares_burned: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationOutcome {
    pub collateral_bank: Bank,
    pub debt_bank: Bank,
    pub position: UserPosition,
    /// Debt tokens paid in by the liquidator
    pub repaid: u64,
    /// Collateral tokens paid out to the liquidator
    pub seized: u64,
    pub health_before: u64,
}

/// Derived balances and health of a position against accrued banks
struct Exposure {
    collateral: u64,
    debt: u64,
    health_ratio: u64,
}

fn exposure(
    collateral_bank: &Bank,
    debt_bank: &Bank,
    position: &UserPosition,
    prices: &PositionPrices,
) -> Result<Exposure, ProgramError> {
    let collateral = collateral_bank.deposit_amount_for_shares(position.collateral.shares)?;
    let debt = debt_bank.borrow_amount_for_shares(position.debt.shares)?;

    let health_ratio = SolvencyEngine::health_ratio(
        &AssetAmount {
            amount: collateral,
            price: prices.collateral,
            decimals: collateral_bank.decimals,
        },
        &AssetAmount {
            amount: debt,
            price: prices.debt,
            decimals: debt_bank.decimals,
        },
        collateral_bank.liquidation_threshold,
    )?;

    Ok(Exposure {
        collateral,
        debt,
        health_ratio,
    })
}

fn require_amount(amount: u64) -> Result<(), ProgramError> {
    if amount == 0 {
        return Err(LendingError::InvalidAmount.into());
    }
    Ok(())
}

fn checked_add_shares(current: u64, shares: u64) -> Result<u64, ProgramError> {
    current
        .checked_add(shares)
        .ok_or_else(|| LendingError::ArithmeticOverflow.into())
}

fn checked_sub_shares(current: u64, shares: u64) -> Result<u64, ProgramError> {
    current
        .checked_sub(shares)
        .ok_or_else(|| LendingError::ArithmeticOverflow.into())
}

/// Supply `amount` of `bank`'s asset as collateral
pub fn deposit(
    bank: &Bank,
    position: &UserPosition,
    amount: u64,
    now: i64,
) -> Result<DepositOutcome, ProgramError> {
    require_amount(amount)?;

    let mut position = position.clone();
    if position.has_debt() && position.debt.mint == bank.mint {
        return Err(LendingError::PositionAssetMismatch.into());
    }
    position.collateral.bind(&bank.mint)?;

    let mut bank = accrue(bank, now)?;
    let shares = bank.deposit_shares_for_amount(amount)?;
    if shares == 0 {
        msg!("Deposit of {} is worth less than one share", amount);
        return Err(LendingError::InvalidAmount.into());
    }

    bank.add_deposit(amount, shares)?;
    position.collateral.shares = checked_add_shares(position.collateral.shares, shares)?;
    position.last_updated = now;

    Ok(DepositOutcome {
        bank,
        position,
        shares_minted: shares,
    })
}

/// Take `amount` of collateral back out of `bank`
///
/// A position in debt must supply its debt bank and current prices; the
/// withdrawal is refused if it would leave the position unhealthy.
pub fn withdraw(
    bank: &Bank,
    position: &UserPosition,
    amount: u64,
    debt: Option<(&Bank, &PositionPrices)>,
    now: i64,
) -> Result<WithdrawOutcome, ProgramError> {
    require_amount(amount)?;

    if position.collateral.is_empty() {
        return Err(LendingError::InsufficientFunds.into());
    }
    if position.collateral.mint != bank.mint {
        return Err(LendingError::PositionAssetMismatch.into());
    }

    let mut bank = accrue(bank, now)?;
    let mut position = position.clone();

    let balance = bank.deposit_amount_for_shares(position.collateral.shares)?;
    if amount > balance {
        msg!("Withdraw {} exceeds deposited balance {}", amount, balance);
        return Err(LendingError::InsufficientFunds.into());
    }
    if amount > bank.available_liquidity() {
        msg!(
            "Withdraw {} exceeds available liquidity {}",
            amount,
            bank.available_liquidity()
        );
        return Err(LendingError::InsufficientLiquidity.into());
    }

    let shares = if amount == balance {
        position.collateral.shares
    } else {
        bank.deposit_shares_to_burn(amount)?
    };

    bank.remove_deposit(amount, shares)?;
    position.collateral.shares = checked_sub_shares(position.collateral.shares, shares)?;
    position.last_updated = now;

    let debt_bank = if position.has_debt() {
        let (debt_bank, prices) = debt.ok_or(ProgramError::NotEnoughAccountKeys)?;
        if debt_bank.mint != position.debt.mint {
            return Err(LendingError::PositionAssetMismatch.into());
        }
        let debt_bank = accrue(debt_bank, now)?;

        let exposure = exposure(&bank, &debt_bank, &position, prices)?;
        if !SolvencyEngine::admits_borrow(exposure.health_ratio) {
            msg!(
                "Withdraw would leave health ratio at {}",
                exposure.health_ratio
            );
            return Err(LendingError::InsufficientCollateral.into());
        }
        Some(debt_bank)
    } else {
        None
    };

    Ok(WithdrawOutcome {
        bank,
        debt_bank,
        position,
        shares_burned: shares,
    })
}

/// Borrow `amount` from `debt_bank` against collateral held in `collateral_bank`
pub fn borrow(
    debt_bank: &Bank,
    collateral_bank: &Bank,
    position: &UserPosition,
    amount: u64,
    prices: &PositionPrices,
    now: i64,
) -> Result<BorrowOutcome, ProgramError> {
    require_amount(amount)?;

    if debt_bank.mint == collateral_bank.mint || position.collateral.mint != collateral_bank.mint {
        return Err(LendingError::PositionAssetMismatch.into());
    }

    let mut position = position.clone();
    position.debt.bind(&debt_bank.mint)?;

    let mut debt_bank = accrue(debt_bank, now)?;
    let collateral_bank = accrue(collateral_bank, now)?;

    if amount > debt_bank.available_liquidity() {
        msg!(
            "Borrow {} exceeds available liquidity {}",
            amount,
            debt_bank.available_liquidity()
        );
        return Err(LendingError::InsufficientLiquidity.into());
    }

    let shares = debt_bank.borrow_shares_for_amount(amount)?;
    debt_bank.add_borrow(amount, shares)?;
    position.debt.shares = checked_add_shares(position.debt.shares, shares)?;
    position.last_updated = now;

    let exposure = exposure(&collateral_bank, &debt_bank, &position, prices)?;
    if !SolvencyEngine::admits_borrow(exposure.health_ratio) {
        msg!(
            "Borrow would leave health ratio at {}",
            exposure.health_ratio
        );
        return Err(LendingError::HealthCheckFailed.into());
    }

    Ok(BorrowOutcome {
        debt_bank,
        collateral_bank,
        position,
        shares_minted: shares,
        health_ratio: exposure.health_ratio,
    })
}

/// Pay back `amount` of the position's debt
pub fn repay(
    bank: &Bank,
    position: &UserPosition,
    amount: u64,
    now: i64,
) -> Result<RepayOutcome, ProgramError> {
    require_amount(amount)?;

    if position.debt.is_empty() {
        return Err(LendingError::ExceedsDebt.into());
    }
    if position.debt.mint != bank.mint {
        return Err(LendingError::PositionAssetMismatch.into());
    }

    let mut bank = accrue(bank, now)?;
    let mut position = position.clone();

    let debt = bank.borrow_amount_for_shares(position.debt.shares)?;
    if amount > debt {
        msg!("Repay {} exceeds outstanding debt {}", amount, debt);
        return Err(LendingError::ExceedsDebt.into());
    }

    let shares = if amount == debt {
        position.debt.shares
    } else {
        bank.borrow_shares_to_burn(amount)?
    };
    if shares == 0 {
        msg!("Repay of {} is worth less than one share", amount);
        return Err(LendingError::InvalidAmount.into());
    }

    bank.remove_borrow(amount, shares)?;
    position.debt.shares = checked_sub_shares(position.debt.shares, shares)?;
    position.last_updated = now;

    Ok(RepayOutcome {
        bank,
        position,
        shares_burned: shares,
    })
}

/// Close out part of an unhealthy position
///
/// The liquidator repays up to the debt bank's close factor and receives the
/// equivalent collateral plus the collateral bank's liquidation bonus.
pub fn liquidate(
    collateral_bank: &Bank,
    debt_bank: &Bank,
    position: &UserPosition,
    prices: &PositionPrices,
    now: i64,
) -> Result<LiquidationOutcome, ProgramError> {
    if collateral_bank.mint == debt_bank.mint {
        return Err(LendingError::PositionAssetMismatch.into());
    }
    if !position.has_debt() {
        return Err(LendingError::NotLiquidatable.into());
    }
    if position.debt.mint != debt_bank.mint || position.collateral.mint != collateral_bank.mint {
        return Err(LendingError::PositionAssetMismatch.into());
    }

    let mut collateral_bank = accrue(collateral_bank, now)?;
    let mut debt_bank = accrue(debt_bank, now)?;
    let mut position = position.clone();

    let exposure = exposure(&collateral_bank, &debt_bank, &position, prices)?;
    if !SolvencyEngine::is_liquidatable(exposure.health_ratio) {
        msg!("Position is healthy: ratio {}", exposure.health_ratio);
        return Err(LendingError::NotLiquidatable.into());
    }

    let collateral_asset = AssetAmount {
        amount: exposure.collateral,
        price: prices.collateral,
        decimals: collateral_bank.decimals,
    };
    let debt_asset = AssetAmount {
        amount: exposure.debt,
        price: prices.debt,
        decimals: debt_bank.decimals,
    };
    let mut amounts = SolvencyEngine::liquidation_amounts(
        &collateral_asset,
        &debt_asset,
        debt_bank.close_factor,
        collateral_bank.liquidation_bonus,
    )?;

    // A partial repay must retire at least one debt share
    if amounts.repay < exposure.debt && debt_bank.borrow_shares_to_burn(amounts.repay)? == 0 {
        msg!(
            "Repay of {} is worth less than one share, closing debt of {}",
            amounts.repay,
            exposure.debt
        );
        amounts = SolvencyEngine::liquidation_amounts(
            &collateral_asset,
            &debt_asset,
            BPS as u16,
            collateral_bank.liquidation_bonus,
        )?;
    }

    if amounts.seize > collateral_bank.available_liquidity() {
        msg!(
            "Seizing {} exceeds collateral liquidity {}",
            amounts.seize,
            collateral_bank.available_liquidity()
        );
        return Err(LendingError::InsufficientLiquidity.into());
    }

    let debt_shares = if amounts.repay == exposure.debt {
        position.debt.shares
    } else {
        debt_bank.borrow_shares_to_burn(amounts.repay)?
    };
    debt_bank.remove_borrow(amounts.repay, debt_shares)?;
    position.debt.shares = checked_sub_shares(position.debt.shares, debt_shares)?;

    let collateral_shares = if amounts.seize == exposure.collateral {
        position.collateral.shares
    } else {
        collateral_bank
            .deposit_shares_to_burn(amounts.seize)?
            .min(position.collateral.shares)
    };
    collateral_bank.remove_deposit(amounts.seize, collateral_shares)?;
    position.collateral.shares =
        checked_sub_shares(position.collateral.shares, collateral_shares)?;
    position.last_updated = now;

    Ok(LiquidationOutcome {
        collateral_bank,
        debt_bank,
        position,
        repaid: amounts.repay,
        seized: amounts.seize,
        health_before: exposure.health_ratio,
    })
}
