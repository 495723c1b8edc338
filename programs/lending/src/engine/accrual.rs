//! Interest accrual
//!
//! Totals are compounded once per second of elapsed time:
//! `total' = total × (1 + rate / SECONDS_PER_YEAR)^elapsed`.
//! The transform is pure: it takes a bank by reference and returns the
//! up-to-date copy, leaving the caller to decide whether to commit it.

use solana_program::program_error::ProgramError;

use crate::{
    constants::{BPS, SECONDS_PER_YEAR},
    math::Decimal,
    state::Bank,
};

/// Bring a bank's totals up to `now`
pub fn accrue(bank: &Bank, now: i64) -> Result<Bank, ProgramError> {
    let mut accrued = bank.clone();

    if now <= bank.last_update_timestamp {
        return Ok(accrued);
    }

    let elapsed = (now - bank.last_update_timestamp) as u64;

    accrued.total_deposits = compound(bank.total_deposits, bank.deposit_rate, elapsed)?;
    accrued.total_borrows = compound(bank.total_borrows, bank.borrow_rate, elapsed)?;

    // Borrower interest is owed to depositors, so the pool never ends up
    // lending more than it holds
    if accrued.total_borrows > accrued.total_deposits {
        accrued.total_deposits = accrued.total_borrows;
    }

    accrued.last_update_timestamp = now;

    Ok(accrued)
}

/// Growth factor of `rate_bps` (annual) over `elapsed` seconds
pub fn compound_factor(rate_bps: u64, elapsed: u64) -> Result<Decimal, ProgramError> {
    if rate_bps == 0 || elapsed == 0 {
        return Ok(Decimal::ONE);
    }

    let per_second = Decimal::from_fraction(
        rate_bps as u128,
        BPS as u128 * SECONDS_PER_YEAR as u128,
    )?;

    Decimal::ONE.checked_add(per_second)?.checked_pow(elapsed)
}

fn compound(total: u64, rate_bps: u64, elapsed: u64) -> Result<u64, ProgramError> {
    if total == 0 {
        return Ok(0);
    }
    compound_factor(rate_bps, elapsed)?.mul_u64_floor(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LendingError;
    use solana_program::pubkey::Pubkey;

    const DAY: i64 = 24 * 60 * 60;
    const YEAR: i64 = SECONDS_PER_YEAR as i64;

    fn bank_with(deposits: u64, borrows: u64, deposit_rate: u64, borrow_rate: u64) -> Bank {
        let mut bank = Bank::new(
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            6,
            255,
            254,
            deposit_rate,
            borrow_rate,
            1_000,
        );
        bank.total_deposits = deposits;
        bank.total_deposit_shares = deposits;
        bank.total_borrows = borrows;
        bank.total_borrow_shares = borrows;
        bank
    }

    #[test]
    fn test_no_elapsed_time_is_noop() {
        let bank = bank_with(1_000_000, 500_000, 500, 1_000);
        assert_eq!(accrue(&bank, 1_000).unwrap(), bank);
        // A clock reading behind the bank is also a no-op
        assert_eq!(accrue(&bank, 999).unwrap(), bank);
    }

    #[test]
    fn test_one_year_at_ten_percent() {
        let bank = bank_with(1_000_000_000, 0, 1_000, 0);
        let accrued = accrue(&bank, 1_000 + YEAR).unwrap();

        // Per-second compounding of 10% lands just under e^0.1 = 1.10517
        assert!(accrued.total_deposits > 1_105_100_000);
        assert!(accrued.total_deposits < 1_105_200_000);
        assert_eq!(accrued.last_update_timestamp, 1_000 + YEAR);
    }

    #[test]
    fn test_totals_never_decrease() {
        let bank = bank_with(1_000_000, 400_000, 200, 800);
        let accrued = accrue(&bank, 1_000 + 30 * DAY).unwrap();
        assert!(accrued.total_deposits >= bank.total_deposits);
        assert!(accrued.total_borrows > bank.total_borrows);
        assert_eq!(accrued.total_deposit_shares, bank.total_deposit_shares);
        assert_eq!(accrued.total_borrow_shares, bank.total_borrow_shares);
    }

    #[test]
    fn test_borrows_never_outgrow_deposits() {
        // Fully utilised pool where borrowers pay far more than depositors earn
        let bank = bank_with(1_000_000, 1_000_000, 0, 5_000);
        let accrued = accrue(&bank, 1_000 + YEAR).unwrap();
        assert!(accrued.total_borrows > 1_000_000);
        assert_eq!(accrued.total_deposits, accrued.total_borrows);
    }

    #[test]
    fn test_split_accrual_matches_single_step() {
        let bank = bank_with(10_000_000_000, 5_000_000_000, 300, 600);

        let once = accrue(&bank, 1_000 + 10 * DAY).unwrap();
        let mut stepped = bank.clone();
        for day in 1..=10 {
            stepped = accrue(&stepped, 1_000 + day * DAY).unwrap();
        }

        // Each step floors at most one unit per side
        assert!(once.total_deposits.abs_diff(stepped.total_deposits) <= 10);
        assert!(once.total_borrows.abs_diff(stepped.total_borrows) <= 10);
    }

    #[test]
    fn test_zero_rate_is_identity() {
        let bank = bank_with(1_000, 500, 0, 0);
        let accrued = accrue(&bank, 1_000 + YEAR).unwrap();
        assert_eq!(accrued.total_deposits, 1_000);
        assert_eq!(accrued.total_borrows, 500);
        assert_eq!(accrued.last_update_timestamp, 1_000 + YEAR);
    }

    #[test]
    fn test_overflow_is_reported() {
        let bank = bank_with(u64::MAX, 0, 10_000, 0);
        assert_eq!(
            accrue(&bank, 1_000 + YEAR),
            Err(LendingError::ArithmeticOverflow.into())
        );
    }
}
