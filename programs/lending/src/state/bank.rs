use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{program_error::ProgramError, pubkey::Pubkey};

use crate::{
    constants::*,
    error::LendingError,
    math::{mul_div_ceil, mul_div_floor, to_u64, Decimal},
};

/// Per-asset pool record
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct Bank {
    /// Account discriminator
    pub discriminator: [u8; 8],

    /// Is initialized
    pub is_initialized: bool,

    /// Bank PDA bump
    pub bump: u8,

    /// Treasury token account PDA bump
    pub treasury_bump: u8,

    /// Authority allowed to update the configuration
    pub authority: Pubkey,

    /// Underlying asset
    pub mint: Pubkey,

    /// Mint decimals
    pub decimals: u8,

    /// Underlying units supplied, including accrued interest
    pub total_deposits: u64,
    pub total_deposit_shares: u64,

    /// Underlying units owed by borrowers, including accrued interest
    pub total_borrows: u64,
    pub total_borrow_shares: u64,

    /// Annual deposit rate in basis points
    pub deposit_rate: u64,

    /// Annual borrow rate in basis points
    pub borrow_rate: u64,

    /// Share of collateral value counted against debt (bps)
    pub liquidation_threshold: u16,

    /// Extra collateral paid to liquidators (bps)
    pub liquidation_bonus: u16,

    /// Maximum share of a debt repaid per liquidation (bps)
    pub close_factor: u16,

    /// Oracle feed pricing this asset
    pub price_feed_id: [u8; 32],

    /// Oracle staleness bound in seconds
    pub max_price_age: u64,

    /// Maximum confidence interval relative to price (bps)
    pub max_confidence: u16,

    /// Last time interest was accrued
    pub last_update_timestamp: i64,
}

impl Bank {
    pub const DISCRIMINATOR: [u8; 8] = [76, 78, 68, 95, 66, 65, 78, 75]; // "LND_BANK"

    pub const LEN: usize = 8 + // discriminator
        1 + // is_initialized
        1 + // bump
        1 + // treasury_bump
        32 + // authority
        32 + // mint
        1 + // decimals
        8 + // total_deposits
        8 + // total_deposit_shares
        8 + // total_borrows
        8 + // total_borrow_shares
        8 + // deposit_rate
        8 + // borrow_rate
        2 + // liquidation_threshold
        2 + // liquidation_bonus
        2 + // close_factor
        32 + // price_feed_id
        8 + // max_price_age
        2 + // max_confidence
        8 + // last_update_timestamp
        64; // padding

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        authority: Pubkey,
        mint: Pubkey,
        decimals: u8,
        bump: u8,
        treasury_bump: u8,
        deposit_rate: u64,
        borrow_rate: u64,
        now: i64,
    ) -> Self {
        Self {
            discriminator: Self::DISCRIMINATOR,
            is_initialized: true,
            bump,
            treasury_bump,
            authority,
            mint,
            decimals,
            total_deposits: 0,
            total_deposit_shares: 0,
            total_borrows: 0,
            total_borrow_shares: 0,
            deposit_rate,
            borrow_rate,
            liquidation_threshold: DEFAULT_LIQUIDATION_THRESHOLD_BPS,
            liquidation_bonus: DEFAULT_LIQUIDATION_BONUS_BPS,
            close_factor: DEFAULT_CLOSE_FACTOR_BPS,
            price_feed_id: [0u8; 32],
            max_price_age: DEFAULT_MAX_PRICE_AGE,
            max_confidence: DEFAULT_MAX_CONFIDENCE_BPS,
            last_update_timestamp: now,
        }
    }

    /// Validate account header
    pub fn validate(&self) -> Result<(), ProgramError> {
        if self.discriminator != Self::DISCRIMINATOR {
            return Err(ProgramError::InvalidAccountData);
        }

        if !self.is_initialized {
            return Err(LendingError::NotInitialized.into());
        }

        Ok(())
    }

    /// Validate risk and oracle parameters
    pub fn validate_config(&self) -> Result<(), ProgramError> {
        // Depositors cannot earn more than borrowers pay
        if self.borrow_rate > MAX_RATE_BPS || self.deposit_rate > self.borrow_rate {
            return Err(LendingError::InvalidBankConfig.into());
        }

        if self.liquidation_threshold as u64 > BPS {
            return Err(LendingError::InvalidBankConfig.into());
        }

        if self.close_factor == 0 || self.close_factor as u64 > BPS {
            return Err(LendingError::InvalidBankConfig.into());
        }

        if self.liquidation_bonus > MAX_LIQUIDATION_BONUS_BPS {
            return Err(LendingError::InvalidBankConfig.into());
        }

        if self.max_price_age == 0 || self.max_confidence as u64 > BPS {
            return Err(LendingError::InvalidBankConfig.into());
        }

        Ok(())
    }

    /// Underlying units held by the pool and not lent out
    pub fn available_liquidity(&self) -> u64 {
        self.total_deposits.saturating_sub(self.total_borrows)
    }

    /// Underlying units per deposit share
    pub fn deposit_exchange_rate(&self) -> Result<Decimal, ProgramError> {
        if self.total_deposit_shares == 0 {
            return Ok(Decimal::ONE);
        }
        Decimal::from_fraction(
            self.total_deposits as u128,
            self.total_deposit_shares as u128,
        )
    }

    /// Underlying units per borrow share
    pub fn borrow_exchange_rate(&self) -> Result<Decimal, ProgramError> {
        if self.total_borrow_shares == 0 {
            return Ok(Decimal::ONE);
        }
        Decimal::from_fraction(
            self.total_borrows as u128,
            self.total_borrow_shares as u128,
        )
    }

    // Conversions round in the pool's favour: depositors get shares and
    // amounts rounded down, borrowers owe shares and amounts rounded up.

    /// Shares minted for a deposit, rounded down
    pub fn deposit_shares_for_amount(&self, amount: u64) -> Result<u64, ProgramError> {
        if self.total_deposit_shares == 0 || self.total_deposits == 0 {
            return Ok(amount);
        }
        to_u64(mul_div_floor(
            amount as u128,
            self.total_deposit_shares as u128,
            self.total_deposits as u128,
        )?)
    }

    /// Shares burned for a withdrawal, rounded up
    pub fn deposit_shares_to_burn(&self, amount: u64) -> Result<u64, ProgramError> {
        if self.total_deposits == 0 {
            return Err(LendingError::InsufficientLiquidity.into());
        }
        to_u64(mul_div_ceil(
            amount as u128,
            self.total_deposit_shares as u128,
            self.total_deposits as u128,
        )?)
    }

    /// Underlying value of deposit shares, rounded down
    pub fn deposit_amount_for_shares(&self, shares: u64) -> Result<u64, ProgramError> {
        if self.total_deposit_shares == 0 {
            return Ok(0);
        }
        to_u64(mul_div_floor(
            shares as u128,
            self.total_deposits as u128,
            self.total_deposit_shares as u128,
        )?)
    }

    /// Shares owed for a new borrow, rounded up
    pub fn borrow_shares_for_amount(&self, amount: u64) -> Result<u64, ProgramError> {
        if self.total_borrow_shares == 0 || self.total_borrows == 0 {
            return Ok(amount);
        }
        to_u64(mul_div_ceil(
            amount as u128,
            self.total_borrow_shares as u128,
            self.total_borrows as u128,
        )?)
    }

    /// Shares cleared by a repayment, rounded down
    pub fn borrow_shares_to_burn(&self, amount: u64) -> Result<u64, ProgramError> {
        if self.total_borrows == 0 {
            return Ok(0);
        }
        to_u64(mul_div_floor(
            amount as u128,
            self.total_borrow_shares as u128,
            self.total_borrows as u128,
        )?)
    }

    /// Underlying debt represented by borrow shares, rounded up
    pub fn borrow_amount_for_shares(&self, shares: u64) -> Result<u64, ProgramError> {
        if self.total_borrow_shares == 0 {
            return Ok(0);
        }
        to_u64(mul_div_ceil(
            shares as u128,
            self.total_borrows as u128,
            self.total_borrow_shares as u128,
        )?)
    }

    pub fn add_deposit(&mut self, amount: u64, shares: u64) -> Result<(), ProgramError> {
        self.total_deposits = self
            .total_deposits
            .checked_add(amount)
            .ok_or(LendingError::ArithmeticOverflow)?;
        self.total_deposit_shares = self
            .total_deposit_shares
            .checked_add(shares)
            .ok_or(LendingError::ArithmeticOverflow)?;
        Ok(())
    }

    pub fn remove_deposit(&mut self, amount: u64, shares: u64) -> Result<(), ProgramError> {
        self.total_deposits = self
            .total_deposits
            .checked_sub(amount)
            .ok_or(LendingError::ArithmeticOverflow)?;
        self.total_deposit_shares = self
            .total_deposit_shares
            .checked_sub(shares)
            .ok_or(LendingError::ArithmeticOverflow)?;
        Ok(())
    }

    pub fn add_borrow(&mut self, amount: u64, shares: u64) -> Result<(), ProgramError> {
        self.total_borrows = self
            .total_borrows
            .checked_add(amount)
            .ok_or(LendingError::ArithmeticOverflow)?;
        self.total_borrow_shares = self
            .total_borrow_shares
            .checked_add(shares)
            .ok_or(LendingError::ArithmeticOverflow)?;
        Ok(())
    }

    pub fn remove_borrow(&mut self, amount: u64, shares: u64) -> Result<(), ProgramError> {
        self.total_borrow_shares = self
            .total_borrow_shares
            .checked_sub(shares)
            .ok_or(LendingError::ArithmeticOverflow)?;
        // Rounding dust with no shares behind it is owed by nobody
        self.total_borrows = if self.total_borrow_shares == 0 {
            0
        } else {
            self.total_borrows
                .checked_sub(amount)
                .ok_or(LendingError::ArithmeticOverflow)?
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_bank() -> Bank {
        Bank::new(
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            6,
            255,
            254,
            1,
            1,
            0,
        )
    }

    #[test]
    fn test_new_bank_defaults() {
        let bank = test_bank();
        assert!(bank.validate().is_ok());
        assert!(bank.validate_config().is_ok());
        assert_eq!(bank.total_deposits, 0);
        assert_eq!(bank.total_borrows, 0);
        assert_eq!(bank.deposit_exchange_rate().unwrap(), Decimal::ONE);
    }

    #[test]
    fn test_serialized_size_fits_len() {
        let bank = test_bank();
        let data = bank.try_to_vec().unwrap();
        assert!(data.len() <= Bank::LEN);
    }

    #[test]
    fn test_first_deposit_is_one_to_one() {
        let bank = test_bank();
        assert_eq!(bank.deposit_shares_for_amount(1_000).unwrap(), 1_000);
        assert_eq!(bank.borrow_shares_for_amount(500).unwrap(), 500);
    }

    #[test]
    fn test_conversions_round_in_pool_favour() {
        let mut bank = test_bank();
        bank.total_deposits = 3;
        bank.total_deposit_shares = 2;
        bank.total_borrows = 3;
        bank.total_borrow_shares = 2;

        // 1 unit = 0.66 shares
        assert_eq!(bank.deposit_shares_for_amount(1).unwrap(), 0);
        assert_eq!(bank.deposit_shares_to_burn(1).unwrap(), 1);
        assert_eq!(bank.borrow_shares_for_amount(1).unwrap(), 1);
        assert_eq!(bank.borrow_shares_to_burn(1).unwrap(), 0);

        // 1 share = 1.5 units
        assert_eq!(bank.deposit_amount_for_shares(1).unwrap(), 1);
        assert_eq!(bank.borrow_amount_for_shares(1).unwrap(), 2);
    }

    #[test]
    fn test_config_validation() {
        let mut bank = test_bank();
        bank.liquidation_threshold = 10_001;
        assert_eq!(
            bank.validate_config(),
            Err(LendingError::InvalidBankConfig.into())
        );

        let mut bank = test_bank();
        bank.close_factor = 0;
        assert!(bank.validate_config().is_err());

        let mut bank = test_bank();
        bank.liquidation_bonus = MAX_LIQUIDATION_BONUS_BPS + 1;
        assert!(bank.validate_config().is_err());

        let mut bank = test_bank();
        bank.max_price_age = 0;
        assert!(bank.validate_config().is_err());
    }

    #[test]
    fn test_rate_bounds() {
        let mut bank = test_bank();
        bank.deposit_rate = MAX_RATE_BPS;
        bank.borrow_rate = MAX_RATE_BPS;
        assert!(bank.validate_config().is_ok());

        bank.borrow_rate = MAX_RATE_BPS + 1;
        assert_eq!(
            bank.validate_config(),
            Err(LendingError::InvalidBankConfig.into())
        );

        let mut bank = test_bank();
        bank.deposit_rate = 600;
        bank.borrow_rate = 500;
        assert_eq!(
            bank.validate_config(),
            Err(LendingError::InvalidBankConfig.into())
        );
    }

    #[test]
    fn test_bad_discriminator_rejected() {
        let mut bank = test_bank();
        bank.discriminator = [0u8; 8];
        assert_eq!(bank.validate(), Err(ProgramError::InvalidAccountData));
    }

    #[test]
    fn test_repaying_last_share_clears_dust() {
        let mut bank = test_bank();
        bank.add_borrow(100, 100).unwrap();
        bank.total_borrows = 101;
        bank.remove_borrow(100, 100).unwrap();
        assert_eq!(bank.total_borrows, 0);
        assert_eq!(bank.total_borrow_shares, 0);
    }
}
