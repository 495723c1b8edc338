use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{program_error::ProgramError, pubkey::Pubkey};

use crate::error::LendingError;

/// Shares a user holds in one bank
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionSlot {
    pub mint: Pubkey,
    pub shares: u64,
}

impl PositionSlot {
    pub fn is_empty(&self) -> bool {
        self.shares == 0
    }

    /// Point an empty slot at `mint`, or check that an occupied slot already holds it
    pub fn bind(&mut self, mint: &Pubkey) -> Result<(), ProgramError> {
        if self.is_empty() {
            self.mint = *mint;
            return Ok(());
        }

        if self.mint != *mint {
            return Err(LendingError::PositionAssetMismatch.into());
        }

        Ok(())
    }

    pub fn holds(&self, mint: &Pubkey) -> bool {
        !self.is_empty() && self.mint == *mint
    }
}

/// Per-user ledger: one collateral asset and one borrowed asset
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserPosition {
    /// Account discriminator
    pub discriminator: [u8; 8],

    /// Is initialized
    pub is_initialized: bool,

    /// User PDA bump
    pub bump: u8,

    /// Wallet owning the position
    pub owner: Pubkey,

    /// Deposited asset and deposit shares
    pub collateral: PositionSlot,

    /// Borrowed asset and borrow shares
    pub debt: PositionSlot,

    /// Last time the position changed
    pub last_updated: i64,
}

impl UserPosition {
    pub const DISCRIMINATOR: [u8; 8] = [76, 78, 68, 95, 85, 83, 69, 82]; // "LND_USER"

    pub const LEN: usize = 8 + // discriminator
        1 + // is_initialized
        1 + // bump
        32 + // owner
        (32 + 8) + // collateral
        (32 + 8) + // debt
        8 + // last_updated
        32; // padding

    pub fn new(owner: Pubkey, collateral_mint: Pubkey, bump: u8, now: i64) -> Self {
        Self {
            discriminator: Self::DISCRIMINATOR,
            is_initialized: true,
            bump,
            owner,
            collateral: PositionSlot {
                mint: collateral_mint,
                shares: 0,
            },
            debt: PositionSlot::default(),
            last_updated: now,
        }
    }

    pub fn validate(&self) -> Result<(), ProgramError> {
        if self.discriminator != Self::DISCRIMINATOR {
            return Err(ProgramError::InvalidAccountData);
        }

        if !self.is_initialized {
            return Err(LendingError::NotInitialized.into());
        }

        Ok(())
    }

    pub fn has_debt(&self) -> bool {
        !self.debt.is_empty()
    }

    /// Fully closed positions hold no shares on either side
    pub fn is_closed(&self) -> bool {
        self.collateral.is_empty() && self.debt.is_empty()
    }
}
