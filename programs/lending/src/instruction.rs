use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program, sysvar,
};

use crate::{
    error::LendingError,
    pda::{BankPDA, TreasuryPDA, UserPDA},
};

/// Optional bank parameter changes; `None` keeps the current value
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct BankConfigUpdate {
    pub deposit_rate: Option<u64>,
    pub borrow_rate: Option<u64>,
    pub liquidation_threshold: Option<u16>,
    pub liquidation_bonus: Option<u16>,
    pub close_factor: Option<u16>,
    pub price_feed_id: Option<[u8; 32]>,
    pub max_price_age: Option<u64>,
    pub max_confidence: Option<u16>,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub enum LendingInstruction {
    /// Open a position for the signer
    /// Accounts:
    /// 0. `[signer, writable]` Owner (payer)
    /// 1. `[writable]` User position PDA
    /// 2. `[]` System program
    InitUser { asset_id: Pubkey },

    /// Create the bank and treasury for a mint
    /// Accounts:
    /// 0. `[signer, writable]` Authority (payer)
    /// 1. `[]` Mint
    /// 2. `[writable]` Bank PDA
    /// 3. `[writable]` Treasury PDA
    /// 4. `[]` Token program
    /// 5. `[]` System program
    /// 6. `[]` Rent sysvar
    InitBank { deposit_rate: u64, borrow_rate: u64 },

    /// Change rates, risk or oracle parameters of a bank
    /// Accounts:
    /// 0. `[signer]` Bank authority
    /// 1. `[writable]` Bank PDA
    UpdateBankConfig(BankConfigUpdate),

    /// Supply collateral
    /// Accounts:
    /// 0. `[signer]` Owner
    /// 1. `[]` Mint
    /// 2. `[writable]` Bank PDA
    /// 3. `[writable]` Treasury PDA
    /// 4. `[writable]` User position PDA
    /// 5. `[writable]` Owner token account
    /// 6. `[]` Token program
    Deposit { amount: u64 },

    /// Take collateral back
    /// Accounts:
    /// 0-6. As `Deposit`
    /// When the position is in debt:
    /// 7. `[writable]` Debt bank PDA
    /// 8. `[]` Collateral price update
    /// 9. `[]` Debt price update
    Withdraw { amount: u64 },

    /// Borrow against collateral
    /// Accounts:
    /// 0. `[signer]` Owner
    /// 1. `[]` Mint of the borrowed asset
    /// 2. `[writable]` Bank PDA of the borrowed asset
    /// 3. `[writable]` Treasury PDA of the borrowed asset
    /// 4. `[writable]` Collateral bank PDA
    /// 5. `[writable]` User position PDA
    /// 6. `[writable]` Owner token account
    /// 7. `[]` Collateral price update
    /// 8. `[]` Debt price update
    /// 9. `[]` Token program
    Borrow { amount: u64 },

    /// Pay back debt
    /// Accounts:
    /// 0-6. As `Deposit`, for the borrowed asset
    Repay { amount: u64 },

    /// Liquidate an unhealthy position
    /// Accounts:
    /// 0. `[signer]` Liquidator
    /// 1. `[writable]` Collateral bank PDA
    /// 2. `[writable]` Collateral treasury PDA
    /// 3. `[writable]` Debt bank PDA
    /// 4. `[writable]` Debt treasury PDA
    /// 5. `[writable]` Borrower position PDA
    /// 6. `[writable]` Liquidator collateral token account
    /// 7. `[writable]` Liquidator debt token account
    /// 8. `[]` Collateral price update
    /// 9. `[]` Debt price update
    /// 10. `[]` Token program
    Liquidate,
}

impl LendingInstruction {
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        let (&variant, rest) = input
            .split_first()
            .ok_or(LendingError::InvalidInstruction)?;

        Ok(match variant {
            0 => {
                let payload = InitUserPayload::try_from_slice(rest)
                    .map_err(|_| LendingError::InvalidInstruction)?;
                Self::InitUser {
                    asset_id: payload.asset_id,
                }
            }
            1 => {
                let payload = InitBankPayload::try_from_slice(rest)
                    .map_err(|_| LendingError::InvalidInstruction)?;
                Self::InitBank {
                    deposit_rate: payload.deposit_rate,
                    borrow_rate: payload.borrow_rate,
                }
            }
            2 => Self::UpdateBankConfig(
                BankConfigUpdate::try_from_slice(rest)
                    .map_err(|_| LendingError::InvalidInstruction)?,
            ),
            3 => Self::Deposit {
                amount: unpack_amount(rest)?,
            },
            4 => Self::Withdraw {
                amount: unpack_amount(rest)?,
            },
            5 => Self::Borrow {
                amount: unpack_amount(rest)?,
            },
            6 => Self::Repay {
                amount: unpack_amount(rest)?,
            },
            7 => Self::Liquidate,
            _ => return Err(LendingError::InvalidInstruction.into()),
        })
    }

    pub fn pack(&self) -> Vec<u8> {
        self.try_to_vec().unwrap()
    }
}

fn unpack_amount(rest: &[u8]) -> Result<u64, ProgramError> {
    u64::try_from_slice(rest).map_err(|_| LendingError::InvalidInstruction.into())
}

#[derive(BorshSerialize, BorshDeserialize)]
struct InitUserPayload {
    asset_id: Pubkey,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct InitBankPayload {
    deposit_rate: u64,
    borrow_rate: u64,
}

/// Price update accounts for both legs of a position
#[derive(Debug, Clone, Copy)]
pub struct OracleAccounts {
    pub collateral: Pubkey,
    pub debt: Pubkey,
}

// Helper functions to create instructions

pub fn init_user(program_id: &Pubkey, owner: &Pubkey, asset_id: &Pubkey) -> Instruction {
    let (user, _) = UserPDA::derive(program_id, owner);

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*owner, true),
            AccountMeta::new(user, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: LendingInstruction::InitUser {
            asset_id: *asset_id,
        }
        .pack(),
    }
}

pub fn init_bank(
    program_id: &Pubkey,
    authority: &Pubkey,
    mint: &Pubkey,
    deposit_rate: u64,
    borrow_rate: u64,
) -> Instruction {
    let (bank, _) = BankPDA::derive(program_id, mint);
    let (treasury, _) = TreasuryPDA::derive(program_id, mint);

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*authority, true),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new(bank, false),
            AccountMeta::new(treasury, false),
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(sysvar::rent::id(), false),
        ],
        data: LendingInstruction::InitBank {
            deposit_rate,
            borrow_rate,
        }
        .pack(),
    }
}

pub fn update_bank_config(
    program_id: &Pubkey,
    authority: &Pubkey,
    mint: &Pubkey,
    update: BankConfigUpdate,
) -> Instruction {
    let (bank, _) = BankPDA::derive(program_id, mint);

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*authority, true),
            AccountMeta::new(bank, false),
        ],
        data: LendingInstruction::UpdateBankConfig(update).pack(),
    }
}

fn transfer_accounts(
    program_id: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
    owner_token_account: &Pubkey,
) -> Vec<AccountMeta> {
    let (bank, _) = BankPDA::derive(program_id, mint);
    let (treasury, _) = TreasuryPDA::derive(program_id, mint);
    let (user, _) = UserPDA::derive(program_id, owner);

    vec![
        AccountMeta::new_readonly(*owner, true),
        AccountMeta::new_readonly(*mint, false),
        AccountMeta::new(bank, false),
        AccountMeta::new(treasury, false),
        AccountMeta::new(user, false),
        AccountMeta::new(*owner_token_account, false),
        AccountMeta::new_readonly(spl_token::id(), false),
    ]
}

pub fn deposit(
    program_id: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
    owner_token_account: &Pubkey,
    amount: u64,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: transfer_accounts(program_id, owner, mint, owner_token_account),
        data: LendingInstruction::Deposit { amount }.pack(),
    }
}

/// `debt` names the borrowed mint and price accounts when the position is in debt
pub fn withdraw(
    program_id: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
    owner_token_account: &Pubkey,
    amount: u64,
    debt: Option<(&Pubkey, OracleAccounts)>,
) -> Instruction {
    let mut accounts = transfer_accounts(program_id, owner, mint, owner_token_account);
    if let Some((debt_mint, oracles)) = debt {
        let (debt_bank, _) = BankPDA::derive(program_id, debt_mint);
        accounts.push(AccountMeta::new(debt_bank, false));
        accounts.push(AccountMeta::new_readonly(oracles.collateral, false));
        accounts.push(AccountMeta::new_readonly(oracles.debt, false));
    }

    Instruction {
        program_id: *program_id,
        accounts,
        data: LendingInstruction::Withdraw { amount }.pack(),
    }
}

pub fn borrow(
    program_id: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
    collateral_mint: &Pubkey,
    owner_token_account: &Pubkey,
    oracles: OracleAccounts,
    amount: u64,
) -> Instruction {
    let (bank, _) = BankPDA::derive(program_id, mint);
    let (treasury, _) = TreasuryPDA::derive(program_id, mint);
    let (collateral_bank, _) = BankPDA::derive(program_id, collateral_mint);
    let (user, _) = UserPDA::derive(program_id, owner);

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*owner, true),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new(bank, false),
            AccountMeta::new(treasury, false),
            AccountMeta::new(collateral_bank, false),
            AccountMeta::new(user, false),
            AccountMeta::new(*owner_token_account, false),
            AccountMeta::new_readonly(oracles.collateral, false),
            AccountMeta::new_readonly(oracles.debt, false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        data: LendingInstruction::Borrow { amount }.pack(),
    }
}

pub fn repay(
    program_id: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
    owner_token_account: &Pubkey,
    amount: u64,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: transfer_accounts(program_id, owner, mint, owner_token_account),
        data: LendingInstruction::Repay { amount }.pack(),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn liquidate(
    program_id: &Pubkey,
    liquidator: &Pubkey,
    borrower: &Pubkey,
    collateral_mint: &Pubkey,
    debt_mint: &Pubkey,
    liquidator_collateral_account: &Pubkey,
    liquidator_debt_account: &Pubkey,
    oracles: OracleAccounts,
) -> Instruction {
    let (collateral_bank, _) = BankPDA::derive(program_id, collateral_mint);
    let (collateral_treasury, _) = TreasuryPDA::derive(program_id, collateral_mint);
    let (debt_bank, _) = BankPDA::derive(program_id, debt_mint);
    let (debt_treasury, _) = TreasuryPDA::derive(program_id, debt_mint);
    let (position, _) = UserPDA::derive(program_id, borrower);

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*liquidator, true),
            AccountMeta::new(collateral_bank, false),
            AccountMeta::new(collateral_treasury, false),
            AccountMeta::new(debt_bank, false),
            AccountMeta::new(debt_treasury, false),
            AccountMeta::new(position, false),
            AccountMeta::new(*liquidator_collateral_account, false),
            AccountMeta::new(*liquidator_debt_account, false),
            AccountMeta::new_readonly(oracles.collateral, false),
            AccountMeta::new_readonly(oracles.debt, false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        data: LendingInstruction::Liquidate.pack(),
    }
}
