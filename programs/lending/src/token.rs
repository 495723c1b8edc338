//! SPL Token program CPI helpers

use solana_program::{
    account_info::AccountInfo,
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed},
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction,
    sysvar::Sysvar,
};

use spl_token::{
    instruction as token_instruction,
    state::{Account as TokenAccount, Mint},
};

use crate::error::LendingError;

/// SPL Token program ID
pub const TOKEN_PROGRAM_ID: Pubkey = spl_token::ID;

pub fn check_token_program(token_program: &AccountInfo) -> ProgramResult {
    if *token_program.key != TOKEN_PROGRAM_ID {
        msg!("Unexpected token program {}", token_program.key);
        return Err(ProgramError::IncorrectProgramId);
    }
    Ok(())
}

/// Unpack a mint owned by the token program
pub fn unpack_mint(mint: &AccountInfo) -> Result<Mint, ProgramError> {
    if *mint.owner != TOKEN_PROGRAM_ID {
        return Err(LendingError::InvalidMint.into());
    }
    Mint::unpack(&mint.try_borrow_data()?).map_err(|_| LendingError::InvalidMint.into())
}

/// Unpack a token account and check that it holds `mint`
pub fn unpack_token_account(
    account: &AccountInfo,
    mint: &Pubkey,
) -> Result<TokenAccount, ProgramError> {
    if *account.owner != TOKEN_PROGRAM_ID {
        return Err(LendingError::InvalidAccountOwner.into());
    }
    let token_account = TokenAccount::unpack(&account.try_borrow_data()?)?;
    if token_account.mint != *mint {
        msg!("Token account {} does not hold mint {}", account.key, mint);
        return Err(LendingError::InvalidMint.into());
    }
    Ok(token_account)
}

/// Create a bank treasury: a token account at a PDA that is its own authority
pub fn create_treasury<'a>(
    payer: &AccountInfo<'a>,
    treasury: &AccountInfo<'a>,
    mint: &AccountInfo<'a>,
    token_program: &AccountInfo<'a>,
    rent_sysvar: &AccountInfo<'a>,
    system_program: &AccountInfo<'a>,
    treasury_seeds: &[&[u8]],
) -> ProgramResult {
    let rent = Rent::from_account_info(rent_sysvar)?;
    let account_rent = rent.minimum_balance(TokenAccount::LEN);

    invoke_signed(
        &system_instruction::create_account(
            payer.key,
            treasury.key,
            account_rent,
            TokenAccount::LEN as u64,
            &TOKEN_PROGRAM_ID,
        ),
        &[payer.clone(), treasury.clone(), system_program.clone()],
        &[treasury_seeds],
    )?;

    invoke(
        &token_instruction::initialize_account(
            &TOKEN_PROGRAM_ID,
            treasury.key,
            mint.key,
            treasury.key,
        )?,
        &[
            treasury.clone(),
            mint.clone(),
            treasury.clone(),
            rent_sysvar.clone(),
            token_program.clone(),
        ],
    )?;

    Ok(())
}

/// Transfer SPL tokens
///
/// Fails with `InsufficientFunds` before invoking the token program when the
/// source cannot cover `amount`. Pass the PDA seeds of `authority` when it is
/// a program account.
pub fn transfer<'a>(
    source: &AccountInfo<'a>,
    destination: &AccountInfo<'a>,
    authority: &AccountInfo<'a>,
    amount: u64,
    token_program: &AccountInfo<'a>,
    signer_seeds: &[&[&[u8]]],
) -> ProgramResult {
    check_token_program(token_program)?;

    let balance = TokenAccount::unpack(&source.try_borrow_data()?)?.amount;
    if balance < amount {
        msg!("Token account {} holds {}, needs {}", source.key, balance, amount);
        return Err(LendingError::InsufficientFunds.into());
    }

    let instruction = token_instruction::transfer(
        &TOKEN_PROGRAM_ID,
        source.key,
        destination.key,
        authority.key,
        &[],
        amount,
    )?;

    let accounts = [
        source.clone(),
        destination.clone(),
        authority.clone(),
        token_program.clone(),
    ];

    if signer_seeds.is_empty() {
        invoke(&instruction, &accounts)
    } else {
        invoke_signed(&instruction, &accounts, signer_seeds)
    }
}
