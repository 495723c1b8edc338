use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    clock::Clock,
    entrypoint::ProgramResult,
    msg,
    program::invoke_signed,
    program_error::ProgramError,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction,
    sysvar::Sysvar,
};

use crate::{
    engine::accrue,
    error::LendingError,
    instruction::{BankConfigUpdate, LendingInstruction},
    ledger::{self, PositionPrices},
    oracle::OracleGateway,
    pda::{seeds, verify_pda, BankPDA, TreasuryPDA, UserPDA},
    state::{Bank, UserPosition},
    token,
};

pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    let instruction = LendingInstruction::unpack(instruction_data)?;

    match instruction {
        LendingInstruction::InitUser { asset_id } => {
            msg!("Instruction: InitUser");
            process_init_user(program_id, accounts, asset_id)
        }

        LendingInstruction::InitBank {
            deposit_rate,
            borrow_rate,
        } => {
            msg!("Instruction: InitBank");
            process_init_bank(program_id, accounts, deposit_rate, borrow_rate)
        }

        LendingInstruction::UpdateBankConfig(update) => {
            msg!("Instruction: UpdateBankConfig");
            process_update_bank_config(program_id, accounts, update)
        }

        LendingInstruction::Deposit { amount } => {
            msg!("Instruction: Deposit");
            process_deposit(program_id, accounts, amount)
        }

        LendingInstruction::Withdraw { amount } => {
            msg!("Instruction: Withdraw");
            process_withdraw(program_id, accounts, amount)
        }

        LendingInstruction::Borrow { amount } => {
            msg!("Instruction: Borrow");
            process_borrow(program_id, accounts, amount)
        }

        LendingInstruction::Repay { amount } => {
            msg!("Instruction: Repay");
            process_repay(program_id, accounts, amount)
        }

        LendingInstruction::Liquidate => {
            msg!("Instruction: Liquidate");
            process_liquidate(program_id, accounts)
        }
    }
}

fn borsh_deserialize_unchecked<T: BorshDeserialize>(data: &[u8]) -> Result<T, ProgramError> {
    let mut cursor: &[u8] = data;
    T::deserialize(&mut cursor).map_err(|_| ProgramError::InvalidAccountData)
}

fn save<T: BorshSerialize>(state: &T, account: &AccountInfo) -> ProgramResult {
    state.serialize(&mut &mut account.data.borrow_mut()[..])?;
    Ok(())
}

fn require_signer(account: &AccountInfo) -> ProgramResult {
    if !account.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }
    Ok(())
}

/// Load a bank and check that it sits at its PDA
fn load_bank(program_id: &Pubkey, bank_info: &AccountInfo) -> Result<Bank, ProgramError> {
    if bank_info.owner != program_id {
        return Err(LendingError::InvalidAccountOwner.into());
    }

    let bank = borsh_deserialize_unchecked::<Bank>(&bank_info.try_borrow_data()?)?;
    bank.validate()?;

    let expected = Pubkey::create_program_address(
        &[seeds::BANK, bank.mint.as_ref(), &[bank.bump]],
        program_id,
    )
    .map_err(|_| LendingError::InvalidPda)?;
    if expected != *bank_info.key {
        return Err(LendingError::InvalidPda.into());
    }

    Ok(bank)
}

fn load_bank_for_mint(
    program_id: &Pubkey,
    bank_info: &AccountInfo,
    mint: &Pubkey,
) -> Result<Bank, ProgramError> {
    let bank = load_bank(program_id, bank_info)?;
    if bank.mint != *mint {
        return Err(LendingError::InvalidMint.into());
    }
    Ok(bank)
}

fn check_treasury(program_id: &Pubkey, treasury_info: &AccountInfo, bank: &Bank) -> ProgramResult {
    let expected = Pubkey::create_program_address(
        &[seeds::TREASURY, bank.mint.as_ref(), &[bank.treasury_bump]],
        program_id,
    )
    .map_err(|_| LendingError::InvalidPda)?;
    if expected != *treasury_info.key {
        return Err(LendingError::InvalidPda.into());
    }
    Ok(())
}

/// Load a position; `owner` pins it to a wallet when given
fn load_position(
    program_id: &Pubkey,
    user_info: &AccountInfo,
    owner: Option<&Pubkey>,
) -> Result<UserPosition, ProgramError> {
    if user_info.owner != program_id {
        return Err(LendingError::InvalidAccountOwner.into());
    }

    let position = borsh_deserialize_unchecked::<UserPosition>(&user_info.try_borrow_data()?)?;
    position.validate()?;

    if let Some(owner) = owner {
        if position.owner != *owner {
            return Err(LendingError::InvalidAuthority.into());
        }
    }

    let expected = Pubkey::create_program_address(
        &[seeds::USER, position.owner.as_ref(), &[position.bump]],
        program_id,
    )
    .map_err(|_| LendingError::InvalidPda)?;
    if expected != *user_info.key {
        return Err(LendingError::InvalidPda.into());
    }

    Ok(position)
}

fn read_prices(
    collateral_oracle: &AccountInfo,
    collateral_bank: &Bank,
    debt_oracle: &AccountInfo,
    debt_bank: &Bank,
    now: i64,
) -> Result<PositionPrices, ProgramError> {
    Ok(PositionPrices {
        collateral: OracleGateway::read(collateral_oracle, collateral_bank, now)?.price,
        debt: OracleGateway::read(debt_oracle, debt_bank, now)?.price,
    })
}

/// Create a user position
fn process_init_user(program_id: &Pubkey, accounts: &[AccountInfo], asset_id: Pubkey) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    let owner_info = next_account_info(account_info_iter)?;
    let user_info = next_account_info(account_info_iter)?;
    let system_program = next_account_info(account_info_iter)?;

    require_signer(owner_info)?;

    let bump = verify_pda(user_info.key, &UserPDA::derive(program_id, owner_info.key))?;

    if !user_info.data_is_empty() {
        msg!("Position already exists for {}", owner_info.key);
        return Err(LendingError::AlreadyExists.into());
    }

    let rent = Rent::get()?;
    invoke_signed(
        &system_instruction::create_account(
            owner_info.key,
            user_info.key,
            rent.minimum_balance(UserPosition::LEN),
            UserPosition::LEN as u64,
            program_id,
        ),
        &[owner_info.clone(), user_info.clone(), system_program.clone()],
        &[&[seeds::USER, owner_info.key.as_ref(), &[bump]]],
    )?;

    let now = Clock::get()?.unix_timestamp;
    let position = UserPosition::new(*owner_info.key, asset_id, bump, now);
    save(&position, user_info)?;

    msg!("Position opened for {} with collateral {}", owner_info.key, asset_id);

    Ok(())
}

/// Create the bank and treasury of a mint
fn process_init_bank(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    deposit_rate: u64,
    borrow_rate: u64,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    let authority_info = next_account_info(account_info_iter)?;
    let mint_info = next_account_info(account_info_iter)?;
    let bank_info = next_account_info(account_info_iter)?;
    let treasury_info = next_account_info(account_info_iter)?;
    let token_program = next_account_info(account_info_iter)?;
    let system_program = next_account_info(account_info_iter)?;
    let rent_sysvar = next_account_info(account_info_iter)?;

    require_signer(authority_info)?;
    token::check_token_program(token_program)?;

    let bank_bump = verify_pda(bank_info.key, &BankPDA::derive(program_id, mint_info.key))?;
    let treasury_bump = verify_pda(
        treasury_info.key,
        &TreasuryPDA::derive(program_id, mint_info.key),
    )?;

    if !bank_info.data_is_empty() || !treasury_info.data_is_empty() {
        msg!("Bank already exists for mint {}", mint_info.key);
        return Err(LendingError::AlreadyExists.into());
    }

    let mint = token::unpack_mint(mint_info)?;

    let rent = Rent::from_account_info(rent_sysvar)?;
    invoke_signed(
        &system_instruction::create_account(
            authority_info.key,
            bank_info.key,
            rent.minimum_balance(Bank::LEN),
            Bank::LEN as u64,
            program_id,
        ),
        &[
            authority_info.clone(),
            bank_info.clone(),
            system_program.clone(),
        ],
        &[&[seeds::BANK, mint_info.key.as_ref(), &[bank_bump]]],
    )?;

    token::create_treasury(
        authority_info,
        treasury_info,
        mint_info,
        token_program,
        rent_sysvar,
        system_program,
        &[seeds::TREASURY, mint_info.key.as_ref(), &[treasury_bump]],
    )?;

    let now = Clock::get()?.unix_timestamp;
    let bank = Bank::new(
        *authority_info.key,
        *mint_info.key,
        mint.decimals,
        bank_bump,
        treasury_bump,
        deposit_rate,
        borrow_rate,
        now,
    );
    bank.validate_config()?;
    save(&bank, bank_info)?;

    msg!(
        "Bank initialized for mint {}: deposit rate {} bps, borrow rate {} bps",
        mint_info.key,
        deposit_rate,
        borrow_rate
    );

    Ok(())
}

/// Update bank parameters
fn process_update_bank_config(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    update: BankConfigUpdate,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    let authority_info = next_account_info(account_info_iter)?;
    let bank_info = next_account_info(account_info_iter)?;

    require_signer(authority_info)?;

    let bank = load_bank(program_id, bank_info)?;
    if bank.authority != *authority_info.key {
        return Err(LendingError::InvalidAuthority.into());
    }

    // Interest up to now is owed at the old rates
    let now = Clock::get()?.unix_timestamp;
    let mut bank = accrue(&bank, now)?;

    if let Some(value) = update.deposit_rate {
        bank.deposit_rate = value;
    }
    if let Some(value) = update.borrow_rate {
        bank.borrow_rate = value;
    }
    if let Some(value) = update.liquidation_threshold {
        bank.liquidation_threshold = value;
    }
    if let Some(value) = update.liquidation_bonus {
        bank.liquidation_bonus = value;
    }
    if let Some(value) = update.close_factor {
        bank.close_factor = value;
    }
    if let Some(value) = update.price_feed_id {
        bank.price_feed_id = value;
    }
    if let Some(value) = update.max_price_age {
        bank.max_price_age = value;
    }
    if let Some(value) = update.max_confidence {
        bank.max_confidence = value;
    }

    bank.validate_config()?;
    save(&bank, bank_info)?;

    msg!("Bank config updated for mint {}", bank.mint);

    Ok(())
}

/// Accounts shared by deposit, withdraw and repay
struct TransferAccounts<'a, 'b> {
    owner: &'a AccountInfo<'b>,
    bank: &'a AccountInfo<'b>,
    treasury: &'a AccountInfo<'b>,
    user: &'a AccountInfo<'b>,
    token_account: &'a AccountInfo<'b>,
    token_program: &'a AccountInfo<'b>,
}

/// Walk and check the accounts shared by deposit, withdraw and repay
fn load_transfer_accounts<'a, 'b, I>(
    program_id: &Pubkey,
    account_info_iter: &mut I,
) -> Result<(TransferAccounts<'a, 'b>, Bank, UserPosition), ProgramError>
where
    I: Iterator<Item = &'a AccountInfo<'b>>,
{
    let owner_info = next_account_info(account_info_iter)?;
    let mint_info = next_account_info(account_info_iter)?;
    let bank_info = next_account_info(account_info_iter)?;
    let treasury_info = next_account_info(account_info_iter)?;
    let user_info = next_account_info(account_info_iter)?;
    let token_info = next_account_info(account_info_iter)?;
    let token_program = next_account_info(account_info_iter)?;

    require_signer(owner_info)?;
    token::check_token_program(token_program)?;

    let bank = load_bank_for_mint(program_id, bank_info, mint_info.key)?;
    check_treasury(program_id, treasury_info, &bank)?;
    let position = load_position(program_id, user_info, Some(owner_info.key))?;
    token::unpack_token_account(token_info, &bank.mint)?;

    Ok((
        TransferAccounts {
            owner: owner_info,
            bank: bank_info,
            treasury: treasury_info,
            user: user_info,
            token_account: token_info,
            token_program,
        },
        bank,
        position,
    ))
}

/// Supply collateral
fn process_deposit(program_id: &Pubkey, accounts: &[AccountInfo], amount: u64) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();
    let (accounts, bank, position) = load_transfer_accounts(program_id, account_info_iter)?;

    let now = Clock::get()?.unix_timestamp;
    let outcome = ledger::deposit(&bank, &position, amount, now)?;

    token::transfer(
        accounts.token_account,
        accounts.treasury,
        accounts.owner,
        amount,
        accounts.token_program,
        &[],
    )?;

    save(&outcome.bank, accounts.bank)?;
    save(&outcome.position, accounts.user)?;

    msg!(
        "Deposited {} of {}, minted {} shares",
        amount,
        outcome.bank.mint,
        outcome.shares_minted
    );

    Ok(())
}

/// Withdraw collateral
fn process_withdraw(program_id: &Pubkey, accounts: &[AccountInfo], amount: u64) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();
    let (accounts, bank, position) = load_transfer_accounts(program_id, account_info_iter)?;

    let now = Clock::get()?.unix_timestamp;

    // Positions in debt bring the debt bank and both price updates
    let debt_accounts = if position.has_debt() {
        let debt_bank_info = next_account_info(account_info_iter)?;
        let collateral_oracle = next_account_info(account_info_iter)?;
        let debt_oracle = next_account_info(account_info_iter)?;

        let debt_bank = load_bank_for_mint(program_id, debt_bank_info, &position.debt.mint)?;
        let prices = read_prices(collateral_oracle, &bank, debt_oracle, &debt_bank, now)?;
        Some((debt_bank_info, debt_bank, prices))
    } else {
        None
    };

    let outcome = ledger::withdraw(
        &bank,
        &position,
        amount,
        debt_accounts
            .as_ref()
            .map(|(_, debt_bank, prices)| (debt_bank, prices)),
        now,
    )?;

    let treasury_seeds: &[&[u8]] = &[
        seeds::TREASURY,
        bank.mint.as_ref(),
        &[bank.treasury_bump],
    ];
    token::transfer(
        accounts.treasury,
        accounts.token_account,
        accounts.treasury,
        amount,
        accounts.token_program,
        &[treasury_seeds],
    )?;

    save(&outcome.bank, accounts.bank)?;
    save(&outcome.position, accounts.user)?;
    if let (Some(debt_bank), Some((debt_bank_info, _, _))) = (&outcome.debt_bank, &debt_accounts) {
        save(debt_bank, debt_bank_info)?;
    }

    msg!(
        "Withdrew {} of {}, burned {} shares",
        amount,
        outcome.bank.mint,
        outcome.shares_burned
    );

    Ok(())
}

/// Borrow against collateral
fn process_borrow(program_id: &Pubkey, accounts: &[AccountInfo], amount: u64) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    let owner_info = next_account_info(account_info_iter)?;
    let mint_info = next_account_info(account_info_iter)?;
    let bank_info = next_account_info(account_info_iter)?;
    let treasury_info = next_account_info(account_info_iter)?;
    let collateral_bank_info = next_account_info(account_info_iter)?;
    let user_info = next_account_info(account_info_iter)?;
    let token_info = next_account_info(account_info_iter)?;
    let collateral_oracle = next_account_info(account_info_iter)?;
    let debt_oracle = next_account_info(account_info_iter)?;
    let token_program = next_account_info(account_info_iter)?;

    require_signer(owner_info)?;
    token::check_token_program(token_program)?;

    if bank_info.key == collateral_bank_info.key {
        return Err(LendingError::PositionAssetMismatch.into());
    }

    let debt_bank = load_bank_for_mint(program_id, bank_info, mint_info.key)?;
    check_treasury(program_id, treasury_info, &debt_bank)?;
    let collateral_bank = load_bank(program_id, collateral_bank_info)?;
    let position = load_position(program_id, user_info, Some(owner_info.key))?;
    token::unpack_token_account(token_info, &debt_bank.mint)?;

    let now = Clock::get()?.unix_timestamp;
    let prices = read_prices(
        collateral_oracle,
        &collateral_bank,
        debt_oracle,
        &debt_bank,
        now,
    )?;

    let outcome = ledger::borrow(&debt_bank, &collateral_bank, &position, amount, &prices, now)?;

    let treasury_seeds: &[&[u8]] = &[
        seeds::TREASURY,
        debt_bank.mint.as_ref(),
        &[debt_bank.treasury_bump],
    ];
    token::transfer(
        treasury_info,
        token_info,
        treasury_info,
        amount,
        token_program,
        &[treasury_seeds],
    )?;

    save(&outcome.debt_bank, bank_info)?;
    save(&outcome.collateral_bank, collateral_bank_info)?;
    save(&outcome.position, user_info)?;

    msg!(
        "Borrowed {} of {}, health ratio {}",
        amount,
        outcome.debt_bank.mint,
        outcome.health_ratio
    );

    Ok(())
}

/// Pay back debt
fn process_repay(program_id: &Pubkey, accounts: &[AccountInfo], amount: u64) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();
    let (accounts, bank, position) = load_transfer_accounts(program_id, account_info_iter)?;

    let now = Clock::get()?.unix_timestamp;
    let outcome = ledger::repay(&bank, &position, amount, now)?;

    token::transfer(
        accounts.token_account,
        accounts.treasury,
        accounts.owner,
        amount,
        accounts.token_program,
        &[],
    )?;

    save(&outcome.bank, accounts.bank)?;
    save(&outcome.position, accounts.user)?;

    msg!(
        "Repaid {} of {}, burned {} shares",
        amount,
        outcome.bank.mint,
        outcome.shares_burned
    );

    Ok(())
}

/// Liquidate an unhealthy position
fn process_liquidate(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();

    let liquidator_info = next_account_info(account_info_iter)?;
    let collateral_bank_info = next_account_info(account_info_iter)?;
    let collateral_treasury_info = next_account_info(account_info_iter)?;
    let debt_bank_info = next_account_info(account_info_iter)?;
    let debt_treasury_info = next_account_info(account_info_iter)?;
    let position_info = next_account_info(account_info_iter)?;
    let liquidator_collateral_info = next_account_info(account_info_iter)?;
    let liquidator_debt_info = next_account_info(account_info_iter)?;
    let collateral_oracle = next_account_info(account_info_iter)?;
    let debt_oracle = next_account_info(account_info_iter)?;
    let token_program = next_account_info(account_info_iter)?;

    require_signer(liquidator_info)?;
    token::check_token_program(token_program)?;

    if collateral_bank_info.key == debt_bank_info.key {
        return Err(LendingError::PositionAssetMismatch.into());
    }

    let collateral_bank = load_bank(program_id, collateral_bank_info)?;
    check_treasury(program_id, collateral_treasury_info, &collateral_bank)?;
    let debt_bank = load_bank(program_id, debt_bank_info)?;
    check_treasury(program_id, debt_treasury_info, &debt_bank)?;
    let position = load_position(program_id, position_info, None)?;
    token::unpack_token_account(liquidator_collateral_info, &collateral_bank.mint)?;
    token::unpack_token_account(liquidator_debt_info, &debt_bank.mint)?;

    let now = Clock::get()?.unix_timestamp;
    let prices = read_prices(
        collateral_oracle,
        &collateral_bank,
        debt_oracle,
        &debt_bank,
        now,
    )?;

    let outcome = ledger::liquidate(&collateral_bank, &debt_bank, &position, &prices, now)?;

    token::transfer(
        liquidator_debt_info,
        debt_treasury_info,
        liquidator_info,
        outcome.repaid,
        token_program,
        &[],
    )?;

    if outcome.seized > 0 {
        let treasury_seeds: &[&[u8]] = &[
            seeds::TREASURY,
            collateral_bank.mint.as_ref(),
            &[collateral_bank.treasury_bump],
        ];
        token::transfer(
            collateral_treasury_info,
            liquidator_collateral_info,
            collateral_treasury_info,
            outcome.seized,
            token_program,
            &[treasury_seeds],
        )?;
    }

    save(&outcome.collateral_bank, collateral_bank_info)?;
    save(&outcome.debt_bank, debt_bank_info)?;
    save(&outcome.position, position_info)?;

    msg!(
        "Liquidated {}: repaid {}, seized {}, health ratio was {}",
        position.owner,
        outcome.repaid,
        outcome.seized,
        outcome.health_before
    );

    Ok(())
}
