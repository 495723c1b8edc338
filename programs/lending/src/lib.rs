// Overcollateralized lending core
// Native Solana implementation - NO ANCHOR

use solana_program::{
    account_info::AccountInfo, entrypoint::ProgramResult, program_error::PrintProgramError,
    pubkey::Pubkey,
};

pub mod constants;
pub mod engine;
pub mod error;
pub mod instruction;
pub mod ledger;
pub mod math;
pub mod oracle;
pub mod pda;
pub mod processor;
pub mod state;
pub mod token;

use crate::error::LendingError;

solana_program::declare_id!("LendCore11111111111111111111111111111111111");

#[cfg(not(feature = "no-entrypoint"))]
solana_program::entrypoint!(process);

pub fn process(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    if let Err(error) = processor::process_instruction(program_id, accounts, instruction_data) {
        error.print::<LendingError>();
        return Err(error);
    }
    Ok(())
}
