//! Program Derived Address (PDA) derivation functions

use solana_program::{program_error::ProgramError, pubkey::Pubkey};

use crate::error::LendingError;

/// PDA seed constants
pub mod seeds {
    pub const BANK: &[u8] = b"bank";
    pub const TREASURY: &[u8] = b"treasury";
    pub const USER: &[u8] = b"user";
}

/// Bank PDA, one per mint
pub struct BankPDA;
impl BankPDA {
    pub fn derive(program_id: &Pubkey, mint: &Pubkey) -> (Pubkey, u8) {
        Pubkey::find_program_address(&[seeds::BANK, mint.as_ref()], program_id)
    }
}

/// Treasury token account PDA, one per mint, self-authority
pub struct TreasuryPDA;
impl TreasuryPDA {
    pub fn derive(program_id: &Pubkey, mint: &Pubkey) -> (Pubkey, u8) {
        Pubkey::find_program_address(&[seeds::TREASURY, mint.as_ref()], program_id)
    }
}

/// User position PDA, one per wallet
pub struct UserPDA;
impl UserPDA {
    pub fn derive(program_id: &Pubkey, owner: &Pubkey) -> (Pubkey, u8) {
        Pubkey::find_program_address(&[seeds::USER, owner.as_ref()], program_id)
    }
}

/// Check that `actual` is the PDA derived for `expected`
pub fn verify_pda(actual: &Pubkey, expected: &(Pubkey, u8)) -> Result<u8, ProgramError> {
    if *actual != expected.0 {
        return Err(LendingError::InvalidPda.into());
    }
    Ok(expected.1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdas_are_distinct_per_seed() {
        let program_id = Pubkey::new_unique();
        let mint = Pubkey::new_unique();

        let (bank, _) = BankPDA::derive(&program_id, &mint);
        let (treasury, _) = TreasuryPDA::derive(&program_id, &mint);
        let (user, _) = UserPDA::derive(&program_id, &mint);

        assert_ne!(bank, treasury);
        assert_ne!(bank, user);
        assert_ne!(treasury, user);
    }

    #[test]
    fn test_verify_pda() {
        let program_id = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let derived = UserPDA::derive(&program_id, &owner);

        assert_eq!(verify_pda(&derived.0, &derived).unwrap(), derived.1);
        assert_eq!(
            verify_pda(&Pubkey::new_unique(), &derived),
            Err(LendingError::InvalidPda.into())
        );
    }
}
