use num_derive::FromPrimitive;
use solana_program::{
    decode_error::DecodeError,
    program_error::{PrintProgramError, ProgramError},
};
use thiserror::Error;

#[derive(Error, Debug, Copy, Clone, FromPrimitive, PartialEq, Eq)]
pub enum LendingError {
    #[error("Account already exists")]
    AlreadyExists = 0,

    #[error("Pool liquidity cannot cover the requested amount")]
    InsufficientLiquidity = 1,

    #[error("Remaining collateral would not cover outstanding debt")]
    InsufficientCollateral = 2,

    #[error("Borrow would leave the position under-collateralized")]
    HealthCheckFailed = 3,

    #[error("Repay amount exceeds outstanding debt")]
    ExceedsDebt = 4,

    #[error("Position is not liquidatable")]
    NotLiquidatable = 5,

    #[error("Oracle account is not a trusted price source")]
    InvalidOracleSource = 6,

    #[error("Oracle price is stale")]
    StalePrice = 7,

    #[error("Oracle confidence interval too wide")]
    LowConfidence = 8,

    #[error("Arithmetic overflow")]
    ArithmeticOverflow = 9,

    #[error("Invalid instruction")]
    InvalidInstruction = 10,

    #[error("Amount must be greater than zero")]
    InvalidAmount = 11,

    #[error("Insufficient funds")]
    InsufficientFunds = 12,

    #[error("Account not initialized")]
    NotInitialized = 13,

    #[error("Invalid authority")]
    InvalidAuthority = 14,

    #[error("Invalid PDA")]
    InvalidPda = 15,

    #[error("Account owned by unexpected program")]
    InvalidAccountOwner = 16,

    #[error("Asset does not match the position")]
    PositionAssetMismatch = 17,

    #[error("Oracle price is not positive")]
    InvalidPrice = 18,

    #[error("Invalid bank configuration")]
    InvalidBankConfig = 19,

    #[error("Mint does not match the bank")]
    InvalidMint = 20,
}

impl PrintProgramError for LendingError {
    fn print<E>(&self) {
        use solana_program::msg;
        msg!("LendingError: {}", self);
    }
}

impl From<LendingError> for ProgramError {
    fn from(e: LendingError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for LendingError {
    fn type_of() -> &'static str {
        "LendingError"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::FromPrimitive;

    #[test]
    fn test_custom_codes_round_trip() {
        let err: ProgramError = LendingError::ExceedsDebt.into();
        assert_eq!(err, ProgramError::Custom(4));

        match err {
            ProgramError::Custom(code) => {
                assert_eq!(LendingError::from_u32(code), Some(LendingError::ExceedsDebt));
            }
            _ => panic!("expected custom error"),
        }
    }

    #[test]
    fn test_unknown_code_does_not_decode() {
        assert_eq!(LendingError::from_u32(999), None);
    }
}
