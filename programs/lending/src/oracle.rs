//! Pyth price reads
//!
//! Prices come from Pyth receiver `PriceUpdateV2` accounts. The account body
//! is decoded with borsh after the 8-byte discriminator; trailing zero padding
//! is ignored. Every read is validated against the bank's oracle
//! configuration (feed id, max age, max confidence) and normalized into a
//! `Decimal` of quote units per whole token.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::AccountInfo, msg, program_error::ProgramError, pubkey::Pubkey,
};

use crate::{
    constants::{BPS, PRICE_UPDATE_V2_DISCRIMINATOR, PYTH_RECEIVER_PROGRAM_ID},
    error::LendingError,
    math::{checked_pow10, Decimal},
    state::Bank,
};

/// How thoroughly the Wormhole guardian signatures were checked
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationLevel {
    Partial { num_signatures: u8 },
    Full,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceFeedMessage {
    pub feed_id: [u8; 32],
    pub price: i64,
    pub conf: u64,
    pub exponent: i32,
    /// Unix timestamp
    pub publish_time: i64,
    pub prev_publish_time: i64,
    pub ema_price: i64,
    pub ema_conf: u64,
}

/// Body of a Pyth receiver price account
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceUpdateV2 {
    pub write_authority: Pubkey,
    pub verification_level: VerificationLevel,
    pub price_message: PriceFeedMessage,
    pub posted_slot: u64,
}

impl PriceUpdateV2 {
    /// Discriminator, body and padding as stored on chain
    pub const LEN: usize = 8 + 32 + 2 + (32 + 8 + 8 + 4 + 8 + 8 + 8 + 8) + 8;

    pub fn pack(&self) -> Result<Vec<u8>, ProgramError> {
        let mut data = Vec::with_capacity(Self::LEN);
        data.extend_from_slice(&PRICE_UPDATE_V2_DISCRIMINATOR);
        data.extend_from_slice(
            &self
                .try_to_vec()
                .map_err(|_| ProgramError::InvalidAccountData)?,
        );
        data.resize(Self::LEN, 0);
        Ok(data)
    }
}

/// Validated price of one asset, never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OracleReading {
    /// Quote units per whole token
    pub price: Decimal,
    pub confidence: Decimal,
    pub published_at: i64,
}

pub struct OracleGateway;

impl OracleGateway {
    /// Read and validate the price of `bank`'s asset from `oracle_account`
    pub fn read(
        oracle_account: &AccountInfo,
        bank: &Bank,
        now: i64,
    ) -> Result<OracleReading, ProgramError> {
        let data = oracle_account.try_borrow_data()?;
        Self::parse(oracle_account.owner, &data, bank, now)
    }

    /// Validation behind `read`, on raw account parts
    pub fn parse(
        owner: &Pubkey,
        data: &[u8],
        bank: &Bank,
        now: i64,
    ) -> Result<OracleReading, ProgramError> {
        if *owner != PYTH_RECEIVER_PROGRAM_ID {
            msg!("Oracle account owned by {}, expected pyth receiver", owner);
            return Err(LendingError::InvalidOracleSource.into());
        }

        if data.len() < 8 || data[..8] != PRICE_UPDATE_V2_DISCRIMINATOR {
            msg!("Oracle account is not a price update");
            return Err(LendingError::InvalidOracleSource.into());
        }

        let update = PriceUpdateV2::deserialize(&mut &data[8..])
            .map_err(|_| LendingError::InvalidOracleSource)?;

        if update.verification_level != VerificationLevel::Full {
            msg!("Price update is only partially verified");
            return Err(LendingError::InvalidOracleSource.into());
        }

        let message = update.price_message;
        if message.feed_id != bank.price_feed_id {
            msg!("Price feed does not belong to mint {}", bank.mint);
            return Err(LendingError::InvalidOracleSource.into());
        }

        let age = now.saturating_sub(message.publish_time);
        if age > 0 && age as u64 > bank.max_price_age {
            msg!(
                "Price is stale: {}s old, max {}s",
                age,
                bank.max_price_age
            );
            return Err(LendingError::StalePrice.into());
        }

        if message.price <= 0 {
            msg!("Non-positive oracle price {}", message.price);
            return Err(LendingError::InvalidPrice.into());
        }
        let price = message.price as u64;

        if message.conf as u128 * BPS as u128 > price as u128 * bank.max_confidence as u128 {
            msg!(
                "Price confidence {} too wide for price {}",
                message.conf,
                price
            );
            return Err(LendingError::LowConfidence.into());
        }

        let normalized = scale(price, message.exponent)?;
        if normalized == Decimal::ZERO {
            msg!(
                "Oracle price {}e{} rounds to zero",
                message.price,
                message.exponent
            );
            return Err(LendingError::InvalidPrice.into());
        }

        Ok(OracleReading {
            price: normalized,
            confidence: scale(message.conf, message.exponent)?,
            published_at: message.publish_time,
        })
    }
}

/// `mantissa × 10^exponent` as a `Decimal`, rounded down
fn scale(mantissa: u64, exponent: i32) -> Result<Decimal, ProgramError> {
    let shift = exponent
        .checked_add(18)
        .ok_or(LendingError::ArithmeticOverflow)?;

    let raw = if shift >= 0 {
        (mantissa as u128)
            .checked_mul(checked_pow10(shift as u32)?)
            .ok_or(LendingError::ArithmeticOverflow)?
    } else {
        // Anything below 10^-18 is dust
        let divisor = checked_pow10(shift.unsigned_abs()).unwrap_or(u128::MAX);
        mantissa as u128 / divisor
    };

    Ok(Decimal::from_raw(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;
    const FEED: [u8; 32] = [7u8; 32];

    fn bank() -> Bank {
        let mut bank = Bank::new(
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            9,
            255,
            254,
            0,
            0,
            NOW,
        );
        bank.price_feed_id = FEED;
        bank
    }

    fn update(price: i64, conf: u64, exponent: i32, publish_time: i64) -> PriceUpdateV2 {
        PriceUpdateV2 {
            write_authority: Pubkey::new_unique(),
            verification_level: VerificationLevel::Full,
            price_message: PriceFeedMessage {
                feed_id: FEED,
                price,
                conf,
                exponent,
                publish_time,
                prev_publish_time: publish_time - 1,
                ema_price: price,
                ema_conf: conf,
            },
            posted_slot: 42,
        }
    }

    fn parse(update: &PriceUpdateV2) -> Result<OracleReading, ProgramError> {
        OracleGateway::parse(
            &PYTH_RECEIVER_PROGRAM_ID,
            &update.pack().unwrap(),
            &bank(),
            NOW,
        )
    }

    #[test]
    fn test_reads_normalized_price() {
        // $150.12345678 with exponent -8
        let reading = parse(&update(15_012_345_678, 1_000_000, -8, NOW - 5)).unwrap();
        assert_eq!(reading.price.raw, 150_123_456_780_000_000_000);
        assert_eq!(reading.confidence.raw, 10_000_000_000_000_000);
        assert_eq!(reading.published_at, NOW - 5);
    }

    #[test]
    fn test_positive_exponent() {
        let reading = parse(&update(3, 0, 2, NOW)).unwrap();
        assert_eq!(reading.price, Decimal::from_num(300));
    }

    #[test]
    fn test_rejects_foreign_owner() {
        let data = update(100, 0, 0, NOW).pack().unwrap();
        assert_eq!(
            OracleGateway::parse(&Pubkey::new_unique(), &data, &bank(), NOW),
            Err(LendingError::InvalidOracleSource.into())
        );
    }

    #[test]
    fn test_rejects_wrong_discriminator_and_garbage() {
        let mut data = update(100, 0, 0, NOW).pack().unwrap();
        data[0] ^= 0xff;
        assert_eq!(
            OracleGateway::parse(&PYTH_RECEIVER_PROGRAM_ID, &data, &bank(), NOW),
            Err(LendingError::InvalidOracleSource.into())
        );

        let mut truncated = PRICE_UPDATE_V2_DISCRIMINATOR.to_vec();
        truncated.extend_from_slice(&[1, 2, 3]);
        assert_eq!(
            OracleGateway::parse(&PYTH_RECEIVER_PROGRAM_ID, &truncated, &bank(), NOW),
            Err(LendingError::InvalidOracleSource.into())
        );
    }

    #[test]
    fn test_rejects_partial_verification() {
        let mut partial = update(100, 0, 0, NOW);
        partial.verification_level = VerificationLevel::Partial { num_signatures: 5 };
        assert_eq!(parse(&partial), Err(LendingError::InvalidOracleSource.into()));
    }

    #[test]
    fn test_rejects_other_feed() {
        let mut other = update(100, 0, 0, NOW);
        other.price_message.feed_id = [9u8; 32];
        assert_eq!(parse(&other), Err(LendingError::InvalidOracleSource.into()));
    }

    #[test]
    fn test_staleness_boundary() {
        // Exactly max age is still fresh
        assert!(parse(&update(100, 0, 0, NOW - 100)).is_ok());
        assert_eq!(
            parse(&update(100, 0, 0, NOW - 101)),
            Err(LendingError::StalePrice.into())
        );
    }

    #[test]
    fn test_rejects_non_positive_price() {
        assert_eq!(parse(&update(0, 0, 0, NOW)), Err(LendingError::InvalidPrice.into()));
        assert_eq!(parse(&update(-5, 0, 0, NOW)), Err(LendingError::InvalidPrice.into()));
    }

    #[test]
    fn test_rejects_price_below_precision() {
        // 5e-20 is below 18 decimals
        assert_eq!(parse(&update(5, 0, -20, NOW)), Err(LendingError::InvalidPrice.into()));

        let smallest = parse(&update(5, 0, -18, NOW)).unwrap();
        assert_eq!(smallest.price.raw, 5);
    }

    #[test]
    fn test_confidence_limit() {
        // Default limit is 2% of price
        assert!(parse(&update(10_000, 200, -2, NOW)).is_ok());
        assert_eq!(
            parse(&update(10_000, 201, -2, NOW)),
            Err(LendingError::LowConfidence.into())
        );
    }
}
