//! Program-wide constants and configuration defaults

use solana_program::{pubkey, pubkey::Pubkey};

/// Basis point denominator (10_000 = 100%)
pub const BPS: u64 = 10_000;

pub const SECONDS_PER_YEAR: u64 = 365 * 24 * 60 * 60;

/// Default liquidation threshold: collateral counts at 80% of its value
pub const DEFAULT_LIQUIDATION_THRESHOLD_BPS: u16 = 8_000;

/// Default liquidation bonus paid to liquidators (5%)
pub const DEFAULT_LIQUIDATION_BONUS_BPS: u16 = 500;

/// Default close factor: half of the debt per liquidation
pub const DEFAULT_CLOSE_FACTOR_BPS: u16 = 5_000;

/// Upper bound accepted for the liquidation bonus (50%)
pub const MAX_LIQUIDATION_BONUS_BPS: u16 = 5_000;

/// Upper bound for annual deposit and borrow rates (100%)
pub const MAX_RATE_BPS: u64 = 10_000;

/// Default maximum oracle price age in seconds
pub const DEFAULT_MAX_PRICE_AGE: u64 = 100;

/// Default maximum confidence interval as a fraction of price (2%)
pub const DEFAULT_MAX_CONFIDENCE_BPS: u16 = 200;

/// Pyth receiver program owning `PriceUpdateV2` accounts
pub const PYTH_RECEIVER_PROGRAM_ID: Pubkey = pubkey!("rec5EKMGg6MxZYaMdyBfgwp4d5rB9T1VQH5pJv5LtFJ");

/// Account discriminator of a `PriceUpdateV2` account
pub const PRICE_UPDATE_V2_DISCRIMINATOR: [u8; 8] = [34, 241, 35, 99, 157, 126, 244, 205];
