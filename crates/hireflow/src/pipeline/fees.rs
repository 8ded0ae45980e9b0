use serde::{Deserialize, Serialize};

use super::domain::ExperienceLevel;

/// Billing dials for placements. Percentages are whole percents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Share of the placement fee invoiced up front.
    pub upfront_percent: u8,
    /// Days a fresh offer stays open when no explicit expiry is given.
    pub offer_validity_days: i64,
    /// Length of the replacement/refund guarantee window.
    pub guarantee_period_days: i64,
    /// ISO currency code used for gateway intents.
    pub currency: String,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            upfront_percent: 50,
            offer_validity_days: 7,
            guarantee_period_days: 90,
            currency: "usd".to_string(),
        }
    }
}

/// Validation errors raised by the fee calculator. Nothing is clamped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeeError {
    #[error("salary must be non-negative minor units, got {0}")]
    NegativeSalary(i64),
    #[error("percentage must lie within 0..=100, got {0}")]
    PercentageOutOfRange(u8),
}

/// Staged fee split for one placement. `upfront_amount + remaining_amount`
/// always equals `placement_fee`; the rounding remainder lands on the
/// remaining leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub fee_percentage: u8,
    pub placement_fee: i64,
    pub upfront_amount: i64,
    pub remaining_amount: i64,
}

/// Canonical fee tier: a direct lookup on the candidate's experience level.
pub const fn tier_percentage(level: ExperienceLevel) -> u8 {
    match level {
        ExperienceLevel::Entry | ExperienceLevel::Mid => 15,
        ExperienceLevel::Senior => 18,
        ExperienceLevel::Executive => 20,
    }
}

/// Compute the staged fee for a salary in integer minor-currency units.
pub fn calculate_fee(
    salary: i64,
    level: ExperienceLevel,
    config: &FeeConfig,
) -> Result<FeeBreakdown, FeeError> {
    if salary < 0 {
        return Err(FeeError::NegativeSalary(salary));
    }
    if config.upfront_percent > 100 {
        return Err(FeeError::PercentageOutOfRange(config.upfront_percent));
    }

    let fee_percentage = tier_percentage(level);
    let placement_fee = percentage_of(salary, fee_percentage);
    let upfront_amount = percentage_of(placement_fee, config.upfront_percent);
    // Derived, never rounded independently, so the two legs sum exactly.
    let remaining_amount = placement_fee - upfront_amount;

    Ok(FeeBreakdown {
        fee_percentage,
        placement_fee,
        upfront_amount,
        remaining_amount,
    })
}

/// Integer percentage with half-up rounding, widened to avoid overflow.
fn percentage_of(amount: i64, percent: u8) -> i64 {
    let scaled = amount as i128 * percent as i128;
    ((scaled + 50) / 100) as i64
}
