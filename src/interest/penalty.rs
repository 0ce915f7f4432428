use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::decimal::{Money, Rate};
use crate::errors::{LendingError, Result};

/// penalty configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PenaltyConfig {
    /// simple daily penalty rate on the overdue amount
    pub daily_rate: Rate,
    /// days overdue before penalties apply
    pub grace_period_days: u32,
    /// cap on the penalty for a single overdue amount
    pub maximum_penalty: Option<Money>,
}

impl Default for PenaltyConfig {
    fn default() -> Self {
        Self {
            daily_rate: Rate::from_percentage_decimal(dec!(0.1)),
            grace_period_days: 0,
            maximum_penalty: None,
        }
    }
}

/// Simple (non-compounding) penalty on an overdue amount.
///
/// Any zero or negative input yields a zero penalty rather than an error.
/// A product too large for a decimal is a `CalculationError`.
pub fn calculate_penalty(overdue_amount: Money, days_overdue: i64, daily_penalty_rate: Rate) -> Result<Money> {
    if !overdue_amount.is_positive() || days_overdue <= 0 || daily_penalty_rate <= Rate::ZERO {
        return Ok(Money::ZERO);
    }

    let penalty = overdue_amount
        .as_decimal()
        .checked_mul(Decimal::from(days_overdue))
        .and_then(|v| v.checked_mul(daily_penalty_rate.as_decimal()))
        .ok_or_else(|| LendingError::CalculationError {
            message: format!("penalty overflow on {overdue_amount} over {days_overdue} days"),
        })?;
    Ok(Money::from_decimal(penalty).round_currency())
}

/// engine for calculating penalty charges with grace and cap
pub struct PenaltyEngine {
    pub config: PenaltyConfig,
}

impl PenaltyEngine {
    pub fn new(config: PenaltyConfig) -> Self {
        Self { config }
    }

    /// calculate penalty on overdue amount
    pub fn calculate_penalty(&self, overdue_amount: Money, days_overdue: i64) -> Result<PenaltyCalculation> {
        let grace = i64::from(self.config.grace_period_days);
        if days_overdue > 0 && days_overdue <= grace {
            return Ok(PenaltyCalculation {
                penalty_amount: Money::ZERO,
                daily_rate: self.config.daily_rate,
                days_charged: 0,
                overdue_base: overdue_amount,
                grace_applied: true,
                capped: false,
            });
        }

        let days_charged = days_overdue.saturating_sub(grace).max(0);
        let uncapped = calculate_penalty(overdue_amount, days_charged, self.config.daily_rate)?;

        let (penalty_amount, capped) = match self.config.maximum_penalty {
            Some(max) if uncapped > max => (max, true),
            _ => (uncapped, false),
        };

        Ok(PenaltyCalculation {
            penalty_amount,
            daily_rate: self.config.daily_rate,
            days_charged: u32::try_from(days_charged).unwrap_or(u32::MAX),
            overdue_base: overdue_amount,
            grace_applied: false,
            capped,
        })
    }
}

/// penalty calculation result
#[derive(Debug, Clone, PartialEq)]
pub struct PenaltyCalculation {
    pub penalty_amount: Money,
    pub daily_rate: Rate,
    pub days_charged: u32,
    pub overdue_base: Money,
    pub grace_applied: bool,
    pub capped: bool,
}
