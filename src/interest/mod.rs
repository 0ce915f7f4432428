pub mod penalty;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::decimal::{Money, Rate};
use crate::errors::{LendingError, Result};

pub use penalty::{calculate_penalty, PenaltyCalculation, PenaltyConfig, PenaltyEngine};

/// total interest over the life of a loan: `emi * tenor - principal`
pub fn calculate_total_interest(emi: Money, tenor_months: u32, principal: Money) -> Result<Money> {
    if principal.is_negative() {
        return Err(LendingError::invalid_argument(format!(
            "principal cannot be negative, got {principal}"
        )));
    }
    if emi.is_negative() {
        return Err(LendingError::invalid_argument(format!(
            "emi cannot be negative, got {emi}"
        )));
    }

    Ok((emi * Decimal::from(tenor_months) - principal).round_currency())
}

/// simple daily interest on a 365-day year, rounded to currency
pub fn accrue_simple_interest(principal: Money, annual_rate: Rate, days: i64) -> Money {
    if days <= 0 || !principal.is_positive() || annual_rate <= Rate::ZERO {
        return Money::ZERO;
    }

    let interest = principal.as_decimal() * annual_rate.daily_rate().as_decimal() * Decimal::from(days);
    Money::from_decimal(interest).round_currency()
}

/// simple daily interest between two dates
pub fn accrue_between(principal: Money, annual_rate: Rate, from: NaiveDate, to: NaiveDate) -> Money {
    accrue_simple_interest(principal, annual_rate, (to - from).num_days())
}
