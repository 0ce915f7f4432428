use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{LendingError, Result};
use crate::interest::accrue_between;

use super::amortization::{calculate_emi, validate_loan_terms};

/// request to repay part or all of a loan ahead of schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarlyRepaymentRequest {
    pub outstanding_principal: Money,
    pub annual_rate: Rate,
    pub remaining_tenor_months: u32,
    pub last_payment_date: NaiveDate,
    pub repayment_date: NaiveDate,
    pub repayment_amount: Money,
}

/// outcome of an early repayment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarlyRepaymentResult {
    /// interest accrued since the last payment, settled first
    pub accrued_interest: Money,
    /// principal plus accrued interest as of the repayment date
    pub payoff_amount: Money,
    pub loan_fully_paid: bool,
    pub principal_reduction: Money,
    pub new_outstanding_balance: Money,
    /// installment for the remaining tenor, None once the loan is paid off
    pub new_emi: Option<Money>,
    pub interest_saved: Money,
    /// amount paid beyond the payoff, returned to the member
    pub excess: Money,
}

/// payoff quote: outstanding principal plus simple daily interest since the last payment
pub fn calculate_early_repayment_amount(
    outstanding_principal: Money,
    annual_rate: Rate,
    last_payment_date: NaiveDate,
    as_of: NaiveDate,
) -> Result<Money> {
    if as_of < last_payment_date {
        return Err(LendingError::invalid_argument(format!(
            "payoff date {as_of} precedes last payment {last_payment_date}"
        )));
    }
    if outstanding_principal.is_negative() {
        return Err(LendingError::invalid_argument("outstanding principal cannot be negative"));
    }
    let accrued = accrue_between(outstanding_principal, annual_rate, last_payment_date, as_of);
    Ok(outstanding_principal + accrued)
}

/// Settle accrued interest, then reduce principal by the rest.
///
/// A repayment that covers the payoff amount closes the loan; anything less
/// keeps the remaining tenor and recomputes the installment at the same rate.
pub fn calculate_early_repayment(request: &EarlyRepaymentRequest) -> Result<EarlyRepaymentResult> {
    validate_loan_terms(request.outstanding_principal, request.annual_rate, request.remaining_tenor_months)?;
    if !request.repayment_amount.is_positive() {
        return Err(LendingError::invalid_argument(format!(
            "repayment must be positive, got {}",
            request.repayment_amount
        )));
    }

    let payoff_amount = calculate_early_repayment_amount(
        request.outstanding_principal,
        request.annual_rate,
        request.last_payment_date,
        request.repayment_date,
    )?;
    let accrued_interest = payoff_amount - request.outstanding_principal;

    let months = Decimal::from(request.remaining_tenor_months);
    let current_emi = calculate_emi(request.outstanding_principal, request.annual_rate, request.remaining_tenor_months)?;
    let scheduled_interest = (current_emi * months - request.outstanding_principal).max(Money::ZERO);

    if request.repayment_amount >= payoff_amount {
        return Ok(EarlyRepaymentResult {
            accrued_interest,
            payoff_amount,
            loan_fully_paid: true,
            principal_reduction: request.outstanding_principal,
            new_outstanding_balance: Money::ZERO,
            new_emi: None,
            interest_saved: (scheduled_interest - accrued_interest).max(Money::ZERO),
            excess: request.repayment_amount - payoff_amount,
        });
    }

    if request.repayment_amount < accrued_interest {
        return Err(LendingError::invalid_argument(format!(
            "repayment {} does not cover accrued interest {}",
            request.repayment_amount, accrued_interest
        )));
    }

    let principal_reduction = request.repayment_amount - accrued_interest;
    let new_outstanding_balance = request.outstanding_principal - principal_reduction;
    let new_emi = calculate_emi(new_outstanding_balance, request.annual_rate, request.remaining_tenor_months)?;
    let new_scheduled_interest = (new_emi * months - new_outstanding_balance).max(Money::ZERO);

    Ok(EarlyRepaymentResult {
        accrued_interest,
        payoff_amount,
        loan_fully_paid: false,
        principal_reduction,
        new_outstanding_balance,
        new_emi: Some(new_emi),
        interest_saved: (scheduled_interest - new_scheduled_interest).max(Money::ZERO),
        excess: Money::ZERO,
    })
}
