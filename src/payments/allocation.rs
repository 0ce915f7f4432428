use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{LendingError, Result};
use crate::types::OverpaymentPolicy;

/// how a payment was split between interest and principal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PaymentAllocation {
    pub total_payment: Money,
    pub interest_payment: Money,
    pub principal_payment: Money,
    /// amount beyond interest and principal, credited to the member
    pub overpayment: Money,
    pub remaining_balance: Money,
    pub remaining_interest: Money,
}

impl PaymentAllocation {
    pub fn total_applied(&self) -> Money {
        self.interest_payment + self.principal_payment
    }

    pub fn settles_loan(&self) -> bool {
        self.remaining_balance.is_zero() && self.remaining_interest.is_zero()
    }
}

/// Apply a payment interest-first, then to principal.
///
/// A payment larger than interest plus principal is either refused or the
/// excess is reported as `overpayment`, depending on `policy`.
pub fn allocate_payment(
    payment_amount: Money,
    outstanding_principal: Money,
    accrued_interest: Money,
    policy: OverpaymentPolicy,
) -> Result<PaymentAllocation> {
    if !payment_amount.is_positive() {
        return Err(LendingError::invalid_argument(format!(
            "payment must be positive, got {payment_amount}"
        )));
    }
    if outstanding_principal.is_negative() || accrued_interest.is_negative() {
        return Err(LendingError::invalid_argument(
            "outstanding balances cannot be negative",
        ));
    }

    let interest_payment = payment_amount.min(accrued_interest);
    let after_interest = payment_amount - interest_payment;
    let principal_payment = after_interest.min(outstanding_principal);
    let excess = after_interest - principal_payment;

    if excess.is_positive() && policy == OverpaymentPolicy::Reject {
        return Err(LendingError::Overpayment { excess });
    }

    Ok(PaymentAllocation {
        total_payment: payment_amount,
        interest_payment,
        principal_payment,
        overpayment: excess,
        remaining_balance: outstanding_principal - principal_payment,
        remaining_interest: accrued_interest - interest_payment,
    })
}
