pub mod handlers;
pub mod in_memory;
pub mod service;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{LendingError, Result};
use crate::payments::AmortizationSchedule;
use crate::types::{LoanId, LoanStatus, LoanType};

pub use handlers::{JournalPostingHandler, LoanDisbursementHandler, LoanRepaymentHandler};
pub use in_memory::{InMemoryLedgerRepository, InMemoryLoanRepository};
pub use service::{LoanOperationsService, Submission};

/// a member's loan account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanAccount {
    pub loan_id: LoanId,
    pub tenant_id: String,
    pub member_id: String,
    pub loan_type: LoanType,
    pub principal: Money,
    pub annual_rate: Rate,
    pub tenor_months: u32,
    pub status: LoanStatus,
    pub outstanding_principal: Money,
    pub accrued_interest: Money,
    /// overpayments held for the member
    pub member_credit: Money,
    pub schedule: Option<AmortizationSchedule>,
    pub disbursed_on: Option<NaiveDate>,
    pub last_payment_date: Option<NaiveDate>,
    /// optimistic concurrency token, bumped on every stored change
    #[serde(default)]
    pub version: u64,
}

impl LoanAccount {
    /// an approved loan waiting for disbursement
    pub fn approved(
        loan_id: LoanId,
        tenant_id: impl Into<String>,
        member_id: impl Into<String>,
        loan_type: LoanType,
        principal: Money,
        annual_rate: Rate,
        tenor_months: u32,
    ) -> Self {
        Self {
            loan_id,
            tenant_id: tenant_id.into(),
            member_id: member_id.into(),
            loan_type,
            principal,
            annual_rate,
            tenor_months,
            status: LoanStatus::Approved,
            outstanding_principal: Money::ZERO,
            accrued_interest: Money::ZERO,
            member_credit: Money::ZERO,
            schedule: None,
            disbursed_on: None,
            last_payment_date: None,
            version: 0,
        }
    }

    pub(crate) fn ensure_status(&self, expected: LoanStatus) -> Result<()> {
        if self.status != expected {
            return Err(LendingError::InvalidState {
                current: format!("{:?}", self.status),
                expected: format!("{:?}", expected),
            });
        }
        Ok(())
    }
}

/// payload of a disbursement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisbursementInstruction {
    pub loan_id: LoanId,
    pub disbursement_date: NaiveDate,
    pub first_payment_date: NaiveDate,
}

/// payload of a repayment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepaymentInstruction {
    pub loan_id: LoanId,
    pub amount: Money,
    pub payment_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalLine {
    pub account_code: String,
    pub debit: Money,
    pub credit: Money,
}

/// double-entry journal entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub reference: String,
    pub posting_date: NaiveDate,
    pub description: String,
    pub lines: Vec<JournalLine>,
}

impl JournalEntry {
    pub fn total_debits(&self) -> Money {
        self.lines.iter().map(|l| l.debit).sum()
    }

    pub fn total_credits(&self) -> Money {
        self.lines.iter().map(|l| l.credit).sum()
    }

    /// at least two lines, one side per line, debits equal credits
    pub fn validate(&self) -> Result<()> {
        if self.lines.len() < 2 {
            return Err(LendingError::invalid_argument(format!(
                "journal {} needs at least two lines",
                self.reference
            )));
        }
        for line in &self.lines {
            if line.debit.is_negative() || line.credit.is_negative() {
                return Err(LendingError::invalid_argument(format!(
                    "journal {} has a negative amount on {}",
                    self.reference, line.account_code
                )));
            }
            if line.debit.is_positive() == line.credit.is_positive() {
                return Err(LendingError::invalid_argument(format!(
                    "journal {} line {} must be either a debit or a credit",
                    self.reference, line.account_code
                )));
            }
        }
        let (debits, credits) = (self.total_debits(), self.total_credits());
        if debits != credits {
            return Err(LendingError::invalid_argument(format!(
                "journal {} is unbalanced: debits {} credits {}",
                self.reference, debits, credits
            )));
        }
        Ok(())
    }
}

#[async_trait]
pub trait LoanRepository: Send + Sync {
    async fn get(&self, loan_id: LoanId) -> Result<Option<LoanAccount>>;
    /// add a new account; an existing id is an error
    async fn insert(&self, loan: LoanAccount) -> Result<()>;
    /// Store `updated` only if the stored version still equals `expected_version`.
    /// Returns false when another writer got there first.
    async fn compare_and_swap(&self, expected_version: u64, updated: LoanAccount) -> Result<bool>;
}

#[async_trait]
pub trait LedgerRepository: Send + Sync {
    async fn post(&self, entry: JournalEntry) -> Result<()>;
    async fn entries(&self) -> Result<Vec<JournalEntry>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(account: &str, debit: i64, credit: i64) -> JournalLine {
        JournalLine {
            account_code: account.to_string(),
            debit: Money::from_major(debit),
            credit: Money::from_major(credit),
        }
    }

    fn entry(lines: Vec<JournalLine>) -> JournalEntry {
        JournalEntry {
            reference: "JE-1".to_string(),
            posting_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            description: "loan disbursement".to_string(),
            lines,
        }
    }

    #[test]
    fn test_balanced_entry() {
        let je = entry(vec![line("1400", 500, 0), line("1000", 0, 500)]);
        assert!(je.validate().is_ok());
        assert_eq!(je.total_debits(), Money::from_major(500));
    }

    #[test]
    fn test_unbalanced_entry() {
        let je = entry(vec![line("1400", 500, 0), line("1000", 0, 400)]);
        assert!(matches!(je.validate(), Err(LendingError::InvalidArgument { .. })));
    }

    #[test]
    fn test_line_with_both_sides() {
        let je = entry(vec![line("1400", 500, 500), line("1000", 0, 0)]);
        assert!(je.validate().is_err());
    }

    #[test]
    fn test_single_line_rejected() {
        let je = entry(vec![line("1400", 0, 0)]);
        assert!(je.validate().is_err());
    }
}
