use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::{LendingError, Result};

/// unique identifier for a maker-checker transaction
pub type TransactionId = Uuid;

/// unique identifier for a loan account
pub type LoanId = Uuid;

/// cooperative loan products
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoanType {
    Normal,
    Commodity,
    Car,
}

impl LoanType {
    /// how many times a member's savings the product may lend
    pub fn savings_multiplier(&self) -> Decimal {
        match self {
            LoanType::Normal => dec!(2.0),
            LoanType::Commodity => dec!(3.0),
            LoanType::Car => dec!(5.0),
        }
    }
}

/// approval status of a maker-checker transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    PendingApproval,
    Approved,
    Rejected,
}

impl TransactionStatus {
    /// approved and rejected are terminal
    pub fn is_decided(&self) -> bool {
        !matches!(self, TransactionStatus::PendingApproval)
    }
}

/// execution progress of an approved transaction, tracked apart from the approval decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionStatus {
    NotExecuted,
    InProgress,
    Succeeded,
    Failed,
}

/// checker queue priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low = 1,
    #[default]
    Normal = 2,
    High = 3,
    Critical = 4,
}

/// what an approved transaction does once executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    LoanDisbursement,
    LoanRepayment,
    JournalPosting,
}

impl OperationKind {
    pub const ALL: [OperationKind; 3] = [
        OperationKind::LoanDisbursement,
        OperationKind::LoanRepayment,
        OperationKind::JournalPosting,
    ];

    pub fn entity_name(&self) -> &'static str {
        match self {
            OperationKind::LoanDisbursement | OperationKind::LoanRepayment => "Loan",
            OperationKind::JournalPosting => "JournalEntry",
        }
    }

    pub fn operation_name(&self) -> &'static str {
        match self {
            OperationKind::LoanDisbursement => "Disburse",
            OperationKind::LoanRepayment => "Repay",
            OperationKind::JournalPosting => "Post",
        }
    }

    /// resolve an (entity, operation) pair, case-insensitive
    pub fn from_names(entity: &str, operation: &str) -> Result<Self> {
        OperationKind::ALL
            .into_iter()
            .find(|kind| {
                kind.entity_name().eq_ignore_ascii_case(entity)
                    && kind.operation_name().eq_ignore_ascii_case(operation)
            })
            .ok_or_else(|| {
                LendingError::invalid_argument(format!("unknown operation {entity}.{operation}"))
            })
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.entity_name(), self.operation_name())
    }
}

/// behaviour when a payment exceeds everything owed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverpaymentPolicy {
    /// refuse the payment
    Reject,
    /// accept it and report the excess as member credit
    CreditAsOverpayment,
}

/// loan account lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanStatus {
    /// approved, funds not yet released
    Approved,
    /// disbursed and repaying
    Active,
    /// fully repaid
    Closed,
}
