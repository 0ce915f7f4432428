use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};

use crate::config::LendingPolicy;
use crate::decimal::Money;
use crate::errors::{LendingError, Result};
use crate::interest::accrue_between;
use crate::payments::{allocate_payment, AmortizationSchedule, LoanCalculationInput, PaymentAllocation};
use crate::types::{LoanId, LoanStatus, OverpaymentPolicy};
use crate::workflow::{MakerCheckerTransaction, TransactionHandler};

use super::{
    DisbursementInstruction, JournalEntry, LedgerRepository, LoanAccount, LoanRepository,
    RepaymentInstruction,
};

async fn load_loan(loans: &dyn LoanRepository, loan_id: LoanId) -> Result<LoanAccount> {
    loans.get(loan_id).await?.ok_or_else(|| LendingError::NotFound {
        entity: "Loan".to_string(),
        id: loan_id.to_string(),
    })
}

/// Write back a loan read at `loan.version`. Fails if anyone else wrote it
/// in between, so a change is never applied over a newer state.
async fn store_loan(loans: &dyn LoanRepository, mut loan: LoanAccount) -> Result<LoanAccount> {
    let expected_version = loan.version;
    loan.version = expected_version + 1;
    if !loans.compare_and_swap(expected_version, loan.clone()).await? {
        warn!("loan {} changed while an update was in flight", loan.loan_id);
        return Err(LendingError::ConcurrentModification { id: loan.loan_id });
    }
    Ok(loan)
}

/// releases an approved loan and fixes its repayment schedule
pub struct LoanDisbursementHandler {
    loans: Arc<dyn LoanRepository>,
}

impl LoanDisbursementHandler {
    pub fn new(loans: Arc<dyn LoanRepository>) -> Self {
        Self { loans }
    }

    pub async fn disburse(&self, instruction: &DisbursementInstruction) -> Result<LoanAccount> {
        let mut loan = load_loan(self.loans.as_ref(), instruction.loan_id).await?;
        loan.ensure_status(LoanStatus::Approved)?;

        let input = LoanCalculationInput::new(
            loan.principal,
            loan.annual_rate,
            loan.tenor_months,
            instruction.disbursement_date,
            instruction.first_payment_date,
        )?;
        let schedule = AmortizationSchedule::generate(&input)?;

        loan.status = LoanStatus::Active;
        loan.outstanding_principal = loan.principal;
        loan.accrued_interest = Money::ZERO;
        loan.disbursed_on = Some(instruction.disbursement_date);
        loan.last_payment_date = Some(instruction.disbursement_date);
        info!(
            "disbursed loan {} of {} with EMI {} over {} months",
            loan.loan_id, loan.principal, schedule.emi, loan.tenor_months
        );
        loan.schedule = Some(schedule);

        store_loan(self.loans.as_ref(), loan).await
    }
}

#[async_trait]
impl TransactionHandler for LoanDisbursementHandler {
    async fn execute(&self, transaction: &MakerCheckerTransaction) -> Result<()> {
        let instruction: DisbursementInstruction = transaction.payload_as()?;
        self.disburse(&instruction).await.map(|_| ())
    }
}

/// applies a member payment interest-first
pub struct LoanRepaymentHandler {
    loans: Arc<dyn LoanRepository>,
    overpayment_policy: OverpaymentPolicy,
}

impl LoanRepaymentHandler {
    pub fn new(loans: Arc<dyn LoanRepository>, policy: &LendingPolicy) -> Self {
        Self {
            loans,
            overpayment_policy: policy.overpayment_policy,
        }
    }

    pub fn overpayment_policy(&self) -> OverpaymentPolicy {
        self.overpayment_policy
    }

    pub async fn repay(&self, instruction: &RepaymentInstruction) -> Result<(LoanAccount, PaymentAllocation)> {
        let mut loan = load_loan(self.loans.as_ref(), instruction.loan_id).await?;
        loan.ensure_status(LoanStatus::Active)?;

        let since = loan.last_payment_date.or(loan.disbursed_on).unwrap_or(instruction.payment_date);
        if instruction.payment_date < since {
            return Err(LendingError::invalid_argument(format!(
                "payment date {} precedes last payment {}",
                instruction.payment_date, since
            )));
        }

        let accrued = loan.accrued_interest
            + accrue_between(loan.outstanding_principal, loan.annual_rate, since, instruction.payment_date);
        let allocation = allocate_payment(
            instruction.amount,
            loan.outstanding_principal,
            accrued,
            self.overpayment_policy,
        )?;

        loan.outstanding_principal = allocation.remaining_balance;
        loan.accrued_interest = allocation.remaining_interest;
        loan.member_credit += allocation.overpayment;
        loan.last_payment_date = Some(instruction.payment_date);
        if allocation.settles_loan() {
            loan.status = LoanStatus::Closed;
            info!("loan {} fully repaid", loan.loan_id);
        }

        let loan = store_loan(self.loans.as_ref(), loan).await?;
        Ok((loan, allocation))
    }
}

#[async_trait]
impl TransactionHandler for LoanRepaymentHandler {
    async fn execute(&self, transaction: &MakerCheckerTransaction) -> Result<()> {
        let instruction: RepaymentInstruction = transaction.payload_as()?;
        self.repay(&instruction).await.map(|_| ())
    }
}

/// posts balanced journal entries to the ledger
pub struct JournalPostingHandler {
    ledger: Arc<dyn LedgerRepository>,
}

impl JournalPostingHandler {
    pub fn new(ledger: Arc<dyn LedgerRepository>) -> Self {
        Self { ledger }
    }

    pub async fn post(&self, entry: JournalEntry) -> Result<()> {
        entry.validate()?;
        info!("posting journal {} for {}", entry.reference, entry.total_debits());
        self.ledger.post(entry).await
    }
}

#[async_trait]
impl TransactionHandler for JournalPostingHandler {
    async fn execute(&self, transaction: &MakerCheckerTransaction) -> Result<()> {
        let entry: JournalEntry = transaction.payload_as()?;
        self.post(entry).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::{Money, Rate};
    use crate::loans::{InMemoryLedgerRepository, InMemoryLoanRepository, JournalLine};
    use crate::types::LoanType;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn seeded_loan(repo: &InMemoryLoanRepository) -> LoanId {
        let loan = LoanAccount::approved(
            Uuid::now_v7(),
            "tenant-a",
            "M-7",
            LoanType::Normal,
            Money::from_major(365_000),
            Rate::from_percentage(10),
            12,
        );
        let id = loan.loan_id;
        repo.insert(loan).await.unwrap();
        id
    }

    fn disbursement(loan_id: LoanId) -> DisbursementInstruction {
        DisbursementInstruction {
            loan_id,
            disbursement_date: date(2024, 1, 1),
            first_payment_date: date(2024, 1, 31),
        }
    }

    #[tokio::test]
    async fn test_disbursement_activates_loan() {
        let repo = InMemoryLoanRepository::new();
        let loan_id = seeded_loan(&repo).await;
        let handler = LoanDisbursementHandler::new(Arc::new(repo.clone()));

        let loan = handler.disburse(&disbursement(loan_id)).await.unwrap();
        assert_eq!(loan.status, LoanStatus::Active);
        assert_eq!(loan.outstanding_principal, Money::from_major(365_000));
        let schedule = loan.schedule.as_ref().unwrap();
        assert_eq!(schedule.entries.len(), 12);
        assert_eq!(schedule.entries.last().unwrap().closing_balance, Money::ZERO);

        // a second disbursement is refused
        assert!(matches!(
            handler.disburse(&disbursement(loan_id)).await,
            Err(LendingError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_disbursement_of_unknown_loan() {
        let handler = LoanDisbursementHandler::new(Arc::new(InMemoryLoanRepository::new()));
        assert!(matches!(
            handler.disburse(&disbursement(Uuid::now_v7())).await,
            Err(LendingError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_repayment_interest_first_then_close() {
        let repo = InMemoryLoanRepository::new();
        let loan_id = seeded_loan(&repo).await;
        let loans: Arc<dyn LoanRepository> = Arc::new(repo.clone());
        LoanDisbursementHandler::new(loans.clone())
            .disburse(&disbursement(loan_id))
            .await
            .unwrap();

        let repayments = LoanRepaymentHandler::new(loans, &LendingPolicy::default());
        let (loan, allocation) = repayments
            .repay(&RepaymentInstruction {
                loan_id,
                amount: Money::from_major(100_000),
                payment_date: date(2024, 1, 31),
            })
            .await
            .unwrap();

        assert_eq!(allocation.interest_payment, Money::from_major(3_000));
        assert_eq!(allocation.principal_payment, Money::from_major(97_000));
        assert_eq!(loan.outstanding_principal, Money::from_major(268_000));

        let (loan, allocation) = repayments
            .repay(&RepaymentInstruction {
                loan_id,
                amount: Money::from_major(300_000),
                payment_date: date(2024, 1, 31),
            })
            .await
            .unwrap();

        assert_eq!(loan.status, LoanStatus::Closed);
        assert_eq!(allocation.overpayment, Money::from_major(32_000));
        assert_eq!(loan.member_credit, Money::from_major(32_000));
    }

    #[tokio::test]
    async fn test_repayment_overpayment_rejected_by_policy() {
        let repo = InMemoryLoanRepository::new();
        let loan_id = seeded_loan(&repo).await;
        let loans: Arc<dyn LoanRepository> = Arc::new(repo.clone());
        LoanDisbursementHandler::new(loans.clone())
            .disburse(&disbursement(loan_id))
            .await
            .unwrap();

        let mut json = serde_json::to_value(LendingPolicy::default()).unwrap();
        json["overpayment_policy"] = serde_json::json!("Reject");
        let policy = LendingPolicy::from_json(&json.to_string()).unwrap();
        let repayments = LoanRepaymentHandler::new(loans.clone(), &policy);
        assert_eq!(repayments.overpayment_policy(), OverpaymentPolicy::Reject);
        let result = repayments
            .repay(&RepaymentInstruction {
                loan_id,
                amount: Money::from_decimal(dec!(400000)),
                payment_date: date(2024, 1, 1),
            })
            .await;
        assert!(matches!(result, Err(LendingError::Overpayment { .. })));

        // nothing was written
        let loan = loans.get(loan_id).await.unwrap().unwrap();
        assert_eq!(loan.outstanding_principal, Money::from_major(365_000));
    }

    #[tokio::test]
    async fn test_journal_posting_validates() {
        let ledger = InMemoryLedgerRepository::new();
        let handler = JournalPostingHandler::new(Arc::new(ledger.clone()));

        let unbalanced = JournalEntry {
            reference: "JE-9".to_string(),
            posting_date: date(2024, 1, 1),
            description: "bad".to_string(),
            lines: vec![
                JournalLine {
                    account_code: "1400".to_string(),
                    debit: Money::from_major(10),
                    credit: Money::ZERO,
                },
                JournalLine {
                    account_code: "1000".to_string(),
                    debit: Money::ZERO,
                    credit: Money::from_major(9),
                },
            ],
        };
        assert!(handler.post(unbalanced).await.is_err());
        assert!(ledger.entries().await.unwrap().is_empty());
    }
}
