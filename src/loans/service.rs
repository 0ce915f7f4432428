use std::sync::Arc;

use log::info;
use tokio::sync::Mutex;

use crate::decimal::Money;
use crate::errors::{LendingError, Result};
use crate::events::{Event, EventStore};
use crate::payments::PaymentAllocation;
use crate::types::{LoanId, OperationKind, Priority};
use crate::workflow::{MakerCheckerEngine, MakerCheckerTransaction, NewTransactionRequest};

use super::{
    DisbursementInstruction, JournalEntry, JournalPostingHandler, LoanAccount, LoanDisbursementHandler,
    LoanRepaymentHandler, LoanRepository, RepaymentInstruction,
};

/// outcome of submitting an operation
#[derive(Debug, Clone, PartialEq)]
pub enum Submission<T> {
    /// below the materiality threshold, applied immediately
    Applied(T),
    /// waiting for a checker
    PendingApproval(MakerCheckerTransaction),
}

impl<T> Submission<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Submission::PendingApproval(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Submission::Applied(value) => Some(value),
            Submission::PendingApproval(_) => None,
        }
    }
}

/// Front door for loan mutations. Material amounts go through dual control,
/// everything else is applied straight away by the same handlers the
/// workflow dispatches to.
pub struct LoanOperationsService {
    loans: Arc<dyn LoanRepository>,
    engine: Arc<MakerCheckerEngine>,
    disbursements: Arc<LoanDisbursementHandler>,
    repayments: Arc<LoanRepaymentHandler>,
    journals: Arc<JournalPostingHandler>,
    events: Mutex<EventStore>,
}

impl LoanOperationsService {
    pub fn new(
        loans: Arc<dyn LoanRepository>,
        engine: Arc<MakerCheckerEngine>,
        disbursements: Arc<LoanDisbursementHandler>,
        repayments: Arc<LoanRepaymentHandler>,
        journals: Arc<JournalPostingHandler>,
    ) -> Self {
        Self {
            loans,
            engine,
            disbursements,
            repayments,
            journals,
            events: Mutex::new(EventStore::new()),
        }
    }

    pub fn engine(&self) -> &Arc<MakerCheckerEngine> {
        &self.engine
    }

    /// drain events for operations applied without approval
    pub async fn take_events(&self) -> Vec<Event> {
        self.events.lock().await.take_events()
    }

    pub async fn submit_disbursement(
        &self,
        tenant_id: &str,
        maker_id: &str,
        instruction: DisbursementInstruction,
        priority: Priority,
    ) -> Result<Submission<LoanAccount>> {
        let loan = self.load_loan(instruction.loan_id).await?;

        if self.engine.config().requires_approval(loan.principal) {
            let request = NewTransactionRequest::new(
                tenant_id,
                OperationKind::LoanDisbursement,
                loan.loan_id.to_string(),
                maker_id,
                &instruction,
            )?
            .with_amount(loan.principal)
            .with_priority(priority);
            return self.hold_for_approval(request).await;
        }

        let loan = self.disbursements.disburse(&instruction).await?;
        self.events.lock().await.emit(Event::LoanDisbursed {
            loan_id: loan.loan_id,
            amount: loan.principal,
            disbursement_date: instruction.disbursement_date,
        });
        Ok(Submission::Applied(loan))
    }

    pub async fn submit_repayment(
        &self,
        tenant_id: &str,
        maker_id: &str,
        instruction: RepaymentInstruction,
        priority: Priority,
    ) -> Result<Submission<(LoanAccount, PaymentAllocation)>> {
        if !instruction.amount.is_positive() {
            return Err(LendingError::invalid_argument(format!(
                "repayment amount must be positive, got {}",
                instruction.amount
            )));
        }
        // fail fast on unknown loans rather than at execution time
        self.load_loan(instruction.loan_id).await?;

        if self.engine.config().requires_approval(instruction.amount) {
            let request = NewTransactionRequest::new(
                tenant_id,
                OperationKind::LoanRepayment,
                instruction.loan_id.to_string(),
                maker_id,
                &instruction,
            )?
            .with_amount(instruction.amount)
            .with_priority(priority);
            return self.hold_for_approval(request).await;
        }

        let (loan, allocation) = self.repayments.repay(&instruction).await?;
        self.events.lock().await.emit(Event::RepaymentApplied {
            loan_id: loan.loan_id,
            amount: instruction.amount,
            to_interest: allocation.interest_payment,
            to_principal: allocation.principal_payment,
            payment_date: instruction.payment_date,
        });
        Ok(Submission::Applied((loan, allocation)))
    }

    pub async fn submit_journal_entry(
        &self,
        tenant_id: &str,
        maker_id: &str,
        entry: JournalEntry,
        priority: Priority,
    ) -> Result<Submission<Money>> {
        entry.validate()?;
        let amount = entry.total_debits();

        if self.engine.config().requires_approval(amount) {
            let request = NewTransactionRequest::new(
                tenant_id,
                OperationKind::JournalPosting,
                entry.reference.clone(),
                maker_id,
                &entry,
            )?
            .with_amount(amount)
            .with_priority(priority);
            return self.hold_for_approval(request).await;
        }

        let (reference, posting_date) = (entry.reference.clone(), entry.posting_date);
        self.journals.post(entry).await?;
        self.events.lock().await.emit(Event::JournalPosted {
            reference,
            posting_date,
            amount,
        });
        Ok(Submission::Applied(amount))
    }

    async fn hold_for_approval<T>(&self, request: NewTransactionRequest) -> Result<Submission<T>> {
        let transaction = self.engine.create_transaction(request).await?;
        info!(
            "{} of {:?} held for approval as {}",
            transaction.kind, transaction.amount, transaction.reference
        );
        Ok(Submission::PendingApproval(transaction))
    }

    async fn load_loan(&self, loan_id: LoanId) -> Result<LoanAccount> {
        self.loans.get(loan_id).await?.ok_or_else(|| LendingError::NotFound {
            entity: "Loan".to_string(),
            id: loan_id.to_string(),
        })
    }
}
