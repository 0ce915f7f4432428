/// maker-checker - a material disbursement waits for a second officer
use std::sync::Arc;

use coop_lending_core::chrono::{NaiveDate, Utc};
use coop_lending_core::loans::{
    InMemoryLedgerRepository, InMemoryLoanRepository, JournalPostingHandler, LoanDisbursementHandler,
    LoanRepaymentHandler, LoanRepository,
};
use coop_lending_core::workflow::{InMemoryTransactionRepository, LoggingNotifier};
use coop_lending_core::{
    DisbursementInstruction, DispatchRegistry, LendingPolicy, LoanAccount, LoanOperationsService, LoanType, MakerCheckerEngine,
    Money, OperationKind, Priority, Rate, SafeTimeProvider, Submission, TimeSource, Uuid,
    WorkflowConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let loans = Arc::new(InMemoryLoanRepository::new());
    let loan_repo: Arc<dyn LoanRepository> = loans.clone();

    let disbursements = Arc::new(LoanDisbursementHandler::new(loan_repo.clone()));
    let policy = LendingPolicy::default();
    let repayments = Arc::new(LoanRepaymentHandler::new(loan_repo.clone(), &policy));
    let journals = Arc::new(JournalPostingHandler::new(Arc::new(InMemoryLedgerRepository::new())));

    let registry = DispatchRegistry::builder()
        .register(OperationKind::LoanDisbursement, disbursements.clone())?
        .register(OperationKind::LoanRepayment, repayments.clone())?
        .register(OperationKind::JournalPosting, journals.clone())?
        .build()?;

    let time = Arc::new(SafeTimeProvider::new(TimeSource::Test(Utc::now())));
    let engine = Arc::new(MakerCheckerEngine::new(
        Arc::new(InMemoryTransactionRepository::new()),
        Arc::new(LoggingNotifier),
        registry,
        time,
        WorkflowConfig::default(),
    )?);
    let service = LoanOperationsService::new(loan_repo.clone(), engine.clone(), disbursements, repayments, journals);

    // a car loan above the materiality threshold
    let loan = LoanAccount::approved(
        Uuid::now_v7(),
        "coop-1",
        "M-001",
        LoanType::Car,
        Money::from_major(2_400_000),
        Rate::from_percentage(14),
        36,
    );
    loans.insert(loan.clone()).await?;

    let instruction = DisbursementInstruction {
        loan_id: loan.loan_id,
        disbursement_date: NaiveDate::from_ymd_opt(2024, 7, 1).ok_or("bad date")?,
        first_payment_date: NaiveDate::from_ymd_opt(2024, 8, 1).ok_or("bad date")?,
    };

    match service
        .submit_disbursement("coop-1", "loan-officer", instruction, Priority::High)
        .await?
    {
        Submission::PendingApproval(tx) => {
            println!("{} waiting for approval", tx.reference);
            for pending in engine.get_pending_transactions("coop-1", Some("branch-manager")).await? {
                println!("  pending: {} {} {:?}", pending.reference, pending.kind, pending.amount);
            }

            let approved = engine.approve_transaction(tx.id, "branch-manager", Some("docs verified")).await?;
            println!("approved: {approved}");

            if let Some(status) = engine.get_transaction(tx.id).await? {
                println!("execution: {:?}", status.execution.status);
            }
        }
        Submission::Applied(loan) => println!("applied directly: {:?}", loan.status),
    }

    if let Some(loan) = loans.get(loan.loan_id).await? {
        if let Some(schedule) = &loan.schedule {
            println!("loan {:?}, EMI {}", loan.status, schedule.emi);
        }
    }

    Ok(())
}
