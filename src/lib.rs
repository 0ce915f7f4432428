pub mod config;
pub mod decimal;
pub mod eligibility;
pub mod errors;
pub mod events;
pub mod interest;
pub mod loans;
pub mod payments;
pub mod types;
pub mod workflow;

// re-export key types
pub use config::{LendingPolicy, WorkflowConfig};
pub use decimal::{Money, Rate};
pub use eligibility::{EligibilityChecker, EligibilityDetails, EligibilityResult, MemberProfile};
pub use errors::{LendingError, Result};
pub use events::{Event, EventStore};
pub use interest::{
    accrue_simple_interest, calculate_penalty, calculate_total_interest, PenaltyCalculation, PenaltyConfig,
    PenaltyEngine,
};
pub use loans::{
    DisbursementInstruction, JournalEntry, JournalLine, LoanAccount, LoanOperationsService, RepaymentInstruction,
    Submission,
};
pub use payments::{
    allocate_payment, calculate_early_repayment, calculate_early_repayment_amount, calculate_emi,
    AmortizationEntry, AmortizationSchedule, EarlyRepaymentRequest, EarlyRepaymentResult, LoanCalculationInput,
    PaymentAllocation,
};
pub use types::{
    ExecutionStatus, LoanId, LoanStatus, LoanType, OperationKind, OverpaymentPolicy, Priority, TransactionId,
    TransactionStatus,
};
pub use workflow::{
    DispatchRegistry, MakerCheckerEngine, MakerCheckerTransaction, NewTransactionRequest, Notifier,
    TransactionHandler, TransactionRepository,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
