pub mod allocation;
pub mod amortization;
pub mod early_repayment;

pub use allocation::{allocate_payment, PaymentAllocation};
pub use amortization::{
    calculate_emi, due_date_for, AmortizationEntry, AmortizationSchedule, LoanCalculationInput,
};
pub use early_repayment::{
    calculate_early_repayment, calculate_early_repayment_amount, EarlyRepaymentRequest,
    EarlyRepaymentResult,
};
