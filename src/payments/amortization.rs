use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate, CURRENCY_DP};
use crate::errors::{LendingError, Result};

/// longest tenor accepted, 100 years
pub const MAX_TENOR_MONTHS: u32 = 1200;

/// inputs for a single schedule calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanCalculationInput {
    pub principal: Money,
    pub annual_rate: Rate,
    pub tenor_months: u32,
    pub disbursement_date: NaiveDate,
    pub first_payment_date: NaiveDate,
}

impl LoanCalculationInput {
    pub fn new(
        principal: Money,
        annual_rate: Rate,
        tenor_months: u32,
        disbursement_date: NaiveDate,
        first_payment_date: NaiveDate,
    ) -> Result<Self> {
        let input = Self {
            principal,
            annual_rate,
            tenor_months,
            disbursement_date,
            first_payment_date,
        };
        input.validate()?;
        Ok(input)
    }

    pub fn validate(&self) -> Result<()> {
        validate_loan_terms(self.principal, self.annual_rate, self.tenor_months)?;
        if self.first_payment_date < self.disbursement_date {
            return Err(LendingError::invalid_argument(format!(
                "first payment {} precedes disbursement {}",
                self.first_payment_date, self.disbursement_date
            )));
        }
        Ok(())
    }
}

/// one installment row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationEntry {
    pub installment_number: u32,
    pub due_date: NaiveDate,
    pub opening_balance: Money,
    pub principal_due: Money,
    pub interest_due: Money,
    pub total_due: Money,
    pub closing_balance: Money,
}

/// amortization schedule under the reducing-balance method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationSchedule {
    pub input: LoanCalculationInput,
    pub emi: Money,
    pub entries: Vec<AmortizationEntry>,
    pub total_interest: Money,
    pub total_payment: Money,
}

impl AmortizationSchedule {
    /// generate payment schedule
    pub fn generate(input: &LoanCalculationInput) -> Result<Self> {
        input.validate()?;

        let emi = calculate_emi(input.principal, input.annual_rate, input.tenor_months)?;
        let monthly_rate = input.annual_rate.monthly_rate().as_decimal();

        let mut entries = Vec::with_capacity(input.tenor_months as usize);
        let mut balance = input.principal;

        for number in 1..=input.tenor_months {
            let due_date = due_date_for(input.first_payment_date, number)?;
            let interest_due = Money::from_decimal(balance.as_decimal() * monthly_rate).round_currency();

            // last row absorbs whatever rounding left behind
            let principal_due = if number == input.tenor_months {
                balance
            } else {
                (emi - interest_due).max(Money::ZERO).min(balance)
            };

            let closing_balance = balance - principal_due;

            entries.push(AmortizationEntry {
                installment_number: number,
                due_date,
                opening_balance: balance,
                principal_due,
                interest_due,
                total_due: principal_due + interest_due,
                closing_balance,
            });

            balance = closing_balance;
        }

        let total_interest = entries.iter().map(|e| e.interest_due).sum();
        let total_payment = entries.iter().map(|e| e.total_due).sum();

        Ok(Self {
            input: input.clone(),
            emi,
            entries,
            total_interest,
            total_payment,
        })
    }

    /// get installment by 1-based number
    pub fn entry(&self, installment_number: u32) -> Option<&AmortizationEntry> {
        installment_number
            .checked_sub(1)
            .and_then(|idx| self.entries.get(idx as usize))
    }

    /// balance remaining after an installment; the full principal before the first
    pub fn balance_after(&self, installment_number: u32) -> Money {
        self.entry(installment_number)
            .map(|e| e.closing_balance)
            .unwrap_or(self.input.principal)
    }

    pub fn maturity_date(&self) -> Option<NaiveDate> {
        self.entries.last().map(|e| e.due_date)
    }

    pub fn total_principal(&self) -> Money {
        self.entries.iter().map(|e| e.principal_due).sum()
    }
}

pub(crate) fn validate_loan_terms(principal: Money, annual_rate: Rate, tenor_months: u32) -> Result<()> {
    if !principal.is_positive() {
        return Err(LendingError::invalid_argument(format!(
            "principal must be positive, got {principal}"
        )));
    }
    if principal != principal.round_currency() {
        return Err(LendingError::invalid_argument(format!(
            "principal {principal} has more than {CURRENCY_DP} decimal places"
        )));
    }
    if tenor_months == 0 || tenor_months > MAX_TENOR_MONTHS {
        return Err(LendingError::invalid_argument(format!(
            "tenor must be between 1 and {MAX_TENOR_MONTHS} months, got {tenor_months}"
        )));
    }
    if annual_rate.is_negative() {
        return Err(LendingError::invalid_argument(format!(
            "annual rate cannot be negative, got {annual_rate}"
        )));
    }
    Ok(())
}

/// Equated monthly installment under the reducing-balance method.
///
/// `EMI = P * r * (1 + r)^n / ((1 + r)^n - 1)` with `r` the monthly rate,
/// or `P / n` when the rate is zero. Rounded half-up to the currency unit.
pub fn calculate_emi(principal: Money, annual_rate: Rate, tenor_months: u32) -> Result<Money> {
    validate_loan_terms(principal, annual_rate, tenor_months)?;

    if annual_rate.is_zero() {
        return Ok((principal / Decimal::from(tenor_months)).round_currency());
    }

    let r = annual_rate.monthly_rate().as_decimal();
    let base = Decimal::ONE + r;

    let mut compound = Decimal::ONE;
    for _ in 0..tenor_months {
        compound = compound.checked_mul(base).ok_or_else(|| LendingError::CalculationError {
            message: format!("compound factor overflow at {tenor_months} months"),
        })?;
    }

    let numerator = principal
        .as_decimal()
        .checked_mul(r)
        .and_then(|v| v.checked_mul(compound))
        .ok_or_else(|| LendingError::CalculationError {
            message: format!("installment overflow for principal {principal}"),
        })?;
    let denominator = compound - Decimal::ONE;
    if denominator.is_zero() {
        return Err(LendingError::CalculationError {
            message: "rate too small to amortize".to_string(),
        });
    }

    Ok(Money::from_decimal(numerator / denominator).round_currency())
}

/// Due date of an installment, counted in calendar months from the first
/// payment date. Days past the end of a shorter month clamp to its last day,
/// and each date is derived from the first one so a clamp never drifts forward.
pub fn due_date_for(first_payment_date: NaiveDate, installment_number: u32) -> Result<NaiveDate> {
    let offset = installment_number.saturating_sub(1);
    first_payment_date
        .checked_add_months(Months::new(offset))
        .ok_or_else(|| LendingError::CalculationError {
            message: format!("due date out of range for installment {installment_number}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn input(principal: i64, rate: Rate, tenor: u32) -> LoanCalculationInput {
        LoanCalculationInput::new(
            Money::from_major(principal),
            rate,
            tenor,
            date(2024, 1, 1),
            date(2024, 2, 1),
        )
        .unwrap()
    }

    fn assert_schedule_invariants(schedule: &AmortizationSchedule) {
        let first = &schedule.entries[0];
        assert_eq!(first.opening_balance, schedule.input.principal);

        for (idx, entry) in schedule.entries.iter().enumerate() {
            assert_eq!(entry.installment_number, idx as u32 + 1);
            assert_eq!(entry.closing_balance, entry.opening_balance - entry.principal_due);
            assert_eq!(entry.total_due, entry.principal_due + entry.interest_due);
            assert!(entry.closing_balance <= entry.opening_balance);
            assert!(!entry.closing_balance.is_negative());
        }

        for pair in schedule.entries.windows(2) {
            assert_eq!(pair[0].closing_balance, pair[1].opening_balance);
        }

        assert_eq!(schedule.entries.last().unwrap().closing_balance, Money::ZERO);
        let drift = (schedule.total_principal() - schedule.input.principal).abs();
        assert!(drift <= Money::ONE);
    }

    #[test]
    fn test_emi_reference_value() {
        let emi = calculate_emi(Money::from_major(500_000), Rate::from_percentage(12), 12).unwrap();
        assert_eq!(emi, Money::from_decimal(dec!(44424.39)));
    }

    #[test]
    fn test_emi_zero_rate() {
        let emi = calculate_emi(Money::from_major(120_000), Rate::ZERO, 12).unwrap();
        assert_eq!(emi, Money::from_major(10_000));
    }

    #[test]
    fn test_emi_invalid_arguments() {
        let rate = Rate::from_percentage(12);
        assert!(matches!(
            calculate_emi(Money::ZERO, rate, 12),
            Err(LendingError::InvalidArgument { .. })
        ));
        assert!(matches!(
            calculate_emi(Money::from_major(-10), rate, 12),
            Err(LendingError::InvalidArgument { .. })
        ));
        assert!(matches!(
            calculate_emi(Money::from_major(1_000), rate, 0),
            Err(LendingError::InvalidArgument { .. })
        ));
        assert!(matches!(
            calculate_emi(Money::from_major(1_000), Rate::from_decimal(dec!(-0.01)), 12),
            Err(LendingError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_sub_cent_principal_rejected() {
        let principal = Money::from_decimal(dec!(1000.005));
        assert!(matches!(
            calculate_emi(principal, Rate::from_percentage(12), 12),
            Err(LendingError::InvalidArgument { .. })
        ));
        let result = LoanCalculationInput::new(principal, Rate::from_percentage(12), 12, date(2024, 1, 1), date(2024, 2, 1));
        assert!(matches!(result, Err(LendingError::InvalidArgument { .. })));

        // whole cents are fine and row one opens on the exact principal
        let schedule = AmortizationSchedule::generate(
            &LoanCalculationInput::new(
                Money::from_decimal(dec!(1000.01)),
                Rate::from_percentage(12),
                12,
                date(2024, 1, 1),
                date(2024, 2, 1),
            )
            .unwrap(),
        )
        .unwrap();
        assert_eq!(schedule.entries[0].opening_balance, Money::from_decimal(dec!(1000.01)));
        assert_eq!(schedule.total_principal(), Money::from_decimal(dec!(1000.01)));
    }

    #[test]
    fn test_tenor_is_capped() {
        assert!(calculate_emi(Money::from_major(1_000), Rate::ZERO, MAX_TENOR_MONTHS).is_ok());
        assert!(matches!(
            calculate_emi(Money::from_major(1_000), Rate::ZERO, MAX_TENOR_MONTHS + 1),
            Err(LendingError::InvalidArgument { .. })
        ));
        assert!(matches!(
            calculate_emi(Money::from_major(1_000), Rate::ZERO, u32::MAX),
            Err(LendingError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_schedule_closes_to_zero() {
        let schedule = AmortizationSchedule::generate(&input(500_000, Rate::from_percentage(12), 12)).unwrap();
        assert_eq!(schedule.entries.len(), 12);
        assert_eq!(schedule.emi, Money::from_decimal(dec!(44424.39)));
        assert_eq!(schedule.entries[0].interest_due, Money::from_major(5_000));
        assert_eq!(schedule.entries[0].principal_due, Money::from_decimal(dec!(39424.39)));
        assert_schedule_invariants(&schedule);
    }

    #[test]
    fn test_schedule_invariants_across_inputs() {
        let cases = [
            (100_000, Rate::from_percentage_decimal(dec!(13.5)), 7),
            (1_000, Rate::from_percentage(36), 24),
            (2_500_000, Rate::from_percentage(18), 60),
            (99_999, Rate::from_percentage_decimal(dec!(9.99)), 360),
            (100_000, Rate::ZERO, 3),
        ];

        for (principal, rate, tenor) in cases {
            let schedule = AmortizationSchedule::generate(&input(principal, rate, tenor)).unwrap();
            assert_eq!(schedule.entries.len(), tenor as usize);
            assert_schedule_invariants(&schedule);
        }
    }

    #[test]
    fn test_zero_rate_last_row_absorbs_remainder() {
        let schedule = AmortizationSchedule::generate(&input(100_000, Rate::ZERO, 3)).unwrap();
        assert_eq!(schedule.emi, Money::from_decimal(dec!(33333.33)));
        assert_eq!(schedule.entries[2].principal_due, Money::from_decimal(dec!(33333.34)));
        assert_eq!(schedule.total_interest, Money::ZERO);
    }

    #[test]
    fn test_total_interest_matches_schedule() {
        let schedule = AmortizationSchedule::generate(&input(500_000, Rate::from_percentage(12), 12)).unwrap();
        let formula = crate::interest::calculate_total_interest(schedule.emi, 12, Money::from_major(500_000)).unwrap();
        assert!((formula - schedule.total_interest).abs() <= Money::ONE);
    }

    #[test]
    fn test_due_dates_clamp_to_month_end() {
        let first = date(2024, 1, 31);
        assert_eq!(due_date_for(first, 1).unwrap(), date(2024, 1, 31));
        assert_eq!(due_date_for(first, 2).unwrap(), date(2024, 2, 29));
        assert_eq!(due_date_for(first, 3).unwrap(), date(2024, 3, 31));
        assert_eq!(due_date_for(first, 4).unwrap(), date(2024, 4, 30));
        assert_eq!(due_date_for(date(2023, 1, 31), 2).unwrap(), date(2023, 2, 28));
    }

    #[test]
    fn test_schedule_due_dates() {
        let input = LoanCalculationInput::new(
            Money::from_major(12_000),
            Rate::from_percentage(10),
            4,
            date(2024, 1, 15),
            date(2024, 1, 31),
        )
        .unwrap();
        let schedule = AmortizationSchedule::generate(&input).unwrap();
        let dates: Vec<NaiveDate> = schedule.entries.iter().map(|e| e.due_date).collect();
        assert_eq!(
            dates,
            vec![date(2024, 1, 31), date(2024, 2, 29), date(2024, 3, 31), date(2024, 4, 30)]
        );
        assert_eq!(schedule.maturity_date(), Some(date(2024, 4, 30)));
    }

    #[test]
    fn test_first_payment_before_disbursement_rejected() {
        let result = LoanCalculationInput::new(
            Money::from_major(1_000),
            Rate::from_percentage(10),
            12,
            date(2024, 3, 1),
            date(2024, 2, 1),
        );
        assert!(matches!(result, Err(LendingError::InvalidArgument { .. })));
    }

    #[test]
    fn test_entry_accessors() {
        let schedule = AmortizationSchedule::generate(&input(500_000, Rate::from_percentage(12), 12)).unwrap();
        assert!(schedule.entry(0).is_none());
        assert!(schedule.entry(13).is_none());
        assert_eq!(schedule.balance_after(0), Money::from_major(500_000));
        assert_eq!(schedule.balance_after(12), Money::ZERO);
        assert_eq!(schedule.entry(2).unwrap().opening_balance, schedule.balance_after(1));
    }
}
