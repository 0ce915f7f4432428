use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::LendingPolicy;
use crate::decimal::{Money, Rate};
use crate::errors::{LendingError, Result};
use crate::payments::calculate_emi;
use crate::types::LoanType;

/// member figures the eligibility rules look at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberProfile {
    pub member_id: String,
    pub total_savings: Money,
    pub membership_start: NaiveDate,
    pub net_monthly_salary: Money,
    pub existing_monthly_deductions: Money,
    pub total_outstanding_loans: Money,
    pub monthly_income: Money,
}

/// figures computed while checking, reported whether or not the member qualifies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityDetails {
    pub required_savings: Money,
    pub actual_savings: Money,
    pub membership_months: u32,
    pub required_membership_months: u32,
    pub proposed_emi: Money,
    /// None when the member has no salary to deduct from
    pub deduction_rate: Option<Rate>,
    pub max_deduction_rate: Rate,
    /// room left for a new installment under the deduction ceiling
    pub deduction_headroom: Money,
    pub debt_to_income: Option<Decimal>,
    pub max_debt_to_income: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityResult {
    pub is_eligible: bool,
    pub reasons: Vec<String>,
    pub details: EligibilityDetails,
}

/// runs every eligibility rule and collects all failures
pub struct EligibilityChecker {
    policy: LendingPolicy,
}

impl EligibilityChecker {
    pub fn new(policy: LendingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &LendingPolicy {
        &self.policy
    }

    /// Check a loan request against savings, tenure, deduction and
    /// debt-to-income rules. Every rule runs; the member is eligible only
    /// when none of them adds a reason.
    pub fn check_eligibility(
        &self,
        member: &MemberProfile,
        loan_amount: Money,
        loan_type: LoanType,
        tenor_months: u32,
        interest_rate: Rate,
        as_of: NaiveDate,
    ) -> Result<EligibilityResult> {
        let proposed_emi = calculate_emi(loan_amount, interest_rate, tenor_months)?;
        if as_of < member.membership_start {
            return Err(LendingError::invalid_argument(format!(
                "assessment date {as_of} precedes membership start {}",
                member.membership_start
            )));
        }

        let mut reasons = Vec::new();

        // savings multiplier
        let required_savings = (loan_amount / loan_type.savings_multiplier()).round_currency();
        if member.total_savings < required_savings {
            reasons.push(format!(
                "savings of {} are below the {} required for a {:?} loan of {}",
                member.total_savings, required_savings, loan_type, loan_amount
            ));
        }

        // membership tenure
        let membership_months = months_between(member.membership_start, as_of);
        if membership_months < self.policy.min_membership_months {
            reasons.push(format!(
                "membership of {} months is below the required {} months",
                membership_months, self.policy.min_membership_months
            ));
        }

        // salary deduction ceiling
        let max_deduction_rate = self.policy.max_deduction_rate;
        let total_deductions = member.existing_monthly_deductions + proposed_emi;
        let (deduction_rate, deduction_headroom) = match total_deductions.ratio_to(member.net_monthly_salary) {
            Some(ratio) if member.net_monthly_salary.is_positive() => {
                let allowed = (member.net_monthly_salary * max_deduction_rate.as_decimal()).round_currency();
                let headroom = (allowed - member.existing_monthly_deductions).max(Money::ZERO);
                let rate = Rate::from_decimal(ratio);
                if rate > max_deduction_rate {
                    reasons.push(format!(
                        "monthly deductions of {} would be {:.2}% of net salary, above the {} ceiling (headroom {})",
                        total_deductions,
                        rate.as_percentage(),
                        max_deduction_rate,
                        headroom
                    ));
                }
                (Some(rate), headroom)
            }
            _ => {
                reasons.push("net monthly salary must be positive to assess deductions".to_string());
                (None, Money::ZERO)
            }
        };

        // debt to income
        let max_debt_to_income = self.policy.max_debt_to_income;
        let total_debt = member.total_outstanding_loans + loan_amount;
        let debt_to_income = match total_debt.ratio_to(member.monthly_income) {
            Some(ratio) if member.monthly_income.is_positive() => {
                if ratio > max_debt_to_income {
                    reasons.push(format!(
                        "debt of {} is {:.2}x monthly income, above the {}x ceiling",
                        total_debt, ratio, max_debt_to_income
                    ));
                }
                Some(ratio)
            }
            _ => {
                reasons.push("monthly income must be positive to assess debt-to-income".to_string());
                None
            }
        };

        Ok(EligibilityResult {
            is_eligible: reasons.is_empty(),
            reasons,
            details: EligibilityDetails {
                required_savings,
                actual_savings: member.total_savings,
                membership_months,
                required_membership_months: self.policy.min_membership_months,
                proposed_emi,
                deduction_rate,
                max_deduction_rate,
                deduction_headroom,
                debt_to_income,
                max_debt_to_income,
            },
        })
    }
}

/// whole calendar months from `start` to `end`
pub fn months_between(start: NaiveDate, end: NaiveDate) -> u32 {
    if end <= start {
        return 0;
    }
    let mut months = (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32;
    if end.day() < start.day() {
        months -= 1;
    }
    months.max(0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn member() -> MemberProfile {
        MemberProfile {
            member_id: "M-0042".to_string(),
            total_savings: Money::from_major(300_000),
            membership_start: date(2022, 1, 15),
            net_monthly_salary: Money::from_major(250_000),
            existing_monthly_deductions: Money::from_major(20_000),
            total_outstanding_loans: Money::from_major(100_000),
            monthly_income: Money::from_major(300_000),
        }
    }

    fn checker() -> EligibilityChecker {
        EligibilityChecker::new(LendingPolicy::default())
    }

    #[test]
    fn test_eligible_member() {
        let result = checker()
            .check_eligibility(
                &member(),
                Money::from_major(500_000),
                LoanType::Normal,
                12,
                Rate::from_percentage(12),
                date(2024, 6, 1),
            )
            .unwrap();

        assert!(result.is_eligible, "{:?}", result.reasons);
        assert!(result.reasons.is_empty());
        assert_eq!(result.details.required_savings, Money::from_major(250_000));
        assert_eq!(result.details.proposed_emi, Money::from_decimal(dec!(44424.39)));
        assert_eq!(result.details.membership_months, 28);
    }

    #[test]
    fn test_savings_multiplier_by_loan_type() {
        let mut poor_saver = member();
        poor_saver.total_savings = Money::from_major(150_000);

        let normal = checker()
            .check_eligibility(&poor_saver, Money::from_major(500_000), LoanType::Normal, 12, Rate::from_percentage(12), date(2024, 6, 1))
            .unwrap();
        assert!(!normal.is_eligible);
        assert_eq!(normal.reasons.len(), 1);
        assert!(normal.reasons[0].contains("savings"));

        let car = checker()
            .check_eligibility(&poor_saver, Money::from_major(500_000), LoanType::Car, 12, Rate::from_percentage(12), date(2024, 6, 1))
            .unwrap();
        assert_eq!(car.details.required_savings, Money::from_major(100_000));
        assert!(car.is_eligible, "{:?}", car.reasons);
    }

    #[test]
    fn test_all_failures_collected() {
        let applicant = MemberProfile {
            member_id: "M-0099".to_string(),
            total_savings: Money::from_major(10_000),
            membership_start: date(2024, 4, 1),
            net_monthly_salary: Money::from_major(50_000),
            existing_monthly_deductions: Money::from_major(15_000),
            total_outstanding_loans: Money::from_major(900_000),
            monthly_income: Money::from_major(50_000),
        };

        let result = checker()
            .check_eligibility(&applicant, Money::from_major(500_000), LoanType::Normal, 12, Rate::from_percentage(12), date(2024, 6, 1))
            .unwrap();

        assert!(!result.is_eligible);
        assert_eq!(result.reasons.len(), 4);
        assert!(result.reasons.iter().any(|r| r.contains("savings")));
        assert!(result.reasons.iter().any(|r| r.contains("membership")));
        assert!(result.reasons.iter().any(|r| r.contains("deductions")));
        assert!(result.reasons.iter().any(|r| r.contains("debt")));
        assert_eq!(result.details.deduction_headroom, Money::from_major(7_500));
    }

    #[test]
    fn test_zero_salary_fails_without_panicking() {
        let mut applicant = member();
        applicant.net_monthly_salary = Money::ZERO;
        applicant.monthly_income = Money::ZERO;

        let result = checker()
            .check_eligibility(&applicant, Money::from_major(100_000), LoanType::Normal, 12, Rate::from_percentage(12), date(2024, 6, 1))
            .unwrap();

        assert!(!result.is_eligible);
        assert_eq!(result.reasons.len(), 2);
        assert_eq!(result.details.deduction_rate, None);
        assert_eq!(result.details.debt_to_income, None);
    }

    #[test]
    fn test_invalid_loan_terms_propagate() {
        let result = checker().check_eligibility(
            &member(),
            Money::ZERO,
            LoanType::Normal,
            12,
            Rate::from_percentage(12),
            date(2024, 6, 1),
        );
        assert!(matches!(result, Err(LendingError::InvalidArgument { .. })));
    }

    #[test]
    fn test_months_between() {
        assert_eq!(months_between(date(2024, 1, 15), date(2024, 7, 14)), 5);
        assert_eq!(months_between(date(2024, 1, 15), date(2024, 7, 15)), 6);
        assert_eq!(months_between(date(2023, 11, 30), date(2024, 2, 29)), 2);
        assert_eq!(months_between(date(2024, 5, 1), date(2024, 1, 1)), 0);
    }
}
