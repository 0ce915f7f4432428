use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{LendingError, Result};
use crate::interest::PenaltyConfig;
use crate::types::OverpaymentPolicy;

/// lending rules applied by eligibility checks and repayments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LendingPolicy {
    /// minimum months of membership before a member may borrow
    pub min_membership_months: u32,
    /// ceiling on (existing deductions + new EMI) / net monthly salary
    pub max_deduction_rate: Rate,
    /// ceiling on (outstanding loans + new loan) / monthly income
    pub max_debt_to_income: Decimal,
    pub overpayment_policy: OverpaymentPolicy,
    pub penalty: PenaltyConfig,
}

impl Default for LendingPolicy {
    fn default() -> Self {
        Self {
            min_membership_months: 6,
            max_deduction_rate: Rate::from_percentage(45),
            max_debt_to_income: dec!(24),
            overpayment_policy: OverpaymentPolicy::CreditAsOverpayment,
            penalty: PenaltyConfig::default(),
        }
    }
}

impl LendingPolicy {
    pub fn from_json(json: &str) -> Result<Self> {
        let policy: LendingPolicy = serde_json::from_str(json)?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_deduction_rate <= Rate::ZERO || self.max_deduction_rate > Rate::ONE {
            return Err(LendingError::InvalidConfiguration {
                message: format!("max_deduction_rate must be in (0, 100%], got {}", self.max_deduction_rate),
            });
        }
        if self.max_debt_to_income <= Decimal::ZERO {
            return Err(LendingError::InvalidConfiguration {
                message: "max_debt_to_income must be positive".to_string(),
            });
        }
        if self.penalty.daily_rate.is_negative() {
            return Err(LendingError::InvalidConfiguration {
                message: "penalty daily_rate cannot be negative".to_string(),
            });
        }
        Ok(())
    }
}

/// maker-checker workflow settings; missing keys take their defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// operations at or above this amount need a second approver
    pub materiality_threshold: Money,
    /// hours a pending transaction stays approvable, None for no expiry
    pub default_expiry_hours: Option<i64>,
    /// execution attempts before a transaction is dead-lettered
    pub max_execution_attempts: u32,
    /// seconds an execution claim is honoured before another caller may take it over
    pub execution_lease_seconds: i64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            materiality_threshold: Money::from_major(1_000_000),
            default_expiry_hours: Some(72),
            max_execution_attempts: 3,
            execution_lease_seconds: 300,
        }
    }
}

impl WorkflowConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: WorkflowConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_execution_attempts == 0 {
            return Err(LendingError::InvalidConfiguration {
                message: "max_execution_attempts must be at least 1".to_string(),
            });
        }
        if self.materiality_threshold.is_negative() {
            return Err(LendingError::InvalidConfiguration {
                message: "materiality_threshold cannot be negative".to_string(),
            });
        }
        if self.execution_lease_seconds <= 0 {
            return Err(LendingError::InvalidConfiguration {
                message: format!(
                    "execution_lease_seconds must be positive, got {}",
                    self.execution_lease_seconds
                ),
            });
        }
        if let Some(hours) = self.default_expiry_hours {
            if hours <= 0 {
                return Err(LendingError::InvalidConfiguration {
                    message: format!("default_expiry_hours must be positive, got {hours}"),
                });
            }
        }
        Ok(())
    }

    pub fn default_expiry(&self) -> Option<Duration> {
        self.default_expiry_hours.map(Duration::hours)
    }

    pub fn execution_lease(&self) -> Duration {
        Duration::seconds(self.execution_lease_seconds)
    }

    /// whether an operation of this size must go through maker-checker
    pub fn requires_approval(&self, amount: Money) -> bool {
        amount >= self.materiality_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_valid() {
        let policy = LendingPolicy::default();
        assert!(policy.validate().is_ok());
        assert_eq!(policy.min_membership_months, 6);
        assert_eq!(policy.max_deduction_rate, Rate::from_percentage(45));
    }

    #[test]
    fn test_policy_json_round() {
        let json = serde_json::to_string(&LendingPolicy::default()).unwrap();
        let parsed = LendingPolicy::from_json(&json).unwrap();
        assert_eq!(parsed.max_debt_to_income, dec!(24));
        assert_eq!(parsed.overpayment_policy, OverpaymentPolicy::CreditAsOverpayment);
    }

    #[test]
    fn test_policy_rejects_bad_deduction_rate() {
        let mut policy = LendingPolicy::default();
        policy.max_deduction_rate = Rate::from_percentage(150);
        assert!(matches!(policy.validate(), Err(LendingError::InvalidConfiguration { .. })));
    }

    #[test]
    fn test_workflow_config_validation() {
        let mut config = WorkflowConfig::default();
        assert!(config.validate().is_ok());

        config.max_execution_attempts = 0;
        assert!(config.validate().is_err());

        config.max_execution_attempts = 1;
        config.default_expiry_hours = Some(-1);
        assert!(config.validate().is_err());

        config.default_expiry_hours = None;
        config.execution_lease_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_workflow_config_partial_json() {
        let config = WorkflowConfig::from_json(r#"{"materiality_threshold": "250000"}"#).unwrap();
        assert_eq!(config.materiality_threshold, Money::from_major(250_000));
        assert_eq!(config.max_execution_attempts, 3);
        assert_eq!(config.execution_lease(), Duration::minutes(5));
    }

    #[test]
    fn test_materiality_threshold() {
        let config = WorkflowConfig {
            materiality_threshold: Money::from_major(500_000),
            ..WorkflowConfig::default()
        };
        assert!(!config.requires_approval(Money::from_major(499_999)));
        assert!(config.requires_approval(Money::from_major(500_000)));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            WorkflowConfig::from_json("{ not json"),
            Err(LendingError::Serialization(_))
        ));
    }
}
