pub mod dispatch;
pub mod engine;
pub mod in_memory;
pub mod ports;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{LendingError, Result};
use crate::types::{ExecutionStatus, OperationKind, Priority, TransactionId, TransactionStatus};

pub use dispatch::{DispatchRegistry, DispatchRegistryBuilder, TransactionHandler};
pub use engine::{MakerCheckerEngine, RetryReport};
pub use in_memory::{InMemoryTransactionRepository, LoggingNotifier};
pub use ports::{
    Notifier, ReferenceGenerator, SequenceReferenceGenerator, TransactionRepository,
    UuidV7ReferenceGenerator,
};

/// execution bookkeeping for an approved transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub status: ExecutionStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub executed_at: Option<DateTime<Utc>>,
}

impl ExecutionRecord {
    /// an in-progress claim nobody has finished within the lease
    pub fn claim_expired(&self, now: DateTime<Utc>, lease: Duration) -> bool {
        self.status == ExecutionStatus::InProgress
            && self.last_attempt_at.map_or(true, |claimed_at| now >= claimed_at + lease)
    }
}

impl Default for ExecutionRecord {
    fn default() -> Self {
        Self {
            status: ExecutionStatus::NotExecuted,
            attempts: 0,
            last_error: None,
            last_attempt_at: None,
            executed_at: None,
        }
    }
}

/// a proposed mutation waiting for, or past, dual-control approval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MakerCheckerTransaction {
    pub id: TransactionId,
    pub reference: String,
    pub tenant_id: String,
    pub kind: OperationKind,
    pub entity_id: String,
    pub payload: serde_json::Value,
    pub amount: Option<Money>,
    pub priority: Priority,
    pub maker_id: String,
    pub made_at: DateTime<Utc>,
    pub checker_id: Option<String>,
    pub checked_at: Option<DateTime<Utc>>,
    pub checker_comments: Option<String>,
    pub rejection_reason: Option<String>,
    pub status: TransactionStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub execution: ExecutionRecord,
    /// optimistic concurrency token, bumped on every stored change
    pub version: u64,
}

impl MakerCheckerTransaction {
    pub fn entity_name(&self) -> &'static str {
        self.kind.entity_name()
    }

    pub fn operation_name(&self) -> &'static str {
        self.kind.operation_name()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| now >= at).unwrap_or(false)
    }

    /// approved, but the change has not been applied yet
    pub fn awaiting_execution(&self) -> bool {
        self.status == TransactionStatus::Approved && self.execution.status != ExecutionStatus::Succeeded
    }

    /// decode the request payload
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

/// what a maker submits
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransactionRequest {
    pub tenant_id: String,
    pub kind: OperationKind,
    pub entity_id: String,
    pub payload: serde_json::Value,
    pub amount: Option<Money>,
    pub priority: Priority,
    pub maker_id: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewTransactionRequest {
    pub fn new<P: Serialize>(
        tenant_id: impl Into<String>,
        kind: OperationKind,
        entity_id: impl Into<String>,
        maker_id: impl Into<String>,
        payload: &P,
    ) -> Result<Self> {
        Ok(Self {
            tenant_id: tenant_id.into(),
            kind,
            entity_id: entity_id.into(),
            payload: serde_json::to_value(payload)?,
            amount: None,
            priority: Priority::default(),
            maker_id: maker_id.into(),
            expires_at: None,
        })
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.tenant_id.trim().is_empty() {
            return Err(LendingError::invalid_argument("tenant id is required"));
        }
        if self.maker_id.trim().is_empty() {
            return Err(LendingError::invalid_argument("maker id is required"));
        }
        if let Some(amount) = self.amount {
            if amount.is_negative() {
                return Err(LendingError::invalid_argument(format!(
                    "transaction amount cannot be negative, got {amount}"
                )));
            }
        }
        Ok(())
    }
}
