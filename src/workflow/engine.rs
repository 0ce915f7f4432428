use std::sync::Arc;

use hourglass_rs::SafeTimeProvider;
use log::{debug, error, info, warn};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::WorkflowConfig;
use crate::errors::{LendingError, Result};
use crate::events::{Event, EventStore};
use crate::types::{ExecutionStatus, TransactionId, TransactionStatus};

use super::dispatch::DispatchRegistry;
use super::ports::{Notifier, ReferenceGenerator, TransactionRepository, UuidV7ReferenceGenerator};
use super::{ExecutionRecord, MakerCheckerTransaction, NewTransactionRequest};

/// outcome of a retry sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Dual-control workflow: a maker proposes, a different checker decides,
/// and only approved transactions are dispatched to their domain handler.
///
/// The approval decision is durable on its own. Execution is tracked in a
/// separate [`ExecutionRecord`] so a failed dispatch leaves the transaction
/// approved and retryable.
pub struct MakerCheckerEngine {
    repository: Arc<dyn TransactionRepository>,
    notifier: Arc<dyn Notifier>,
    registry: DispatchRegistry,
    references: Box<dyn ReferenceGenerator>,
    time: Arc<SafeTimeProvider>,
    config: WorkflowConfig,
    events: Mutex<EventStore>,
}

impl MakerCheckerEngine {
    pub fn new(
        repository: Arc<dyn TransactionRepository>,
        notifier: Arc<dyn Notifier>,
        registry: DispatchRegistry,
        time: Arc<SafeTimeProvider>,
        config: WorkflowConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            repository,
            notifier,
            registry,
            references: Box::new(UuidV7ReferenceGenerator),
            time,
            config,
            events: Mutex::new(EventStore::new()),
        })
    }

    pub fn with_reference_generator(mut self, references: Box<dyn ReferenceGenerator>) -> Self {
        self.references = references;
        self
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// drain audit events collected so far
    pub async fn take_events(&self) -> Vec<Event> {
        self.events.lock().await.take_events()
    }

    async fn emit(&self, event: Event) {
        self.events.lock().await.emit(event);
    }

    /// Record a maker's proposal as pending approval and tell the checkers.
    pub async fn create_transaction(&self, request: NewTransactionRequest) -> Result<MakerCheckerTransaction> {
        request.validate()?;
        if !self.registry.supports(request.kind) {
            return Err(LendingError::OperationNotRegistered { kind: request.kind });
        }

        let now = self.time.now();
        let expires_at = request
            .expires_at
            .or_else(|| self.config.default_expiry().map(|ttl| now + ttl));

        let transaction = MakerCheckerTransaction {
            id: Uuid::now_v7(),
            reference: self.references.next_reference(now),
            tenant_id: request.tenant_id,
            kind: request.kind,
            entity_id: request.entity_id,
            payload: request.payload,
            amount: request.amount,
            priority: request.priority,
            maker_id: request.maker_id,
            made_at: now,
            checker_id: None,
            checked_at: None,
            checker_comments: None,
            rejection_reason: None,
            status: TransactionStatus::PendingApproval,
            expires_at,
            execution: ExecutionRecord::default(),
            version: 0,
        };

        self.repository.insert(transaction.clone()).await?;
        info!(
            "created {} transaction {} by {} in tenant {}",
            transaction.kind, transaction.reference, transaction.maker_id, transaction.tenant_id
        );

        self.emit(Event::TransactionCreated {
            transaction_id: transaction.id,
            reference: transaction.reference.clone(),
            kind: transaction.kind,
            maker_id: transaction.maker_id.clone(),
            amount: transaction.amount,
            timestamp: now,
        })
        .await;

        if let Err(e) = self.notifier.notify_checkers(&transaction).await {
            warn!("could not notify checkers of {}: {}", transaction.reference, e);
        }

        Ok(transaction)
    }

    /// Approve a pending transaction and execute it.
    ///
    /// Returns false when the transaction is missing, already decided,
    /// expired, or another checker decided it concurrently. A checker who is
    /// also the maker is an authorization violation.
    pub async fn approve_transaction(
        &self,
        transaction_id: TransactionId,
        checker_id: &str,
        comments: Option<&str>,
    ) -> Result<bool> {
        if checker_id.trim().is_empty() {
            return Err(LendingError::invalid_argument("checker id is required"));
        }

        let Some(transaction) = self.repository.get(transaction_id).await? else {
            debug!("approve: transaction {transaction_id} not found");
            return Ok(false);
        };

        ensure_separate_checker(&transaction, checker_id)?;

        if transaction.status != TransactionStatus::PendingApproval {
            debug!(
                "approve: transaction {} already {:?}",
                transaction.reference, transaction.status
            );
            return Ok(false);
        }

        let now = self.time.now();
        if transaction.is_expired(now) {
            warn!("approve: transaction {} expired at {:?}", transaction.reference, transaction.expires_at);
            return Ok(false);
        }

        let expected_version = transaction.version;
        let mut approved = transaction;
        approved.status = TransactionStatus::Approved;
        approved.checker_id = Some(checker_id.to_string());
        approved.checked_at = Some(now);
        approved.checker_comments = comments.map(str::to_string);
        approved.version = expected_version + 1;

        if !self.repository.compare_and_swap(expected_version, approved.clone()).await? {
            info!("approve: transaction {} was decided concurrently", approved.reference);
            return Ok(false);
        }

        info!("transaction {} approved by {}", approved.reference, checker_id);
        self.emit(Event::TransactionApproved {
            transaction_id,
            checker_id: checker_id.to_string(),
            timestamp: now,
        })
        .await;

        if let Err(e) = self.notifier.notify_maker(&approved).await {
            warn!("could not notify maker of {}: {}", approved.reference, e);
        }

        if let Err(e) = self.execute_approved_transaction(transaction_id).await {
            error!("execution of approved transaction {} errored: {}", approved.reference, e);
        }

        Ok(true)
    }

    /// Reject a pending transaction. Never executes anything.
    pub async fn reject_transaction(
        &self,
        transaction_id: TransactionId,
        checker_id: &str,
        reason: &str,
    ) -> Result<bool> {
        if checker_id.trim().is_empty() {
            return Err(LendingError::invalid_argument("checker id is required"));
        }
        if reason.trim().is_empty() {
            return Err(LendingError::invalid_argument("a rejection reason is required"));
        }

        let Some(transaction) = self.repository.get(transaction_id).await? else {
            debug!("reject: transaction {transaction_id} not found");
            return Ok(false);
        };

        ensure_separate_checker(&transaction, checker_id)?;

        if transaction.status != TransactionStatus::PendingApproval {
            return Ok(false);
        }

        let now = self.time.now();
        let expected_version = transaction.version;
        let mut rejected = transaction;
        rejected.status = TransactionStatus::Rejected;
        rejected.checker_id = Some(checker_id.to_string());
        rejected.checked_at = Some(now);
        rejected.rejection_reason = Some(reason.to_string());
        rejected.version = expected_version + 1;

        if !self.repository.compare_and_swap(expected_version, rejected.clone()).await? {
            info!("reject: transaction {} was decided concurrently", rejected.reference);
            return Ok(false);
        }

        info!("transaction {} rejected by {}: {}", rejected.reference, checker_id, reason);
        self.emit(Event::TransactionRejected {
            transaction_id,
            checker_id: checker_id.to_string(),
            reason: reason.to_string(),
            timestamp: now,
        })
        .await;

        if let Err(e) = self.notifier.notify_maker(&rejected).await {
            warn!("could not notify maker of {}: {}", rejected.reference, e);
        }

        Ok(true)
    }

    /// Dispatch an approved transaction to its handler, at most once.
    ///
    /// The execution slot is claimed with a compare-and-swap before the
    /// handler runs, so concurrent callers cannot both dispatch. Handler
    /// errors are recorded on the transaction and reported as false. A claim
    /// older than the configured lease counts as abandoned and may be taken
    /// over; the abandoned run still counts as an attempt.
    pub async fn execute_approved_transaction(&self, transaction_id: TransactionId) -> Result<bool> {
        let Some(transaction) = self.repository.get(transaction_id).await? else {
            return Ok(false);
        };

        if transaction.status != TransactionStatus::Approved {
            return Ok(false);
        }

        let now = self.time.now();
        match transaction.execution.status {
            ExecutionStatus::Succeeded => return Ok(false),
            ExecutionStatus::InProgress if !transaction.execution.claim_expired(now, self.config.execution_lease()) => {
                return Ok(false)
            }
            _ => {}
        }

        if transaction.execution.attempts >= self.config.max_execution_attempts {
            warn!(
                "transaction {} exhausted {} execution attempts",
                transaction.reference, transaction.execution.attempts
            );
            return Ok(false);
        }

        if transaction.execution.status == ExecutionStatus::InProgress {
            warn!(
                "taking over abandoned execution of {} claimed at {:?}",
                transaction.reference, transaction.execution.last_attempt_at
            );
        }

        let expected_version = transaction.version;
        let mut claimed = transaction;
        claimed.execution.status = ExecutionStatus::InProgress;
        claimed.execution.attempts += 1;
        claimed.execution.last_attempt_at = Some(now);
        claimed.version = expected_version + 1;

        if !self.repository.compare_and_swap(expected_version, claimed.clone()).await? {
            debug!("execute: transaction {} claimed by another caller", claimed.reference);
            return Ok(false);
        }

        let outcome = self.registry.dispatch(&claimed).await;
        let finished_at = self.time.now();
        let attempt = claimed.execution.attempts;

        let mut finished = claimed.clone();
        finished.version = claimed.version + 1;
        let succeeded = match &outcome {
            Ok(()) => {
                finished.execution.status = ExecutionStatus::Succeeded;
                finished.execution.executed_at = Some(finished_at);
                finished.execution.last_error = None;
                true
            }
            Err(e) => {
                finished.execution.status = ExecutionStatus::Failed;
                finished.execution.last_error = Some(e.to_string());
                false
            }
        };

        if !self.repository.compare_and_swap(claimed.version, finished).await? {
            error!("execution record of {} changed while it was running", claimed.reference);
            return Err(LendingError::ConcurrentModification { id: transaction_id });
        }

        match outcome {
            Ok(()) => {
                info!("executed {} transaction {}", claimed.kind, claimed.reference);
                self.emit(Event::ExecutionSucceeded {
                    transaction_id,
                    kind: claimed.kind,
                    attempt,
                    timestamp: finished_at,
                })
                .await;
            }
            Err(e) => {
                error!(
                    "execution of {} transaction {} failed on attempt {}: {}",
                    claimed.kind, claimed.reference, attempt, e
                );
                self.emit(Event::ExecutionFailed {
                    transaction_id,
                    kind: claimed.kind,
                    attempt,
                    error: e.to_string(),
                    timestamp: finished_at,
                })
                .await;
            }
        }

        Ok(succeeded)
    }

    /// Pending transactions for a tenant, highest priority first and oldest
    /// first within a priority. With a checker, that checker's own
    /// submissions are left out.
    pub async fn get_pending_transactions(
        &self,
        tenant_id: &str,
        checker_id: Option<&str>,
    ) -> Result<Vec<MakerCheckerTransaction>> {
        let mut pending: Vec<MakerCheckerTransaction> = self
            .repository
            .find_by_status(tenant_id, TransactionStatus::PendingApproval)
            .await?
            .into_iter()
            .filter(|t| checker_id.map_or(true, |checker| t.maker_id != checker))
            .collect();

        pending.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.made_at.cmp(&b.made_at))
                .then(a.id.cmp(&b.id))
        });

        Ok(pending)
    }

    pub async fn get_transaction(&self, transaction_id: TransactionId) -> Result<Option<MakerCheckerTransaction>> {
        self.repository.get(transaction_id).await
    }

    /// Approved transactions whose execution failed, never ran, or was
    /// abandoned past its lease, and still have attempts left.
    pub async fn retryable_transactions(&self, tenant_id: &str) -> Result<Vec<MakerCheckerTransaction>> {
        let max_attempts = self.config.max_execution_attempts;
        Ok(self
            .unfinished(tenant_id)
            .await?
            .into_iter()
            .filter(|t| t.execution.attempts < max_attempts)
            .collect())
    }

    /// Approved transactions that used up every allowed attempt without success.
    pub async fn dead_lettered_transactions(&self, tenant_id: &str) -> Result<Vec<MakerCheckerTransaction>> {
        let max_attempts = self.config.max_execution_attempts;
        Ok(self
            .unfinished(tenant_id)
            .await?
            .into_iter()
            .filter(|t| t.execution.status != ExecutionStatus::NotExecuted && t.execution.attempts >= max_attempts)
            .collect())
    }

    /// approved, not applied, and not held by a live execution claim
    async fn unfinished(&self, tenant_id: &str) -> Result<Vec<MakerCheckerTransaction>> {
        let now = self.time.now();
        let lease = self.config.execution_lease();
        Ok(self
            .repository
            .find_by_status(tenant_id, TransactionStatus::Approved)
            .await?
            .into_iter()
            .filter(|t| match t.execution.status {
                ExecutionStatus::NotExecuted | ExecutionStatus::Failed => true,
                ExecutionStatus::InProgress => t.execution.claim_expired(now, lease),
                ExecutionStatus::Succeeded => false,
            })
            .collect())
    }

    /// Re-drive every retryable transaction of a tenant once.
    pub async fn retry_failed_executions(&self, tenant_id: &str) -> Result<RetryReport> {
        let mut report = RetryReport::default();
        for transaction in self.retryable_transactions(tenant_id).await? {
            report.attempted += 1;
            if self.execute_approved_transaction(transaction.id).await? {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }
        }

        if report.attempted > 0 {
            info!(
                "retry sweep for tenant {}: {} attempted, {} succeeded, {} failed",
                tenant_id, report.attempted, report.succeeded, report.failed
            );
        }
        Ok(report)
    }
}

fn ensure_separate_checker(transaction: &MakerCheckerTransaction, checker_id: &str) -> Result<()> {
    if transaction.maker_id == checker_id {
        warn!(
            "{} tried to check their own transaction {}",
            checker_id, transaction.reference
        );
        return Err(LendingError::AuthorizationViolation {
            message: "checker cannot be the same as maker".to_string(),
        });
    }
    Ok(())
}
