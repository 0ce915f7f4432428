use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::Result;
use crate::types::{TransactionId, TransactionStatus};

use super::MakerCheckerTransaction;

/// persistence for maker-checker transactions
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn insert(&self, transaction: MakerCheckerTransaction) -> Result<()>;
    async fn get(&self, id: TransactionId) -> Result<Option<MakerCheckerTransaction>>;
    async fn find_by_status(
        &self,
        tenant_id: &str,
        status: TransactionStatus,
    ) -> Result<Vec<MakerCheckerTransaction>>;
    /// Store `updated` only if the stored version still equals `expected_version`.
    /// Returns false when another writer got there first.
    async fn compare_and_swap(
        &self,
        expected_version: u64,
        updated: MakerCheckerTransaction,
    ) -> Result<bool>;
}

/// best-effort delivery of workflow notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_checkers(&self, transaction: &MakerCheckerTransaction) -> Result<()>;
    async fn notify_maker(&self, transaction: &MakerCheckerTransaction) -> Result<()>;
}

/// source of human-facing transaction references
pub trait ReferenceGenerator: Send + Sync {
    fn next_reference(&self, now: DateTime<Utc>) -> String;
}

/// `MC-<date>-<uuid v7>`; unique without coordination
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidV7ReferenceGenerator;

impl ReferenceGenerator for UuidV7ReferenceGenerator {
    fn next_reference(&self, now: DateTime<Utc>) -> String {
        format!("MC-{}-{}", now.format("%Y%m%d"), Uuid::now_v7().simple())
    }
}

/// monotonic per-process counter, `MC-00000001` onwards
#[derive(Debug, Default)]
pub struct SequenceReferenceGenerator {
    next: AtomicU64,
}

impl SequenceReferenceGenerator {
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl ReferenceGenerator for SequenceReferenceGenerator {
    fn next_reference(&self, _now: DateTime<Utc>) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        format!("MC-{n:08}")
    }
}
