use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use tokio::sync::RwLock;

use crate::errors::{LendingError, Result};
use crate::types::{TransactionId, TransactionStatus};

use super::ports::{Notifier, TransactionRepository};
use super::MakerCheckerTransaction;

/// A thread-safe in-memory transaction store.
///
/// The version check and the write happen under one write lock, so of two
/// racing updates built from the same version only the first is stored.
#[derive(Default, Clone)]
pub struct InMemoryTransactionRepository {
    transactions: Arc<RwLock<HashMap<TransactionId, MakerCheckerTransaction>>>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.transactions.read().await.len()
    }
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn insert(&self, transaction: MakerCheckerTransaction) -> Result<()> {
        let mut transactions = self.transactions.write().await;
        if transactions.contains_key(&transaction.id) {
            return Err(LendingError::Storage {
                message: format!("transaction {} already exists", transaction.id),
            });
        }
        transactions.insert(transaction.id, transaction);
        Ok(())
    }

    async fn get(&self, id: TransactionId) -> Result<Option<MakerCheckerTransaction>> {
        let transactions = self.transactions.read().await;
        Ok(transactions.get(&id).cloned())
    }

    async fn find_by_status(
        &self,
        tenant_id: &str,
        status: TransactionStatus,
    ) -> Result<Vec<MakerCheckerTransaction>> {
        let transactions = self.transactions.read().await;
        Ok(transactions
            .values()
            .filter(|t| t.tenant_id == tenant_id && t.status == status)
            .cloned()
            .collect())
    }

    async fn compare_and_swap(
        &self,
        expected_version: u64,
        updated: MakerCheckerTransaction,
    ) -> Result<bool> {
        let mut transactions = self.transactions.write().await;
        match transactions.get_mut(&updated.id) {
            Some(stored) if stored.version == expected_version => {
                *stored = updated;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(LendingError::NotFound {
                entity: "MakerCheckerTransaction".to_string(),
                id: updated.id.to_string(),
            }),
        }
    }
}

/// notifier that only writes to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify_checkers(&self, transaction: &MakerCheckerTransaction) -> Result<()> {
        info!(
            "transaction {} ({}) awaits a checker in tenant {}",
            transaction.reference, transaction.kind, transaction.tenant_id
        );
        Ok(())
    }

    async fn notify_maker(&self, transaction: &MakerCheckerTransaction) -> Result<()> {
        info!(
            "transaction {} for maker {} is now {:?}",
            transaction.reference, transaction.maker_id, transaction.status
        );
        Ok(())
    }
}
