use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::errors::{LendingError, Result};
use crate::types::LoanId;

use super::{JournalEntry, LedgerRepository, LoanAccount, LoanRepository};

/// In-memory loan accounts keyed by loan id.
#[derive(Default, Clone)]
pub struct InMemoryLoanRepository {
    loans: Arc<RwLock<HashMap<LoanId, LoanAccount>>>,
}

impl InMemoryLoanRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LoanRepository for InMemoryLoanRepository {
    async fn get(&self, loan_id: LoanId) -> Result<Option<LoanAccount>> {
        let loans = self.loans.read().await;
        Ok(loans.get(&loan_id).cloned())
    }

    async fn insert(&self, loan: LoanAccount) -> Result<()> {
        let mut loans = self.loans.write().await;
        if loans.contains_key(&loan.loan_id) {
            return Err(LendingError::Storage {
                message: format!("loan {} already exists", loan.loan_id),
            });
        }
        loans.insert(loan.loan_id, loan);
        Ok(())
    }

    async fn compare_and_swap(&self, expected_version: u64, updated: LoanAccount) -> Result<bool> {
        let mut loans = self.loans.write().await;
        match loans.get_mut(&updated.loan_id) {
            Some(stored) if stored.version == expected_version => {
                *stored = updated;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(LendingError::NotFound {
                entity: "Loan".to_string(),
                id: updated.loan_id.to_string(),
            }),
        }
    }
}

/// Append-only in-memory ledger.
#[derive(Default, Clone)]
pub struct InMemoryLedgerRepository {
    entries: Arc<RwLock<Vec<JournalEntry>>>,
}

impl InMemoryLedgerRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerRepository for InMemoryLedgerRepository {
    async fn post(&self, entry: JournalEntry) -> Result<()> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<JournalEntry>> {
        Ok(self.entries.read().await.clone())
    }
}
