use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::{LendingError, Result};
use crate::types::OperationKind;

use super::MakerCheckerTransaction;

/// applies an approved transaction to its target domain
#[async_trait]
pub trait TransactionHandler: Send + Sync {
    async fn execute(&self, transaction: &MakerCheckerTransaction) -> Result<()>;
}

/// handlers keyed by operation kind, fixed once built
pub struct DispatchRegistry {
    handlers: HashMap<OperationKind, Arc<dyn TransactionHandler>>,
}

impl DispatchRegistry {
    pub fn builder() -> DispatchRegistryBuilder {
        DispatchRegistryBuilder::default()
    }

    pub fn supports(&self, kind: OperationKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &OperationKind> {
        self.handlers.keys()
    }

    pub async fn dispatch(&self, transaction: &MakerCheckerTransaction) -> Result<()> {
        let handler = self
            .handlers
            .get(&transaction.kind)
            .ok_or(LendingError::OperationNotRegistered {
                kind: transaction.kind,
            })?;
        handler.execute(transaction).await
    }
}

#[derive(Default)]
pub struct DispatchRegistryBuilder {
    handlers: HashMap<OperationKind, Arc<dyn TransactionHandler>>,
}

impl DispatchRegistryBuilder {
    /// register a handler; each kind may be registered once
    pub fn register(mut self, kind: OperationKind, handler: Arc<dyn TransactionHandler>) -> Result<Self> {
        if self.handlers.contains_key(&kind) {
            return Err(LendingError::DuplicateHandler { kind });
        }
        self.handlers.insert(kind, handler);
        Ok(self)
    }

    pub fn build(self) -> Result<DispatchRegistry> {
        if self.handlers.is_empty() {
            return Err(LendingError::InvalidConfiguration {
                message: "dispatch registry has no handlers".to_string(),
            });
        }
        Ok(DispatchRegistry {
            handlers: self.handlers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl TransactionHandler for Noop {
        async fn execute(&self, _transaction: &MakerCheckerTransaction) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let result = DispatchRegistry::builder()
            .register(OperationKind::LoanDisbursement, Arc::new(Noop))
            .and_then(|b| b.register(OperationKind::LoanDisbursement, Arc::new(Noop)));

        assert!(matches!(
            result,
            Err(LendingError::DuplicateHandler {
                kind: OperationKind::LoanDisbursement
            })
        ));
    }

    #[test]
    fn test_empty_registry_rejected() {
        assert!(DispatchRegistry::builder().build().is_err());
    }

    #[test]
    fn test_supports() {
        let registry = DispatchRegistry::builder()
            .register(OperationKind::JournalPosting, Arc::new(Noop))
            .unwrap()
            .build()
            .unwrap();

        assert!(registry.supports(OperationKind::JournalPosting));
        assert!(!registry.supports(OperationKind::LoanRepayment));
        assert_eq!(registry.kinds().count(), 1);
    }
}
