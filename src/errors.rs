use thiserror::Error;
use uuid::Uuid;

use crate::decimal::Money;
use crate::types::OperationKind;

#[derive(Error, Debug)]
pub enum LendingError {
    #[error("invalid argument: {message}")]
    InvalidArgument {
        message: String,
    },

    #[error("payment exceeds outstanding balance by {excess}")]
    Overpayment {
        excess: Money,
    },

    #[error("authorization violation: {message}")]
    AuthorizationViolation {
        message: String,
    },

    #[error("invalid state: current {current}, expected {expected}")]
    InvalidState {
        current: String,
        expected: String,
    },

    #[error("{entity} not found: {id}")]
    NotFound {
        entity: String,
        id: String,
    },

    #[error("no handler registered for {kind}")]
    OperationNotRegistered {
        kind: OperationKind,
    },

    #[error("handler already registered for {kind}")]
    DuplicateHandler {
        kind: OperationKind,
    },

    #[error("{id} was modified concurrently")]
    ConcurrentModification {
        id: Uuid,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("calculation error: {message}")]
    CalculationError {
        message: String,
    },

    #[error("storage error: {message}")]
    Storage {
        message: String,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LendingError {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        LendingError::InvalidArgument {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LendingError>;
