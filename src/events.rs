use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{LoanId, OperationKind, TransactionId};

/// audit events emitted by the workflow engine and loan operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // maker-checker lifecycle
    TransactionCreated {
        transaction_id: TransactionId,
        reference: String,
        kind: OperationKind,
        maker_id: String,
        amount: Option<Money>,
        timestamp: DateTime<Utc>,
    },
    TransactionApproved {
        transaction_id: TransactionId,
        checker_id: String,
        timestamp: DateTime<Utc>,
    },
    TransactionRejected {
        transaction_id: TransactionId,
        checker_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    // execution
    ExecutionSucceeded {
        transaction_id: TransactionId,
        kind: OperationKind,
        attempt: u32,
        timestamp: DateTime<Utc>,
    },
    ExecutionFailed {
        transaction_id: TransactionId,
        kind: OperationKind,
        attempt: u32,
        error: String,
        timestamp: DateTime<Utc>,
    },

    // loan operations applied without approval
    LoanDisbursed {
        loan_id: LoanId,
        amount: Money,
        disbursement_date: NaiveDate,
    },
    RepaymentApplied {
        loan_id: LoanId,
        amount: Money,
        to_interest: Money,
        to_principal: Money,
        payment_date: NaiveDate,
    },
    JournalPosted {
        reference: String,
        posting_date: NaiveDate,
        amount: Money,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
