use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{InstallmentId, LoanId, LoanStatus, PaymentId};

/// audit events emitted after a ledger transaction commits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerEvent {
    // lifecycle events
    LoanSubmitted {
        loan_id: LoanId,
        principal: Money,
        emi: Money,
        submitted_by: Option<String>,
        timestamp: DateTime<Utc>,
    },
    StatusChanged {
        loan_id: LoanId,
        old_status: LoanStatus,
        new_status: LoanStatus,
        changed_by: Option<String>,
        timestamp: DateTime<Utc>,
    },

    // schedule events
    ScheduleGenerated {
        loan_id: LoanId,
        installments: u32,
        first_due: DateTime<Utc>,
        last_due: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    // payment events
    PaymentRecorded {
        loan_id: LoanId,
        payment_id: PaymentId,
        amount: Money,
        fine: Money,
        collection_date: NaiveDate,
        installment_number: Option<u32>,
        total_amount_paid: Money,
        timestamp: DateTime<Utc>,
    },
    OverpaymentRecorded {
        loan_id: LoanId,
        payment_id: PaymentId,
        amount: Money,
        timestamp: DateTime<Utc>,
    },
    PaymentEdited {
        loan_id: LoanId,
        payment_id: PaymentId,
        old_contribution: Money,
        new_contribution: Money,
        total_amount_paid: Money,
        edited_by: Option<String>,
        timestamp: DateTime<Utc>,
    },
    PaymentDeleted {
        loan_id: LoanId,
        payment_id: PaymentId,
        contribution: Money,
        total_amount_paid: Money,
        deleted_by: Option<String>,
        timestamp: DateTime<Utc>,
    },
    InstallmentReopened {
        loan_id: LoanId,
        installment_id: InstallmentId,
        installment_number: u32,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<LedgerEvent>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = LedgerEvent>) {
        self.events.extend(events);
    }

    pub fn take_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    #[test]
    fn test_take_events_drains() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut store = EventStore::new();
        store.extend(vec![LedgerEvent::StatusChanged {
            loan_id: Uuid::new_v4(),
            old_status: LoanStatus::Pending,
            new_status: LoanStatus::Approved,
            changed_by: Some("admin".to_string()),
            timestamp: now,
        }]);

        assert_eq!(store.take_events().len(), 1);
        assert!(store.take_events().is_empty());
    }
}
