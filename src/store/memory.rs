use std::collections::HashMap;
use std::sync::RwLock;

use crate::errors::{LedgerError, Result};
use crate::loan::Loan;
use crate::payments::PaymentEntry;
use crate::types::{LoanId, LoanStatus};

use super::{CommitOutcome, LoanDocument, LoanStore, Versioned};

/// in-process store; documents are replaced whole on commit
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<LoanId, Versioned<LoanDocument>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.read().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<E>(_: E) -> LedgerError {
    LedgerError::store("memory store lock poisoned")
}

impl LoanStore for MemoryStore {
    fn insert(&self, document: LoanDocument) -> Result<()> {
        let mut docs = self.documents.write().map_err(poisoned)?;
        let id = document.loan.id;
        if docs.contains_key(&id) {
            return Err(LedgerError::store(format!("loan {} already exists", id)));
        }
        docs.insert(
            id,
            Versioned {
                version: 1,
                value: document,
            },
        );
        Ok(())
    }

    fn fetch(&self, loan_id: LoanId) -> Result<Option<Versioned<LoanDocument>>> {
        let docs = self.documents.read().map_err(poisoned)?;
        Ok(docs.get(&loan_id).cloned())
    }

    fn commit(&self, expected_version: u64, document: LoanDocument) -> Result<CommitOutcome> {
        let mut docs = self.documents.write().map_err(poisoned)?;
        let id = document.loan.id;
        let slot = docs
            .get_mut(&id)
            .ok_or_else(|| LedgerError::store(format!("loan {} vanished during commit", id)))?;

        if slot.version != expected_version {
            return Ok(CommitOutcome::Conflict {
                current: slot.version,
            });
        }
        slot.version += 1;
        slot.value = document;
        Ok(CommitOutcome::Committed {
            version: slot.version,
        })
    }

    fn loans_with_status(&self, status: LoanStatus) -> Result<Vec<Loan>> {
        let docs = self.documents.read().map_err(poisoned)?;
        let mut loans: Vec<Loan> = docs
            .values()
            .filter(|doc| doc.value.loan.status == status)
            .map(|doc| doc.value.loan.clone())
            .collect();
        loans.sort_by_key(|loan| (loan.created_at, loan.id));
        Ok(loans)
    }

    fn payments_for(&self, loan_ids: &[LoanId]) -> Result<Vec<PaymentEntry>> {
        let docs = self.documents.read().map_err(poisoned)?;
        Ok(loan_ids
            .iter()
            .filter_map(|id| docs.get(id))
            .flat_map(|doc| doc.value.payments.iter().cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::{Money, Rate};
    use crate::loan::LoanTerms;
    use crate::store::run_transaction;
    use crate::types::Cadence;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn document() -> LoanDocument {
        let terms = LoanTerms {
            borrower_name: "Meena".to_string(),
            branch_id: None,
            principal: Money::from_major(5_000),
            interest_rate: Rate::from_percentage(12),
            tenor: 5,
            cadence: Cadence::Weekly,
        };
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        LoanDocument::new(Loan::submit(Uuid::new_v4(), terms, None, now, 2).unwrap())
    }

    #[test]
    fn test_insert_and_fetch() {
        let store = MemoryStore::new();
        let doc = document();
        let id = doc.loan.id;

        store.insert(doc.clone()).unwrap();
        assert!(store.insert(doc).is_err());

        let read = store.fetch(id).unwrap().unwrap();
        assert_eq!(read.version, 1);
        assert!(store.fetch(Uuid::new_v4()).unwrap().is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_commit_detects_stale_version() {
        let store = MemoryStore::new();
        let doc = document();
        let id = doc.loan.id;
        store.insert(doc).unwrap();

        let read = store.fetch(id).unwrap().unwrap();
        let mut first = read.value.clone();
        first.loan.borrower_name = "first".to_string();
        let mut second = read.value.clone();
        second.loan.borrower_name = "second".to_string();

        assert_eq!(store.commit(read.version, first).unwrap(), CommitOutcome::Committed { version: 2 });
        assert_eq!(store.commit(read.version, second).unwrap(), CommitOutcome::Conflict { current: 2 });
        assert_eq!(store.fetch(id).unwrap().unwrap().value.loan.borrower_name, "first");
    }

    #[test]
    fn test_transaction_error_writes_nothing() {
        let store = MemoryStore::new();
        let doc = document();
        let id = doc.loan.id;
        store.insert(doc).unwrap();

        let result: Result<()> = run_transaction(&store, id, 3, |doc| {
            doc.loan.borrower_name = "changed".to_string();
            Err(LedgerError::calculation("boom"))
        });

        assert!(result.is_err());
        let read = store.fetch(id).unwrap().unwrap();
        assert_eq!(read.version, 1);
        assert_eq!(read.value.loan.borrower_name, "Meena");
    }

    #[test]
    fn test_transaction_unchanged_document_is_not_written() {
        let store = MemoryStore::new();
        let doc = document();
        let id = doc.loan.id;
        store.insert(doc).unwrap();

        let name = run_transaction(&store, id, 3, |doc| Ok(doc.loan.borrower_name.clone())).unwrap();
        assert_eq!(name, "Meena");
        assert_eq!(store.fetch(id).unwrap().unwrap().version, 1);
    }

    #[test]
    fn test_transaction_missing_loan() {
        let store = MemoryStore::new();
        let err = run_transaction(&store, Uuid::new_v4(), 3, |_| Ok(())).unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));
    }

    #[test]
    fn test_transaction_retries_then_aborts() {
        let store = MemoryStore::new();
        let doc = document();
        let id = doc.loan.id;
        store.insert(doc).unwrap();

        // a competing writer commits inside every attempt
        let mut runs = 0;
        let err = run_transaction(&store, id, 3, |doc| {
            runs += 1;
            let current = store.fetch(id)?.unwrap();
            let mut rival = current.value.clone();
            rival.loan.borrower_name = format!("rival {}", runs);
            store.commit(current.version, rival)?;
            doc.loan.tenor += 1;
            Ok(())
        })
        .unwrap_err();

        assert_eq!(runs, 3);
        assert_eq!(err, LedgerError::Aborted { attempts: 3 });
        assert_eq!(store.fetch(id).unwrap().unwrap().value.loan.tenor, 5);
    }
}
