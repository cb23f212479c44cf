//! Document store seam for the ledger.
//!
//! A loan and its installments and payment entries live in one [`LoanDocument`]. Every
//! write goes through [`run_transaction`], which reads a versioned copy, lets the caller
//! mutate it, and commits with a compare-and-swap on the version. Conflicting commits
//! re-run the body against a fresh read.

pub mod memory;

use serde::{Deserialize, Serialize};

use crate::errors::{LedgerError, Result};
use crate::loan::Loan;
use crate::payments::PaymentEntry;
use crate::schedule::ScheduledInstallment;
use crate::types::{LoanId, LoanStatus};

pub use memory::MemoryStore;

/// loan aggregate with its child collections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanDocument {
    pub loan: Loan,
    /// ordered by due date
    pub installments: Vec<ScheduledInstallment>,
    /// insertion ordered
    pub payments: Vec<PaymentEntry>,
}

impl LoanDocument {
    pub fn new(loan: Loan) -> Self {
        Self {
            loan,
            installments: Vec::new(),
            payments: Vec::new(),
        }
    }

    pub fn payment_index(&self, payment_id: uuid::Uuid) -> Option<usize> {
        self.payments.iter().position(|p| p.id == payment_id)
    }
}

/// document read together with the version it was read at
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

/// result of a compare-and-swap commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed { version: u64 },
    Conflict { current: u64 },
}

/// store client shared by the ledger for the life of the process
pub trait LoanStore: Send + Sync {
    /// create a new loan document; fails if the id is taken
    fn insert(&self, document: LoanDocument) -> Result<()>;

    fn fetch(&self, loan_id: LoanId) -> Result<Option<Versioned<LoanDocument>>>;

    /// replace the document if its version still equals `expected_version`
    fn commit(&self, expected_version: u64, document: LoanDocument) -> Result<CommitOutcome>;

    fn loans_with_status(&self, status: LoanStatus) -> Result<Vec<Loan>>;

    fn payments_for(&self, loan_ids: &[LoanId]) -> Result<Vec<PaymentEntry>>;
}

/// run `body` as one atomic read-modify-write on a loan document.
///
/// `body` may run more than once and must be free of side effects outside the document.
/// An error from `body` aborts with nothing written; an unchanged document is not
/// committed.
pub fn run_transaction<S, T, F>(
    store: &S,
    loan_id: LoanId,
    max_attempts: u32,
    mut body: F,
) -> Result<T>
where
    S: LoanStore + ?Sized,
    F: FnMut(&mut LoanDocument) -> Result<T>,
{
    for attempt in 1..=max_attempts {
        let read = store
            .fetch(loan_id)?
            .ok_or_else(|| LedgerError::not_found(format!("loan {} does not exist", loan_id)))?;

        let mut working = read.value.clone();
        let value = body(&mut working)?;

        if working == read.value {
            return Ok(value);
        }

        match store.commit(read.version, working)? {
            CommitOutcome::Committed { version } => {
                tracing::debug!(%loan_id, version, attempt, "transaction committed");
                return Ok(value);
            }
            CommitOutcome::Conflict { current } => {
                tracing::debug!(
                    %loan_id,
                    read_version = read.version,
                    current,
                    attempt,
                    "write conflict, retrying"
                );
            }
        }
    }

    Err(LedgerError::Aborted {
        attempts: max_attempts,
    })
}
