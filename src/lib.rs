pub mod api;
pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod loan;
pub mod payments;
pub mod report;
pub mod schedule;
pub mod serialization;
pub mod store;
pub mod types;

// re-export key types
pub use api::{
    Caller, DailyReportRequest, DeletePaymentRequest, DeletePaymentResponse, EditPaymentRequest,
    LedgerResponse, LoanActionRequest, LoanApplicationRequest, LoanApplicationResponse,
    RecordPaymentRequest, RecordPaymentResponse, ScheduleRequest, ScheduleResponse,
};
pub use config::{InstallmentLinkPolicy, LedgerConfig};
pub use decimal::{Money, MoneyInput, Rate, Tally};
pub use errors::{ErrorKind, ErrorResponse, LedgerError, Result};
pub use events::{EventStore, LedgerEvent};
pub use ledger::Ledger;
pub use loan::{Loan, LoanSnapshot, LoanTerms};
pub use payments::{PaymentDetails, PaymentEntry};
pub use report::{CollectionAggregator, CollectionSummary, DailyCollectionRow, DailyReport};
pub use schedule::{ScheduleGenerator, ScheduledInstallment};
pub use serialization::LoanStatement;
pub use store::{run_transaction, LoanDocument, LoanStore, MemoryStore};
pub use types::{
    Cadence, InstallmentId, InstallmentStatus, LoanId, LoanStatus, PaymentId, PaymentMode,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
