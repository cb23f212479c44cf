use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// unique identifier for a loan
pub type LoanId = Uuid;

/// unique identifier for a payment entry
pub type PaymentId = Uuid;

/// unique identifier for a scheduled installment
pub type InstallmentId = Uuid;

/// loan status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoanStatus {
    /// submitted, awaiting review
    Pending,
    /// approved and collecting
    Approved,
    /// terminal, no ledger activity
    Rejected,
    /// held for document verification
    VerificationRequired,
    /// closed manually once the borrower has repaid
    PaidInFull,
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoanStatus::Pending => "Pending",
            LoanStatus::Approved => "Approved",
            LoanStatus::Rejected => "Rejected",
            LoanStatus::VerificationRequired => "Verification Required",
            LoanStatus::PaidInFull => "Paid in Full",
        };
        f.write_str(s)
    }
}

/// repayment cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cadence {
    Daily,
    Weekly,
    Monthly,
}

impl Cadence {
    /// advance `anchor` by `units` cadence periods.
    ///
    /// Monthly steps use calendar months from the anchor, clamping to the last day of
    /// shorter months (Jan 31 + 1 month = Feb 29 in 2024, Feb 28 otherwise).
    pub fn advance(&self, anchor: DateTime<Utc>, units: u32) -> Option<DateTime<Utc>> {
        match self {
            Cadence::Daily => anchor.checked_add_signed(chrono::Duration::days(units as i64)),
            Cadence::Weekly => {
                anchor.checked_add_signed(chrono::Duration::days(7 * units as i64))
            }
            Cadence::Monthly => anchor.checked_add_months(Months::new(units)),
        }
    }

    /// calendar-day version of [`Cadence::advance`]
    pub fn advance_date(&self, anchor: NaiveDate, units: u32) -> Option<NaiveDate> {
        match self {
            Cadence::Daily => anchor.checked_add_days(chrono::Days::new(units as u64)),
            Cadence::Weekly => anchor.checked_add_days(chrono::Days::new(7 * units as u64)),
            Cadence::Monthly => anchor.checked_add_months(Months::new(units)),
        }
    }
}

impl FromStr for Cadence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Cadence::Daily),
            "weekly" => Ok(Cadence::Weekly),
            "monthly" => Ok(Cadence::Monthly),
            other => Err(format!("unknown repayment cadence '{}'", other)),
        }
    }
}

/// how a collection was received
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMode {
    Cash,
    Online,
    Cheque,
}

impl FromStr for PaymentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cash" => Ok(PaymentMode::Cash),
            "online" => Ok(PaymentMode::Online),
            "cheque" | "check" => Ok(PaymentMode::Cheque),
            other => Err(format!("unknown payment mode '{}'", other)),
        }
    }
}

/// scheduled installment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstallmentStatus {
    Pending,
    Paid,
}
