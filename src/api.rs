//! Request and response records for the callable operations.
//!
//! Requests carry raw caller input (string ids, loosely typed amounts, ISO dates) and are
//! validated into typed values before any transaction starts.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::{MoneyInput, Rate, Tally};
use crate::errors::{LedgerError, Result};
use crate::loan::{LoanSnapshot, LoanTerms};
use crate::payments::{parse_collection_date, PaymentDetails};
use crate::types::{Cadence, LoanId, PaymentId};

/// identity supplied by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Caller {
    pub uid: Option<String>,
    pub is_admin: bool,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(uid: impl Into<String>) -> Self {
        Self {
            uid: Some(uid.into()),
            is_admin: false,
        }
    }

    pub fn admin(uid: impl Into<String>) -> Self {
        Self {
            uid: Some(uid.into()),
            is_admin: true,
        }
    }

    pub fn require_authenticated(&self) -> Result<&str> {
        match self.uid.as_deref() {
            Some(uid) if !uid.is_empty() => Ok(uid),
            _ => Err(LedgerError::Unauthenticated),
        }
    }

    pub fn require_admin(&self) -> Result<&str> {
        let uid = self.require_authenticated()?;
        if !self.is_admin {
            return Err(LedgerError::PermissionDenied);
        }
        Ok(uid)
    }
}

fn parse_id(raw: &str, field: &str) -> Result<Uuid> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(LedgerError::invalid_argument(format!("{} is required", field)));
    }
    Uuid::parse_str(raw)
        .map_err(|_| LedgerError::invalid_argument(format!("{} '{}' is not a valid id", field, raw)))
}

/// generate the installment plan of an approved loan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub loan_id: String,
}

impl ScheduleRequest {
    pub fn validate(&self) -> Result<LoanId> {
        parse_id(&self.loan_id, "loan_id")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleResponse {
    pub success: bool,
    pub message: String,
    pub installments: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPaymentRequest {
    pub loan_id: String,
    pub amount: MoneyInput,
    #[serde(default)]
    pub fine: Option<MoneyInput>,
    pub mode: String,
    pub collection_date: String,
    #[serde(default)]
    pub remarks: Option<String>,
}

impl RecordPaymentRequest {
    pub fn validate(&self) -> Result<(LoanId, PaymentDetails)> {
        let loan_id = parse_id(&self.loan_id, "loan_id")?;
        let details = PaymentDetails::validate(
            &self.amount,
            self.fine.as_ref(),
            &self.mode,
            &self.collection_date,
            self.remarks.as_deref(),
        )?;
        Ok((loan_id, details))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPaymentResponse {
    pub payment_id: PaymentId,
    /// number of the installment this payment settled, `None` for an overpayment
    pub settled_installment: Option<u32>,
    pub loan: LoanSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditPaymentRequest {
    pub loan_id: String,
    pub payment_id: String,
    pub amount: MoneyInput,
    #[serde(default)]
    pub fine: Option<MoneyInput>,
    pub mode: String,
    pub collection_date: String,
    #[serde(default)]
    pub remarks: Option<String>,
}

impl EditPaymentRequest {
    pub fn validate(&self) -> Result<(LoanId, PaymentId, PaymentDetails)> {
        let loan_id = parse_id(&self.loan_id, "loan_id")?;
        let payment_id = parse_id(&self.payment_id, "payment_id")?;
        let details = PaymentDetails::validate(
            &self.amount,
            self.fine.as_ref(),
            &self.mode,
            &self.collection_date,
            self.remarks.as_deref(),
        )?;
        Ok((loan_id, payment_id, details))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletePaymentRequest {
    pub loan_id: String,
    pub payment_id: String,
}

impl DeletePaymentRequest {
    pub fn validate(&self) -> Result<(LoanId, PaymentId)> {
        Ok((
            parse_id(&self.loan_id, "loan_id")?,
            parse_id(&self.payment_id, "payment_id")?,
        ))
    }
}

/// loan snapshot after an edit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerResponse {
    pub loan: LoanSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletePaymentResponse {
    /// false when the entry was already gone
    pub deleted: bool,
    pub loan: LoanSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanApplicationRequest {
    pub borrower_name: String,
    #[serde(default)]
    pub branch_id: Option<String>,
    pub principal: MoneyInput,
    /// percent, e.g. 10 for 10%
    pub interest_rate: MoneyInput,
    pub tenor: u32,
    pub cadence: String,
}

impl LoanApplicationRequest {
    pub fn validate(&self) -> Result<LoanTerms> {
        let borrower_name = self.borrower_name.trim();
        if borrower_name.is_empty() {
            return Err(LedgerError::invalid_argument("borrower_name is required"));
        }
        let principal = Tally::of(self.principal.clone())
            .to_money()
            .ok_or_else(|| LedgerError::invalid_argument("principal is not a number"))?;
        let rate = self
            .interest_rate
            .coerce()
            .map(Rate::from_percentage_decimal)
            .ok_or_else(|| LedgerError::invalid_argument("interest_rate is not a number"))?;
        let cadence = self
            .cadence
            .parse::<Cadence>()
            .map_err(LedgerError::invalid_argument)?;

        Ok(LoanTerms {
            borrower_name: borrower_name.to_string(),
            branch_id: self
                .branch_id
                .as_deref()
                .map(str::trim)
                .filter(|b| !b.is_empty())
                .map(str::to_string),
            principal,
            interest_rate: rate,
            tenor: self.tenor,
            cadence,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanApplicationResponse {
    pub loan_id: LoanId,
    pub loan: LoanSnapshot,
}

/// approve, reject, hold for verification or close a loan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanActionRequest {
    pub loan_id: String,
}

impl LoanActionRequest {
    pub fn validate(&self) -> Result<LoanId> {
        parse_id(&self.loan_id, "loan_id")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyReportRequest {
    pub number_of_days: u32,
    /// last day of the window; today when absent
    #[serde(default)]
    pub reference_date: Option<String>,
    #[serde(default)]
    pub branch_id: Option<String>,
}

impl DailyReportRequest {
    pub fn reference_date(&self) -> Result<Option<NaiveDate>> {
        self.reference_date
            .as_deref()
            .map(parse_collection_date)
            .transpose()
    }
}
