pub mod ledger;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, MoneyInput, Tally};
use crate::errors::{LedgerError, Result};
use crate::types::{InstallmentId, LoanId, PaymentId, PaymentMode};

/// one collection recorded against a loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEntry {
    pub id: PaymentId,
    pub loan_id: LoanId,
    pub amount_paid: Money,
    pub fine: Money,
    pub payment_mode: PaymentMode,
    pub collection_date: NaiveDate,
    pub remarks: Option<String>,
    /// installment settled when the entry was recorded, if any
    pub installment_id: Option<InstallmentId>,
    pub collected_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub edited_by: Option<String>,
    pub edited_at: Option<DateTime<Utc>>,
}

impl PaymentEntry {
    /// amount_paid + fine
    pub fn contribution(&self) -> Tally {
        Tally::from(self.amount_paid).add(self.fine)
    }

    /// replace the monetary and descriptive fields wholesale
    pub fn overwrite(&mut self, details: &PaymentDetails, edited_by: Option<String>, now: DateTime<Utc>) {
        self.amount_paid = details.amount;
        self.fine = details.fine;
        self.payment_mode = details.mode;
        self.collection_date = details.collection_date;
        self.remarks = details.remarks.clone();
        self.edited_by = edited_by;
        self.edited_at = Some(now);
    }
}

/// validated payment fields shared by record and edit
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentDetails {
    pub amount: Money,
    pub fine: Money,
    pub mode: PaymentMode,
    pub collection_date: NaiveDate,
    pub remarks: Option<String>,
}

impl PaymentDetails {
    pub fn validate(
        amount: &MoneyInput,
        fine: Option<&MoneyInput>,
        mode: &str,
        collection_date: &str,
        remarks: Option<&str>,
    ) -> Result<Self> {
        let amount = Tally::of(amount.clone())
            .to_money()
            .ok_or_else(|| LedgerError::invalid_argument(format!("amount {:?} is not a number", amount)))?;
        if !amount.is_positive() {
            return Err(LedgerError::invalid_argument(format!(
                "amount must be positive, got {}",
                amount
            )));
        }

        let fine = match fine {
            Some(input) => Tally::of(input.clone()).to_money().ok_or_else(|| {
                LedgerError::invalid_argument(format!("fine {:?} is not a number", input))
            })?,
            None => Money::ZERO,
        };
        if fine.is_negative() {
            return Err(LedgerError::invalid_argument(format!(
                "fine must not be negative, got {}",
                fine
            )));
        }

        let mode = mode.parse::<PaymentMode>().map_err(LedgerError::invalid_argument)?;
        let collection_date = parse_collection_date(collection_date)?;

        let remarks = remarks
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);

        Ok(Self {
            amount,
            fine,
            mode,
            collection_date,
            remarks,
        })
    }

    pub fn contribution(&self) -> Tally {
        Tally::from(self.amount).add(self.fine)
    }
}

/// accepts `YYYY-MM-DD` or a full RFC 3339 timestamp (its UTC date is used)
pub fn parse_collection_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc).date_naive())
        .map_err(|_| LedgerError::invalid_argument(format!("collection date '{}' is not a valid date", raw)))
}
