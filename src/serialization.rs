/// serialization support for loan statements
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Tally};
use crate::errors::{LedgerError, Result};
use crate::loan::Loan;
use crate::payments::PaymentEntry;
use crate::schedule::{oldest_pending, ScheduledInstallment};
use crate::store::LoanDocument;

/// serializable view of a loan with its plan and collections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanStatement {
    pub loan: Loan,
    pub installments: Vec<ScheduledInstallment>,
    pub payments: Vec<PaymentEntry>,
    pub summary: StatementSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementSummary {
    pub installment_count: u32,
    pub pending_installments: u32,
    pub payment_count: u32,
    pub total_fines: Money,
    pub next_due: Option<ScheduledInstallment>,
}

impl LoanStatement {
    pub fn from_document(document: &LoanDocument) -> Result<Self> {
        let mut installments = document.installments.clone();
        installments.sort_by_key(|inst| inst.installment_number);

        let mut payments = document.payments.clone();
        payments.sort_by_key(|p| p.created_at);

        let total_fines = payments
            .iter()
            .fold(Tally::ZERO, |acc, p| acc.add(p.fine))
            .to_money()
            .ok_or_else(|| LedgerError::calculation("total fines overflowed"))?;

        let summary = StatementSummary {
            installment_count: installments.len() as u32,
            pending_installments: installments.iter().filter(|i| i.is_pending()).count() as u32,
            payment_count: payments.len() as u32,
            total_fines,
            next_due: oldest_pending(&installments).map(|idx| installments[idx].clone()),
        };

        Ok(LoanStatement {
            loan: document.loan.clone(),
            installments,
            payments,
            summary,
        })
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Rate;
    use crate::errors::ErrorKind;
    use crate::loan::LoanTerms;
    use crate::schedule::ScheduleGenerator;
    use crate::types::{Cadence, PaymentMode};
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    #[test]
    fn test_statement_summary() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let terms = LoanTerms {
            borrower_name: "Kavya".to_string(),
            branch_id: None,
            principal: Money::from_major(6_000),
            interest_rate: Rate::from_percentage(20),
            tenor: 3,
            cadence: Cadence::Monthly,
        };
        let mut loan = Loan::submit(Uuid::new_v4(), terms, None, now, 2).unwrap();
        loan.approve(now).unwrap();

        let mut document = LoanDocument::new(loan);
        document.installments = ScheduleGenerator::generate(&document.loan, now).unwrap();
        document.installments.reverse();
        let first_id = document.installments[2].id;
        document.installments[2].settle(Uuid::new_v4(), Money::from_major(2_400), now);

        let statement = LoanStatement::from_document(&document).unwrap();
        assert_eq!(statement.installments[0].installment_number, 1);
        assert_eq!(statement.installments[0].id, first_id);
        assert_eq!(statement.summary.installment_count, 3);
        assert_eq!(statement.summary.pending_installments, 2);
        assert_eq!(statement.summary.next_due.as_ref().map(|i| i.installment_number), Some(2));
        assert_eq!(statement.summary.total_fines, Money::ZERO);

        let json = statement.to_json_pretty().unwrap();
        assert!(json.contains("\"borrower_name\": \"Kavya\""));
        assert!(json.contains("\"expected_amount\": \"2400"));
    }

    #[test]
    fn test_fine_total_overflow_is_an_error() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let terms = LoanTerms {
            borrower_name: "Kavya".to_string(),
            branch_id: None,
            principal: Money::from_major(6_000),
            interest_rate: Rate::from_percentage(20),
            tenor: 3,
            cadence: Cadence::Monthly,
        };
        let loan = Loan::submit(Uuid::new_v4(), terms, None, now, 2).unwrap();
        let mut document = LoanDocument::new(loan);

        // each fine is representable, their sum is not
        let fine = Money::from_decimal(Decimal::from_i128_with_scale(5 * 10_i128.pow(28), 0));
        for _ in 0..2 {
            document.payments.push(PaymentEntry {
                id: Uuid::new_v4(),
                loan_id: document.loan.id,
                amount_paid: Money::from_major(1),
                fine,
                payment_mode: PaymentMode::Cash,
                collection_date: now.date_naive(),
                remarks: None,
                installment_id: None,
                collected_by: None,
                created_at: now,
                edited_by: None,
                edited_at: None,
            });
        }

        let err = LoanStatement::from_document(&document).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
