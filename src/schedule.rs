use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::loan::Loan;
use crate::types::{InstallmentId, InstallmentStatus, LoanId, LoanStatus, PaymentId};

/// one due date/amount in a loan's repayment plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledInstallment {
    pub id: InstallmentId,
    pub loan_id: LoanId,
    /// 1-based position in the plan
    pub installment_number: u32,
    pub due_date: DateTime<Utc>,
    /// EMI frozen at generation time
    pub expected_amount: Money,
    pub status: InstallmentStatus,
    pub payment_id: Option<PaymentId>,
    pub amount_paid: Option<Money>,
    pub paid_on: Option<DateTime<Utc>>,
}

impl ScheduledInstallment {
    pub fn is_pending(&self) -> bool {
        self.status == InstallmentStatus::Pending
    }

    /// mark settled by `payment_id`
    pub fn settle(&mut self, payment_id: PaymentId, amount_paid: Money, paid_on: DateTime<Utc>) {
        self.status = InstallmentStatus::Paid;
        self.payment_id = Some(payment_id);
        self.amount_paid = Some(amount_paid);
        self.paid_on = Some(paid_on);
    }

    /// back to pending with the payment snapshot cleared
    pub fn reopen(&mut self) {
        self.status = InstallmentStatus::Pending;
        self.payment_id = None;
        self.amount_paid = None;
        self.paid_on = None;
    }
}

/// builds the installment plan for an approved loan
pub struct ScheduleGenerator;

impl ScheduleGenerator {
    /// `tenor` installments due at anchor + 1..=tenor cadence units.
    ///
    /// Fails with a precondition error naming the first missing or invalid field.
    pub fn generate(loan: &Loan, now: DateTime<Utc>) -> Result<Vec<ScheduledInstallment>> {
        if loan.status != LoanStatus::Approved {
            return Err(LedgerError::InvalidLoanStatus {
                status: loan.status,
                message: "schedules are generated for approved loans only".to_string(),
            });
        }

        let anchor = loan.approval_date.ok_or_else(|| {
            LedgerError::failed_precondition("approval_date is missing")
        })?;
        if anchor > now {
            return Err(LedgerError::failed_precondition(format!(
                "approval_date {} is in the future",
                anchor
            )));
        }
        if loan.tenor == 0 {
            return Err(LedgerError::failed_precondition("tenor must be a positive integer"));
        }
        let emi = match loan.emi_amount() {
            Some(emi) if emi.is_positive() => emi,
            _ => {
                return Err(LedgerError::failed_precondition(format!(
                    "{:?} EMI amount is missing or not positive",
                    loan.cadence
                )))
            }
        };

        (0..loan.tenor)
            .map(|i| {
                let due_date = loan.cadence.advance(anchor, i + 1).ok_or_else(|| {
                    LedgerError::calculation(format!(
                        "due date for installment {} is out of range",
                        i + 1
                    ))
                })?;
                Ok(ScheduledInstallment {
                    id: Uuid::new_v4(),
                    loan_id: loan.id,
                    installment_number: i + 1,
                    due_date,
                    expected_amount: emi,
                    status: InstallmentStatus::Pending,
                    payment_id: None,
                    amount_paid: None,
                    paid_on: None,
                })
            })
            .collect()
    }
}

/// oldest pending installment by due date
pub fn oldest_pending(installments: &[ScheduledInstallment]) -> Option<usize> {
    installments
        .iter()
        .enumerate()
        .filter(|(_, inst)| inst.is_pending())
        .min_by_key(|(_, inst)| (inst.due_date, inst.installment_number))
        .map(|(idx, _)| idx)
}
