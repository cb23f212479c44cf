use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate, Tally};
use crate::errors::{LedgerError, Result};
use crate::types::{Cadence, LoanId, LoanStatus};

/// loan aggregate root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    // identification
    pub id: LoanId,
    pub borrower_name: String,
    pub branch_id: Option<String>,

    pub status: LoanStatus,

    // terms
    pub principal: Money,
    pub interest_rate: Rate,
    pub tenor: u32,
    pub cadence: Cadence,
    pub daily_emi: Option<Money>,
    pub weekly_emi: Option<Money>,
    pub monthly_emi: Option<Money>,

    /// anchor for the schedule and the report's expected amounts
    pub approval_date: Option<DateTime<Utc>>,

    /// sum of (amount_paid + fine) over the loan's current payment entries
    pub total_amount_paid: Money,
    pub schedule_generated: bool,

    // audit
    pub submitted_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_status_change: DateTime<Utc>,
}

/// validated terms for a new loan
#[derive(Debug, Clone, PartialEq)]
pub struct LoanTerms {
    pub borrower_name: String,
    pub branch_id: Option<String>,
    pub principal: Money,
    pub interest_rate: Rate,
    pub tenor: u32,
    pub cadence: Cadence,
}

impl Loan {
    /// create a pending loan with its cadence EMI derived from the terms
    pub fn submit(
        id: LoanId,
        terms: LoanTerms,
        submitted_by: Option<String>,
        now: DateTime<Utc>,
        currency_dp: u32,
    ) -> Result<Self> {
        let emi = derive_emi(terms.principal, terms.interest_rate, terms.tenor, currency_dp)?;

        let mut loan = Self {
            id,
            borrower_name: terms.borrower_name,
            branch_id: terms.branch_id,
            status: LoanStatus::Pending,
            principal: terms.principal,
            interest_rate: terms.interest_rate,
            tenor: terms.tenor,
            cadence: terms.cadence,
            daily_emi: None,
            weekly_emi: None,
            monthly_emi: None,
            approval_date: None,
            total_amount_paid: Money::ZERO,
            schedule_generated: false,
            submitted_by,
            created_at: now,
            last_status_change: now,
        };
        match terms.cadence {
            Cadence::Daily => loan.daily_emi = Some(emi),
            Cadence::Weekly => loan.weekly_emi = Some(emi),
            Cadence::Monthly => loan.monthly_emi = Some(emi),
        }
        Ok(loan)
    }

    /// the EMI field matching the loan's cadence
    pub fn emi_amount(&self) -> Option<Money> {
        match self.cadence {
            Cadence::Daily => self.daily_emi,
            Cadence::Weekly => self.weekly_emi,
            Cadence::Monthly => self.monthly_emi,
        }
    }

    /// calendar day of approval, in UTC
    pub fn approval_day(&self) -> Option<NaiveDate> {
        self.approval_date.map(|d| d.date_naive())
    }

    /// first day after the loan term: approval day + tenor cadence units
    pub fn end_date(&self) -> Option<NaiveDate> {
        self.approval_day()
            .and_then(|start| self.cadence.advance_date(start, self.tenor))
    }

    pub fn accepts_payments(&self) -> bool {
        self.status == LoanStatus::Approved
    }

    /// Pending or VerificationRequired -> Approved
    pub fn approve(&mut self, now: DateTime<Utc>) -> Result<LoanStatus> {
        let previous = self.transition(
            &[LoanStatus::Pending, LoanStatus::VerificationRequired],
            LoanStatus::Approved,
            now,
        )?;
        self.approval_date = Some(now);
        Ok(previous)
    }

    /// Pending or VerificationRequired -> Rejected
    pub fn reject(&mut self, now: DateTime<Utc>) -> Result<LoanStatus> {
        self.transition(
            &[LoanStatus::Pending, LoanStatus::VerificationRequired],
            LoanStatus::Rejected,
            now,
        )
    }

    /// Pending -> VerificationRequired
    pub fn require_verification(&mut self, now: DateTime<Utc>) -> Result<LoanStatus> {
        self.transition(&[LoanStatus::Pending], LoanStatus::VerificationRequired, now)
    }

    /// Approved -> PaidInFull
    pub fn mark_paid_in_full(&mut self, now: DateTime<Utc>) -> Result<LoanStatus> {
        self.transition(&[LoanStatus::Approved], LoanStatus::PaidInFull, now)
    }

    fn transition(
        &mut self,
        from: &[LoanStatus],
        to: LoanStatus,
        now: DateTime<Utc>,
    ) -> Result<LoanStatus> {
        if !from.contains(&self.status) {
            return Err(LedgerError::InvalidLoanStatus {
                status: self.status,
                message: format!("cannot move to {}", to),
            });
        }
        let previous = self.status;
        self.status = to;
        self.last_status_change = now;
        Ok(previous)
    }
}

/// `(principal + principal * rate / 100) / tenor`, rounded half-up
pub fn derive_emi(principal: Money, rate: Rate, tenor: u32, currency_dp: u32) -> Result<Money> {
    if !principal.is_positive() {
        return Err(LedgerError::invalid_argument(format!(
            "principal must be positive, got {}",
            principal
        )));
    }
    if rate.is_negative() {
        return Err(LedgerError::invalid_argument(format!(
            "interest rate must not be negative, got {}",
            rate
        )));
    }
    if tenor == 0 {
        return Err(LedgerError::invalid_argument("tenor must be at least 1"));
    }

    let interest = principal
        .percentage(rate)
        .ok_or_else(|| LedgerError::calculation("interest overflowed"))?;
    let repayable = Tally::from(principal)
        .add(interest)
        .to_money()
        .ok_or_else(|| LedgerError::calculation("repayable amount overflowed"))?;

    let emi = repayable
        .as_decimal()
        .checked_div(Decimal::from(tenor))
        .ok_or_else(|| LedgerError::calculation("emi division failed"))?;
    Ok(Money::from_decimal(emi).round_half_up(currency_dp))
}

/// point-in-time copy of a loan returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanSnapshot {
    pub loan: Loan,
    pub captured_at: DateTime<Utc>,
    pub trigger: String,
}

impl LoanSnapshot {
    pub fn capture(loan: &Loan, captured_at: DateTime<Utc>, trigger: impl Into<String>) -> Self {
        Self {
            loan: loan.clone(),
            captured_at,
            trigger: trigger.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn terms(cadence: Cadence) -> LoanTerms {
        LoanTerms {
            borrower_name: "Asha".to_string(),
            branch_id: Some("north".to_string()),
            principal: Money::from_major(10_000),
            interest_rate: Rate::from_percentage(10),
            tenor: 10,
            cadence,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_submit_derives_cadence_emi() {
        let loan = Loan::submit(Uuid::new_v4(), terms(Cadence::Daily), None, now(), 2).unwrap();
        assert_eq!(loan.status, LoanStatus::Pending);
        assert_eq!(loan.total_amount_paid, Money::ZERO);
        assert_eq!(loan.daily_emi, Some(Money::from_major(1_100)));
        assert_eq!(loan.weekly_emi, None);
        assert_eq!(loan.emi_amount(), Some(Money::from_major(1_100)));

        let weekly = Loan::submit(Uuid::new_v4(), terms(Cadence::Weekly), None, now(), 2).unwrap();
        assert_eq!(weekly.weekly_emi, Some(Money::from_major(1_100)));
        assert_eq!(weekly.daily_emi, None);
    }

    #[test]
    fn test_emi_rounds_half_up() {
        // 1000 * 1.05 / 3 = 350
        assert_eq!(
            derive_emi(Money::from_major(1_000), Rate::from_percentage(5), 3, 2).unwrap(),
            Money::from_major(350)
        );
        // 100 / 3 = 33.333.. -> 33.33
        assert_eq!(
            derive_emi(Money::from_major(100), Rate::ZERO, 3, 2).unwrap().as_decimal(),
            dec!(33.33)
        );
        // 0.05 / 2 = 0.025 -> 0.03
        assert_eq!(
            derive_emi(Money::from_str_exact("0.05").unwrap(), Rate::ZERO, 2, 2)
                .unwrap()
                .as_decimal(),
            dec!(0.03)
        );
    }

    #[test]
    fn test_emi_rejects_bad_terms() {
        assert!(derive_emi(Money::ZERO, Rate::ZERO, 3, 2).is_err());
        assert!(derive_emi(Money::from_major(100), Rate::ZERO, 0, 2).is_err());
        let negative = Rate::from_percentage_decimal(dec!(-1));
        assert!(derive_emi(Money::from_major(100), negative, 3, 2).is_err());
    }

    #[test]
    fn test_status_machine() {
        let mut loan = Loan::submit(Uuid::new_v4(), terms(Cadence::Monthly), None, now(), 2).unwrap();
        let later = now() + chrono::Duration::days(2);

        assert_eq!(loan.require_verification(later).unwrap(), LoanStatus::Pending);
        assert_eq!(loan.approve(later).unwrap(), LoanStatus::VerificationRequired);
        assert_eq!(loan.approval_date, Some(later));
        assert!(loan.accepts_payments());

        // approved loans cannot be rejected
        let err = loan.reject(later).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidLoanStatus { status: LoanStatus::Approved, .. }));

        loan.mark_paid_in_full(later).unwrap();
        assert!(!loan.accepts_payments());
        assert!(loan.approve(later).is_err());
    }

    #[test]
    fn test_end_date() {
        let mut loan = Loan::submit(Uuid::new_v4(), terms(Cadence::Weekly), None, now(), 2).unwrap();
        assert_eq!(loan.end_date(), None);
        loan.approve(now()).unwrap();
        assert_eq!(loan.end_date(), NaiveDate::from_ymd_opt(2024, 3, 11));
    }
}
