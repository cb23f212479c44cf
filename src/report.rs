//! Daily expected-vs-collected aggregation.
//!
//! Pure and read-only: the aggregator only looks at the loans and payment entries it is
//! handed. `Ledger::daily_report` adds the fetch step on top of it.

use std::collections::HashMap;

use chrono::{Datelike, Days, NaiveDate};
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};

use crate::api::{Caller, DailyReportRequest};
use crate::decimal::{Money, Rate, Tally};
use crate::errors::{LedgerError, Result};
use crate::ledger::Ledger;
use crate::loan::Loan;
use crate::payments::PaymentEntry;
use crate::store::LoanStore;
use crate::types::{Cadence, LoanStatus};

/// one calendar day of the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCollectionRow {
    pub date: NaiveDate,
    pub collected_today: Money,
    pub expected_today: Money,
}

/// totals over a report window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub days: u32,
    pub total_collected: Money,
    pub total_expected: Money,
    /// collected / expected; `None` when nothing was expected
    pub efficiency: Option<Rate>,
}

impl CollectionSummary {
    /// window totals; fails when a total leaves the decimal range
    pub fn from_rows(rows: &[DailyCollectionRow]) -> Result<Self> {
        let total_collected = rows
            .iter()
            .fold(Tally::ZERO, |acc, r| acc.add(r.collected_today))
            .to_money()
            .ok_or_else(|| LedgerError::calculation("total collected overflowed"))?;
        let total_expected = rows
            .iter()
            .fold(Tally::ZERO, |acc, r| acc.add(r.expected_today))
            .to_money()
            .ok_or_else(|| LedgerError::calculation("total expected overflowed"))?;

        let efficiency = if total_expected.is_zero() {
            None
        } else {
            let rate = total_collected
                .as_decimal()
                .checked_div(total_expected.as_decimal())
                .and_then(Rate::from_fraction)
                .ok_or_else(|| LedgerError::calculation("collection efficiency overflowed"))?;
            Some(rate)
        };

        Ok(CollectionSummary {
            days: rows.len() as u32,
            total_collected,
            total_expected,
            efficiency,
        })
    }
}

/// report output: rows most recent first, plus window totals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyReport {
    pub reference_date: NaiveDate,
    pub rows: Vec<DailyCollectionRow>,
    pub summary: CollectionSummary,
}

/// builds daily collection reports
pub struct CollectionAggregator {
    max_days: u32,
    currency_dp: u32,
}

impl CollectionAggregator {
    pub fn new(max_days: u32, currency_dp: u32) -> Self {
        Self {
            max_days,
            currency_dp,
        }
    }

    /// `number_of_days` rows ending at `reference_date` inclusive, most recent first.
    ///
    /// Sums are kept exact and rounded half-up only once per row.
    pub fn build_daily_report(
        &self,
        loans: &[Loan],
        payments: &[PaymentEntry],
        number_of_days: u32,
        reference_date: NaiveDate,
    ) -> Result<Vec<DailyCollectionRow>> {
        if number_of_days == 0 || number_of_days > self.max_days {
            return Err(LedgerError::invalid_argument(format!(
                "number_of_days must be between 1 and {}, got {}",
                self.max_days, number_of_days
            )));
        }

        let collected = collected_by_day(payments)?;
        let schedules: Vec<ExpectedSchedule> =
            loans.iter().filter_map(ExpectedSchedule::from_loan).collect();

        (0..number_of_days)
            .map(|offset| {
                let date = reference_date
                    .checked_sub_days(Days::new(u64::from(offset)))
                    .ok_or_else(|| {
                        LedgerError::invalid_argument(format!(
                            "a {} day window ending {} runs past the earliest date",
                            number_of_days, reference_date
                        ))
                    })?;

                let expected = schedules
                    .iter()
                    .filter(|s| s.is_due_on(date))
                    .fold(Tally::ZERO, |acc, s| acc.add(s.emi));
                let expected = expected.to_money().ok_or_else(|| {
                    LedgerError::calculation(format!("expected amount for {} overflowed", date))
                })?;
                let collected_today = collected.get(&date).copied().unwrap_or(Money::ZERO);

                Ok(DailyCollectionRow {
                    date,
                    collected_today: collected_today.round_half_up(self.currency_dp),
                    expected_today: expected.round_half_up(self.currency_dp),
                })
            })
            .collect()
    }
}

/// exact collections per calendar day
fn collected_by_day(payments: &[PaymentEntry]) -> Result<HashMap<NaiveDate, Money>> {
    let mut by_day: HashMap<NaiveDate, Tally> = HashMap::new();
    for payment in payments {
        let slot = by_day.entry(payment.collection_date).or_insert(Tally::ZERO);
        *slot = slot.add(payment.amount_paid).add(payment.fine);
    }
    by_day
        .into_iter()
        .map(|(date, tally)| {
            tally
                .to_money()
                .map(|money| (date, money))
                .ok_or_else(|| LedgerError::calculation(format!("collections for {} overflowed", date)))
        })
        .collect()
}

/// the parts of a loan that decide what is expected on a given day
struct ExpectedSchedule {
    cadence: Cadence,
    start: NaiveDate,
    end: NaiveDate,
    emi: Money,
}

impl ExpectedSchedule {
    fn from_loan(loan: &Loan) -> Option<Self> {
        if loan.status != LoanStatus::Approved {
            return None;
        }
        let (Some(start), Some(end)) = (loan.approval_day(), loan.end_date()) else {
            tracing::warn!(loan_id = %loan.id, "loan has no usable approval date, skipped");
            return None;
        };
        let emi = match loan.emi_amount() {
            Some(emi) if emi.is_positive() => emi,
            other => {
                tracing::warn!(
                    loan_id = %loan.id,
                    cadence = ?loan.cadence,
                    emi = ?other.map(|m| m.as_decimal()),
                    "loan has no positive emi, skipped"
                );
                return None;
            }
        };
        Some(Self {
            cadence: loan.cadence,
            start,
            end,
            emi,
        })
    }

    fn is_due_on(&self, date: NaiveDate) -> bool {
        if date < self.start || date >= self.end {
            return false;
        }
        match self.cadence {
            Cadence::Daily => true,
            Cadence::Weekly => (date - self.start).num_days() % 7 == 0,
            Cadence::Monthly => date.day() == self.start.day(),
        }
    }
}

impl<S: LoanStore> Ledger<S> {
    /// fetch approved loans and their payments, then aggregate
    pub fn daily_report(
        &self,
        caller: &Caller,
        request: &DailyReportRequest,
        time: &SafeTimeProvider,
    ) -> Result<DailyReport> {
        caller.require_authenticated()?;
        let reference_date = match request.reference_date()? {
            Some(date) => date,
            None => time.now().date_naive(),
        };
        let branch = request
            .branch_id
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty());

        let loans: Vec<Loan> = self
            .store
            .loans_with_status(LoanStatus::Approved)?
            .into_iter()
            .filter(|loan| branch.map_or(true, |b| loan.branch_id.as_deref() == Some(b)))
            .collect();
        let loan_ids: Vec<_> = loans.iter().map(|loan| loan.id).collect();
        let payments = self.store.payments_for(&loan_ids)?;

        let aggregator =
            CollectionAggregator::new(self.config.max_report_days, self.config.currency_decimal_places);
        let rows = aggregator.build_daily_report(&loans, &payments, request.number_of_days, reference_date)?;
        let summary = CollectionSummary::from_rows(&rows)?;

        tracing::info!(
            %reference_date,
            days = request.number_of_days,
            loans = loans.len(),
            collected = %summary.total_collected,
            expected = %summary.total_expected,
            "daily collection report built"
        );

        Ok(DailyReport {
            reference_date,
            rows,
            summary,
        })
    }
}
