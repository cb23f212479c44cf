/// quick start - approve a daily loan, collect for a few days, print the report
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use emi_ledger_rs::{
    Caller, DailyReportRequest, DeletePaymentRequest, Ledger, LedgerConfig, LoanActionRequest,
    LoanApplicationRequest, MemoryStore, MoneyInput, RecordPaymentRequest, SafeTimeProvider,
    TimeSource,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
    ));
    let controller = time.test_control().unwrap();

    let ledger = Ledger::new(Arc::new(MemoryStore::new()), LedgerConfig::default())?;
    let officer = Caller::user("officer-7");
    let admin = Caller::admin("branch-admin");

    // ₹10,000 at 10% over 10 days
    let application = ledger.submit_loan(
        &officer,
        &LoanApplicationRequest {
            borrower_name: "Sunita Devi".to_string(),
            branch_id: Some("north".to_string()),
            principal: MoneyInput::from(10_000_i64),
            interest_rate: MoneyInput::from(10_i64),
            tenor: 10,
            cadence: "Daily".to_string(),
        },
        &time,
    )?;
    let loan_id = application.loan_id.to_string();

    let approved = ledger.approve_loan(&admin, &LoanActionRequest { loan_id: loan_id.clone() }, &time)?;
    println!("{}", approved.message);

    // collect on the next three days
    let mut first_payment = None;
    for _ in 0..3 {
        controller.advance(Duration::days(1));
        let receipt = ledger.record_payment(
            &officer,
            &RecordPaymentRequest {
                loan_id: loan_id.clone(),
                amount: MoneyInput::from("1100"),
                fine: None,
                mode: "Cash".to_string(),
                collection_date: time.now().format("%Y-%m-%d").to_string(),
                remarks: None,
            },
            &time,
        )?;
        println!(
            "installment {:?} settled, total paid {}",
            receipt.settled_installment, receipt.loan.loan.total_amount_paid
        );
        first_payment.get_or_insert(receipt.payment_id);
    }

    // reverse the first collection
    if let Some(payment_id) = first_payment {
        let deleted = ledger.delete_payment(
            &admin,
            &DeletePaymentRequest {
                loan_id: loan_id.clone(),
                payment_id: payment_id.to_string(),
            },
            &time,
        )?;
        println!("after delete, total paid {}", deleted.loan.loan.total_amount_paid);
    }

    let report = ledger.daily_report(
        &officer,
        &DailyReportRequest {
            number_of_days: 7,
            reference_date: None,
            branch_id: Some("north".to_string()),
        },
        &time,
    )?;
    for row in &report.rows {
        println!("{}  collected {:>8}  expected {:>8}", row.date, row.collected_today, row.expected_today);
    }

    println!("{}", ledger.statement(application.loan_id)?.to_json_pretty()?);
    println!("{} audit events", ledger.take_events().len());

    Ok(())
}
