use hourglass_rs::SafeTimeProvider;
use uuid::Uuid;

use crate::api::{
    Caller, DeletePaymentRequest, DeletePaymentResponse, EditPaymentRequest, LedgerResponse,
    RecordPaymentRequest, RecordPaymentResponse,
};
use crate::config::InstallmentLinkPolicy;
use crate::decimal::{Money, Tally};
use crate::errors::{LedgerError, Result};
use crate::events::LedgerEvent;
use crate::ledger::Ledger;
use crate::loan::LoanSnapshot;
use crate::schedule::oldest_pending;
use crate::store::{LoanDocument, LoanStore};

use super::PaymentEntry;

/// turn an invalid tally into a transaction-aborting error
fn settle_tally(tally: Tally, what: &str) -> Result<Money> {
    tally
        .to_money()
        .ok_or_else(|| LedgerError::calculation(format!("{} is not a valid decimal", what)))
}

fn reopen_linked(
    doc: &mut LoanDocument,
    entry: &PaymentEntry,
    now: chrono::DateTime<chrono::Utc>,
) -> Option<LedgerEvent> {
    let installment = doc
        .installments
        .iter_mut()
        .find(|inst| Some(inst.id) == entry.installment_id && inst.payment_id == Some(entry.id))?;
    installment.reopen();
    Some(LedgerEvent::InstallmentReopened {
        loan_id: doc.loan.id,
        installment_id: installment.id,
        installment_number: installment.installment_number,
        timestamp: now,
    })
}

impl<S: LoanStore> Ledger<S> {
    /// record a collection, settling the oldest pending installment
    pub fn record_payment(
        &self,
        caller: &Caller,
        request: &RecordPaymentRequest,
        time: &SafeTimeProvider,
    ) -> Result<RecordPaymentResponse> {
        let uid = caller.require_authenticated()?.to_string();
        let (loan_id, details) = request.validate()?;
        let now = time.now();
        let payment_id = Uuid::new_v4();

        let (entry, settled, loan) = self.transact("record_payment", loan_id, |doc| {
            if !doc.loan.accepts_payments() {
                return Err(LedgerError::InvalidLoanStatus {
                    status: doc.loan.status,
                    message: "payments are only accepted on approved loans".to_string(),
                });
            }

            let total = settle_tally(
                Tally::from(doc.loan.total_amount_paid)
                    .add(details.amount)
                    .add(details.fine),
                "total amount paid",
            )?;

            let mut settled = None;
            if let Some(idx) = oldest_pending(&doc.installments) {
                let installment = &mut doc.installments[idx];
                installment.settle(payment_id, details.amount, now);
                settled = Some((installment.id, installment.installment_number));
            }

            let entry = PaymentEntry {
                id: payment_id,
                loan_id,
                amount_paid: details.amount,
                fine: details.fine,
                payment_mode: details.mode,
                collection_date: details.collection_date,
                remarks: details.remarks.clone(),
                installment_id: settled.map(|(id, _)| id),
                collected_by: Some(uid.clone()),
                created_at: now,
                edited_by: None,
                edited_at: None,
            };
            doc.payments.push(entry.clone());
            doc.loan.total_amount_paid = total;

            Ok((entry, settled.map(|(_, number)| number), doc.loan.clone()))
        })?;

        let mut events = vec![LedgerEvent::PaymentRecorded {
            loan_id,
            payment_id,
            amount: entry.amount_paid,
            fine: entry.fine,
            collection_date: entry.collection_date,
            installment_number: settled,
            total_amount_paid: loan.total_amount_paid,
            timestamp: now,
        }];
        match settled {
            Some(number) => tracing::info!(
                %loan_id,
                %payment_id,
                installment = number,
                total = %loan.total_amount_paid,
                "payment recorded"
            ),
            None => {
                tracing::warn!(
                    %loan_id,
                    %payment_id,
                    amount = %entry.amount_paid,
                    "no pending installment, payment recorded as overpayment"
                );
                events.push(LedgerEvent::OverpaymentRecorded {
                    loan_id,
                    payment_id,
                    amount: entry.amount_paid,
                    timestamp: now,
                });
            }
        }
        self.publish(events);

        Ok(RecordPaymentResponse {
            payment_id,
            settled_installment: settled,
            loan: LoanSnapshot::capture(&loan, now, format!("payment: {}", payment_id)),
        })
    }

    /// replace a payment entry and re-derive the loan's running total
    pub fn edit_payment(
        &self,
        caller: &Caller,
        request: &EditPaymentRequest,
        time: &SafeTimeProvider,
    ) -> Result<LedgerResponse> {
        let uid = caller.require_admin()?.to_string();
        let (loan_id, payment_id, details) = request.validate()?;
        let now = time.now();
        let link = self.config.installment_link;

        let (old_contribution, new_contribution, loan) =
            self.transact("edit_payment", loan_id, |doc| {
                let idx = doc.payment_index(payment_id).ok_or_else(|| {
                    LedgerError::not_found(format!(
                        "payment {} does not exist on loan {}",
                        payment_id, loan_id
                    ))
                })?;

                let old_contribution = settle_tally(doc.payments[idx].contribution(), "stored payment")?;
                let new_contribution = settle_tally(details.contribution(), "new payment")?;

                let reverted = Tally::from(doc.loan.total_amount_paid).subtract(old_contribution);
                if reverted.is_invalid() {
                    return Err(LedgerError::calculation("total amount paid is not a valid decimal"));
                }
                let total = settle_tally(reverted.add(new_contribution), "total amount paid")?;
                if total.is_negative() {
                    return Err(LedgerError::calculation(format!(
                        "edit would make total amount paid negative ({})",
                        total
                    )));
                }

                doc.payments[idx].overwrite(&details, Some(uid.clone()), now);
                doc.loan.total_amount_paid = total;

                if link == InstallmentLinkPolicy::Reopen {
                    let entry = doc.payments[idx].clone();
                    if let Some(installment) = doc.installments.iter_mut().find(|inst| {
                        Some(inst.id) == entry.installment_id && inst.payment_id == Some(entry.id)
                    }) {
                        installment.amount_paid = Some(entry.amount_paid);
                    }
                }

                Ok((old_contribution, new_contribution, doc.loan.clone()))
            })?;

        tracing::info!(
            %loan_id,
            %payment_id,
            old = %old_contribution,
            new = %new_contribution,
            total = %loan.total_amount_paid,
            "payment edited"
        );
        self.publish(vec![LedgerEvent::PaymentEdited {
            loan_id,
            payment_id,
            old_contribution,
            new_contribution,
            total_amount_paid: loan.total_amount_paid,
            edited_by: Some(uid),
            timestamp: now,
        }]);

        Ok(LedgerResponse {
            loan: LoanSnapshot::capture(&loan, now, format!("edit: {}", payment_id)),
        })
    }

    /// remove a payment entry; deleting an entry that is already gone is a no-op
    pub fn delete_payment(
        &self,
        caller: &Caller,
        request: &DeletePaymentRequest,
        time: &SafeTimeProvider,
    ) -> Result<DeletePaymentResponse> {
        let uid = caller.require_admin()?.to_string();
        let (loan_id, payment_id) = request.validate()?;
        let now = time.now();
        let link = self.config.installment_link;

        let (removed, reopened, loan) = self.transact("delete_payment", loan_id, |doc| {
            let Some(idx) = doc.payment_index(payment_id) else {
                return Ok((None, None, doc.loan.clone()));
            };

            let contribution = settle_tally(doc.payments[idx].contribution(), "stored payment")?;
            let total = settle_tally(
                Tally::from(doc.loan.total_amount_paid).subtract(contribution),
                "total amount paid",
            )?;
            if total.is_negative() {
                return Err(LedgerError::calculation(format!(
                    "delete would make total amount paid negative ({})",
                    total
                )));
            }

            let entry = doc.payments.remove(idx);
            doc.loan.total_amount_paid = total;

            let reopened = match link {
                InstallmentLinkPolicy::Reopen => reopen_linked(doc, &entry, now),
                InstallmentLinkPolicy::Detached => None,
            };

            Ok((Some(contribution), reopened, doc.loan.clone()))
        })?;

        let Some(contribution) = removed else {
            tracing::info!(%loan_id, %payment_id, "payment already deleted");
            return Ok(DeletePaymentResponse {
                deleted: false,
                loan: LoanSnapshot::capture(&loan, now, "delete: no-op"),
            });
        };

        tracing::info!(
            %loan_id,
            %payment_id,
            %contribution,
            total = %loan.total_amount_paid,
            "payment deleted"
        );
        let mut events = vec![LedgerEvent::PaymentDeleted {
            loan_id,
            payment_id,
            contribution,
            total_amount_paid: loan.total_amount_paid,
            deleted_by: Some(uid),
            timestamp: now,
        }];
        events.extend(reopened);
        self.publish(events);

        Ok(DeletePaymentResponse {
            deleted: true,
            loan: LoanSnapshot::capture(&loan, now, format!("delete: {}", payment_id)),
        })
    }
}
