//! Monthly VAT settlements.

use rust_decimal::Decimal;

use super::{Context, common};
use crate::ledger::error::LedgerError;
use crate::ledger::record::{LedgerLeg, LedgerRecord};

/// Books the VAT report as two aggregate records against the VAT authority.
///
/// Deductible input VAT is the sum of every line's VAT after deduction; output
/// VAT is the sum of every line's rounded VAT to add. Payment transactions are
/// booked as ordinary transactions.
pub(super) fn generate(ctx: &Context<'_>) -> Result<Vec<LedgerRecord>, LedgerError> {
    let lines = ctx.input.vat_records;
    let input_vat: Decimal = lines.iter().map(|line| line.local_vat_after_deduction).sum();
    let output_vat: Decimal = lines.iter().map(|line| line.rounded_vat_to_add).sum();

    let mut records = Vec::new();
    if !input_vat.is_zero() || !output_vat.is_zero() {
        let date = report_date(ctx)?;
        let accounts = &ctx.ledger.accounts;
        if !input_vat.is_zero() {
            records.push(
                LedgerRecord::transfer(
                    ctx.charge_id(),
                    LedgerLeg::local(accounts.vat_authority, input_vat),
                    LedgerLeg::local(accounts.input_vat, input_vat),
                    date,
                    date,
                )
                .with_description("Input VAT"),
            );
        }
        if !output_vat.is_zero() {
            records.push(
                LedgerRecord::transfer(
                    ctx.charge_id(),
                    LedgerLeg::local(accounts.output_vat, output_vat),
                    LedgerLeg::local(accounts.vat_authority, output_vat),
                    date,
                    date,
                )
                .with_description("Output VAT"),
            );
        }
    }

    records.extend(common::transaction_records(ctx)?);
    Ok(records)
}

/// The report is dated by its earliest payment, falling back to the charge's own dates.
fn report_date(ctx: &Context<'_>) -> Result<chrono::NaiveDate, LedgerError> {
    let mut payment_dates = Vec::new();
    for tx in ctx.input.transactions {
        payment_dates.push(ctx.effective_date(tx)?);
    }
    let summary = &ctx.charge().summary;
    payment_dates
        .into_iter()
        .min()
        .or(summary.min_debit_date)
        .or(summary.min_event_date)
        .or(summary.min_documents_date)
        .ok_or(LedgerError::MissingChargeDate {
            charge_id: ctx.charge_id(),
        })
}
