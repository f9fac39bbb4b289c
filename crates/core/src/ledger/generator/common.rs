//! Common charges: documents as income or expense, transactions against the business.

use chargebook_shared::types::Money;

use super::Context;
use crate::charge::{Document, DocumentType, Transaction};
use crate::currency::CurrencyService;
use crate::ledger::error::LedgerError;
use crate::ledger::record::{LedgerLeg, LedgerRecord};

pub(super) fn generate(ctx: &Context<'_>) -> Result<Vec<LedgerRecord>, LedgerError> {
    let mut records = document_records(ctx)?;
    records.extend(transaction_records(ctx)?);
    Ok(records)
}

/// Credit card bill settlements only book their transactions; the card is the business.
pub(super) fn generate_creditcard_bank(ctx: &Context<'_>) -> Result<Vec<LedgerRecord>, LedgerError> {
    transaction_records(ctx)
}

pub(super) fn transaction_records(ctx: &Context<'_>) -> Result<Vec<LedgerRecord>, LedgerError> {
    let mut records = Vec::new();
    for tx in ctx.input.transactions {
        if let Some(record) = transaction_record(ctx, tx)? {
            records.push(record);
        }
    }
    Ok(records)
}

pub(super) fn transaction_record(
    ctx: &Context<'_>,
    tx: &Transaction,
) -> Result<Option<LedgerRecord>, LedgerError> {
    if tx.amount.is_zero() {
        return Ok(None);
    }
    let business = tx.business_id.ok_or(LedgerError::MissingCounterparty {
        charge_id: ctx.charge_id(),
    })?;
    ctx.transaction_record(tx, business)
}

pub(super) fn document_records(ctx: &Context<'_>) -> Result<Vec<LedgerRecord>, LedgerError> {
    let documents = ctx.input.documents;
    let has_invoice = documents.iter().any(|doc| doc.document_type.is_invoice());

    let mut records = Vec::new();
    for doc in documents {
        if !doc.document_type.is_bookable(has_invoice) {
            continue;
        }
        if let Some(record) = document_record(ctx, doc)? {
            records.push(record);
        }
    }
    Ok(records)
}

/// Books one document.
///
/// Income: debit the customer with the total, credit the tax category with the
/// net amount and output VAT with the VAT. Expense is the mirror image against
/// input VAT. Credit invoices and negative totals reverse the sides.
fn document_record(ctx: &Context<'_>, doc: &Document) -> Result<Option<LedgerRecord>, LedgerError> {
    let incomplete = |field| LedgerError::IncompleteDocument {
        document_id: doc.id,
        field,
    };

    let total = doc.total_amount.ok_or_else(|| incomplete("total amount"))?;
    if total.is_zero() {
        return Ok(None);
    }
    let date = doc.date.ok_or_else(|| incomplete("date"))?;
    let currency = doc.currency().ok_or_else(|| incomplete("currency"))?;
    let counterparty = doc
        .counterparty(ctx.ledger.owner_id)
        .ok_or(LedgerError::MissingCounterparty {
            charge_id: ctx.charge_id(),
        })?;
    let category = ctx.tax_category()?;

    let total = total.abs();
    let vat = doc.vat_amount.unwrap_or_default().abs();
    if vat > total {
        return Err(incomplete("VAT amount"));
    }

    let rate = ctx.input.rates.rate_on(currency, date)?;
    let local_total = CurrencyService::convert(total, rate);
    let local_vat = CurrencyService::convert(vat, rate);
    let local_net = local_total - local_vat;

    let foreign = |amount| (currency != ctx.local_currency()).then(|| Money::new(amount, currency));
    let total_leg = LedgerLeg {
        entity: counterparty,
        local_amount: local_total,
        foreign: foreign(total),
    };
    let net_leg = LedgerLeg {
        entity: category,
        local_amount: local_net,
        foreign: foreign(total - vat),
    };

    let is_income = doc.debtor_id == Some(counterparty);
    let vat_leg = LedgerLeg {
        entity: if is_income {
            ctx.ledger.accounts.output_vat
        } else {
            ctx.ledger.accounts.input_vat
        },
        local_amount: local_vat,
        foreign: foreign(vat),
    };

    let (debits, credits) = if is_income {
        (vec![total_leg], vec![net_leg, vat_leg])
    } else {
        (vec![net_leg, vat_leg], vec![total_leg])
    };
    let Some(record) = ctx.record_from_legs(debits, credits, date, date)? else {
        return Ok(None);
    };

    let reverse =
        (doc.document_type == DocumentType::CreditInvoice) != doc.total_amount.is_some_and(|t| t.is_sign_negative());
    let record = if reverse { record.reversed() } else { record };

    let description = match &doc.serial_number {
        Some(serial) => format!("{} {serial}", doc.document_type),
        None => doc.document_type.to_string(),
    };
    Ok(Some(
        record
            .with_description(description)
            .with_reference(doc.serial_number.clone()),
    ))
}
