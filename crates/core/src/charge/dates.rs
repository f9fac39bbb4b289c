//! Effective dates and derived charge summaries.

use std::collections::BTreeSet;

use chargebook_shared::types::{CurrencyCode, FinancialEntityId};
use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::types::{ChargeSummary, Document, Transaction};

/// Returns the date a transaction is considered settled.
///
/// Preference order: bank timestamp, manual override, debit date. The event
/// date stands in only for local-currency transactions, because converting a
/// foreign amount at the wrong date would book the wrong local value. A foreign
/// transaction without any debit information has no effective date.
#[must_use]
pub fn effective_date(transaction: &Transaction, local_currency: CurrencyCode) -> Option<NaiveDate> {
    transaction
        .debit_timestamp
        .map(|ts| ts.date_naive())
        .or(transaction.debit_date_override)
        .or(transaction.debit_date)
        .or_else(|| (transaction.currency == local_currency).then_some(transaction.event_date))
}

/// Returns the minimum over the present dates, or `None` if there are none.
#[must_use]
pub fn min_date(dates: impl IntoIterator<Item = Option<NaiveDate>>) -> Option<NaiveDate> {
    dates.into_iter().flatten().min()
}

/// Returns the single distinct value, or `None` when there are zero or several.
pub(crate) fn single<T: Ord>(values: impl IntoIterator<Item = T>) -> Option<T> {
    let mut distinct: BTreeSet<T> = values.into_iter().collect();
    if distinct.len() == 1 {
        distinct.pop_first()
    } else {
        None
    }
}

/// Derives a charge summary from its items.
///
/// Transactions take precedence over documents for the currency, total and
/// counterparty: they record what actually moved.
#[must_use]
pub fn summarize(
    transactions: &[Transaction],
    documents: &[Document],
    local_currency: CurrencyCode,
    owner_id: FinancialEntityId,
) -> ChargeSummary {
    let min_event_date = min_date(transactions.iter().map(|tx| Some(tx.event_date)));
    let min_debit_date = min_date(transactions.iter().map(|tx| effective_date(tx, local_currency)));
    let min_documents_date = min_date(documents.iter().map(|doc| doc.date));

    let (currency, total_amount, counterparty_id) = if transactions.is_empty() {
        let currency = single(documents.iter().filter_map(Document::currency));
        let total = currency.and_then(|_| {
            documents
                .iter()
                .map(|doc| doc.total_amount)
                .sum::<Option<Decimal>>()
        });
        let counterparty = single(documents.iter().filter_map(|doc| doc.counterparty(owner_id)));
        (currency, total, counterparty)
    } else {
        let currency = single(transactions.iter().map(|tx| tx.currency));
        let total = currency.map(|_| transactions.iter().map(|tx| tx.amount).sum::<Decimal>());
        let counterparty = single(transactions.iter().filter_map(|tx| tx.business_id));
        (currency, total, counterparty)
    };

    ChargeSummary {
        currency,
        total_amount,
        min_event_date,
        min_debit_date,
        min_documents_date,
        counterparty_id,
    }
}
