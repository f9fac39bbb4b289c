//! Internal transfers and bank deposits through a clearing account.

use chargebook_shared::types::FinancialEntityId;
use rust_decimal::Decimal;

use super::Context;
use crate::ledger::error::LedgerError;
use crate::ledger::record::{LedgerLeg, LedgerRecord};

/// Books each transaction against `clearing`.
///
/// When the charge holds both legs of the move, whatever is left in the
/// clearing account is translation difference and goes to the exchange-rate
/// account. A one-sided charge leaves the clearing balance open for the charge
/// that completes it.
pub(super) fn generate(
    ctx: &Context<'_>,
    clearing: FinancialEntityId,
) -> Result<Vec<LedgerRecord>, LedgerError> {
    let mut records = Vec::new();
    let mut clearing_balance = Decimal::ZERO;
    let mut has_inflow = false;
    let mut has_outflow = false;

    for tx in ctx.input.transactions {
        let Some(record) = ctx.transaction_record(tx, clearing)? else {
            continue;
        };
        if tx.amount.is_sign_positive() {
            has_inflow = true;
            clearing_balance -= record.debit_total();
        } else {
            has_outflow = true;
            clearing_balance += record.debit_total();
        }
        records.push(record);
    }

    if has_inflow && has_outflow && !clearing_balance.is_zero() {
        let date = records
            .iter()
            .map(|record| record.value_date)
            .max()
            .unwrap_or_default();
        let residual = LedgerRecord::transfer(
            ctx.charge_id(),
            LedgerLeg::local(ctx.ledger.accounts.exchange_rates, clearing_balance),
            LedgerLeg::local(clearing, clearing_balance),
            date,
            date,
        )
        .with_description("Exchange rate difference");
        records.push(residual);
    }

    Ok(records)
}
