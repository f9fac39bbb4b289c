//! Currency conversions between two of the owner's accounts.

use rust_decimal::Decimal;

use super::Context;
use crate::ledger::error::LedgerError;
use crate::ledger::record::{LedgerLeg, LedgerRecord};

/// Books a conversion as a single record.
///
/// The destination account is debited with the incoming amount and the source
/// account credited with the outgoing amount, each at its own effective date.
/// The local difference between the two legs is realized exchange gain (credit)
/// or loss (debit) on the exchange-rate account.
pub(super) fn generate(ctx: &Context<'_>) -> Result<Vec<LedgerRecord>, LedgerError> {
    let invalid = |reason| LedgerError::InvalidConversion {
        charge_id: ctx.charge_id(),
        reason,
    };

    let (outgoing, incoming): (Vec<_>, Vec<_>) = ctx
        .input
        .transactions
        .iter()
        .filter(|tx| !tx.amount.is_zero())
        .partition(|tx| tx.amount.is_sign_negative());

    let ([source], [destination]) = (outgoing.as_slice(), incoming.as_slice()) else {
        return Err(invalid("expected exactly one outgoing and one incoming transaction"));
    };

    let source_date = ctx.effective_date(source)?;
    let destination_date = ctx.effective_date(destination)?;
    let credit = ctx.leg(source.account_id, source.money().abs(), source_date)?;
    let debit = ctx.leg(destination.account_id, destination.money(), destination_date)?;

    let delta = debit.local_amount - credit.local_amount;
    let mut record = LedgerRecord::transfer(
        ctx.charge_id(),
        debit,
        credit,
        source.event_date.min(destination.event_date),
        source_date.max(destination_date),
    )
    .with_description("Currency conversion");

    let exchange_rates = ctx.ledger.accounts.exchange_rates;
    if delta > Decimal::ZERO {
        record = record.with_credit_2(LedgerLeg::local(exchange_rates, delta));
    } else if delta < Decimal::ZERO {
        record = record.with_debit_2(LedgerLeg::local(exchange_rates, -delta));
    }

    Ok(vec![record])
}
