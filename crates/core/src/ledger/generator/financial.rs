//! Bank fees, interest and other financial charges.

use super::Context;
use crate::ledger::error::LedgerError;
use crate::ledger::record::LedgerRecord;

pub(super) fn generate(ctx: &Context<'_>) -> Result<Vec<LedgerRecord>, LedgerError> {
    let category = ctx.tax_category()?;
    let mut records = Vec::new();
    for tx in ctx.input.transactions {
        records.extend(ctx.transaction_record(tx, category)?);
    }
    Ok(records)
}
