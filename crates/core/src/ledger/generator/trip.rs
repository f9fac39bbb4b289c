//! Business trips.

use chargebook_shared::types::FinancialEntityId;

use super::{Context, common};
use crate::charge::BusinessTripCategory;
use crate::ledger::error::LedgerError;
use crate::ledger::record::LedgerRecord;

pub(super) fn generate(ctx: &Context<'_>) -> Result<Vec<LedgerRecord>, LedgerError> {
    let mut records = common::document_records(ctx)?;

    for tx in ctx.input.transactions {
        let record = match tx.business_trip_category {
            Some(category) => {
                let account = category_account(ctx, category)
                    .or(ctx.charge().tax_category_id)
                    .ok_or(LedgerError::MissingTaxCategory {
                        charge_id: ctx.charge_id(),
                    })?;
                ctx.transaction_record(tx, account)?
            }
            None => common::transaction_record(ctx, tx)?,
        };
        records.extend(record);
    }

    Ok(records)
}

fn category_account(ctx: &Context<'_>, category: BusinessTripCategory) -> Option<FinancialEntityId> {
    let accounts = &ctx.ledger.accounts.business_trip;
    match category {
        BusinessTripCategory::Accommodation => accounts.accommodation,
        BusinessTripCategory::Flight => accounts.flight,
        BusinessTripCategory::TravelAndSubsistence => accounts.travel_and_subsistence,
        BusinessTripCategory::CarRental => accounts.car_rental,
        BusinessTripCategory::Other => accounts.other,
    }
}
