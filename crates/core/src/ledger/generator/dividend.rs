//! Dividend distributions.
//!
//! Transactions split into the withholding-tax group and the payment group by
//! configured business ids. Each non-empty group yields one aggregate record.
//! A transaction in neither group stops generation: silently dropping it would
//! leave the dividend half-booked.

use std::collections::BTreeMap;

use chargebook_shared::config::DividendConfig;
use chargebook_shared::types::{FinancialEntityId, Money};
use rust_decimal::Decimal;

use super::Context;
use crate::charge::Transaction;
use crate::ledger::error::LedgerError;
use crate::ledger::record::{LedgerLeg, LedgerRecord};

pub(super) fn generate(
    ctx: &Context<'_>,
    config: &DividendConfig,
) -> Result<Vec<LedgerRecord>, LedgerError> {
    let mut withholding = Vec::new();
    let mut payment = Vec::new();

    for tx in ctx.input.transactions {
        match tx.business_id {
            Some(business) if config.withholding_tax_business_id == Some(business) => {
                withholding.push(tx);
            }
            Some(business) if config.payment_business_ids.contains(&business) => payment.push(tx),
            business_id => {
                return Err(LedgerError::UnclassifiableDividendTransaction {
                    transaction_id: tx.id,
                    business_id,
                });
            }
        }
    }

    let mut records = Vec::new();
    if let Some(withholding_business) = config.withholding_tax_business_id {
        records.extend(group_record(ctx, &withholding, withholding_business, "Dividend withholding tax")?);
    }
    records.extend(group_record(
        ctx,
        &payment,
        ctx.ledger.accounts.dividend_payable,
        "Dividend payment",
    )?);
    Ok(records)
}

/// Per-account running totals of one group.
#[derive(Default)]
struct AccountTotal {
    local: Decimal,
    foreign: Option<Money>,
    legs: usize,
}

impl AccountTotal {
    /// Adds a leg. The foreign total survives only while every leg shares one currency.
    fn add(&mut self, leg: &LedgerLeg) {
        self.foreign = if self.legs == 0 {
            leg.foreign
        } else {
            match (self.foreign, leg.foreign) {
                (Some(total), Some(money)) if total.currency == money.currency => {
                    Some(Money::new(total.amount + money.amount, total.currency))
                }
                _ => None,
            }
        };
        self.local += leg.local_amount;
        self.legs += 1;
    }
}

/// Aggregates a group's transactions per bank account into one record
/// against `counterparty`.
fn group_record(
    ctx: &Context<'_>,
    group: &[&Transaction],
    counterparty: FinancialEntityId,
    description: &str,
) -> Result<Option<LedgerRecord>, LedgerError> {
    if group.is_empty() {
        return Ok(None);
    }

    let mut totals: BTreeMap<FinancialEntityId, AccountTotal> = BTreeMap::new();
    let mut dates = Vec::with_capacity(group.len());
    for tx in group {
        let date = ctx.effective_date(tx)?;
        let leg = ctx.leg(tx.account_id, tx.money(), date)?;
        totals.entry(tx.account_id).or_default().add(&leg);
        dates.push(date);
    }
    let (Some(value_date), Some(invoice_date)) = (
        dates.into_iter().max(),
        group.iter().map(|tx| tx.event_date).min(),
    ) else {
        return Ok(None);
    };

    let mut debits = Vec::new();
    let mut credits = Vec::new();
    let mut net = Decimal::ZERO;
    for (account, total) in totals {
        net += total.local;
        let leg = LedgerLeg {
            entity: account,
            local_amount: total.local,
            foreign: total.foreign,
        }
        .abs();
        if total.local > Decimal::ZERO {
            debits.push(leg);
        } else {
            credits.push(leg);
        }
    }

    // Money in is owed to the counterparty; money out settles it.
    let counter_leg = LedgerLeg::local(counterparty, net.abs());
    if net > Decimal::ZERO {
        credits.push(counter_leg);
    } else {
        debits.push(counter_leg);
    }

    Ok(ctx
        .record_from_legs(debits, credits, invoice_date, value_date)?
        .map(|record| record.with_description(description)))
}
