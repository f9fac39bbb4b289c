//! Balance rules for generated ledger records.

use std::collections::BTreeMap;

use chargebook_shared::types::{ChargeId, FinancialEntityId};
use rust_decimal::Decimal;

use super::error::LedgerError;
use super::record::LedgerRecord;

/// Validates that every record, and the set as a whole, balances exactly.
///
/// # Errors
///
/// Returns `LedgerError::UnbalancedLedger` on the first imbalance.
pub fn validate_balanced(charge_id: ChargeId, records: &[LedgerRecord]) -> Result<(), LedgerError> {
    let mut total_debit = Decimal::ZERO;
    let mut total_credit = Decimal::ZERO;

    for record in records {
        let debit = record.debit_total();
        let credit = record.credit_total();
        if debit != credit {
            return Err(LedgerError::UnbalancedLedger {
                charge_id,
                debit,
                credit,
            });
        }
        total_debit += debit;
        total_credit += credit;
    }

    if total_debit != total_credit {
        return Err(LedgerError::UnbalancedLedger {
            charge_id,
            debit: total_debit,
            credit: total_credit,
        });
    }

    Ok(())
}

/// Net local balance per entity: debits positive, credits negative.
///
/// Entities whose movements cancel out are omitted.
#[must_use]
pub fn entity_balances(records: &[LedgerRecord]) -> BTreeMap<FinancialEntityId, Decimal> {
    let mut balances: BTreeMap<FinancialEntityId, Decimal> = BTreeMap::new();
    for (entity, amount) in records.iter().flat_map(|record| record.movements()) {
        *balances.entry(entity).or_default() += amount;
    }
    balances.retain(|_, balance| !balance.is_zero());
    balances
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::record::LedgerLeg;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn record(debit: FinancialEntityId, credit: FinancialEntityId, amount: Decimal) -> LedgerRecord {
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        LedgerRecord::transfer(
            ChargeId::new(),
            LedgerLeg::local(debit, amount),
            LedgerLeg::local(credit, amount),
            date,
            date,
        )
    }

    #[test]
    fn test_balanced_set_passes() {
        let a = FinancialEntityId::new();
        let b = FinancialEntityId::new();
        let records = [record(a, b, dec!(10)), record(b, a, dec!(4))];
        assert!(validate_balanced(ChargeId::new(), &records).is_ok());
        assert!(validate_balanced(ChargeId::new(), &[]).is_ok());
    }

    #[test]
    fn test_unbalanced_record_is_rejected() {
        let mut r = record(FinancialEntityId::new(), FinancialEntityId::new(), dec!(10));
        r.credit_account_1.local_amount = dec!(9.99);
        let err = validate_balanced(r.charge_id, &[r]).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::UnbalancedLedger { debit, credit, .. } if debit == dec!(10) && credit == dec!(9.99)
        ));
    }

    #[test]
    fn test_entity_balances_net_out() {
        let bank = FinancialEntityId::new();
        let supplier = FinancialEntityId::new();
        let records = [
            record(supplier, bank, dec!(100)),
            record(bank, supplier, dec!(30)),
        ];
        let balances = entity_balances(&records);
        assert_eq!(balances.get(&supplier), Some(&dec!(70)));
        assert_eq!(balances.get(&bank), Some(&dec!(-70)));

        let settled = entity_balances(&[record(supplier, bank, dec!(5)), record(bank, supplier, dec!(5))]);
        assert!(settled.is_empty());
    }
}
