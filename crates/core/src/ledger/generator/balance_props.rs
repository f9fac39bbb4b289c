//! Property-based tests for ledger generation.
//!
//! - Every generated record balances, in any currency mix
//! - Entity balances of a generated ledger sum to zero
//! - A conversion always yields one balanced record

use chargebook_shared::config::{DividendConfig, SalaryConfig};
use chargebook_shared::types::{ChargeId, CurrencyCode, FinancialEntityId};
use chrono::Duration;
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::{GenerationInput, LedgerGenerator, RecoveryRateTable};
use crate::charge::{Charge, DocumentType, Transaction};
use crate::currency::{ExchangeRate, ExchangeRateTable};
use crate::testing::{date, document, ledger_config, transaction};

/// Strategy to generate non-zero amounts (0.01 to 100,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn currency() -> impl Strategy<Value = CurrencyCode> {
    prop_oneof![Just(CurrencyCode::ILS), Just(CurrencyCode::USD), Just(CurrencyCode::EUR)]
}

fn rates() -> ExchangeRateTable {
    let rate = |currency, value| {
        ExchangeRate::new(date(2024, 1, 1), currency, CurrencyCode::ILS, value).unwrap()
    };
    ExchangeRateTable::from_rates(
        CurrencyCode::ILS,
        &[
            rate(CurrencyCode::USD, Decimal::new(36789, 4)),
            rate(CurrencyCode::EUR, Decimal::new(40123, 4)),
        ],
    )
}

fn dated(mut tx: Transaction) -> Transaction {
    tx.debit_date = Some(tx.event_date);
    tx
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// *For any* mix of invoices and payments in any currency, a common charge
    /// generates balanced records whose entity balances net to zero.
    #[test]
    fn prop_common_charge_balances(
        invoices in prop::collection::vec((positive_amount(), 0u32..=30, currency(), any::<bool>()), 0..4),
        payments in prop::collection::vec((positive_amount(), currency(), any::<bool>()), 0..4),
    ) {
        let ledger = ledger_config();
        let owner = ledger.owner_id;
        let counterparty = FinancialEntityId::new();
        let bank = FinancialEntityId::new();
        let mut charge = Charge::new(ChargeId::new());
        charge.tax_category_id = Some(FinancialEntityId::new());

        let documents: Vec<_> = invoices
            .iter()
            .enumerate()
            .map(|(i, (total, vat_percent, currency, income))| {
                let vat = (*total * Decimal::from(*vat_percent) / Decimal::ONE_HUNDRED).round_dp(2);
                let (debtor, creditor) = if *income { (counterparty, owner) } else { (owner, counterparty) };
                let on = date(2024, 3, 1) + Duration::days(i64::try_from(i).unwrap());
                document(DocumentType::Invoice, debtor, creditor, *total, vat, currency.as_str(), on)
            })
            .collect();
        let transactions: Vec<_> = payments
            .iter()
            .map(|(amount, currency, incoming)| {
                let signed = if *incoming { *amount } else { -*amount };
                dated(transaction(bank, Some(counterparty), *currency, signed, date(2024, 4, 1)))
            })
            .collect();

        let generator = LedgerGenerator::new(ledger, DividendConfig::default(), &SalaryConfig::default());
        let generated = generator
            .generate(&GenerationInput {
                charge: &charge,
                transactions: &transactions,
                documents: &documents,
                salary_records: &[],
                vat_records: &[],
                recovery_rates: &RecoveryRateTable::default(),
                rates: &rates(),
            })
            .unwrap();

        for record in &generated.records {
            prop_assert!(record.is_balanced());
        }
        let net: Decimal = generated.entity_balances.values().copied().sum();
        prop_assert_eq!(net, Decimal::ZERO);
    }

    /// *For any* pair of conversion amounts and currencies, the single record balances.
    #[test]
    fn prop_conversion_balances(
        sold in positive_amount(),
        bought in positive_amount(),
        from in currency(),
        to in currency(),
    ) {
        let ledger = ledger_config();
        let mut charge = Charge::new(ChargeId::new());
        charge.is_conversion = true;
        let transactions = [
            dated(transaction(FinancialEntityId::new(), None, from, -sold, date(2024, 5, 1))),
            dated(transaction(FinancialEntityId::new(), None, to, bought, date(2024, 5, 2))),
        ];

        let generator = LedgerGenerator::new(ledger, DividendConfig::default(), &SalaryConfig::default());
        let generated = generator
            .generate(&GenerationInput {
                charge: &charge,
                transactions: &transactions,
                documents: &[],
                salary_records: &[],
                vat_records: &[],
                recovery_rates: &RecoveryRateTable::default(),
                rates: &rates(),
            })
            .unwrap();

        prop_assert_eq!(generated.records.len(), 1);
        prop_assert!(generated.records[0].is_balanced());
    }
}
