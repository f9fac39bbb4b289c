//! Property-based tests for currency operations.
//!
//! - Rounding always yields at most two decimal places
//! - Rate resolution never looks into the future

use chargebook_shared::types::CurrencyCode;
use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::exchange::{ExchangeRate, ExchangeRateTable, RateLookup};
use super::service::CurrencyService;

/// Strategy to generate signed decimal amounts (-1,000,000.00 to 1,000,000.00).
fn amount() -> impl Strategy<Value = Decimal> {
    (-100_000_000i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate positive exchange rates (0.0001 to 10000.0000).
fn positive_rate() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|v| Decimal::new(v, 4))
}

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// *For any* amount and rate, conversion keeps at most two decimal places.
    #[test]
    fn prop_convert_rounds_to_local_precision(amount in amount(), rate in positive_rate()) {
        let result = CurrencyService::convert(amount, rate);
        prop_assert!(result.scale() <= 2);
    }

    /// *For any* amount, converting a negated amount negates the result.
    #[test]
    fn prop_convert_is_sign_symmetric(amount in amount(), rate in positive_rate()) {
        prop_assert_eq!(
            CurrencyService::convert(-amount, rate),
            -CurrencyService::convert(amount, rate)
        );
    }

    /// *For any* set of published dates and query date, the resolved rate was
    /// published on or before the query date, and is the latest such one.
    #[test]
    fn prop_resolution_never_uses_future_rates(
        offsets in prop::collection::btree_set(0i64..60, 1..10),
        query in 0i64..70,
    ) {
        let rates: Vec<ExchangeRate> = offsets
            .iter()
            .map(|offset| {
                ExchangeRate::new(
                    base_date() + Duration::days(*offset),
                    CurrencyCode::USD,
                    CurrencyCode::ILS,
                    Decimal::from(*offset + 1),
                )
                .unwrap()
            })
            .collect();
        let table = ExchangeRateTable::from_rates(CurrencyCode::ILS, &rates);
        let query_date = base_date() + Duration::days(query);

        let expected = offsets.iter().filter(|o| **o <= query).max();
        match (table.rate_on(CurrencyCode::USD, query_date), expected) {
            (Ok(rate), Some(offset)) => prop_assert_eq!(rate, Decimal::from(*offset + 1)),
            (Err(_), None) => {}
            (result, expected) => prop_assert!(false, "got {:?}, expected offset {:?}", result, expected),
        }
    }
}
