//! Exchange rate types and the date-bound rate resolver.
//!
//! A rate is looked up for the exact date first and otherwise falls back to the
//! most recent earlier date. A later rate is never used: it was not known when
//! the transaction happened.

use std::collections::{BTreeMap, HashMap};

use chargebook_shared::types::CurrencyCode;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ErrorCategory;

/// Errors raised while resolving or recording exchange rates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CurrencyError {
    /// No rate exists for the currency at or before the date.
    #[error("No exchange rate for {currency} on or before {date}")]
    RateUnavailable {
        /// Currency being converted to local currency.
        currency: CurrencyCode,
        /// Date the rate was requested for.
        date: NaiveDate,
    },

    /// Exchange rate must be positive.
    #[error("Exchange rate must be positive")]
    NonPositiveRate,

    /// Source and target currencies must be different.
    #[error("Source and target currencies must be different")]
    SameCurrency,
}

impl CurrencyError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::RateUnavailable { .. } => "RATE_UNAVAILABLE",
            Self::NonPositiveRate => "NON_POSITIVE_RATE",
            Self::SameCurrency => "SAME_CURRENCY",
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::RateUnavailable { .. } => ErrorCategory::DataUnavailable,
            Self::NonPositiveRate | Self::SameCurrency => ErrorCategory::InvalidInput,
        }
    }
}

/// Exchange rate between two currencies on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    /// Date this rate is effective.
    pub date: NaiveDate,
    /// Source currency code.
    pub from_currency: CurrencyCode,
    /// Target currency code.
    pub to_currency: CurrencyCode,
    /// Exchange rate (1 from_currency = rate to_currency).
    pub rate: Decimal,
}

impl ExchangeRate {
    /// Creates a validated exchange rate.
    ///
    /// # Errors
    ///
    /// Returns an error if the rate is not positive or both currencies are equal.
    pub fn new(
        date: NaiveDate,
        from_currency: CurrencyCode,
        to_currency: CurrencyCode,
        rate: Decimal,
    ) -> Result<Self, CurrencyError> {
        if rate <= Decimal::ZERO {
            return Err(CurrencyError::NonPositiveRate);
        }
        if from_currency == to_currency {
            return Err(CurrencyError::SameCurrency);
        }
        Ok(Self {
            date,
            from_currency,
            to_currency,
            rate,
        })
    }

    /// Returns the inverse rate.
    #[must_use]
    pub fn inverse(&self) -> Self {
        Self {
            date: self.date,
            from_currency: self.to_currency,
            to_currency: self.from_currency,
            rate: Decimal::ONE / self.rate,
        }
    }
}

/// Resolves the rate converting a currency into the local currency.
pub trait RateLookup {
    /// The tenant's local currency; always converts at rate 1.
    fn local_currency(&self) -> CurrencyCode;

    /// Returns the rate of `currency` to local currency on `date`.
    ///
    /// # Errors
    ///
    /// Returns `CurrencyError::RateUnavailable` if no rate exists at or before `date`.
    fn rate_on(&self, currency: CurrencyCode, date: NaiveDate) -> Result<Decimal, CurrencyError>;
}

/// Request-scoped table of rates into the local currency.
///
/// Built from the rows loaded for one operation and dropped with it, so rates
/// written between requests are always picked up.
#[derive(Debug, Clone)]
pub struct ExchangeRateTable {
    local_currency: CurrencyCode,
    direct: HashMap<CurrencyCode, BTreeMap<NaiveDate, Decimal>>,
    inverse: HashMap<CurrencyCode, BTreeMap<NaiveDate, Decimal>>,
}

impl ExchangeRateTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new(local_currency: CurrencyCode) -> Self {
        Self {
            local_currency,
            direct: HashMap::new(),
            inverse: HashMap::new(),
        }
    }

    /// Creates a table from stored rates. Rows unrelated to the local currency are ignored.
    #[must_use]
    pub fn from_rates<'a>(
        local_currency: CurrencyCode,
        rates: impl IntoIterator<Item = &'a ExchangeRate>,
    ) -> Self {
        let mut table = Self::new(local_currency);
        for rate in rates {
            table.insert(rate);
        }
        table
    }

    /// Adds a rate. Direct quotes (X → local) take precedence over inverted ones.
    pub fn insert(&mut self, rate: &ExchangeRate) {
        if rate.to_currency == self.local_currency {
            self.direct
                .entry(rate.from_currency)
                .or_default()
                .insert(rate.date, rate.rate);
        } else if rate.from_currency == self.local_currency {
            self.inverse
                .entry(rate.to_currency)
                .or_default()
                .insert(rate.date, Decimal::ONE / rate.rate);
        }
    }

    /// Returns the effective date and rate used for `currency` on `date`.
    #[must_use]
    pub fn resolve(&self, currency: CurrencyCode, date: NaiveDate) -> Option<(NaiveDate, Decimal)> {
        let latest = |book: &HashMap<CurrencyCode, BTreeMap<NaiveDate, Decimal>>| {
            book.get(&currency)
                .and_then(|series| series.range(..=date).next_back())
                .map(|(d, r)| (*d, *r))
        };

        match (latest(&self.direct), latest(&self.inverse)) {
            (Some(direct), Some(inverse)) if inverse.0 > direct.0 => Some(inverse),
            (Some(direct), _) => Some(direct),
            (None, inverse) => inverse,
        }
    }

    /// Returns true if the table holds no rates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.direct.is_empty() && self.inverse.is_empty()
    }
}

impl RateLookup for ExchangeRateTable {
    fn local_currency(&self) -> CurrencyCode {
        self.local_currency
    }

    fn rate_on(&self, currency: CurrencyCode, date: NaiveDate) -> Result<Decimal, CurrencyError> {
        if currency == self.local_currency {
            return Ok(Decimal::ONE);
        }
        self.resolve(currency, date)
            .map(|(_, rate)| rate)
            .ok_or(CurrencyError::RateUnavailable { currency, date })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn usd_to_ils(d: NaiveDate, rate: Decimal) -> ExchangeRate {
        ExchangeRate::new(d, CurrencyCode::USD, CurrencyCode::ILS, rate).unwrap()
    }

    fn table() -> ExchangeRateTable {
        ExchangeRateTable::from_rates(
            CurrencyCode::ILS,
            &[
                usd_to_ils(date(2025, 1, 10), dec!(3.60)),
                usd_to_ils(date(2025, 1, 13), dec!(3.65)),
            ],
        )
    }

    #[test]
    fn test_exact_date_is_used() {
        assert_eq!(
            table().rate_on(CurrencyCode::USD, date(2025, 1, 13)),
            Ok(dec!(3.65))
        );
    }

    #[test]
    fn test_falls_back_to_most_recent_earlier_date() {
        // Weekend: no rate published on the 11th or 12th.
        assert_eq!(
            table().rate_on(CurrencyCode::USD, date(2025, 1, 12)),
            Ok(dec!(3.60))
        );
    }

    #[test]
    fn test_never_uses_a_future_rate() {
        let err = table()
            .rate_on(CurrencyCode::USD, date(2025, 1, 9))
            .unwrap_err();
        assert_eq!(
            err,
            CurrencyError::RateUnavailable {
                currency: CurrencyCode::USD,
                date: date(2025, 1, 9),
            }
        );
        assert_eq!(err.category(), ErrorCategory::DataUnavailable);
    }

    #[test]
    fn test_local_currency_is_always_one() {
        let empty = ExchangeRateTable::new(CurrencyCode::ILS);
        assert!(empty.is_empty());
        assert_eq!(
            empty.rate_on(CurrencyCode::ILS, date(1999, 1, 1)),
            Ok(Decimal::ONE)
        );
    }

    #[test]
    fn test_inverse_quote_is_used_when_no_direct_quote() {
        let ils_to_eur =
            ExchangeRate::new(date(2025, 2, 1), CurrencyCode::ILS, CurrencyCode::EUR, dec!(0.25))
                .unwrap();
        let table = ExchangeRateTable::from_rates(CurrencyCode::ILS, &[ils_to_eur]);
        assert_eq!(
            table.rate_on(CurrencyCode::EUR, date(2025, 2, 3)),
            Ok(dec!(4))
        );
    }

    #[test]
    fn test_direct_quote_wins_on_same_date() {
        let d = date(2025, 2, 1);
        let direct = ExchangeRate::new(d, CurrencyCode::EUR, CurrencyCode::ILS, dec!(3.9)).unwrap();
        let inverse = ExchangeRate::new(d, CurrencyCode::ILS, CurrencyCode::EUR, dec!(0.25)).unwrap();
        let table = ExchangeRateTable::from_rates(CurrencyCode::ILS, &[inverse, direct]);
        assert_eq!(table.rate_on(CurrencyCode::EUR, d), Ok(dec!(3.9)));
    }

    #[test]
    fn test_unrelated_pairs_are_ignored() {
        let usd_eur =
            ExchangeRate::new(date(2025, 1, 1), CurrencyCode::USD, CurrencyCode::EUR, dec!(0.9))
                .unwrap();
        let table = ExchangeRateTable::from_rates(CurrencyCode::ILS, &[usd_eur]);
        assert!(table.is_empty());
    }

    #[test]
    fn test_rate_validation() {
        let d = date(2025, 1, 1);
        assert_eq!(
            ExchangeRate::new(d, CurrencyCode::USD, CurrencyCode::ILS, Decimal::ZERO),
            Err(CurrencyError::NonPositiveRate)
        );
        assert_eq!(
            ExchangeRate::new(d, CurrencyCode::USD, CurrencyCode::USD, dec!(1)),
            Err(CurrencyError::SameCurrency)
        );
    }

    #[test]
    fn test_inverse_swaps_currencies() {
        let rate = usd_to_ils(date(2025, 1, 1), dec!(4));
        let inverse = rate.inverse();
        assert_eq!(inverse.from_currency, CurrencyCode::ILS);
        assert_eq!(inverse.to_currency, CurrencyCode::USD);
        assert_eq!(inverse.rate, dec!(0.25));
    }
}
