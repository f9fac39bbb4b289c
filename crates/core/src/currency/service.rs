//! Currency service for conversion into the local currency.
//!
//! Local-currency amounts are stored with two decimal places and rounded with
//! Banker's Rounding, so the same foreign amount always converts the same way.

use chargebook_shared::types::Money;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::*;

use super::exchange::{CurrencyError, RateLookup};

/// Decimal places kept for local-currency ledger amounts.
pub const LOCAL_DECIMAL_PLACES: u32 = 2;

/// Currency service for conversion operations.
///
/// Provides methods for converting amounts between currencies using
/// Banker's Rounding (MidpointNearestEven) strategy.
pub struct CurrencyService;

impl CurrencyService {
    /// Convert amount using exchange rate with Banker's Rounding.
    ///
    /// # Example
    ///
    /// ```
    /// use rust_decimal_macros::dec;
    /// use chargebook_core::currency::CurrencyService;
    ///
    /// let result = CurrencyService::convert(dec!(100.005), dec!(1));
    /// assert_eq!(result, dec!(100.00));
    /// ```
    #[must_use]
    pub fn convert(amount: Decimal, rate: Decimal) -> Decimal {
        Self::convert_with_precision(amount, rate, LOCAL_DECIMAL_PLACES)
    }

    /// Convert amount with custom decimal places.
    #[must_use]
    pub fn convert_with_precision(amount: Decimal, rate: Decimal, decimal_places: u32) -> Decimal {
        (amount * rate).round_dp_with_strategy(decimal_places, RoundingStrategy::MidpointNearestEven)
    }

    /// Round a decimal value using Banker's Rounding.
    #[must_use]
    pub fn round(value: Decimal, decimal_places: u32) -> Decimal {
        value.round_dp_with_strategy(decimal_places, RoundingStrategy::MidpointNearestEven)
    }

    /// Converts money into the local currency at the rate effective on `date`.
    ///
    /// # Errors
    ///
    /// Returns `CurrencyError::RateUnavailable` when no rate is known on or before `date`.
    pub fn to_local(
        money: Money,
        date: NaiveDate,
        rates: &impl RateLookup,
    ) -> Result<Decimal, CurrencyError> {
        let rate = rates.rate_on(money.currency, date)?;
        Ok(Self::convert(money.amount, rate))
    }
}
