//! Multi-currency handling and exchange rates.

pub mod exchange;
pub mod service;

#[cfg(test)]
mod props;

pub use exchange::{CurrencyError, ExchangeRate, ExchangeRateTable, RateLookup};
pub use service::{CurrencyService, LOCAL_DECIMAL_PLACES};
