//! Accounting reconciliation core for Chargebook.
//!
//! Nothing here knows about HTTP or SQL.
//! Persistence is reached only through the traits in [`store`].
//!
//! # Modules
//!
//! - `currency` - Exchange-rate resolution and local-currency conversion
//! - `charge` - Charges, transactions, documents and the charge-type classifier
//! - `matching` - Confidence scoring and charge matching
//! - `ledger` - Ledger records, the lock guard and per-charge-type generation
//! - `reconciliation` - Balance cancellation detection
//! - `store` - Storage seam and an in-memory implementation
//! - `engine` - Request-scoped orchestration with per-charge serialization

pub mod charge;
pub mod currency;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod matching;
pub mod reconciliation;
pub mod store;

#[cfg(test)]
mod testing;

pub use error::ErrorCategory;
