//! Double-entry ledger generation and protection.
//!
//! This module implements:
//! - Ledger records with up to two sub-accounts per side
//! - Per-charge-type generation of balanced record sets
//! - The lock guard freezing historical records
//! - Balance validation

pub mod error;
pub mod generator;
pub mod lock;
pub mod record;
pub mod validation;

pub use error::LedgerError;
pub use generator::{GeneratedLedger, GenerationInput, LedgerGenerator, RecoveryRateTable};
pub use lock::{LedgerLock, LedgerLockError, LedgerLockGuard, ReplacementPlan};
pub use record::{LedgerLeg, LedgerRecord, Side};
pub use validation::{entity_balances, validate_balanced};
