//! Storage errors.

use chargebook_shared::types::{ChargeId, CurrencyCode, DocumentId, TransactionId};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::error::ErrorCategory;
use crate::ledger::LedgerLockError;

/// Errors returned by storage implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    // ========== Lookup Errors ==========
    /// Charge does not exist.
    #[error("Charge not found: {0}")]
    ChargeNotFound(ChargeId),

    /// Transaction does not exist.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// Document does not exist.
    #[error("Document not found: {0}")]
    DocumentNotFound(DocumentId),

    // ========== Write Errors ==========
    /// A different rate is already stored for this date and pair.
    #[error("Exchange rate {from}/{to} on {date} is already stored as {existing}")]
    RateConflict {
        /// Source currency.
        from: CurrencyCode,
        /// Target currency.
        to: CurrencyCode,
        /// Rate date.
        date: NaiveDate,
        /// Rate already stored.
        existing: Decimal,
    },

    /// The write touched a locked ledger record.
    #[error(transparent)]
    Locked(#[from] LedgerLockError),

    /// The stored state no longer matches what the write expected.
    #[error("Conflict: {0}")]
    Conflict(String),

    // ========== Backend Errors ==========
    /// The backend failed.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::ChargeNotFound(_) | Self::TransactionNotFound(_) | Self::DocumentNotFound(_) => {
                ErrorCategory::NotFound
            }
            Self::RateConflict { .. } | Self::Conflict(_) => ErrorCategory::InvalidInput,
            Self::Locked(_) => ErrorCategory::PolicyViolation,
            Self::Backend(_) => ErrorCategory::Infrastructure,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::ChargeNotFound(_) => "CHARGE_NOT_FOUND",
            Self::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            Self::DocumentNotFound(_) => "DOCUMENT_NOT_FOUND",
            Self::RateConflict { .. } => "EXCHANGE_RATE_CONFLICT",
            Self::Locked(err) => err.error_code(),
            Self::Conflict(_) => "CONFLICT",
            Self::Backend(_) => "STORAGE_ERROR",
        }
    }

    /// Returns true if the error is due to the backend rather than the request.
    #[must_use]
    pub const fn is_infrastructure(&self) -> bool {
        matches!(self.category(), ErrorCategory::Infrastructure)
    }
}
