//! Engine errors.

use chargebook_shared::types::{ChargeId, TransactionId};
use thiserror::Error;

use crate::error::ErrorCategory;
use crate::ledger::{LedgerError, LedgerLockError};
use crate::store::StoreError;

/// Errors returned by engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    // ========== Domain Errors ==========
    /// Generation or a lock check failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Storage failed.
    #[error(transparent)]
    Store(StoreError),

    // ========== Request Errors ==========
    /// Matches are only searched for charges holding exactly one side.
    #[error("Charge {charge_id} is not matchable: it must hold only transactions or only documents")]
    ChargeNotMatchable {
        /// Charge ID.
        charge_id: ChargeId,
    },

    /// The transaction is not part of the charge.
    #[error("Transaction {transaction_id} does not belong to charge {charge_id}")]
    TransactionNotInCharge {
        /// Charge ID.
        charge_id: ChargeId,
        /// Transaction ID.
        transaction_id: TransactionId,
    },

    /// The charge is not linked to a business trip.
    #[error("Charge {charge_id} is not a business trip charge")]
    NotBusinessTrip {
        /// Charge ID.
        charge_id: ChargeId,
    },

    // ========== Runtime Errors ==========
    /// A store call did not finish within the lookup timeout.
    #[error("Store call '{operation}' timed out after {timeout_ms} ms")]
    Timeout {
        /// Store method that timed out.
        operation: &'static str,
        /// Configured limit.
        timeout_ms: u64,
    },
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        // A lock rejection is the same failure whether the engine or the store caught it.
        match err {
            StoreError::Locked(lock) => Self::Ledger(LedgerError::Locked(lock)),
            other => Self::Store(other),
        }
    }
}

impl From<LedgerLockError> for EngineError {
    fn from(err: LedgerLockError) -> Self {
        Self::Ledger(LedgerError::Locked(err))
    }
}

impl EngineError {
    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Ledger(err) => err.category(),
            Self::Store(err) => err.category(),
            Self::ChargeNotMatchable { .. } | Self::TransactionNotInCharge { .. } | Self::NotBusinessTrip { .. } => {
                ErrorCategory::InvalidInput
            }
            Self::Timeout { .. } => ErrorCategory::Infrastructure,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Ledger(err) => err.error_code(),
            Self::Store(err) => err.error_code(),
            Self::ChargeNotMatchable { .. } => "CHARGE_NOT_MATCHABLE",
            Self::TransactionNotInCharge { .. } => "TRANSACTION_NOT_IN_CHARGE",
            Self::NotBusinessTrip { .. } => "NOT_BUSINESS_TRIP",
            Self::Timeout { .. } => "STORE_TIMEOUT",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        self.category().http_status_code()
    }

    /// Returns true if the same request may succeed later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Returns true if the error is a ledger lock rejection.
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        matches!(self, Self::Ledger(LedgerError::Locked(_)))
    }
}
