//! Ledger error types for generation and lock errors.
//!
//! Every variant maps to one [`ErrorCategory`] so callers can tell a policy
//! refusal from missing data or a generation defect.

use chargebook_shared::types::{ChargeId, DocumentId, FinancialEntityId, TransactionId};
use rust_decimal::Decimal;
use thiserror::Error;

use super::lock::LedgerLockError;
use crate::currency::CurrencyError;
use crate::error::ErrorCategory;

/// Errors that can occur while generating or writing a charge's ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    // ========== Policy Errors ==========
    /// The write touches a locked ledger record.
    #[error(transparent)]
    Locked(#[from] LedgerLockError),

    // ========== Classification Errors ==========
    /// A dividend transaction belongs to neither the withholding nor the payment group.
    #[error("Dividend transaction {transaction_id} has unrecognised business {business_id:?}")]
    UnclassifiableDividendTransaction {
        /// Offending transaction.
        transaction_id: TransactionId,
        /// Its business, if any.
        business_id: Option<FinancialEntityId>,
    },

    /// A transaction or document has no counterparty business.
    #[error("Charge {charge_id} has an item without a counterparty")]
    MissingCounterparty {
        /// Charge being generated.
        charge_id: ChargeId,
    },

    /// The charge needs a tax category and has none.
    #[error("Charge {charge_id} has no tax category")]
    MissingTaxCategory {
        /// Charge being generated.
        charge_id: ChargeId,
    },

    /// A conversion charge does not have one outgoing and one incoming transaction.
    #[error("Charge {charge_id} is not a valid conversion: {reason}")]
    InvalidConversion {
        /// Charge being generated.
        charge_id: ChargeId,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// An aggregate record would need more than two sub-accounts on one side.
    #[error("Charge {charge_id} needs more than two sub-accounts on one side")]
    TooManySubAccounts {
        /// Charge being generated.
        charge_id: ChargeId,
    },

    // ========== Data Errors ==========
    /// Exchange rate lookup failed.
    #[error(transparent)]
    Currency(#[from] CurrencyError),

    /// A foreign-currency transaction has no effective date.
    #[error("Transaction {transaction_id} has no effective date")]
    MissingEffectiveDate {
        /// Offending transaction.
        transaction_id: TransactionId,
    },

    /// A charge has nothing to date its records by.
    #[error("Charge {charge_id} has no dated item")]
    MissingChargeDate {
        /// Charge being generated.
        charge_id: ChargeId,
    },

    /// No recovery-pay daily rate for a year.
    #[error("No recovery rate for {year}")]
    MissingRecoveryRate {
        /// Salary year.
        year: i32,
    },

    /// A bookable document lacks a field needed to book it.
    #[error("Document {document_id} has no valid {field}")]
    IncompleteDocument {
        /// Offending document.
        document_id: DocumentId,
        /// Missing field.
        field: &'static str,
    },

    // ========== Input Errors ==========
    /// A payslip has inconsistent figures.
    #[error("Invalid salary record for employee {employee_id}: {reason}")]
    InvalidSalaryRecord {
        /// Employee.
        employee_id: FinancialEntityId,
        /// What is wrong with it.
        reason: &'static str,
    },

    // ========== Invariant Errors ==========
    /// Generated records do not balance. This is a generator defect.
    #[error("Ledger for charge {charge_id} is unbalanced. Debit: {debit}, Credit: {credit}")]
    UnbalancedLedger {
        /// Charge being generated.
        charge_id: ChargeId,
        /// Total local debit.
        debit: Decimal,
        /// Total local credit.
        credit: Decimal,
    },
}

impl LedgerError {
    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Locked(_) => ErrorCategory::PolicyViolation,
            Self::UnclassifiableDividendTransaction { .. }
            | Self::MissingCounterparty { .. }
            | Self::MissingTaxCategory { .. }
            | Self::InvalidConversion { .. }
            | Self::TooManySubAccounts { .. } => ErrorCategory::ClassificationFailure,
            Self::Currency(err) => err.category(),
            Self::MissingEffectiveDate { .. }
            | Self::MissingChargeDate { .. }
            | Self::MissingRecoveryRate { .. }
            | Self::IncompleteDocument { .. } => ErrorCategory::DataUnavailable,
            Self::InvalidSalaryRecord { .. } => ErrorCategory::InvalidInput,
            Self::UnbalancedLedger { .. } => ErrorCategory::InvariantViolation,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Locked(err) => err.error_code(),
            Self::UnclassifiableDividendTransaction { .. } => "UNCLASSIFIABLE_DIVIDEND_TRANSACTION",
            Self::MissingCounterparty { .. } => "MISSING_COUNTERPARTY",
            Self::MissingTaxCategory { .. } => "MISSING_TAX_CATEGORY",
            Self::InvalidConversion { .. } => "INVALID_CONVERSION",
            Self::TooManySubAccounts { .. } => "TOO_MANY_SUB_ACCOUNTS",
            Self::Currency(err) => err.error_code(),
            Self::MissingEffectiveDate { .. } => "MISSING_EFFECTIVE_DATE",
            Self::MissingChargeDate { .. } => "MISSING_CHARGE_DATE",
            Self::MissingRecoveryRate { .. } => "MISSING_RECOVERY_RATE",
            Self::IncompleteDocument { .. } => "INCOMPLETE_DOCUMENT",
            Self::InvalidSalaryRecord { .. } => "INVALID_SALARY_RECORD",
            Self::UnbalancedLedger { .. } => "UNBALANCED_LEDGER",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        self.category().http_status_code()
    }

    /// Returns true if retrying after upstream data is seeded may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}
