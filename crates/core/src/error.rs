//! Error taxonomy shared by every module of the core.

use serde::Serialize;

/// Broad class of a failure, telling callers how to react to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Forbidden by policy (e.g. a locked ledger period). Never retried.
    PolicyViolation,
    /// Input could not be classified; needs an operator's decision.
    ClassificationFailure,
    /// Upstream data (rates, dates, settings) is missing; retry once seeded.
    DataUnavailable,
    /// A generation defect such as an unbalanced ledger. Never persisted.
    InvariantViolation,
    /// The request itself is malformed.
    InvalidInput,
    /// The referenced entity does not exist.
    NotFound,
    /// Storage failed or did not answer in time.
    Infrastructure,
}

impl ErrorCategory {
    /// Returns true if retrying the same request may succeed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::DataUnavailable | Self::Infrastructure)
    }

    /// Returns the HTTP status code conventionally used for this category.
    #[must_use]
    pub const fn http_status_code(self) -> u16 {
        match self {
            Self::PolicyViolation => 403,
            Self::ClassificationFailure => 422,
            Self::DataUnavailable => 409,
            Self::InvalidInput => 400,
            Self::NotFound => 404,
            Self::InvariantViolation | Self::Infrastructure => 500,
        }
    }
}
