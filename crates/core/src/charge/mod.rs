//! Charges, their items and their classification.

pub mod batch;
pub mod classifier;
pub mod dates;
pub mod types;

#[cfg(test)]
mod classifier_props;

pub use batch::{BatchedChargePredicate, KeywordBatchPredicate};
pub use classifier::ChargeClassifier;
pub use dates::{effective_date, min_date, summarize};
pub use types::{
    AccountType, ApprovalStatus, BusinessTripCategory, Charge, ChargeSummary, ChargeType,
    Document, DocumentType, RecoveryRate, SalaryRecord, Transaction, UnknownVariant,
    VatRecordKind, VatReportRecord,
};
