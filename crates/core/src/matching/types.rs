//! Matching domain types.

use std::fmt;

use chargebook_shared::types::{ChargeId, CurrencyCode, DocumentId, FinancialEntityId, TransactionId};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::charge::{Charge, ChargeSummary, Document, Transaction};

/// Which kind of items a one-sided charge holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSide {
    /// Bank or card transactions only.
    Transactions,
    /// Documents only.
    Documents,
}

impl MatchSide {
    /// Returns the side a match must come from.
    #[must_use]
    pub const fn complement(self) -> Self {
        match self {
            Self::Transactions => Self::Documents,
            Self::Documents => Self::Transactions,
        }
    }

    /// Returns the side of a charge with these item counts, or `None` if it
    /// is empty or already holds both sides.
    #[must_use]
    pub const fn of(transaction_count: usize, document_count: usize) -> Option<Self> {
        match (transaction_count, document_count) {
            (0, 0) => None,
            (_, 0) => Some(Self::Transactions),
            (0, _) => Some(Self::Documents),
            _ => None,
        }
    }
}

/// The attributes compared when scoring two sides against each other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchProfile {
    /// Counterparty business.
    pub business_id: Option<FinancialEntityId>,
    /// Currency code as recorded; may be malformed.
    pub currency: Option<String>,
    /// Amount; compared by absolute value.
    pub amount: Option<Decimal>,
    /// Date used for the search window and ranking.
    pub date: Option<NaiveDate>,
}

impl MatchProfile {
    /// Profile of a single transaction.
    #[must_use]
    pub fn of_transaction(tx: &Transaction) -> Self {
        Self {
            business_id: tx.business_id,
            currency: Some(tx.currency.to_string()),
            amount: Some(tx.amount),
            date: Some(tx.event_date),
        }
    }

    /// Profile of a single document, seen from `owner`.
    #[must_use]
    pub fn of_document(doc: &Document, owner: FinancialEntityId) -> Self {
        Self {
            business_id: doc.counterparty(owner),
            currency: doc.currency_code.clone(),
            amount: doc.total_amount,
            date: doc.date,
        }
    }

    /// Profile of a charge from its derived summary.
    ///
    /// Transaction charges are dated by settlement, document charges by issue date.
    #[must_use]
    pub fn of_charge(charge: &Charge, side: MatchSide) -> Self {
        Self::of_summary(&charge.summary, side)
    }

    /// Profile from a charge summary holding `side`.
    #[must_use]
    pub fn of_summary(summary: &ChargeSummary, side: MatchSide) -> Self {
        let date = match side {
            MatchSide::Transactions => summary.min_debit_date.or(summary.min_event_date),
            MatchSide::Documents => summary.min_documents_date,
        };
        Self {
            business_id: summary.counterparty_id,
            currency: summary.currency.as_ref().map(CurrencyCode::to_string),
            amount: summary.total_amount,
            date,
        }
    }
}

/// A charge offered as a match, with its component scores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChargeMatch {
    /// Candidate charge.
    pub candidate_charge_id: ChargeId,
    /// Counterparty agreement.
    pub business_score: Decimal,
    /// Currency agreement.
    pub currency_score: Decimal,
    /// Amount closeness.
    pub amount_score: Decimal,
    /// Weighted confidence in `[0, 1]`.
    pub overall_score: Decimal,
    /// Candidate's date, if known.
    pub candidate_date: Option<NaiveDate>,
}

/// A charge that may receive items from the other side.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Candidate charge ID.
    pub charge_id: ChargeId,
    /// Side the candidate holds.
    pub side: MatchSide,
    /// Its attributes.
    pub profile: MatchProfile,
}

/// An item considered for automatic assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum MatchSubject {
    /// A transaction.
    Transaction(TransactionId),
    /// A document.
    Document(DocumentId),
}

impl MatchSubject {
    /// Returns the side this item belongs to.
    #[must_use]
    pub const fn side(self) -> MatchSide {
        match self {
            Self::Transaction(_) => MatchSide::Transactions,
            Self::Document(_) => MatchSide::Documents,
        }
    }
}

impl fmt::Display for MatchSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transaction(id) => write!(f, "transaction {id}"),
            Self::Document(id) => write!(f, "document {id}"),
        }
    }
}

/// Why a subject was not assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum MatchIssueKind {
    /// No complementary charge was found in the search window.
    NoCandidates,
    /// The best candidate did not clear the auto-assign threshold.
    BelowThreshold {
        /// Best overall score.
        top_score: Decimal,
    },
    /// The two best candidates are too close to pick one.
    Ambiguous {
        /// Best overall score.
        top_score: Decimal,
        /// Second-best overall score.
        runner_up_score: Decimal,
    },
    /// The source or target charge has locked ledger records.
    Locked {
        /// Message from the lock guard.
        message: String,
    },
    /// The store rejected or failed the assignment.
    AssignmentFailed {
        /// Error message.
        message: String,
    },
    /// Another item already left the item's charge in this run; the next
    /// run scores it against the charge as it is now.
    Deferred {
        /// The item's charge.
        charge_id: ChargeId,
    },
}

/// A subject that could not be assigned, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchIssue {
    /// The item.
    pub subject: MatchSubject,
    /// Reason.
    #[serde(flatten)]
    pub kind: MatchIssueKind,
}

/// An item moved onto a charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    /// The item.
    pub subject: MatchSubject,
    /// Charge the item came from, if it had one.
    pub from_charge_id: Option<ChargeId>,
    /// Charge the item now belongs to.
    pub to_charge_id: ChargeId,
    /// Score of the chosen match.
    pub score: Decimal,
}

/// Outcome of an automatic matching run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AutoMatchResult {
    /// False only if an assignment failed for infrastructure reasons.
    pub success: bool,
    /// Number of items assigned.
    pub assigned_count: usize,
    /// Assignments performed.
    pub assignments: Vec<Assignment>,
    /// Items left unassigned, with reasons.
    pub errors: Vec<MatchIssue>,
}

/// The matcher's verdict for one subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Assign to the top candidate.
    Assign(ChargeMatch),
    /// Leave unassigned.
    Skip(MatchIssueKind),
}
