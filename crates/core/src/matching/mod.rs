//! Confidence-scored matching of one-sided charges.
//!
//! A charge holding only transactions is matched against charges holding only
//! documents, and vice versa. Scoring and ranking are pure; the engine loads
//! candidates and performs assignments.

pub mod matcher;
pub mod scorer;
pub mod types;

#[cfg(test)]
mod props;

pub use matcher::ChargeMatcher;
pub use scorer::{ComponentScores, ConfidenceScorer};
pub use types::{
    Assignment, AutoMatchResult, Candidate, ChargeMatch, Decision, MatchIssue, MatchIssueKind,
    MatchProfile, MatchSide, MatchSubject,
};
