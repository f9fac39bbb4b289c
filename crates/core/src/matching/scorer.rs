//! Confidence scoring between a subject and a candidate charge.
//!
//! Every score lies in `[0, 1]`. Scorers never fail: missing or malformed
//! input yields a fixed low score instead of an error.

use chargebook_shared::config::{MatchWeights, MatchingConfig};
use chargebook_shared::types::{CurrencyCode, FinancialEntityId};
use rust_decimal::Decimal;

use super::types::{ChargeMatch, Candidate, MatchProfile};

/// Score for a component that could not be compared.
pub const MISSING_SCORE: Decimal = Decimal::from_parts(2, 0, 0, false, 1);
/// Score for two businesses where one side is unknown.
pub const UNKNOWN_BUSINESS_SCORE: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

/// Component scores of one comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentScores {
    /// Counterparty agreement.
    pub business: Decimal,
    /// Currency agreement.
    pub currency: Decimal,
    /// Amount closeness.
    pub amount: Decimal,
}

/// Weighted confidence scorer.
#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    weights: MatchWeights,
    amount_epsilon: Decimal,
    amount_tolerance: Decimal,
}

impl ConfidenceScorer {
    /// Creates a scorer from matcher settings.
    #[must_use]
    pub fn new(config: &MatchingConfig) -> Self {
        Self {
            weights: config.weights,
            amount_epsilon: config.amount_epsilon,
            amount_tolerance: config.amount_tolerance,
        }
    }

    /// Scores counterparty agreement: equal 1, either unknown 0.5, different 0.2.
    #[must_use]
    pub fn business_score(a: Option<FinancialEntityId>, b: Option<FinancialEntityId>) -> Decimal {
        match (a, b) {
            (Some(a), Some(b)) if a == b => Decimal::ONE,
            (Some(_), Some(_)) => MISSING_SCORE,
            _ => UNKNOWN_BUSINESS_SCORE,
        }
    }

    /// Scores currency agreement, ignoring case.
    ///
    /// Missing, empty or malformed codes score 0.2; different codes score 0.
    #[must_use]
    pub fn currency_score(a: Option<&str>, b: Option<&str>) -> Decimal {
        let parse = |code: Option<&str>| code.and_then(|c| CurrencyCode::parse(c).ok());
        match (parse(a), parse(b)) {
            (Some(a), Some(b)) if a == b => Decimal::ONE,
            (Some(_), Some(_)) => Decimal::ZERO,
            _ => MISSING_SCORE,
        }
    }

    /// Scores amount closeness by absolute value.
    ///
    /// Differences within epsilon score 1. Beyond that the score decays
    /// linearly with the relative difference, reaching 0 at the tolerance.
    #[must_use]
    pub fn amount_score(&self, a: Option<Decimal>, b: Option<Decimal>) -> Decimal {
        let (Some(a), Some(b)) = (a, b) else {
            return MISSING_SCORE;
        };
        let (a, b) = (a.abs(), b.abs());
        let diff = (a - b).abs();
        if diff <= self.amount_epsilon {
            return Decimal::ONE;
        }
        let relative = diff / a.max(b);
        if relative >= self.amount_tolerance {
            return Decimal::ZERO;
        }
        (Decimal::ONE - relative / self.amount_tolerance).clamp(Decimal::ZERO, Decimal::ONE)
    }

    /// Scores every component of `subject` against `candidate`.
    #[must_use]
    pub fn components(&self, subject: &MatchProfile, candidate: &MatchProfile) -> ComponentScores {
        ComponentScores {
            business: Self::business_score(subject.business_id, candidate.business_id),
            currency: Self::currency_score(subject.currency.as_deref(), candidate.currency.as_deref()),
            amount: self.amount_score(subject.amount, candidate.amount),
        }
    }

    /// Returns the weighted mean of the components, clamped to `[0, 1]`.
    #[must_use]
    pub fn overall(&self, scores: &ComponentScores) -> Decimal {
        let w = &self.weights;
        let total_weight = w.sum();
        if total_weight <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let weighted = w.business * scores.business + w.currency * scores.currency + w.amount * scores.amount;
        (weighted / total_weight).clamp(Decimal::ZERO, Decimal::ONE)
    }

    /// Scores a candidate charge.
    #[must_use]
    pub fn score(&self, subject: &MatchProfile, candidate: &Candidate) -> ChargeMatch {
        let scores = self.components(subject, &candidate.profile);
        ChargeMatch {
            candidate_charge_id: candidate.charge_id,
            business_score: scores.business,
            currency_score: scores.currency,
            amount_score: scores.amount,
            overall_score: self.overall(&scores),
            candidate_date: candidate.profile.date,
        }
    }
}
