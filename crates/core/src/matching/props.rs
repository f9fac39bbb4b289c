//! Property-based tests for confidence scoring.
//!
//! - Every score lies in [0, 1]
//! - The overall score is monotonic in each component
//! - Near-ties are never auto-assigned

use chargebook_shared::config::{MatchWeights, MatchingConfig};
use chargebook_shared::types::ChargeId;
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::matcher::ChargeMatcher;
use super::scorer::{ComponentScores, ConfidenceScorer};
use super::types::{ChargeMatch, Decision};

/// Strategy to generate a score in [0, 1] with two decimal places.
fn unit() -> impl Strategy<Value = Decimal> {
    (0i64..=100).prop_map(|v| Decimal::new(v, 2))
}

/// Strategy to generate weights that sum to exactly 1.
fn weights() -> impl Strategy<Value = MatchWeights> {
    (0i64..=100)
        .prop_flat_map(|business| (Just(business), 0i64..=(100 - business)))
        .prop_map(|(business, currency)| MatchWeights {
            business: Decimal::new(business, 2),
            currency: Decimal::new(currency, 2),
            amount: Decimal::new(100 - business - currency, 2),
        })
}

fn amount() -> impl Strategy<Value = Decimal> {
    (-10_000_000i64..10_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn scorer(weights: MatchWeights) -> ConfidenceScorer {
    ConfidenceScorer::new(&MatchingConfig {
        weights,
        ..MatchingConfig::default()
    })
}

fn scored(overall: Decimal) -> ChargeMatch {
    ChargeMatch {
        candidate_charge_id: ChargeId::new(),
        business_score: Decimal::ZERO,
        currency_score: Decimal::ZERO,
        amount_score: Decimal::ZERO,
        overall_score: overall,
        candidate_date: None,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// *For any* weights and components in [0, 1], the overall score is in [0, 1].
    #[test]
    fn prop_overall_is_bounded(w in weights(), b in unit(), c in unit(), a in unit()) {
        let overall = scorer(w).overall(&ComponentScores { business: b, currency: c, amount: a });
        prop_assert!(overall >= Decimal::ZERO && overall <= Decimal::ONE);
    }

    /// *For any* components, raising one component never lowers the overall score.
    #[test]
    fn prop_overall_is_monotonic(
        w in weights(),
        b in unit(),
        c in unit(),
        a in unit(),
        raise in unit(),
        which in 0usize..3,
    ) {
        let scorer = scorer(w);
        let base = ComponentScores { business: b, currency: c, amount: a };
        let mut raised = base;
        let bump = |v: Decimal| (v + raise).min(Decimal::ONE);
        match which {
            0 => raised.business = bump(b),
            1 => raised.currency = bump(c),
            _ => raised.amount = bump(a),
        }
        prop_assert!(scorer.overall(&raised) >= scorer.overall(&base));
    }

    /// *For any* pair of amounts, the amount score is in [0, 1] and symmetric.
    #[test]
    fn prop_amount_score_bounded_and_symmetric(x in amount(), y in amount()) {
        let scorer = scorer(MatchWeights::default());
        let s = scorer.amount_score(Some(x), Some(y));
        prop_assert!(s >= Decimal::ZERO && s <= Decimal::ONE);
        prop_assert_eq!(s, scorer.amount_score(Some(y), Some(x)));
    }

    /// *For any* amount, moving the other amount further away never raises the score.
    #[test]
    fn prop_amount_score_decays_with_distance(
        base in 1i64..10_000_000,
        near in 0i64..1_000_000,
        extra in 0i64..1_000_000,
    ) {
        let scorer = scorer(MatchWeights::default());
        let x = Decimal::new(base, 2);
        let closer = scorer.amount_score(Some(x), Some(x + Decimal::new(near, 2)));
        let farther = scorer.amount_score(Some(x), Some(x + Decimal::new(near + extra, 2)));
        prop_assert!(farther <= closer);
    }

    /// *For any* two top scores within the ambiguity margin, nothing is assigned.
    #[test]
    fn prop_near_ties_are_never_assigned(top in 91i64..=100, gap in 0i64..=5) {
        let matcher = ChargeMatcher::new(MatchingConfig::default());
        let top = Decimal::new(top, 2);
        let runner_up = top - Decimal::new(gap, 2);
        let decision = matcher.decide(&[scored(top), scored(runner_up)]);
        prop_assert!(!matches!(decision, Decision::Assign(_)));
    }
}
