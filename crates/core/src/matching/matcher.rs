//! Candidate ranking and the auto-assign decision.

use std::cmp::Ordering;

use chargebook_shared::config::MatchingConfig;
use chargebook_shared::types::ChargeId;
use chrono::NaiveDate;

use super::scorer::ConfidenceScorer;
use super::types::{Candidate, ChargeMatch, Decision, MatchIssueKind, MatchProfile, MatchSide};

/// Ranks complementary charges for a subject and decides auto-assignment.
#[derive(Debug, Clone)]
pub struct ChargeMatcher {
    config: MatchingConfig,
    scorer: ConfidenceScorer,
}

impl ChargeMatcher {
    /// Creates a matcher.
    #[must_use]
    pub fn new(config: MatchingConfig) -> Self {
        let scorer = ConfidenceScorer::new(&config);
        Self { config, scorer }
    }

    /// Returns the matcher settings.
    #[must_use]
    pub const fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Returns the scorer.
    #[must_use]
    pub const fn scorer(&self) -> &ConfidenceScorer {
        &self.scorer
    }

    /// Returns true if the two dates are close enough to compare.
    ///
    /// An unknown date on either side never excludes a candidate.
    fn within_window(&self, subject: Option<NaiveDate>, candidate: Option<NaiveDate>) -> bool {
        match (subject, candidate) {
            (Some(a), Some(b)) => (a - b).num_days().abs() <= self.config.max_date_distance_days,
            _ => true,
        }
    }

    /// Scores every eligible candidate, best first.
    ///
    /// Eligible candidates hold the side complementary to `side`, are not
    /// `exclude`, and lie within the date window.
    #[must_use]
    pub fn score_candidates(
        &self,
        subject: &MatchProfile,
        side: MatchSide,
        candidates: &[Candidate],
        exclude: Option<ChargeId>,
    ) -> Vec<ChargeMatch> {
        let wanted = side.complement();
        let mut matches: Vec<ChargeMatch> = candidates
            .iter()
            .filter(|c| c.side == wanted && Some(c.charge_id) != exclude)
            .filter(|c| self.within_window(subject.date, c.profile.date))
            .map(|c| self.scorer.score(subject, c))
            .collect();
        matches.sort_by(compare_matches);
        matches
    }

    /// Returns the matches worth reviewing: at or above the review floor,
    /// best first, at most `max_results`.
    #[must_use]
    pub fn rank(
        &self,
        subject: &MatchProfile,
        side: MatchSide,
        candidates: &[Candidate],
        exclude: Option<ChargeId>,
    ) -> Vec<ChargeMatch> {
        let mut matches = self.score_candidates(subject, side, candidates, exclude);
        matches.retain(|m| m.overall_score >= self.config.review_floor);
        matches.truncate(self.config.max_results);
        matches
    }

    /// Decides whether the best of `scored` (sorted best first) may be assigned.
    ///
    /// The top candidate must score strictly above the auto-assign threshold
    /// and lead the runner-up by strictly more than the ambiguity margin.
    #[must_use]
    pub fn decide(&self, scored: &[ChargeMatch]) -> Decision {
        let Some(top) = scored.first() else {
            return Decision::Skip(MatchIssueKind::NoCandidates);
        };
        if top.overall_score <= self.config.auto_assign_threshold {
            return Decision::Skip(MatchIssueKind::BelowThreshold {
                top_score: top.overall_score,
            });
        }
        if let Some(runner_up) = scored.get(1)
            && top.overall_score - runner_up.overall_score <= self.config.ambiguity_margin
        {
            return Decision::Skip(MatchIssueKind::Ambiguous {
                top_score: top.overall_score,
                runner_up_score: runner_up.overall_score,
            });
        }
        Decision::Assign(top.clone())
    }
}

/// Orders by overall score descending, then candidate date descending with
/// unknown dates last, then charge id for a stable result.
fn compare_matches(a: &ChargeMatch, b: &ChargeMatch) -> Ordering {
    b.overall_score
        .cmp(&a.overall_score)
        .then_with(|| match (a.candidate_date, b.candidate_date) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.candidate_charge_id.cmp(&b.candidate_charge_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chargebook_shared::types::FinancialEntityId;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn profile(business: FinancialEntityId, amount: Decimal, day: u32) -> MatchProfile {
        MatchProfile {
            business_id: Some(business),
            currency: Some("ILS".to_string()),
            amount: Some(amount),
            date: Some(date(day)),
        }
    }

    fn candidate(side: MatchSide, profile: MatchProfile) -> Candidate {
        Candidate {
            charge_id: ChargeId::new(),
            side,
            profile,
        }
    }

    fn scored(overall: Decimal, day: Option<u32>) -> ChargeMatch {
        ChargeMatch {
            candidate_charge_id: ChargeId::new(),
            business_score: Decimal::ONE,
            currency_score: Decimal::ONE,
            amount_score: Decimal::ONE,
            overall_score: overall,
            candidate_date: day.map(date),
        }
    }

    #[test]
    fn test_only_complementary_side_is_scored() {
        let business = FinancialEntityId::new();
        let subject = profile(business, dec!(100), 10);
        let candidates = vec![
            candidate(MatchSide::Documents, profile(business, dec!(100), 11)),
            candidate(MatchSide::Transactions, profile(business, dec!(100), 11)),
        ];
        let matches = ChargeMatcher::new(MatchingConfig::default()).rank(&subject, MatchSide::Transactions, &candidates, None);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].candidate_charge_id, candidates[0].charge_id);
    }

    #[test]
    fn test_rank_orders_and_floors() {
        let business = FinancialEntityId::new();
        let subject = profile(business, dec!(100), 10);
        let exact = candidate(MatchSide::Documents, profile(business, dec!(100), 5));
        let close = candidate(MatchSide::Documents, profile(business, dec!(98), 20));
        let stranger = candidate(
            MatchSide::Documents,
            MatchProfile {
                business_id: Some(FinancialEntityId::new()),
                currency: Some("EUR".to_string()),
                amount: Some(dec!(3)),
                date: Some(date(10)),
            },
        );

        let matches = ChargeMatcher::new(MatchingConfig::default()).rank(
            &subject,
            MatchSide::Transactions,
            &[stranger, close.clone(), exact.clone()],
            None,
        );
        let ids: Vec<_> = matches.iter().map(|m| m.candidate_charge_id).collect();
        assert_eq!(ids, vec![exact.charge_id, close.charge_id]);
    }

    #[test]
    fn test_equal_scores_prefer_later_date_then_unknown_last() {
        let mut matches = vec![scored(dec!(0.8), None), scored(dec!(0.8), Some(3)), scored(dec!(0.8), Some(9))];
        matches.sort_by(compare_matches);
        let dates: Vec<_> = matches.iter().map(|m| m.candidate_date).collect();
        assert_eq!(dates, vec![Some(date(9)), Some(date(3)), None]);
    }

    #[test]
    fn test_date_window_excludes_far_candidates() {
        let business = FinancialEntityId::new();
        let config = MatchingConfig {
            max_date_distance_days: 5,
            ..MatchingConfig::default()
        };
        let subject = profile(business, dec!(100), 1);
        let far = candidate(MatchSide::Documents, profile(business, dec!(100), 20));
        let undated = candidate(
            MatchSide::Documents,
            MatchProfile {
                date: None,
                ..profile(business, dec!(100), 1)
            },
        );
        let matches = ChargeMatcher::new(config).rank(&subject, MatchSide::Transactions, &[far, undated.clone()], None);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].candidate_charge_id, undated.charge_id);
    }

    #[test]
    fn test_excluded_charge_is_skipped() {
        let business = FinancialEntityId::new();
        let own = candidate(MatchSide::Documents, profile(business, dec!(1), 1));
        let matches = ChargeMatcher::new(MatchingConfig::default()).rank(
            &profile(business, dec!(1), 1),
            MatchSide::Transactions,
            std::slice::from_ref(&own),
            Some(own.charge_id),
        );
        assert!(matches.is_empty());
    }

    #[test]
    fn test_decide() {
        let matcher = ChargeMatcher::new(MatchingConfig::default());

        assert_eq!(matcher.decide(&[]), Decision::Skip(MatchIssueKind::NoCandidates));

        let low = [scored(dec!(0.9), None)];
        assert_eq!(
            matcher.decide(&low),
            Decision::Skip(MatchIssueKind::BelowThreshold { top_score: dec!(0.9) })
        );

        let near_tie = [scored(dec!(0.97), None), scored(dec!(0.92), None)];
        assert_eq!(
            matcher.decide(&near_tie),
            Decision::Skip(MatchIssueKind::Ambiguous {
                top_score: dec!(0.97),
                runner_up_score: dec!(0.92),
            })
        );

        let clear = [scored(dec!(0.97), None), scored(dec!(0.6), None)];
        assert_eq!(matcher.decide(&clear), Decision::Assign(clear[0].clone()));
    }
}
