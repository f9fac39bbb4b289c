//! Detection of batched salary charges.
//!
//! A batched charge pays several employees through one aggregate line. The
//! keyword heuristic is fuzzy, so it sits behind a trait and can be replaced by
//! an explicit flag without touching the salary generator.

use chargebook_shared::types::FinancialEntityId;

use super::types::Charge;

/// Decides whether a salary charge aggregates several employees.
pub trait BatchedChargePredicate: Send + Sync {
    /// Returns true if the charge is batched.
    fn is_batched(&self, charge: &Charge) -> bool;
}

/// Batched when the reserved batched-employee business takes part in the
/// charge, or the description contains one of the batch keywords.
#[derive(Debug, Clone, Default)]
pub struct KeywordBatchPredicate {
    batched_employee_business_id: Option<FinancialEntityId>,
    keywords: Vec<String>,
}

impl KeywordBatchPredicate {
    /// Creates the predicate. Keywords are matched case-insensitively.
    #[must_use]
    pub fn new(batched_employee_business_id: Option<FinancialEntityId>, keywords: &[String]) -> Self {
        Self {
            batched_employee_business_id,
            keywords: keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }
}

impl BatchedChargePredicate for KeywordBatchPredicate {
    fn is_batched(&self, charge: &Charge) -> bool {
        if self
            .batched_employee_business_id
            .is_some_and(|id| charge.business_ids.contains(&id))
        {
            return true;
        }
        charge.user_description.as_deref().is_some_and(|description| {
            let description = description.to_lowercase();
            self.keywords.iter().any(|k| description.contains(k.as_str()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chargebook_shared::types::ChargeId;

    fn predicate(batched: Option<FinancialEntityId>) -> KeywordBatchPredicate {
        KeywordBatchPredicate::new(batched, &["batched".to_string(), "מרוכז".to_string()])
    }

    #[test]
    fn test_reserved_business_marks_batched() {
        let reserved = FinancialEntityId::new();
        let mut charge = Charge::new(ChargeId::new());
        assert!(!predicate(Some(reserved)).is_batched(&charge));
        charge.business_ids.insert(reserved);
        assert!(predicate(Some(reserved)).is_batched(&charge));
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let mut charge = Charge::new(ChargeId::new());
        charge.user_description = Some("March salaries (BATCHED)".to_string());
        assert!(predicate(None).is_batched(&charge));
    }

    #[test]
    fn test_hebrew_keyword() {
        let mut charge = Charge::new(ChargeId::new());
        charge.user_description = Some("משכורות מרוכז מרץ".to_string());
        assert!(predicate(None).is_batched(&charge));
    }

    #[test]
    fn test_plain_description_is_not_batched() {
        let mut charge = Charge::new(ChargeId::new());
        charge.user_description = Some("Salary for Dana".to_string());
        assert!(!predicate(None).is_batched(&charge));
    }

    #[test]
    fn test_blank_keywords_are_ignored() {
        let p = KeywordBatchPredicate::new(None, &["  ".to_string()]);
        let mut charge = Charge::new(ChargeId::new());
        charge.user_description = Some("anything".to_string());
        assert!(!p.is_batched(&charge));
    }
}
