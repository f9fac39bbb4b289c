//! Charge classification.
//!
//! The classifier evaluates an ordered list of predicates and the first match
//! wins. An explicit flag always outranks an incidental attribute, so a
//! conversion between two wallets is a conversion, not an internal transfer.

use std::collections::HashSet;

use chargebook_shared::types::FinancialEntityId;

use super::types::{Charge, ChargeType};

/// Pure, total classifier from charge attributes to a [`ChargeType`].
#[derive(Debug, Clone, Default)]
pub struct ChargeClassifier {
    internal_wallets: HashSet<FinancialEntityId>,
}

impl ChargeClassifier {
    /// Creates a classifier that knows the owner's internal wallet businesses.
    #[must_use]
    pub fn new(internal_wallets: impl IntoIterator<Item = FinancialEntityId>) -> Self {
        Self {
            internal_wallets: internal_wallets.into_iter().collect(),
        }
    }

    /// Classifies a charge.
    ///
    /// Never reads `charge.charge_type`, so re-running on an unchanged charge
    /// always yields the same type.
    #[must_use]
    pub fn classify(&self, charge: &Charge) -> ChargeType {
        if charge.is_conversion {
            ChargeType::Conversion
        } else if charge.is_salary {
            ChargeType::Salary
        } else if self.internal_wallet_count(charge) > 1 {
            ChargeType::InternalTransfer
        } else if charge.business_trip_id.is_some() {
            ChargeType::BusinessTrip
        } else if charge.is_dividend {
            ChargeType::Dividend
        } else if charge.is_bank_deposit {
            ChargeType::BankDeposit
        } else if charge.is_creditcard_bank {
            ChargeType::CreditcardBank
        } else if charge.is_monthly_vat {
            ChargeType::MonthlyVat
        } else if charge.is_financial {
            ChargeType::Financial
        } else {
            ChargeType::Common
        }
    }

    /// Returns how many of the charge's businesses are internal wallets.
    #[must_use]
    pub fn internal_wallet_count(&self, charge: &Charge) -> usize {
        charge
            .business_ids
            .iter()
            .filter(|id| self.internal_wallets.contains(id))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chargebook_shared::types::{BusinessTripId, ChargeId};
    use rstest::rstest;

    fn charge() -> Charge {
        Charge::new(ChargeId::new())
    }

    #[test]
    fn test_default_is_common() {
        assert_eq!(ChargeClassifier::default().classify(&charge()), ChargeType::Common);
    }

    #[rstest]
    #[case::conversion(|c: &mut Charge| c.is_conversion = true, ChargeType::Conversion)]
    #[case::salary(|c: &mut Charge| c.is_salary = true, ChargeType::Salary)]
    #[case::trip(|c: &mut Charge| c.business_trip_id = Some(BusinessTripId::new()), ChargeType::BusinessTrip)]
    #[case::dividend(|c: &mut Charge| c.is_dividend = true, ChargeType::Dividend)]
    #[case::deposit(|c: &mut Charge| c.is_bank_deposit = true, ChargeType::BankDeposit)]
    #[case::card(|c: &mut Charge| c.is_creditcard_bank = true, ChargeType::CreditcardBank)]
    #[case::vat(|c: &mut Charge| c.is_monthly_vat = true, ChargeType::MonthlyVat)]
    #[case::financial(|c: &mut Charge| c.is_financial = true, ChargeType::Financial)]
    fn test_single_flag(#[case] set: fn(&mut Charge), #[case] expected: ChargeType) {
        let mut c = charge();
        set(&mut c);
        assert_eq!(ChargeClassifier::default().classify(&c), expected);
    }

    #[test]
    fn test_two_internal_wallets_is_internal_transfer() {
        let wallet_a = FinancialEntityId::new();
        let wallet_b = FinancialEntityId::new();
        let classifier = ChargeClassifier::new([wallet_a, wallet_b]);

        let mut c = charge();
        c.business_ids.insert(wallet_a);
        c.business_ids.insert(FinancialEntityId::new());
        assert_eq!(classifier.classify(&c), ChargeType::Common);

        c.business_ids.insert(wallet_b);
        assert_eq!(classifier.internal_wallet_count(&c), 2);
        assert_eq!(classifier.classify(&c), ChargeType::InternalTransfer);
    }

    #[test]
    fn test_conversion_outranks_internal_transfer() {
        let wallets = [FinancialEntityId::new(), FinancialEntityId::new()];
        let classifier = ChargeClassifier::new(wallets);
        let mut c = charge();
        c.business_ids.extend(wallets);
        c.is_conversion = true;
        assert_eq!(classifier.classify(&c), ChargeType::Conversion);
    }

    #[test]
    fn test_salary_outranks_dividend() {
        let mut c = charge();
        c.is_dividend = true;
        c.is_salary = true;
        assert_eq!(ChargeClassifier::default().classify(&c), ChargeType::Salary);
    }

    #[test]
    fn test_stored_type_is_ignored() {
        let mut c = charge();
        c.charge_type = Some(ChargeType::Dividend);
        assert_eq!(ChargeClassifier::default().classify(&c), ChargeType::Common);
    }
}
