//! Property-based tests for charge classification.
//!
//! - Classification is deterministic
//! - Common is reached only when no flag applies
//! - The conversion flag always wins

use chargebook_shared::types::{BusinessTripId, ChargeId, FinancialEntityId};
use proptest::prelude::*;

use super::classifier::ChargeClassifier;
use super::types::{Charge, ChargeType};

prop_compose! {
    fn arb_charge()(
        flags in prop::collection::vec(any::<bool>(), 9),
        wallet_members in 0usize..4,
        stored in prop::option::of(prop::sample::select(ChargeType::ALL.to_vec())),
    ) -> (Charge, usize) {
        let mut charge = Charge::new(ChargeId::new());
        charge.is_conversion = flags[0];
        charge.is_salary = flags[1];
        charge.business_trip_id = flags[2].then(BusinessTripId::new);
        charge.is_dividend = flags[3];
        charge.is_bank_deposit = flags[4];
        charge.is_creditcard_bank = flags[5];
        charge.is_monthly_vat = flags[6];
        charge.is_financial = flags[7];
        charge.is_property = flags[8];
        charge.charge_type = stored;
        (charge, wallet_members)
    }
}

fn with_wallets(charge: &mut Charge, members: usize) -> ChargeClassifier {
    let wallets: Vec<FinancialEntityId> = (0..3).map(|_| FinancialEntityId::new()).collect();
    charge.business_ids.extend(wallets.iter().take(members).copied());
    ChargeClassifier::new(wallets)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// *For any* charge, classifying twice yields the same type.
    #[test]
    fn prop_classification_is_idempotent((mut charge, members) in arb_charge()) {
        let classifier = with_wallets(&mut charge, members);
        let first = classifier.classify(&charge);
        charge.charge_type = Some(first);
        prop_assert_eq!(classifier.classify(&charge), first);
    }

    /// *For any* charge, Common means no higher-priority predicate held.
    #[test]
    fn prop_common_only_when_nothing_matches((mut charge, members) in arb_charge()) {
        let classifier = with_wallets(&mut charge, members);
        let any_flag = charge.is_conversion
            || charge.is_salary
            || members > 1
            || charge.business_trip_id.is_some()
            || charge.is_dividend
            || charge.is_bank_deposit
            || charge.is_creditcard_bank
            || charge.is_monthly_vat
            || charge.is_financial;
        prop_assert_eq!(classifier.classify(&charge) == ChargeType::Common, !any_flag);
    }

    /// *For any* charge with the conversion flag, the type is Conversion.
    #[test]
    fn prop_conversion_flag_wins((mut charge, members) in arb_charge()) {
        let classifier = with_wallets(&mut charge, members);
        charge.is_conversion = true;
        prop_assert_eq!(classifier.classify(&charge), ChargeType::Conversion);
    }
}
