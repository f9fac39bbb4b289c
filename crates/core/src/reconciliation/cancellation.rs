//! Balance cancellation detection.
//!
//! For one entity, the ledger movements are grouped into sets that cancel
//! out: first exact opposite pairs, then chronological windows whose running
//! balance returns to zero. Detection never edits amounts.

use std::collections::HashSet;

use chargebook_shared::types::{CancellationGroupId, ChargeId, FinancialEntityId, LedgerRecordId};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::LedgerRecord;

/// How a cancellation group was formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationKind {
    /// Two movements that are exact opposites.
    Pair,
    /// A chronological run of movements that nets to zero.
    Settlement,
}

impl CancellationKind {
    /// Returns the stable storage label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pair => "pair",
            Self::Settlement => "settlement",
        }
    }

    /// Parses a storage label.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "pair" => Some(Self::Pair),
            "settlement" => Some(Self::Settlement),
            _ => None,
        }
    }
}

/// A set of ledger records whose movements on one entity cancel out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationGroup {
    /// Group ID.
    pub id: CancellationGroupId,
    /// Entity whose balance is cancelled.
    pub entity_id: FinancialEntityId,
    /// Member records, sorted.
    pub record_ids: Vec<LedgerRecordId>,
    /// Residual net of the members, within tolerance of zero.
    pub net: Decimal,
    /// How the group was formed.
    pub kind: CancellationKind,
}

impl CancellationGroup {
    fn new(entity_id: FinancialEntityId, members: &[&Movement], kind: CancellationKind) -> Self {
        let mut record_ids: Vec<_> = members.iter().map(|m| m.record_id).collect();
        record_ids.sort();
        Self {
            id: CancellationGroupId::new(),
            entity_id,
            record_ids,
            net: members.iter().map(|m| m.amount).sum(),
            kind,
        }
    }

    /// Returns true if both groups cancel the same records the same way.
    #[must_use]
    pub fn same_membership(&self, other: &Self) -> bool {
        self.entity_id == other.entity_id && self.kind == other.kind && self.record_ids == other.record_ids
    }
}

/// Net signed movement of one record on the entity: debit positive, credit negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Movement {
    /// Source record.
    pub record_id: LedgerRecordId,
    /// Charge of the record.
    pub charge_id: ChargeId,
    /// Record value date.
    pub date: NaiveDate,
    /// Signed local amount.
    pub amount: Decimal,
}

/// Result of detection for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancellationReport {
    /// Entity analysed.
    pub entity_id: FinancialEntityId,
    /// Cancelling groups, pairs first.
    pub groups: Vec<CancellationGroup>,
    /// Records not in any group.
    pub open_record_ids: Vec<LedgerRecordId>,
    /// Net balance of the open records.
    pub open_balance: Decimal,
}

/// Extracts the entity's net movement per record, skipping records that net to zero.
#[must_use]
pub fn movements(entity_id: FinancialEntityId, records: &[LedgerRecord]) -> Vec<Movement> {
    let mut result: Vec<Movement> = records
        .iter()
        .filter_map(|record| {
            let amount: Decimal = record
                .movements()
                .filter(|(entity, _)| *entity == entity_id)
                .map(|(_, amount)| amount)
                .sum();
            (!amount.is_zero()).then_some(Movement {
                record_id: record.id,
                charge_id: record.charge_id,
                date: record.value_date,
                amount,
            })
        })
        .collect();
    result.sort_by(|a, b| a.date.cmp(&b.date).then(a.record_id.cmp(&b.record_id)));
    result
}

/// Detects cancelling groups on an entity.
///
/// Pairs are formed first: each movement, in date order, takes the unpaired
/// opposite within `tolerance`, preferring one from the same charge and then
/// the closest date. The remaining movements are scanned chronologically and
/// every run of two or more consecutive open movements whose balance comes
/// back within `tolerance` of zero becomes a settlement group. A run may start
/// after a movement that never settles; the shortest such run closes first.
#[must_use]
pub fn detect(entity_id: FinancialEntityId, records: &[LedgerRecord], tolerance: Decimal) -> CancellationReport {
    let movements = movements(entity_id, records);
    let mut used = vec![false; movements.len()];
    let mut groups = Vec::new();

    for i in 0..movements.len() {
        if used[i] {
            continue;
        }
        let current = &movements[i];
        let best = movements
            .iter()
            .enumerate()
            .skip(i + 1)
            .filter(|(j, other)| !used[*j] && (current.amount + other.amount).abs() <= tolerance)
            .min_by_key(|(_, other)| {
                (
                    other.charge_id != current.charge_id,
                    (other.date - current.date).num_days().abs(),
                    other.record_id,
                )
            })
            .map(|(j, _)| j);

        if let Some(j) = best {
            used[i] = true;
            used[j] = true;
            groups.push(CancellationGroup::new(
                entity_id,
                &[current, &movements[j]],
                CancellationKind::Pair,
            ));
        }
    }

    // prefix[k] is the sum of pending[..k]; a run pending[s..] nets to zero
    // when the latest prefix sum comes back within tolerance of prefix[s].
    let mut pending: Vec<&Movement> = Vec::new();
    let mut prefix = vec![Decimal::ZERO];
    for (movement, _) in movements.iter().zip(&used).filter(|(_, used)| !**used) {
        let total = prefix.last().copied().unwrap_or_default() + movement.amount;
        pending.push(movement);
        prefix.push(total);
        let start = (0..pending.len() - 1)
            .rev()
            .find(|&s| (total - prefix[s]).abs() <= tolerance);
        if let Some(start) = start {
            groups.push(CancellationGroup::new(
                entity_id,
                &pending[start..],
                CancellationKind::Settlement,
            ));
            pending.truncate(start);
            prefix.truncate(start + 1);
        }
    }

    let grouped: HashSet<LedgerRecordId> =
        groups.iter().flat_map(|g| g.record_ids.iter().copied()).collect();
    let open: Vec<&Movement> = movements.iter().filter(|m| !grouped.contains(&m.record_id)).collect();

    CancellationReport {
        entity_id,
        groups,
        open_record_ids: open.iter().map(|m| m.record_id).collect(),
        open_balance: open.iter().map(|m| m.amount).sum(),
    }
}

/// Changes needed to bring stored groups in line with detected ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CancellationPlan {
    /// Stored groups that are still valid; their ids are preserved.
    pub kept: Vec<CancellationGroup>,
    /// Stored groups to remove.
    pub removed: Vec<CancellationGroup>,
    /// New groups to insert.
    pub inserted: Vec<CancellationGroup>,
}

impl CancellationPlan {
    /// Diffs stored groups against detected ones by membership.
    #[must_use]
    pub fn diff(stored: Vec<CancellationGroup>, detected: Vec<CancellationGroup>) -> Self {
        let mut remaining = detected;
        let mut kept = Vec::new();
        let mut removed = Vec::new();
        for group in stored {
            if let Some(pos) = remaining.iter().position(|d| d.same_membership(&group)) {
                remaining.swap_remove(pos);
                kept.push(group);
            } else {
                removed.push(group);
            }
        }
        Self {
            kept,
            removed,
            inserted: remaining,
        }
    }

    /// Returns true if nothing needs to be written.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.removed.is_empty() && self.inserted.is_empty()
    }

    /// Returns every record whose group membership changes.
    pub fn touched_records(&self) -> impl Iterator<Item = LedgerRecordId> + '_ {
        self.removed
            .iter()
            .chain(&self.inserted)
            .flat_map(|g| g.record_ids.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerLeg;
    use rust_decimal_macros::dec;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    /// A record moving `amount` onto `entity` (negative means credit).
    fn record(entity: FinancialEntityId, charge: ChargeId, amount: Decimal, day: u32) -> LedgerRecord {
        let other = FinancialEntityId::new();
        LedgerRecord::transfer(
            charge,
            LedgerLeg::local(entity, amount),
            LedgerLeg::local(other, amount),
            date(day),
            date(day),
        )
    }

    #[test]
    fn test_movements_are_signed_and_sorted() {
        let entity = FinancialEntityId::new();
        let charge = ChargeId::new();
        let records = [record(entity, charge, dec!(-50), 9), record(entity, charge, dec!(80), 2)];
        let moves = movements(entity, &records);
        assert_eq!(moves.iter().map(|m| m.amount).collect::<Vec<_>>(), vec![dec!(80), dec!(-50)]);
    }

    #[test]
    fn test_pair_prefers_same_charge() {
        let entity = FinancialEntityId::new();
        let (a, b) = (ChargeId::new(), ChargeId::new());
        let invoice = record(entity, a, dec!(100), 1);
        let other_payment = record(entity, b, dec!(-100), 2);
        let own_payment = record(entity, a, dec!(-100), 20);

        let report = detect(entity, &[invoice.clone(), other_payment.clone(), own_payment.clone()], dec!(0.01));
        let pair = &report.groups[0];
        assert_eq!(pair.kind, CancellationKind::Pair);
        let mut expected = vec![invoice.id, own_payment.id];
        expected.sort();
        assert_eq!(pair.record_ids, expected);
        assert_eq!(report.open_record_ids, vec![other_payment.id]);
        assert_eq!(report.open_balance, dec!(-100));
    }

    #[test]
    fn test_pair_prefers_closest_date_across_charges() {
        let entity = FinancialEntityId::new();
        let invoice = record(entity, ChargeId::new(), dec!(100), 10);
        let far = record(entity, ChargeId::new(), dec!(-100), 28);
        let near = record(entity, ChargeId::new(), dec!(-100), 12);

        let report = detect(entity, &[invoice.clone(), far, near.clone()], dec!(0.01));
        let mut expected = vec![invoice.id, near.id];
        expected.sort();
        assert_eq!(report.groups[0].record_ids, expected);
    }

    #[test]
    fn test_settlement_window_closes_at_zero() {
        let entity = FinancialEntityId::new();
        let charge = ChargeId::new();
        let records = [
            record(entity, charge, dec!(100), 1),
            record(entity, charge, dec!(50), 2),
            record(entity, charge, dec!(-150), 3),
            record(entity, charge, dec!(30), 4),
        ];

        let report = detect(entity, &records, dec!(0.01));
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].kind, CancellationKind::Settlement);
        assert_eq!(report.groups[0].record_ids.len(), 3);
        assert_eq!(report.groups[0].net, Decimal::ZERO);
        assert_eq!(report.open_record_ids, vec![records[3].id]);
        assert_eq!(report.open_balance, dec!(30));
    }

    #[test]
    fn test_settlement_found_after_open_balance() {
        let entity = FinancialEntityId::new();
        let charge = ChargeId::new();
        let records = [
            record(entity, charge, dec!(100), 1),
            record(entity, charge, dec!(30), 2),
            record(entity, charge, dec!(-20), 3),
            record(entity, charge, dec!(-10), 4),
        ];

        let report = detect(entity, &records, dec!(0.01));
        assert_eq!(report.groups.len(), 1);
        let settlement = &report.groups[0];
        assert_eq!(settlement.kind, CancellationKind::Settlement);
        let mut expected = vec![records[1].id, records[2].id, records[3].id];
        expected.sort();
        assert_eq!(settlement.record_ids, expected);
        assert_eq!(settlement.net, Decimal::ZERO);
        assert_eq!(report.open_record_ids, vec![records[0].id]);
        assert_eq!(report.open_balance, dec!(100));
    }

    #[test]
    fn test_open_movement_between_settlements_stays_open() {
        let entity = FinancialEntityId::new();
        let charge = ChargeId::new();
        let records = [
            record(entity, charge, dec!(40), 1),
            record(entity, charge, dec!(-15), 2),
            record(entity, charge, dec!(-25), 3),
            record(entity, charge, dec!(7), 4),
            record(entity, charge, dec!(60), 5),
            record(entity, charge, dec!(-35), 6),
            record(entity, charge, dec!(-25), 7),
        ];

        let report = detect(entity, &records, dec!(0.01));
        assert_eq!(report.groups.len(), 2);
        assert!(report.groups.iter().all(|g| g.kind == CancellationKind::Settlement));
        assert_eq!(report.open_record_ids, vec![records[3].id]);
        assert_eq!(report.open_balance, dec!(7));
    }

    #[test]
    fn test_tolerance_allows_rounding_residual() {
        let entity = FinancialEntityId::new();
        let records = [
            record(entity, ChargeId::new(), dec!(100), 1),
            record(entity, ChargeId::new(), dec!(-99.99), 2),
        ];
        let report = detect(entity, &records, dec!(0.01));
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].net, dec!(0.01));
        assert!(detect(entity, &records, Decimal::ZERO).groups.is_empty());
    }

    #[test]
    fn test_other_entities_are_ignored() {
        let entity = FinancialEntityId::new();
        let records = [record(FinancialEntityId::new(), ChargeId::new(), dec!(10), 1)];
        let report = detect(entity, &records, dec!(0.01));
        assert!(report.groups.is_empty());
        assert!(report.open_record_ids.is_empty());
        assert_eq!(report.open_balance, Decimal::ZERO);
    }

    #[test]
    fn test_plan_keeps_unchanged_groups() {
        let entity = FinancialEntityId::new();
        let records = [
            record(entity, ChargeId::new(), dec!(100), 1),
            record(entity, ChargeId::new(), dec!(-100), 2),
        ];
        let stored = detect(entity, &records, dec!(0.01)).groups;
        let redetected = detect(entity, &records, dec!(0.01)).groups;
        assert_ne!(stored[0].id, redetected[0].id);

        let plan = CancellationPlan::diff(stored.clone(), redetected);
        assert!(plan.is_unchanged());
        assert_eq!(plan.kept, stored);
        assert_eq!(plan.touched_records().count(), 0);
    }

    #[test]
    fn test_plan_replaces_changed_groups() {
        let entity = FinancialEntityId::new();
        let records = [
            record(entity, ChargeId::new(), dec!(100), 1),
            record(entity, ChargeId::new(), dec!(-100), 2),
        ];
        let stored = detect(entity, &records, dec!(0.01)).groups;

        let plan = CancellationPlan::diff(stored.clone(), Vec::new());
        assert_eq!(plan.removed, stored);
        assert!(plan.inserted.is_empty());
        assert_eq!(plan.touched_records().count(), 2);
    }

    #[test]
    fn test_kind_labels_round_trip() {
        for kind in [CancellationKind::Pair, CancellationKind::Settlement] {
            assert_eq!(CancellationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(CancellationKind::parse("other"), None);
    }
}
