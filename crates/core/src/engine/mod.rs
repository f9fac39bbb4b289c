//! Request-scoped orchestration.
//!
//! [`ChargeEngine`] loads what an operation needs through the [`Store`] seam,
//! runs the pure domain logic and writes the result back. Nothing is cached
//! between operations: exchange rates, lock dates and recovery rates are read
//! fresh each time. Writes to one charge are serialized through [`ChargeLocks`],
//! and every store call is bounded by the configured lookup timeout.

mod error;
mod locks;


use std::collections::{BTreeSet, HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chargebook_shared::config::{
    AppConfig, DividendConfig, EngineConfig, LedgerConfig, MatchingConfig, ReconciliationConfig, SalaryConfig,
};
use chargebook_shared::types::{ChargeId, FinancialEntityId, LedgerRecordId, TransactionId};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::charge::{BatchedChargePredicate, BusinessTripCategory, Document, SalaryRecord, Transaction, summarize};
use crate::currency::ExchangeRateTable;
use crate::error::ErrorCategory;
use crate::ledger::{
    GeneratedLedger, GenerationInput, LedgerGenerator, LedgerLockGuard, LedgerRecord, RecoveryRateTable,
    ReplacementPlan,
};
use crate::matching::{
    Assignment, AutoMatchResult, Candidate, ChargeMatch, ChargeMatcher, Decision, MatchIssue, MatchIssueKind,
    MatchProfile, MatchSubject,
};
use crate::reconciliation::{CancellationGroup, CancellationPlan, detect};
use crate::store::{ChargeBundle, ChargeRefresh, ItemAssignment, Store, StoreError, UnassignedItems};

pub use error::EngineError;
pub use locks::KeyedLocks;

/// Per-charge mutual exclusion.
pub type ChargeLocks = KeyedLocks<ChargeId>;

/// The configuration sections the engine reads.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Chart of accounts and ownership.
    pub ledger: LedgerConfig,
    /// Dividend business identifiers.
    pub dividend: DividendConfig,
    /// Salary batching.
    pub salary: SalaryConfig,
    /// Matcher tuning.
    pub matching: MatchingConfig,
    /// Cancellation tuning.
    pub reconciliation: ReconciliationConfig,
    /// Runtime limits.
    pub engine: EngineConfig,
}

impl From<&AppConfig> for EngineSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            ledger: config.ledger.clone(),
            dividend: config.dividend.clone(),
            salary: config.salary.clone(),
            matching: config.matching.clone(),
            reconciliation: config.reconciliation.clone(),
            engine: config.engine.clone(),
        }
    }
}

/// Result of a ledger regeneration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerOutcome {
    /// The charge's ledger as stored after the operation.
    #[serde(flatten)]
    pub ledger: GeneratedLedger,
    /// Stored records deleted.
    pub deleted: usize,
    /// Records inserted.
    pub inserted: usize,
}

impl LedgerOutcome {
    /// Returns true if the stored ledger was rewritten.
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.deleted > 0 || self.inserted > 0
    }
}

/// Result of a balance cancellation run for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancellationOutcome {
    /// Entity ID.
    pub entity_id: FinancialEntityId,
    /// Cancellation groups as stored after the run.
    pub groups: Vec<CancellationGroup>,
    /// Records left in no group.
    pub open_record_ids: Vec<LedgerRecordId>,
    /// Net of the open records.
    pub open_balance: Decimal,
    /// Groups removed by this run.
    pub removed: usize,
    /// Groups inserted by this run.
    pub inserted: usize,
}

/// Orchestrates the reconciliation core over a store.
pub struct ChargeEngine<S> {
    store: Arc<S>,
    settings: EngineSettings,
    generator: LedgerGenerator,
    matcher: ChargeMatcher,
    charge_locks: ChargeLocks,
    entity_locks: KeyedLocks<FinancialEntityId>,
}

impl<S: Store> ChargeEngine<S> {
    /// Creates an engine using the keyword batch predicate.
    #[must_use]
    pub fn new(store: Arc<S>, settings: EngineSettings) -> Self {
        let generator = LedgerGenerator::new(settings.ledger.clone(), settings.dividend.clone(), &settings.salary);
        Self::with_generator(store, settings, generator)
    }

    /// Creates an engine with a custom batch predicate.
    #[must_use]
    pub fn with_batch_predicate(
        store: Arc<S>,
        settings: EngineSettings,
        predicate: Arc<dyn BatchedChargePredicate>,
    ) -> Self {
        let generator = LedgerGenerator::with_batch_predicate(
            settings.ledger.clone(),
            settings.dividend.clone(),
            &settings.salary,
            predicate,
        );
        Self::with_generator(store, settings, generator)
    }

    fn with_generator(store: Arc<S>, settings: EngineSettings, generator: LedgerGenerator) -> Self {
        let matcher = ChargeMatcher::new(settings.matching.clone());
        Self {
            store,
            settings,
            generator,
            matcher,
            charge_locks: ChargeLocks::new(),
            entity_locks: KeyedLocks::new(),
        }
    }

    /// Returns the underlying store.
    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the engine settings.
    #[must_use]
    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Runs a store call under the lookup timeout.
    async fn timed<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, EngineError> {
        let limit = self.settings.engine.lookup_timeout();
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result.map_err(EngineError::from),
            Err(_) => {
                let timeout_ms = duration_ms(limit);
                tracing::warn!(operation, timeout_ms, "Store call timed out");
                Err(EngineError::Timeout { operation, timeout_ms })
            }
        }
    }

    async fn lock_guard(&self) -> Result<LedgerLockGuard, EngineError> {
        let versions = self.timed("ledger_locks", self.store.ledger_locks()).await?;
        Ok(LedgerLockGuard::from_versions(&versions))
    }

    // ========================================================================
    // Ledger generation
    // ========================================================================

    /// Classifies a charge, generates its ledger and replaces the stored one.
    ///
    /// Records identical to the stored ones are kept as they are; if nothing
    /// changed, nothing is written. Any record that would be deleted or
    /// inserted must pass the lock guard, otherwise nothing is written.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Ledger` if generation or the lock check fails,
    /// `EngineError::Store` or `EngineError::Timeout` if storage fails.
    pub async fn generate_ledger(&self, charge_id: ChargeId) -> Result<LedgerOutcome, EngineError> {
        let _lock = self.charge_locks.lock(charge_id).await;

        let bundle = self.timed("charge_bundle", self.store.charge_bundle(charge_id)).await?;
        let salary_records = self.timed("salary_records", self.store.salary_records(charge_id)).await?;
        let vat_records = self
            .timed("vat_report_records", self.store.vat_report_records(charge_id))
            .await?;
        let horizon = rate_horizon(&bundle, &salary_records, Utc::now().date_naive());
        let rates = self.timed("exchange_rates", self.store.exchange_rates(horizon)).await?;
        let recovery = self.timed("recovery_rates", self.store.recovery_rates()).await?;
        let guard = self.lock_guard().await?;

        let rate_table = ExchangeRateTable::from_rates(self.settings.ledger.local_currency, &rates);
        let recovery_rates = RecoveryRateTable::from_versions(&recovery);
        let generated = self.generator.generate(&GenerationInput {
            charge: &bundle.charge,
            transactions: &bundle.transactions,
            documents: &bundle.documents,
            salary_records: &salary_records,
            vat_records: &vat_records,
            recovery_rates: &recovery_rates,
            rates: &rate_table,
        })?;

        let existing = self.timed("ledger_records", self.store.ledger_records(charge_id)).await?;
        let plan = guard.check_replacement(&existing, &generated.records)?;

        match plan {
            ReplacementPlan::Unchanged => {
                if bundle.charge.charge_type != Some(generated.charge_type) {
                    self.timed(
                        "set_charge_type",
                        self.store.set_charge_type(charge_id, generated.charge_type),
                    )
                    .await?;
                }
                tracing::debug!(
                    charge_id = %charge_id,
                    charge_type = %generated.charge_type,
                    records = existing.len(),
                    "Ledger unchanged"
                );
                Ok(LedgerOutcome {
                    ledger: GeneratedLedger {
                        records: existing,
                        ..generated
                    },
                    deleted: 0,
                    inserted: 0,
                })
            }
            ReplacementPlan::Replace { delete, insert } => {
                self.timed(
                    "replace_ledger_records",
                    self.store
                        .replace_ledger_records(charge_id, generated.charge_type, &delete, &insert, guard),
                )
                .await?;
                tracing::info!(
                    charge_id = %charge_id,
                    charge_type = %generated.charge_type,
                    deleted = delete.len(),
                    inserted = insert.len(),
                    "Ledger regenerated"
                );

                let deleted = delete.len();
                let inserted = insert.len();
                let mut records: Vec<LedgerRecord> =
                    existing.into_iter().filter(|r| !delete.contains(&r.id)).collect();
                records.extend(insert);
                Ok(LedgerOutcome {
                    ledger: GeneratedLedger { records, ..generated },
                    deleted,
                    inserted,
                })
            }
        }
    }

    // ========================================================================
    // Matching
    // ========================================================================

    /// Ranks the charges that could complete a one-sided charge.
    ///
    /// Read-only.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::ChargeNotMatchable` if the charge is empty or
    /// already holds both sides.
    pub async fn find_charge_matches(&self, charge_id: ChargeId) -> Result<Vec<ChargeMatch>, EngineError> {
        let bundle = self.timed("charge_bundle", self.store.charge_bundle(charge_id)).await?;
        let side = bundle.side().ok_or(EngineError::ChargeNotMatchable { charge_id })?;
        let bundles = self.timed("matchable_charges", self.store.matchable_charges()).await?;

        let profile = MatchProfile::of_summary(&self.refresh(&bundle, None).summary, side);
        let candidates = self.candidates(&bundles);
        let matches = self.matcher.rank(&profile, side, &candidates, Some(charge_id));

        tracing::debug!(
            charge_id = %charge_id,
            candidates = candidates.len(),
            matches = matches.len(),
            "Charge matches ranked"
        );
        Ok(matches)
    }

    /// Assigns unassigned and one-sided items to the charges they match with
    /// high confidence.
    ///
    /// Each item is scored against every open one-sided charge of the other
    /// side. Near-ties and low scores are reported, never assigned. A charge
    /// changed by one assignment takes no further part in the run, so every
    /// decision is made against current data; the remaining items of a charge
    /// that lost an item are reported as deferred. One failed assignment does
    /// not affect the others.
    ///
    /// # Errors
    ///
    /// Returns an error only if the initial lookups fail; per-item failures
    /// are reported in the result.
    pub async fn auto_match_charges(&self) -> Result<AutoMatchResult, EngineError> {
        let bundles = self.timed("matchable_charges", self.store.matchable_charges()).await?;
        let unassigned = self.timed("unassigned_items", self.store.unassigned_items()).await?;
        let guard = self.lock_guard().await?;

        let mut candidates = self.candidates(&bundles);
        let subjects = self.subjects(&bundles, &unassigned);
        let mut touched: HashSet<ChargeId> = HashSet::new();
        let mut completed: HashSet<ChargeId> = HashSet::new();
        let mut result = AutoMatchResult {
            success: true,
            ..AutoMatchResult::default()
        };

        for (subject, source, profile) in subjects {
            if let Some(charge_id) = source.filter(|id| touched.contains(id)) {
                // A charge that received an item now holds both sides.
                if !completed.contains(&charge_id) {
                    tracing::debug!(subject = %subject, charge_id = %charge_id, "Item deferred to the next run");
                    result.errors.push(MatchIssue {
                        subject,
                        kind: MatchIssueKind::Deferred { charge_id },
                    });
                }
                continue;
            }

            let scored = self.matcher.score_candidates(&profile, subject.side(), &candidates, source);
            let chosen = match self.matcher.decide(&scored) {
                Decision::Assign(chosen) => chosen,
                Decision::Skip(kind) => {
                    tracing::debug!(subject = %subject, reason = ?kind, "Item left unassigned");
                    result.errors.push(MatchIssue { subject, kind });
                    continue;
                }
            };

            match self.assign(subject, source, &chosen, guard, &unassigned).await {
                Ok(assignment) => {
                    touched.insert(assignment.to_charge_id);
                    touched.extend(assignment.from_charge_id);
                    completed.insert(assignment.to_charge_id);
                    candidates.retain(|c| !touched.contains(&c.charge_id));
                    tracing::info!(
                        subject = %subject,
                        to_charge_id = %assignment.to_charge_id,
                        score = %assignment.score,
                        "Item assigned"
                    );
                    result.assigned_count += 1;
                    result.assignments.push(assignment);
                }
                Err(err) => {
                    if err.category() == ErrorCategory::Infrastructure {
                        result.success = false;
                    }
                    tracing::warn!(subject = %subject, error = %err, "Assignment failed");
                    let kind = if err.is_locked() {
                        MatchIssueKind::Locked {
                            message: err.to_string(),
                        }
                    } else {
                        MatchIssueKind::AssignmentFailed {
                            message: err.to_string(),
                        }
                    };
                    result.errors.push(MatchIssue { subject, kind });
                }
            }
        }

        tracing::info!(
            assigned = result.assigned_count,
            issues = result.errors.len(),
            success = result.success,
            "Auto-match finished"
        );
        Ok(result)
    }

    fn candidates(&self, bundles: &[ChargeBundle]) -> Vec<Candidate> {
        bundles
            .iter()
            .filter(|bundle| bundle.charge.is_open())
            .filter_map(|bundle| {
                let side = bundle.side()?;
                Some(Candidate {
                    charge_id: bundle.charge.id,
                    side,
                    profile: MatchProfile::of_summary(&self.refresh(bundle, None).summary, side),
                })
            })
            .collect()
    }

    /// Unassigned items first, then items of one-sided charges, each profiled on its own.
    fn subjects(
        &self,
        bundles: &[ChargeBundle],
        unassigned: &UnassignedItems,
    ) -> Vec<(MatchSubject, Option<ChargeId>, MatchProfile)> {
        let owner = self.settings.ledger.owner_id;
        let mut subjects = Vec::new();
        for tx in &unassigned.transactions {
            subjects.push((MatchSubject::Transaction(tx.id), None, MatchProfile::of_transaction(tx)));
        }
        for doc in &unassigned.documents {
            subjects.push((MatchSubject::Document(doc.id), None, MatchProfile::of_document(doc, owner)));
        }
        for bundle in bundles.iter().filter(|b| b.charge.is_open() && b.side().is_some()) {
            let source = Some(bundle.charge.id);
            for tx in &bundle.transactions {
                subjects.push((MatchSubject::Transaction(tx.id), source, MatchProfile::of_transaction(tx)));
            }
            for doc in &bundle.documents {
                subjects.push((MatchSubject::Document(doc.id), source, MatchProfile::of_document(doc, owner)));
            }
        }
        subjects
    }

    /// Moves one item onto the chosen charge under both charges' locks.
    async fn assign(
        &self,
        subject: MatchSubject,
        source: Option<ChargeId>,
        chosen: &ChargeMatch,
        guard: LedgerLockGuard,
        unassigned: &UnassignedItems,
    ) -> Result<Assignment, EngineError> {
        let target_id = chosen.candidate_charge_id;
        let involved: Vec<ChargeId> = source.into_iter().chain([target_id]).collect();
        let _locks = self.charge_locks.lock_many(involved.iter().copied()).await;

        for &charge_id in &involved {
            let records = self.timed("ledger_records", self.store.ledger_records(charge_id)).await?;
            for record in &records {
                guard.check_record(record)?;
            }
        }

        let target = self.timed("charge_bundle", self.store.charge_bundle(target_id)).await?;
        if !target.charge.is_open() || target.side() != Some(subject.side().complement()) {
            return Err(StoreError::Conflict(format!("charge {target_id} changed since it was matched")).into());
        }

        let (source_refresh, item) = match source {
            Some(source_id) => {
                let bundle = self.timed("charge_bundle", self.store.charge_bundle(source_id)).await?;
                let item = Item::take(&bundle, subject)?;
                let remaining = without(&bundle, subject);
                (Some(self.refresh(&remaining, None)), item)
            }
            None => (None, Item::unassigned(unassigned, subject)?),
        };
        let target_refresh = self.refresh(&target, Some(&item));

        self.timed(
            "assign_item",
            self.store.assign_item(&ItemAssignment {
                subject,
                source: source_refresh,
                target: target_refresh,
            }),
        )
        .await?;

        Ok(Assignment {
            subject,
            from_charge_id: source,
            to_charge_id: target_id,
            score: chosen.overall_score,
        })
    }

    /// Recomputes a charge's derived state, optionally with one extra item.
    fn refresh(&self, bundle: &ChargeBundle, extra: Option<&Item>) -> ChargeRefresh {
        let ledger = &self.settings.ledger;
        let mut transactions = bundle.transactions.clone();
        let mut documents = bundle.documents.clone();
        match extra {
            Some(Item::Transaction(tx)) => transactions.push(tx.clone()),
            Some(Item::Document(doc)) => documents.push(doc.clone()),
            None => {}
        }

        let summary = summarize(&transactions, &documents, ledger.local_currency, ledger.owner_id);
        let business_ids: BTreeSet<FinancialEntityId> = transactions
            .iter()
            .filter_map(|tx| tx.business_id)
            .chain(documents.iter().filter_map(|doc| doc.counterparty(ledger.owner_id)))
            .collect();
        ChargeRefresh {
            charge_id: bundle.charge.id,
            summary,
            business_ids,
            close: transactions.is_empty() && documents.is_empty(),
        }
    }

    // ========================================================================
    // Balance cancellation
    // ========================================================================

    /// Detects settled movements of an entity and brings the stored
    /// cancellation groups in line.
    ///
    /// Groups that are still valid keep their ids. Records whose group
    /// membership changes must pass the lock guard.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Ledger` with a lock error if a changed group
    /// touches a locked record; nothing is written in that case.
    pub async fn cancel_balances(&self, entity_id: FinancialEntityId) -> Result<CancellationOutcome, EngineError> {
        let _lock = self.entity_locks.lock(entity_id).await;

        let records = self
            .timed("entity_ledger_records", self.store.entity_ledger_records(entity_id))
            .await?;
        let stored = self
            .timed("cancellation_groups", self.store.cancellation_groups(entity_id))
            .await?;
        let guard = self.lock_guard().await?;

        let report = detect(entity_id, &records, self.settings.reconciliation.tolerance);
        let plan = CancellationPlan::diff(stored, report.groups);

        if !plan.is_unchanged() {
            let by_id: HashMap<LedgerRecordId, &LedgerRecord> = records.iter().map(|r| (r.id, r)).collect();
            // Records of a removed group may already be gone after a regeneration.
            for record_id in plan.touched_records() {
                if let Some(record) = by_id.get(&record_id) {
                    guard.check_record(record)?;
                }
            }
            self.timed(
                "apply_cancellation_plan",
                self.store.apply_cancellation_plan(entity_id, &plan),
            )
            .await?;
            tracing::info!(
                entity_id = %entity_id,
                removed = plan.removed.len(),
                inserted = plan.inserted.len(),
                open_balance = %report.open_balance,
                "Balance cancellations updated"
            );
        }

        let removed = plan.removed.len();
        let inserted = plan.inserted.len();
        let mut groups = plan.kept;
        groups.extend(plan.inserted);
        groups.sort_by(|a, b| a.record_ids.cmp(&b.record_ids));

        Ok(CancellationOutcome {
            entity_id,
            groups,
            open_record_ids: report.open_record_ids,
            open_balance: report.open_balance,
            removed,
            inserted,
        })
    }

    // ========================================================================
    // Business trips
    // ========================================================================

    /// Sets the business-trip category of one transaction in a trip charge.
    ///
    /// The ledger is not regenerated; the new category takes effect on the
    /// next generation.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotBusinessTrip` or
    /// `EngineError::TransactionNotInCharge` for bad input, and a lock error if
    /// the charge already has a locked ledger record.
    pub async fn update_business_trip_transaction_category(
        &self,
        charge_id: ChargeId,
        transaction_id: TransactionId,
        category: Option<BusinessTripCategory>,
    ) -> Result<Transaction, EngineError> {
        let _lock = self.charge_locks.lock(charge_id).await;

        let bundle = self.timed("charge_bundle", self.store.charge_bundle(charge_id)).await?;
        if bundle.charge.business_trip_id.is_none() {
            return Err(EngineError::NotBusinessTrip { charge_id });
        }
        let tx = bundle
            .transactions
            .iter()
            .find(|tx| tx.id == transaction_id)
            .ok_or(EngineError::TransactionNotInCharge {
                charge_id,
                transaction_id,
            })?;
        if tx.business_trip_category == category {
            return Ok(tx.clone());
        }

        let guard = self.lock_guard().await?;
        let records = self.timed("ledger_records", self.store.ledger_records(charge_id)).await?;
        for record in &records {
            guard.check_record(record)?;
        }

        let updated = self
            .timed(
                "set_business_trip_category",
                self.store.set_business_trip_category(transaction_id, category),
            )
            .await?;
        tracing::info!(
            charge_id = %charge_id,
            transaction_id = %transaction_id,
            category = ?category,
            "Business trip category updated"
        );
        Ok(updated)
    }
}

/// A transaction or document being moved.
enum Item {
    Transaction(Transaction),
    Document(Document),
}

impl Item {
    fn take(bundle: &ChargeBundle, subject: MatchSubject) -> Result<Self, EngineError> {
        let found = match subject {
            MatchSubject::Transaction(id) => bundle
                .transactions
                .iter()
                .find(|tx| tx.id == id)
                .cloned()
                .map(Self::Transaction),
            MatchSubject::Document(id) => bundle.documents.iter().find(|doc| doc.id == id).cloned().map(Self::Document),
        };
        found.ok_or_else(|| {
            StoreError::Conflict(format!("{subject} left charge {} since it was matched", bundle.charge.id)).into()
        })
    }

    fn unassigned(items: &UnassignedItems, subject: MatchSubject) -> Result<Self, EngineError> {
        let found = match subject {
            MatchSubject::Transaction(id) => items
                .transactions
                .iter()
                .find(|tx| tx.id == id)
                .cloned()
                .map(Self::Transaction),
            MatchSubject::Document(id) => items.documents.iter().find(|doc| doc.id == id).cloned().map(Self::Document),
        };
        found.ok_or_else(|| StoreError::Conflict(format!("{subject} is not unassigned")).into())
    }
}

/// Returns the bundle with one item removed.
fn without(bundle: &ChargeBundle, subject: MatchSubject) -> ChargeBundle {
    let mut bundle = bundle.clone();
    match subject {
        MatchSubject::Transaction(id) => bundle.transactions.retain(|tx| tx.id != id),
        MatchSubject::Document(id) => bundle.documents.retain(|doc| doc.id != id),
    }
    bundle
}

/// Latest date any rate lookup of this charge may need, never before `today`.
fn rate_horizon(bundle: &ChargeBundle, salary_records: &[SalaryRecord], today: NaiveDate) -> NaiveDate {
    bundle
        .transactions
        .iter()
        .flat_map(|tx| {
            [
                Some(tx.event_date),
                tx.debit_date,
                tx.debit_date_override,
                tx.debit_timestamp.map(|ts| ts.date_naive()),
            ]
        })
        .chain(bundle.documents.iter().map(|doc| doc.date))
        .chain(salary_records.iter().map(|record| Some(record.month)))
        .flatten()
        .fold(today, NaiveDate::max)
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
