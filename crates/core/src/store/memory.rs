//! In-memory store for tests and local runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chargebook_shared::types::{
    CancellationGroupId, ChargeId, CurrencyCode, DocumentId, FinancialEntityId, LedgerRecordId, TransactionId,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use super::{
    ChargeBundle, ChargeRefresh, ChargeStore, ExchangeRateStore, ItemAssignment, LedgerStore, SettingsStore,
    StoreError, UnassignedItems,
};
use crate::charge::{
    BusinessTripCategory, Charge, ChargeType, Document, RecoveryRate, SalaryRecord, Transaction, VatReportRecord,
};
use crate::currency::ExchangeRate;
use crate::ledger::{LedgerLock, LedgerLockGuard, LedgerRecord};
use crate::matching::MatchSubject;
use crate::reconciliation::{CancellationGroup, CancellationPlan};

#[derive(Default)]
struct State {
    charges: HashMap<ChargeId, Charge>,
    transactions: HashMap<TransactionId, Transaction>,
    documents: HashMap<DocumentId, Document>,
    salary_records: Vec<SalaryRecord>,
    vat_records: Vec<VatReportRecord>,
    ledger: Vec<LedgerRecord>,
    cancellations: HashMap<CancellationGroupId, CancellationGroup>,
    rates: BTreeMap<(NaiveDate, CurrencyCode, CurrencyCode), Decimal>,
    locks: Vec<LedgerLock>,
    recovery_rates: Vec<RecoveryRate>,
}

impl State {
    fn bundle(&self, charge: &Charge) -> ChargeBundle {
        let mut transactions: Vec<Transaction> = self
            .transactions
            .values()
            .filter(|tx| tx.charge_id == Some(charge.id))
            .cloned()
            .collect();
        transactions.sort_by(|a, b| a.event_date.cmp(&b.event_date).then(a.id.cmp(&b.id)));
        let mut documents: Vec<Document> = self
            .documents
            .values()
            .filter(|doc| doc.charge_id == Some(charge.id))
            .cloned()
            .collect();
        documents.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
        ChargeBundle {
            charge: charge.clone(),
            transactions,
            documents,
        }
    }

    fn refresh(&mut self, refresh: &ChargeRefresh) -> Result<(), StoreError> {
        let charge = self
            .charges
            .get_mut(&refresh.charge_id)
            .ok_or(StoreError::ChargeNotFound(refresh.charge_id))?;
        charge.summary = refresh.summary.clone();
        charge.business_ids = refresh.business_ids.clone();
        if refresh.close {
            charge.closed_at = Some(chrono::Utc::now());
        }
        Ok(())
    }
}

/// Store keeping everything in process memory behind an async `RwLock`.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
    latency: Option<Duration>,
    fail_writes: AtomicBool,
    fail_ledger_replacements: AtomicBool,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every trait call by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes every subsequent write fail with a backend error.
    pub fn set_failing_writes(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    /// Makes every subsequent ledger replacement fail with a backend error
    /// while other writes keep working.
    pub fn set_failing_ledger_replacements(&self, failing: bool) {
        self.fail_ledger_replacements.store(failing, Ordering::SeqCst);
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("writes are disabled".to_string()));
        }
        Ok(())
    }

    /// Adds or replaces a charge.
    pub async fn insert_charge(&self, charge: Charge) {
        self.state.write().await.charges.insert(charge.id, charge);
    }

    /// Adds or replaces a transaction.
    pub async fn insert_transaction(&self, transaction: Transaction) {
        self.state.write().await.transactions.insert(transaction.id, transaction);
    }

    /// Adds or replaces a document.
    pub async fn insert_document(&self, document: Document) {
        self.state.write().await.documents.insert(document.id, document);
    }

    /// Adds a payslip.
    pub async fn insert_salary_record(&self, record: SalaryRecord) {
        self.state.write().await.salary_records.push(record);
    }

    /// Adds a VAT report line.
    pub async fn insert_vat_record(&self, record: VatReportRecord) {
        self.state.write().await.vat_records.push(record);
    }

    /// Adds a lock-date version.
    pub async fn insert_ledger_lock(&self, lock: LedgerLock) {
        self.state.write().await.locks.push(lock);
    }

    /// Adds a recovery-rate version.
    pub async fn insert_recovery_rate(&self, rate: RecoveryRate) {
        self.state.write().await.recovery_rates.push(rate);
    }

    /// Adds ledger records without any lock check.
    pub async fn insert_ledger_records(&self, records: impl IntoIterator<Item = LedgerRecord>) {
        self.state.write().await.ledger.extend(records);
    }

    /// Returns a stored charge.
    pub async fn charge(&self, charge_id: ChargeId) -> Option<Charge> {
        self.state.read().await.charges.get(&charge_id).cloned()
    }

    /// Returns a stored transaction.
    pub async fn transaction(&self, transaction_id: TransactionId) -> Option<Transaction> {
        self.state.read().await.transactions.get(&transaction_id).cloned()
    }

    /// Returns a stored document.
    pub async fn document(&self, document_id: DocumentId) -> Option<Document> {
        self.state.read().await.documents.get(&document_id).cloned()
    }
}

#[async_trait]
impl ChargeStore for InMemoryStore {
    async fn charge_bundle(&self, charge_id: ChargeId) -> Result<ChargeBundle, StoreError> {
        self.delay().await;
        let state = self.state.read().await;
        let charge = state
            .charges
            .get(&charge_id)
            .ok_or(StoreError::ChargeNotFound(charge_id))?;
        Ok(state.bundle(charge))
    }

    async fn matchable_charges(&self) -> Result<Vec<ChargeBundle>, StoreError> {
        self.delay().await;
        let state = self.state.read().await;
        let mut bundles: Vec<ChargeBundle> = state
            .charges
            .values()
            .filter(|charge| charge.is_open())
            .map(|charge| state.bundle(charge))
            .filter(|bundle| bundle.side().is_some())
            .collect();
        bundles.sort_by_key(|bundle| bundle.charge.id);
        Ok(bundles)
    }

    async fn unassigned_items(&self) -> Result<UnassignedItems, StoreError> {
        self.delay().await;
        let state = self.state.read().await;
        let mut items = UnassignedItems {
            transactions: state
                .transactions
                .values()
                .filter(|tx| tx.charge_id.is_none())
                .cloned()
                .collect(),
            documents: state
                .documents
                .values()
                .filter(|doc| doc.charge_id.is_none())
                .cloned()
                .collect(),
        };
        items.transactions.sort_by_key(|tx| tx.id);
        items.documents.sort_by_key(|doc| doc.id);
        Ok(items)
    }

    async fn salary_records(&self, charge_id: ChargeId) -> Result<Vec<SalaryRecord>, StoreError> {
        self.delay().await;
        let state = self.state.read().await;
        Ok(state
            .salary_records
            .iter()
            .filter(|record| record.charge_id == charge_id)
            .cloned()
            .collect())
    }

    async fn vat_report_records(&self, charge_id: ChargeId) -> Result<Vec<VatReportRecord>, StoreError> {
        self.delay().await;
        let state = self.state.read().await;
        Ok(state
            .vat_records
            .iter()
            .filter(|record| record.charge_id == charge_id)
            .cloned()
            .collect())
    }

    async fn set_charge_type(&self, charge_id: ChargeId, charge_type: ChargeType) -> Result<(), StoreError> {
        self.delay().await;
        self.check_writable()?;
        let mut state = self.state.write().await;
        let charge = state
            .charges
            .get_mut(&charge_id)
            .ok_or(StoreError::ChargeNotFound(charge_id))?;
        charge.charge_type = Some(charge_type);
        Ok(())
    }

    async fn assign_item(&self, assignment: &ItemAssignment) -> Result<(), StoreError> {
        self.delay().await;
        self.check_writable()?;
        let mut state = self.state.write().await;

        // Validate everything before the first mutation.
        let target = assignment.target.charge_id;
        if !state.charges.contains_key(&target) {
            return Err(StoreError::ChargeNotFound(target));
        }
        if let Some(source) = &assignment.source
            && !state.charges.contains_key(&source.charge_id)
        {
            return Err(StoreError::ChargeNotFound(source.charge_id));
        }
        let expected_source = assignment.source.as_ref().map(|s| s.charge_id);
        let current_owner = match assignment.subject {
            MatchSubject::Transaction(id) => state
                .transactions
                .get(&id)
                .ok_or(StoreError::TransactionNotFound(id))?
                .charge_id,
            MatchSubject::Document(id) => state
                .documents
                .get(&id)
                .ok_or(StoreError::DocumentNotFound(id))?
                .charge_id,
        };
        if current_owner != expected_source {
            return Err(StoreError::Conflict(format!(
                "{} moved since it was matched",
                assignment.subject
            )));
        }

        match assignment.subject {
            MatchSubject::Transaction(id) => {
                if let Some(tx) = state.transactions.get_mut(&id) {
                    tx.charge_id = Some(target);
                }
            }
            MatchSubject::Document(id) => {
                if let Some(doc) = state.documents.get_mut(&id) {
                    doc.charge_id = Some(target);
                }
            }
        }
        if let Some(source) = &assignment.source {
            state.refresh(source)?;
        }
        state.refresh(&assignment.target)
    }

    async fn set_business_trip_category(
        &self,
        transaction_id: TransactionId,
        category: Option<BusinessTripCategory>,
    ) -> Result<Transaction, StoreError> {
        self.delay().await;
        self.check_writable()?;
        let mut state = self.state.write().await;
        let tx = state
            .transactions
            .get_mut(&transaction_id)
            .ok_or(StoreError::TransactionNotFound(transaction_id))?;
        tx.business_trip_category = category;
        Ok(tx.clone())
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn ledger_records(&self, charge_id: ChargeId) -> Result<Vec<LedgerRecord>, StoreError> {
        self.delay().await;
        let state = self.state.read().await;
        Ok(state
            .ledger
            .iter()
            .filter(|record| record.charge_id == charge_id)
            .cloned()
            .collect())
    }

    async fn entity_ledger_records(&self, entity_id: FinancialEntityId) -> Result<Vec<LedgerRecord>, StoreError> {
        self.delay().await;
        let state = self.state.read().await;
        Ok(state
            .ledger
            .iter()
            .filter(|record| record.legs().any(|(_, leg)| leg.entity == entity_id))
            .cloned()
            .collect())
    }

    async fn replace_ledger_records(
        &self,
        charge_id: ChargeId,
        charge_type: ChargeType,
        delete: &[LedgerRecordId],
        insert: &[LedgerRecord],
        guard: LedgerLockGuard,
    ) -> Result<(), StoreError> {
        self.delay().await;
        self.check_writable()?;
        if self.fail_ledger_replacements.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("ledger replacement failed".to_string()));
        }
        let mut state = self.state.write().await;
        let current = LedgerLockGuard::from_versions(&state.locks);

        for record in state.ledger.iter().filter(|r| delete.contains(&r.id)) {
            if record.charge_id != charge_id {
                return Err(StoreError::Conflict(format!(
                    "ledger record {} does not belong to charge {charge_id}",
                    record.id
                )));
            }
            guard.check_record(record)?;
            current.check_record(record)?;
        }
        for record in insert {
            guard.check_write(record.value_date)?;
            current.check_write(record.value_date)?;
        }

        state
            .charges
            .get_mut(&charge_id)
            .ok_or(StoreError::ChargeNotFound(charge_id))?
            .charge_type = Some(charge_type);
        state.ledger.retain(|r| !delete.contains(&r.id));
        state.ledger.extend(insert.iter().cloned());
        Ok(())
    }

    async fn cancellation_groups(&self, entity_id: FinancialEntityId) -> Result<Vec<CancellationGroup>, StoreError> {
        self.delay().await;
        let state = self.state.read().await;
        let mut groups: Vec<CancellationGroup> = state
            .cancellations
            .values()
            .filter(|group| group.entity_id == entity_id)
            .cloned()
            .collect();
        groups.sort_by_key(|group| group.id);
        Ok(groups)
    }

    async fn apply_cancellation_plan(
        &self,
        entity_id: FinancialEntityId,
        plan: &CancellationPlan,
    ) -> Result<(), StoreError> {
        self.delay().await;
        self.check_writable()?;
        let mut state = self.state.write().await;
        if plan
            .removed
            .iter()
            .chain(&plan.inserted)
            .any(|group| group.entity_id != entity_id)
        {
            return Err(StoreError::Conflict(format!(
                "cancellation plan mixes entities other than {entity_id}"
            )));
        }
        let current = LedgerLockGuard::from_versions(&state.locks);
        let touched: Vec<LedgerRecordId> = plan.touched_records().collect();
        for record in state.ledger.iter().filter(|r| touched.contains(&r.id)) {
            current.check_record(record)?;
        }
        for group in &plan.removed {
            state.cancellations.remove(&group.id);
        }
        for group in &plan.inserted {
            state.cancellations.insert(group.id, group.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl ExchangeRateStore for InMemoryStore {
    async fn exchange_rates(&self, up_to: NaiveDate) -> Result<Vec<ExchangeRate>, StoreError> {
        self.delay().await;
        let state = self.state.read().await;
        Ok(state
            .rates
            .iter()
            .filter(|((date, _, _), _)| *date <= up_to)
            .map(|(&(date, from_currency, to_currency), &rate)| ExchangeRate {
                date,
                from_currency,
                to_currency,
                rate,
            })
            .collect())
    }

    async fn insert_exchange_rate(&self, rate: &ExchangeRate) -> Result<(), StoreError> {
        self.delay().await;
        self.check_writable()?;
        let mut state = self.state.write().await;
        let key = (rate.date, rate.from_currency, rate.to_currency);
        match state.rates.get(&key) {
            Some(existing) if *existing == rate.rate => Ok(()),
            Some(existing) => Err(StoreError::RateConflict {
                from: rate.from_currency,
                to: rate.to_currency,
                date: rate.date,
                existing: *existing,
            }),
            None => {
                state.rates.insert(key, rate.rate);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl SettingsStore for InMemoryStore {
    async fn ledger_locks(&self) -> Result<Vec<LedgerLock>, StoreError> {
        self.delay().await;
        Ok(self.state.read().await.locks.clone())
    }

    async fn recovery_rates(&self) -> Result<Vec<RecoveryRate>, StoreError> {
        self.delay().await;
        Ok(self.state.read().await.recovery_rates.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::charge::{ChargeSummary, DocumentType};
    use crate::ledger::LedgerLeg;
    use crate::testing::{date, document, transaction};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_rates_are_immutable() {
        let store = InMemoryStore::new();
        let rate = ExchangeRate::new(date(2025, 1, 1), CurrencyCode::USD, CurrencyCode::ILS, dec!(3.6)).unwrap();
        store.insert_exchange_rate(&rate).await.unwrap();
        store.insert_exchange_rate(&rate).await.unwrap();

        let changed = ExchangeRate { rate: dec!(3.7), ..rate.clone() };
        let err = store.insert_exchange_rate(&changed).await.unwrap_err();
        assert!(matches!(err, StoreError::RateConflict { existing, .. } if existing == dec!(3.6)));

        assert_eq!(store.exchange_rates(date(2025, 1, 1)).await.unwrap(), vec![rate]);
        assert!(store.exchange_rates(date(2024, 12, 31)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_matchable_charges_are_open_and_one_sided() {
        let store = InMemoryStore::new();
        let one_sided = Charge::new(ChargeId::new());
        let two_sided = Charge::new(ChargeId::new());
        let mut closed = Charge::new(ChargeId::new());
        closed.closed_at = Some(chrono::Utc::now());
        for charge in [&one_sided, &two_sided, &closed] {
            store.insert_charge(charge.clone()).await;
            let mut tx = transaction(FinancialEntityId::new(), None, CurrencyCode::ILS, dec!(1), date(2025, 1, 1));
            tx.charge_id = Some(charge.id);
            store.insert_transaction(tx).await;
        }
        let mut doc = document(
            DocumentType::Invoice,
            FinancialEntityId::new(),
            FinancialEntityId::new(),
            dec!(1),
            dec!(0),
            "ILS",
            date(2025, 1, 1),
        );
        doc.charge_id = Some(two_sided.id);
        store.insert_document(doc).await;

        let matchable = store.matchable_charges().await.unwrap();
        assert_eq!(matchable.len(), 1);
        assert_eq!(matchable[0].charge.id, one_sided.id);
    }

    #[tokio::test]
    async fn test_assignment_rejects_stale_source() {
        let store = InMemoryStore::new();
        let target = Charge::new(ChargeId::new());
        store.insert_charge(target.clone()).await;
        let tx = transaction(FinancialEntityId::new(), None, CurrencyCode::ILS, dec!(1), date(2025, 1, 1));
        store.insert_transaction(tx.clone()).await;

        let refresh = ChargeRefresh {
            charge_id: target.id,
            summary: ChargeSummary::default(),
            business_ids: BTreeSet::new(),
            close: false,
        };
        let stale = ItemAssignment {
            subject: MatchSubject::Transaction(tx.id),
            source: Some(ChargeRefresh {
                charge_id: target.id,
                ..refresh.clone()
            }),
            target: refresh.clone(),
        };
        assert!(matches!(store.assign_item(&stale).await, Err(StoreError::Conflict(_))));

        let fresh = ItemAssignment {
            subject: MatchSubject::Transaction(tx.id),
            source: None,
            target: refresh,
        };
        store.assign_item(&fresh).await.unwrap();
        assert_eq!(store.transaction(tx.id).await.unwrap().charge_id, Some(target.id));
    }

    #[tokio::test]
    async fn test_replace_rechecks_lock() {
        let store = InMemoryStore::new();
        let charge_id = ChargeId::new();
        let old = LedgerRecord::transfer(
            charge_id,
            LedgerLeg::local(FinancialEntityId::new(), dec!(5)),
            LedgerLeg::local(FinancialEntityId::new(), dec!(5)),
            date(2024, 12, 1),
            date(2024, 12, 1),
        );
        store.insert_ledger_records([old.clone()]).await;

        let guard = LedgerLockGuard::new(Some(date(2024, 12, 31)));
        let err = store
            .replace_ledger_records(charge_id, ChargeType::Common, &[old.id], &[], guard)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Locked(_)));
        assert_eq!(store.ledger_records(charge_id).await.unwrap(), vec![old]);
    }

    #[tokio::test]
    async fn test_replace_rechecks_stored_lock() {
        let store = InMemoryStore::new();
        let mut charge = Charge::new(ChargeId::new());
        charge.charge_type = Some(ChargeType::Financial);
        let charge_id = charge.id;
        store.insert_charge(charge).await;
        store
            .insert_ledger_lock(LedgerLock {
                lock_date: date(2024, 12, 31),
                created_at: chrono::Utc::now(),
            })
            .await;

        let late = LedgerRecord::transfer(
            charge_id,
            LedgerLeg::local(FinancialEntityId::new(), dec!(5)),
            LedgerLeg::local(FinancialEntityId::new(), dec!(5)),
            date(2024, 11, 1),
            date(2024, 11, 1),
        );
        // The caller's guard predates the stored lock.
        let err = store
            .replace_ledger_records(charge_id, ChargeType::Common, &[], &[late], LedgerLockGuard::new(None))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Locked(_)));
        assert!(store.ledger_records(charge_id).await.unwrap().is_empty());
        assert_eq!(store.charge(charge_id).await.unwrap().charge_type, Some(ChargeType::Financial));
    }

    #[tokio::test]
    async fn test_replace_records_charge_type() {
        let store = InMemoryStore::new();
        let charge = Charge::new(ChargeId::new());
        let charge_id = charge.id;
        store.insert_charge(charge).await;
        let record = LedgerRecord::transfer(
            charge_id,
            LedgerLeg::local(FinancialEntityId::new(), dec!(5)),
            LedgerLeg::local(FinancialEntityId::new(), dec!(5)),
            date(2025, 2, 1),
            date(2025, 2, 1),
        );

        store
            .replace_ledger_records(charge_id, ChargeType::Dividend, &[], &[record.clone()], LedgerLockGuard::new(None))
            .await
            .unwrap();
        assert_eq!(store.charge(charge_id).await.unwrap().charge_type, Some(ChargeType::Dividend));
        assert_eq!(store.ledger_records(charge_id).await.unwrap(), vec![record]);
    }

    #[tokio::test]
    async fn test_cancellation_plan_rechecks_stored_lock() {
        let store = InMemoryStore::new();
        let entity = FinancialEntityId::new();
        let charge_id = ChargeId::new();
        let out = LedgerRecord::transfer(
            charge_id,
            LedgerLeg::local(entity, dec!(20)),
            LedgerLeg::local(FinancialEntityId::new(), dec!(20)),
            date(2024, 10, 1),
            date(2024, 10, 1),
        );
        let back = LedgerRecord::transfer(
            charge_id,
            LedgerLeg::local(FinancialEntityId::new(), dec!(20)),
            LedgerLeg::local(entity, dec!(20)),
            date(2024, 10, 2),
            date(2024, 10, 2),
        );
        store.insert_ledger_records([out.clone(), back.clone()]).await;
        store
            .insert_ledger_lock(LedgerLock {
                lock_date: date(2024, 12, 31),
                created_at: chrono::Utc::now(),
            })
            .await;

        let detected = crate::reconciliation::detect(entity, &[out, back], dec!(0.01)).groups;
        let plan = CancellationPlan::diff(Vec::new(), detected);
        let err = store.apply_cancellation_plan(entity, &plan).await.unwrap_err();
        assert!(matches!(err, StoreError::Locked(_)));
        assert!(store.cancellation_groups(entity).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failing_writes() {
        let store = InMemoryStore::new();
        store.set_failing_writes(true);
        let err = store.set_charge_type(ChargeId::new(), ChargeType::Common).await.unwrap_err();
        assert!(err.is_infrastructure());
    }
}
