//! Storage seam.
//!
//! The engine reaches persisted state only through these traits. Each trait
//! method is one unit of work: writes are all-or-nothing, and ledger writes
//! re-check the lock guard against the stored records they touch.

mod error;
pub mod memory;

use std::collections::BTreeSet;

use async_trait::async_trait;
use chargebook_shared::types::{ChargeId, FinancialEntityId, LedgerRecordId, TransactionId};
use chrono::NaiveDate;

use crate::charge::{
    BusinessTripCategory, Charge, ChargeSummary, ChargeType, Document, RecoveryRate, SalaryRecord, Transaction,
    VatReportRecord,
};
use crate::currency::ExchangeRate;
use crate::ledger::{LedgerLock, LedgerLockGuard, LedgerRecord};
use crate::matching::{MatchSide, MatchSubject};
use crate::reconciliation::{CancellationGroup, CancellationPlan};

pub use error::StoreError;
pub use memory::InMemoryStore;

/// A charge with its items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeBundle {
    /// The charge.
    pub charge: Charge,
    /// Its transactions.
    pub transactions: Vec<Transaction>,
    /// Its documents.
    pub documents: Vec<Document>,
}

impl ChargeBundle {
    /// Returns the side the charge holds, or `None` when empty or two-sided.
    #[must_use]
    pub fn side(&self) -> Option<MatchSide> {
        MatchSide::of(self.transactions.len(), self.documents.len())
    }
}

/// Items not yet assigned to any charge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnassignedItems {
    /// Unassigned transactions.
    pub transactions: Vec<Transaction>,
    /// Unassigned documents.
    pub documents: Vec<Document>,
}

/// New derived state of a charge after it gained or lost an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRefresh {
    /// The charge.
    pub charge_id: ChargeId,
    /// Recomputed summary.
    pub summary: ChargeSummary,
    /// Recomputed businesses.
    pub business_ids: BTreeSet<FinancialEntityId>,
    /// Soft-close the charge because it no longer holds any item.
    pub close: bool,
}

/// Moves one item onto a charge. Applied atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemAssignment {
    /// The item.
    pub subject: MatchSubject,
    /// The charge losing the item, if it had one.
    pub source: Option<ChargeRefresh>,
    /// The charge receiving the item.
    pub target: ChargeRefresh,
}

/// Charges and their items.
#[async_trait]
pub trait ChargeStore: Send + Sync {
    /// Loads a charge with its transactions and documents.
    async fn charge_bundle(&self, charge_id: ChargeId) -> Result<ChargeBundle, StoreError>;

    /// Loads every open charge holding exactly one side.
    async fn matchable_charges(&self) -> Result<Vec<ChargeBundle>, StoreError>;

    /// Loads transactions and documents without a charge.
    async fn unassigned_items(&self) -> Result<UnassignedItems, StoreError>;

    /// Loads the payslips paid by a charge.
    async fn salary_records(&self, charge_id: ChargeId) -> Result<Vec<SalaryRecord>, StoreError>;

    /// Loads the VAT report lines settled by a charge.
    async fn vat_report_records(&self, charge_id: ChargeId) -> Result<Vec<VatReportRecord>, StoreError>;

    /// Records the type of the last classification.
    async fn set_charge_type(&self, charge_id: ChargeId, charge_type: ChargeType) -> Result<(), StoreError>;

    /// Re-parents an item and rewrites both charges' derived state in one unit.
    async fn assign_item(&self, assignment: &ItemAssignment) -> Result<(), StoreError>;

    /// Sets the business-trip category of a transaction and returns it.
    async fn set_business_trip_category(
        &self,
        transaction_id: TransactionId,
        category: Option<BusinessTripCategory>,
    ) -> Result<Transaction, StoreError>;
}

/// Ledger records and cancellation marks.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Loads a charge's ledger records.
    async fn ledger_records(&self, charge_id: ChargeId) -> Result<Vec<LedgerRecord>, StoreError>;

    /// Loads every ledger record touching an entity.
    async fn entity_ledger_records(&self, entity_id: FinancialEntityId) -> Result<Vec<LedgerRecord>, StoreError>;

    /// Deletes and inserts records of one charge and records the charge type
    /// they were generated for, all in one unit.
    ///
    /// Implementations re-check `guard`, and the lock date stored at write
    /// time, against the records being deleted and inserted, and reject the
    /// whole write on violation. A rejected write leaves the charge type as it was.
    async fn replace_ledger_records(
        &self,
        charge_id: ChargeId,
        charge_type: ChargeType,
        delete: &[LedgerRecordId],
        insert: &[LedgerRecord],
        guard: LedgerLockGuard,
    ) -> Result<(), StoreError>;

    /// Loads stored cancellation groups of an entity.
    async fn cancellation_groups(&self, entity_id: FinancialEntityId) -> Result<Vec<CancellationGroup>, StoreError>;

    /// Removes and inserts cancellation groups of an entity in one unit.
    ///
    /// Every record whose membership changes must pass the lock date stored at
    /// write time.
    async fn apply_cancellation_plan(
        &self,
        entity_id: FinancialEntityId,
        plan: &CancellationPlan,
    ) -> Result<(), StoreError>;
}

/// Exchange rates into local currency.
#[async_trait]
pub trait ExchangeRateStore: Send + Sync {
    /// Loads every rate dated on or before `up_to`.
    async fn exchange_rates(&self, up_to: NaiveDate) -> Result<Vec<ExchangeRate>, StoreError>;

    /// Stores a rate. Re-inserting the same value is a no-op; a different
    /// value for the same date and pair is a `RateConflict`.
    async fn insert_exchange_rate(&self, rate: &ExchangeRate) -> Result<(), StoreError>;
}

/// Versioned tenant settings.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Loads every lock-date version.
    async fn ledger_locks(&self) -> Result<Vec<LedgerLock>, StoreError>;

    /// Loads every recovery-rate version.
    async fn recovery_rates(&self) -> Result<Vec<RecoveryRate>, StoreError>;
}

/// Everything the engine needs from storage.
pub trait Store: ChargeStore + LedgerStore + ExchangeRateStore + SettingsStore {}

impl<T> Store for T where T: ChargeStore + LedgerStore + ExchangeRateStore + SettingsStore {}
