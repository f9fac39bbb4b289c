//! PostgreSQL implementation of the storage seam.
//!
//! Every trait method that writes runs inside one database transaction. Rows
//! a write depends on are read `FOR UPDATE` first, so the checks made before
//! the write still hold when it commits.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chargebook_core::charge::{
    BusinessTripCategory, Charge, ChargeType, Document, RecoveryRate, SalaryRecord, Transaction, VatReportRecord,
};
use chargebook_core::currency::ExchangeRate;
use chargebook_core::ledger::{LedgerLock, LedgerLockGuard, LedgerRecord};
use chargebook_core::matching::MatchSubject;
use chargebook_core::reconciliation::{CancellationGroup, CancellationPlan};
use chargebook_core::store::{
    ChargeBundle, ChargeRefresh, ChargeStore, ExchangeRateStore, ItemAssignment, LedgerStore, SettingsStore,
    StoreError, UnassignedItems,
};
use chargebook_shared::types::{ChargeId, FinancialEntityId, LedgerRecordId, TransactionId};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

use crate::convert::{self, backend};
use crate::entities::{
    balance_cancellation_records, balance_cancellations, charges, documents, exchange_rates, financial_entities,
    ledger_locks, ledger_records, recovery_rates, salary_records, transactions, vat_report_records,
};

fn now() -> DateTime<FixedOffset> {
    Utc::now().into()
}

/// Store backed by a `SeaORM` connection.
#[derive(Debug, Clone)]
pub struct DbStore {
    db: DatabaseConnection,
}

impl DbStore {
    /// Creates a new store.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Returns the underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn items(
        &self,
        charge_ids: &[Uuid],
    ) -> Result<(Vec<transactions::Model>, Vec<documents::Model>), StoreError> {
        let txs = transactions::Entity::find()
            .filter(transactions::Column::ChargeId.is_in(charge_ids.iter().copied()))
            .order_by_asc(transactions::Column::EventDate)
            .order_by_asc(transactions::Column::Id)
            .all(&self.db)
            .await
            .map_err(backend)?;
        let docs = documents::Entity::find()
            .filter(documents::Column::ChargeId.is_in(charge_ids.iter().copied()))
            .order_by_asc(documents::Column::Date)
            .order_by_asc(documents::Column::Id)
            .all(&self.db)
            .await
            .map_err(backend)?;
        Ok((txs, docs))
    }

    // ========== Ingestion ==========
    //
    // Rows are normally written by the importers; these are used for seeding
    // and by the integration tests.

    /// Inserts a financial entity. `kind` is `business`, `tax_category` or `bank_account`.
    pub async fn insert_financial_entity(
        &self,
        id: FinancialEntityId,
        name: &str,
        kind: &str,
    ) -> Result<(), StoreError> {
        financial_entities::ActiveModel {
            id: Set(id.into_inner()),
            name: Set(name.to_string()),
            kind: Set(kind.to_string()),
            created_at: Set(now()),
        }
        .insert(&self.db)
        .await
        .map_err(backend)?;
        Ok(())
    }

    /// Inserts a charge.
    pub async fn insert_charge(&self, charge: &Charge) -> Result<(), StoreError> {
        convert::charge_model(charge, now()).insert(&self.db).await.map_err(backend)?;
        Ok(())
    }

    /// Inserts a transaction.
    pub async fn insert_transaction(&self, transaction: &Transaction) -> Result<(), StoreError> {
        convert::transaction_model(transaction, now())
            .insert(&self.db)
            .await
            .map_err(backend)?;
        Ok(())
    }

    /// Inserts a document.
    pub async fn insert_document(&self, document: &Document) -> Result<(), StoreError> {
        convert::document_model(document, now())
            .insert(&self.db)
            .await
            .map_err(backend)?;
        Ok(())
    }

    /// Inserts a payslip.
    pub async fn insert_salary_record(&self, record: &SalaryRecord) -> Result<(), StoreError> {
        convert::salary_record_model(record).insert(&self.db).await.map_err(backend)?;
        Ok(())
    }

    /// Inserts a VAT report line.
    pub async fn insert_vat_record(&self, record: &VatReportRecord) -> Result<(), StoreError> {
        convert::vat_record_model(record).insert(&self.db).await.map_err(backend)?;
        Ok(())
    }

    /// Adds a lock-date version. The newest version is in force.
    pub async fn insert_ledger_lock(&self, lock_date: NaiveDate) -> Result<(), StoreError> {
        ledger_locks::ActiveModel {
            id: Set(Uuid::now_v7()),
            lock_date: Set(lock_date),
            created_at: Set(now()),
        }
        .insert(&self.db)
        .await
        .map_err(backend)?;
        Ok(())
    }

    /// Adds a recovery-rate version for a year.
    pub async fn insert_recovery_rate(&self, year: i32, daily_rate: Decimal) -> Result<(), StoreError> {
        recovery_rates::ActiveModel {
            id: Set(Uuid::now_v7()),
            year: Set(year),
            daily_rate: Set(daily_rate),
            created_at: Set(now()),
        }
        .insert(&self.db)
        .await
        .map_err(backend)?;
        Ok(())
    }
}

/// Rewrites the derived columns of a charge.
async fn write_charge_type<C: ConnectionTrait>(
    conn: &C,
    charge_id: ChargeId,
    charge_type: ChargeType,
) -> Result<(), StoreError> {
    let result = charges::Entity::update_many()
        .col_expr(charges::Column::ChargeType, Expr::value(charge_type.as_str()))
        .col_expr(charges::Column::UpdatedAt, Expr::value(now()))
        .filter(charges::Column::Id.eq(charge_id.into_inner()))
        .exec(conn)
        .await
        .map_err(backend)?;
    if result.rows_affected == 0 {
        return Err(StoreError::ChargeNotFound(charge_id));
    }
    Ok(())
}

/// Builds the guard from the lock versions visible to `txn`, holding them
/// `FOR SHARE` so a new lock cannot commit underneath the write.
async fn stored_lock_guard(txn: &DatabaseTransaction) -> Result<LedgerLockGuard, StoreError> {
    let versions: Vec<LedgerLock> = ledger_locks::Entity::find()
        .lock_shared()
        .all(txn)
        .await
        .map_err(backend)?
        .into_iter()
        .map(convert::ledger_lock)
        .collect();
    Ok(LedgerLockGuard::from_versions(&versions))
}

async fn refresh_charge(
    txn: &DatabaseTransaction,
    refresh: &ChargeRefresh,
    at: DateTime<FixedOffset>,
) -> Result<(), StoreError> {
    let summary = &refresh.summary;
    let model = charges::ActiveModel {
        id: Set(refresh.charge_id.into_inner()),
        business_ids: Set(convert::business_ids_json(&refresh.business_ids)),
        summary_currency: Set(summary.currency.map(|c| c.as_str().to_string())),
        summary_total_amount: Set(summary.total_amount),
        min_event_date: Set(summary.min_event_date),
        min_debit_date: Set(summary.min_debit_date),
        min_documents_date: Set(summary.min_documents_date),
        counterparty_id: Set(summary.counterparty_id.map(FinancialEntityId::into_inner)),
        closed_at: if refresh.close { Set(Some(at)) } else { NotSet },
        updated_at: Set(at),
        ..Default::default()
    };
    model.update(txn).await.map_err(backend)?;
    Ok(())
}

fn bundle(
    charge: charges::Model,
    txs: &mut HashMap<Uuid, Vec<transactions::Model>>,
    docs: &mut HashMap<Uuid, Vec<documents::Model>>,
) -> Result<ChargeBundle, StoreError> {
    let id = charge.id;
    Ok(ChargeBundle {
        charge: convert::charge(charge)?,
        transactions: txs
            .remove(&id)
            .unwrap_or_default()
            .into_iter()
            .map(convert::transaction)
            .collect::<Result<_, _>>()?,
        documents: docs
            .remove(&id)
            .unwrap_or_default()
            .into_iter()
            .map(convert::document)
            .collect::<Result<_, _>>()?,
    })
}

fn by_charge<M>(rows: Vec<M>, charge_id: impl Fn(&M) -> Option<Uuid>) -> HashMap<Uuid, Vec<M>> {
    let mut grouped: HashMap<Uuid, Vec<M>> = HashMap::new();
    for row in rows {
        if let Some(id) = charge_id(&row) {
            grouped.entry(id).or_default().push(row);
        }
    }
    grouped
}

#[async_trait]
impl ChargeStore for DbStore {
    async fn charge_bundle(&self, charge_id: ChargeId) -> Result<ChargeBundle, StoreError> {
        let charge = charges::Entity::find_by_id(charge_id.into_inner())
            .one(&self.db)
            .await
            .map_err(backend)?
            .ok_or(StoreError::ChargeNotFound(charge_id))?;
        let (txs, docs) = self.items(&[charge.id]).await?;
        bundle(
            charge,
            &mut by_charge(txs, |tx| tx.charge_id),
            &mut by_charge(docs, |doc| doc.charge_id),
        )
    }

    async fn matchable_charges(&self) -> Result<Vec<ChargeBundle>, StoreError> {
        let open = charges::Entity::find()
            .filter(charges::Column::ClosedAt.is_null())
            .filter(charges::Column::AccountantApprovalStatus.ne("approved"))
            .order_by_asc(charges::Column::Id)
            .all(&self.db)
            .await
            .map_err(backend)?;
        let ids: Vec<Uuid> = open.iter().map(|charge| charge.id).collect();
        let (txs, docs) = self.items(&ids).await?;
        let mut txs = by_charge(txs, |tx| tx.charge_id);
        let mut docs = by_charge(docs, |doc| doc.charge_id);

        let mut bundles = Vec::new();
        for charge in open {
            let bundle = bundle(charge, &mut txs, &mut docs)?;
            if bundle.side().is_some() {
                bundles.push(bundle);
            }
        }
        Ok(bundles)
    }

    async fn unassigned_items(&self) -> Result<UnassignedItems, StoreError> {
        let txs = transactions::Entity::find()
            .filter(transactions::Column::ChargeId.is_null())
            .order_by_asc(transactions::Column::Id)
            .all(&self.db)
            .await
            .map_err(backend)?;
        let docs = documents::Entity::find()
            .filter(documents::Column::ChargeId.is_null())
            .order_by_asc(documents::Column::Id)
            .all(&self.db)
            .await
            .map_err(backend)?;
        Ok(UnassignedItems {
            transactions: txs.into_iter().map(convert::transaction).collect::<Result<_, _>>()?,
            documents: docs.into_iter().map(convert::document).collect::<Result<_, _>>()?,
        })
    }

    async fn salary_records(&self, charge_id: ChargeId) -> Result<Vec<SalaryRecord>, StoreError> {
        let rows = salary_records::Entity::find()
            .filter(salary_records::Column::ChargeId.eq(charge_id.into_inner()))
            .order_by_asc(salary_records::Column::Month)
            .order_by_asc(salary_records::Column::EmployeeId)
            .all(&self.db)
            .await
            .map_err(backend)?;
        Ok(rows.into_iter().map(convert::salary_record).collect())
    }

    async fn vat_report_records(&self, charge_id: ChargeId) -> Result<Vec<VatReportRecord>, StoreError> {
        let rows = vat_report_records::Entity::find()
            .filter(vat_report_records::Column::ChargeId.eq(charge_id.into_inner()))
            .order_by_asc(vat_report_records::Column::Id)
            .all(&self.db)
            .await
            .map_err(backend)?;
        rows.into_iter().map(convert::vat_record).collect()
    }

    async fn set_charge_type(&self, charge_id: ChargeId, charge_type: ChargeType) -> Result<(), StoreError> {
        write_charge_type(&self.db, charge_id, charge_type).await
    }

    async fn assign_item(&self, assignment: &ItemAssignment) -> Result<(), StoreError> {
        let txn = self.db.begin().await.map_err(backend)?;

        // Charges first, in id order, so concurrent assignments cannot deadlock.
        let mut charge_ids: Vec<ChargeId> = assignment
            .source
            .iter()
            .map(|source| source.charge_id)
            .chain([assignment.target.charge_id])
            .collect();
        charge_ids.sort();
        charge_ids.dedup();
        let locked: BTreeSet<Uuid> = charges::Entity::find()
            .filter(charges::Column::Id.is_in(charge_ids.iter().map(|id| id.into_inner())))
            .order_by_asc(charges::Column::Id)
            .lock_exclusive()
            .all(&txn)
            .await
            .map_err(backend)?
            .into_iter()
            .map(|charge| charge.id)
            .collect();
        if let Some(missing) = charge_ids.iter().find(|id| !locked.contains(&id.into_inner())) {
            return Err(StoreError::ChargeNotFound(*missing));
        }

        let target = Some(assignment.target.charge_id.into_inner());
        let expected_owner = assignment.source.as_ref().map(|source| source.charge_id.into_inner());
        let moved = || StoreError::Conflict(format!("{} moved since it was matched", assignment.subject));
        match assignment.subject {
            MatchSubject::Transaction(id) => {
                let row = transactions::Entity::find_by_id(id.into_inner())
                    .lock_exclusive()
                    .one(&txn)
                    .await
                    .map_err(backend)?
                    .ok_or(StoreError::TransactionNotFound(id))?;
                if row.charge_id != expected_owner {
                    return Err(moved());
                }
                let mut model: transactions::ActiveModel = row.into();
                model.charge_id = Set(target);
                model.update(&txn).await.map_err(backend)?;
            }
            MatchSubject::Document(id) => {
                let row = documents::Entity::find_by_id(id.into_inner())
                    .lock_exclusive()
                    .one(&txn)
                    .await
                    .map_err(backend)?
                    .ok_or(StoreError::DocumentNotFound(id))?;
                if row.charge_id != expected_owner {
                    return Err(moved());
                }
                let mut model: documents::ActiveModel = row.into();
                model.charge_id = Set(target);
                model.update(&txn).await.map_err(backend)?;
            }
        }

        let at = now();
        if let Some(source) = &assignment.source {
            refresh_charge(&txn, source, at).await?;
        }
        refresh_charge(&txn, &assignment.target, at).await?;

        txn.commit().await.map_err(backend)?;
        debug!(subject = %assignment.subject, target = %assignment.target.charge_id, "Item assigned");
        Ok(())
    }

    async fn set_business_trip_category(
        &self,
        transaction_id: TransactionId,
        category: Option<BusinessTripCategory>,
    ) -> Result<Transaction, StoreError> {
        let row = transactions::Entity::find_by_id(transaction_id.into_inner())
            .one(&self.db)
            .await
            .map_err(backend)?
            .ok_or(StoreError::TransactionNotFound(transaction_id))?;
        let mut model: transactions::ActiveModel = row.into();
        model.business_trip_category = Set(category.map(|c| c.as_str().to_string()));
        let updated = model.update(&self.db).await.map_err(backend)?;
        convert::transaction(updated)
    }
}

#[async_trait]
impl LedgerStore for DbStore {
    async fn ledger_records(&self, charge_id: ChargeId) -> Result<Vec<LedgerRecord>, StoreError> {
        let rows = ledger_records::Entity::find()
            .filter(ledger_records::Column::ChargeId.eq(charge_id.into_inner()))
            .order_by_asc(ledger_records::Column::CreatedAt)
            .order_by_asc(ledger_records::Column::Id)
            .all(&self.db)
            .await
            .map_err(backend)?;
        rows.into_iter().map(convert::ledger_record).collect()
    }

    async fn entity_ledger_records(&self, entity_id: FinancialEntityId) -> Result<Vec<LedgerRecord>, StoreError> {
        let id = entity_id.into_inner();
        let rows = ledger_records::Entity::find()
            .filter(
                Condition::any()
                    .add(ledger_records::Column::DebitEntity1.eq(id))
                    .add(ledger_records::Column::DebitEntity2.eq(id))
                    .add(ledger_records::Column::CreditEntity1.eq(id))
                    .add(ledger_records::Column::CreditEntity2.eq(id)),
            )
            .order_by_asc(ledger_records::Column::ValueDate)
            .order_by_asc(ledger_records::Column::Id)
            .all(&self.db)
            .await
            .map_err(backend)?;
        rows.into_iter().map(convert::ledger_record).collect()
    }

    async fn replace_ledger_records(
        &self,
        charge_id: ChargeId,
        charge_type: ChargeType,
        delete: &[LedgerRecordId],
        insert: &[LedgerRecord],
        guard: LedgerLockGuard,
    ) -> Result<(), StoreError> {
        let txn = self.db.begin().await.map_err(backend)?;

        // A lock date committed after the caller built its guard still applies.
        let current = stored_lock_guard(&txn).await?;

        let delete_ids: Vec<Uuid> = delete.iter().map(|id| id.into_inner()).collect();
        if !delete_ids.is_empty() {
            let stored = ledger_records::Entity::find()
                .filter(ledger_records::Column::Id.is_in(delete_ids.iter().copied()))
                .lock_exclusive()
                .all(&txn)
                .await
                .map_err(backend)?;
            for row in stored {
                let record = convert::ledger_record(row)?;
                if record.charge_id != charge_id {
                    return Err(StoreError::Conflict(format!(
                        "ledger record {} does not belong to charge {charge_id}",
                        record.id
                    )));
                }
                guard.check_record(&record)?;
                current.check_record(&record)?;
            }
        }
        for record in insert {
            if record.charge_id != charge_id {
                return Err(StoreError::Conflict(format!(
                    "ledger record {} does not belong to charge {charge_id}",
                    record.id
                )));
            }
            guard.check_write(record.value_date)?;
            current.check_write(record.value_date)?;
        }

        write_charge_type(&txn, charge_id, charge_type).await?;
        if !delete_ids.is_empty() {
            ledger_records::Entity::delete_many()
                .filter(ledger_records::Column::Id.is_in(delete_ids))
                .exec(&txn)
                .await
                .map_err(backend)?;
        }
        if !insert.is_empty() {
            let at = now();
            ledger_records::Entity::insert_many(insert.iter().map(|record| convert::ledger_record_model(record, at)))
                .exec(&txn)
                .await
                .map_err(backend)?;
        }

        txn.commit().await.map_err(backend)?;
        debug!(
            %charge_id,
            %charge_type,
            deleted = delete.len(),
            inserted = insert.len(),
            "Ledger records replaced"
        );
        Ok(())
    }

    async fn cancellation_groups(&self, entity_id: FinancialEntityId) -> Result<Vec<CancellationGroup>, StoreError> {
        let groups = balance_cancellations::Entity::find()
            .filter(balance_cancellations::Column::EntityId.eq(entity_id.into_inner()))
            .order_by_asc(balance_cancellations::Column::Id)
            .all(&self.db)
            .await
            .map_err(backend)?;
        if groups.is_empty() {
            return Ok(Vec::new());
        }

        let members = balance_cancellation_records::Entity::find()
            .filter(balance_cancellation_records::Column::CancellationId.is_in(groups.iter().map(|g| g.id)))
            .all(&self.db)
            .await
            .map_err(backend)?;
        let mut by_group: HashMap<Uuid, Vec<LedgerRecordId>> = HashMap::new();
        for member in members {
            by_group
                .entry(member.cancellation_id)
                .or_default()
                .push(LedgerRecordId::from_uuid(member.ledger_record_id));
        }

        groups
            .into_iter()
            .map(|group| {
                let record_ids = by_group.remove(&group.id).unwrap_or_default();
                convert::cancellation_group(group, record_ids)
            })
            .collect()
    }

    async fn apply_cancellation_plan(
        &self,
        entity_id: FinancialEntityId,
        plan: &CancellationPlan,
    ) -> Result<(), StoreError> {
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

        let txn = self.db.begin().await.map_err(backend)?;

        // Membership changes count as edits of the member records.
        let current = stored_lock_guard(&txn).await?;
        let touched: BTreeSet<Uuid> = plan.touched_records().map(LedgerRecordId::into_inner).collect();
        if !touched.is_empty() {
            let rows = ledger_records::Entity::find()
                .filter(ledger_records::Column::Id.is_in(touched))
                .lock_shared()
                .all(&txn)
                .await
                .map_err(backend)?;
            for row in rows {
                current.check_record(&convert::ledger_record(row)?)?;
            }
        }

        if !plan.removed.is_empty() {
            // Memberships go with their group.
            balance_cancellations::Entity::delete_many()
                .filter(balance_cancellations::Column::Id.is_in(plan.removed.iter().map(|g| g.id.into_inner())))
                .exec(&txn)
                .await
                .map_err(backend)?;
        }
        if !plan.inserted.is_empty() {
            let at = now();
            balance_cancellations::Entity::insert_many(
                plan.inserted.iter().map(|group| convert::cancellation_model(group, at)),
            )
            .exec(&txn)
            .await
            .map_err(backend)?;

            let members: Vec<balance_cancellation_records::ActiveModel> = plan
                .inserted
                .iter()
                .flat_map(|group| {
                    group
                        .record_ids
                        .iter()
                        .map(|record_id| balance_cancellation_records::ActiveModel {
                            cancellation_id: Set(group.id.into_inner()),
                            ledger_record_id: Set(record_id.into_inner()),
                        })
                })
                .collect();
            if !members.is_empty() {
                balance_cancellation_records::Entity::insert_many(members)
                    .exec(&txn)
                    .await
                    .map_err(backend)?;
            }
        }
        txn.commit().await.map_err(backend)?;
        Ok(())
    }
}

#[async_trait]
impl ExchangeRateStore for DbStore {
    async fn exchange_rates(&self, up_to: NaiveDate) -> Result<Vec<ExchangeRate>, StoreError> {
        let rows = exchange_rates::Entity::find()
            .filter(exchange_rates::Column::RateDate.lte(up_to))
            .order_by_asc(exchange_rates::Column::RateDate)
            .order_by_asc(exchange_rates::Column::FromCurrency)
            .order_by_asc(exchange_rates::Column::ToCurrency)
            .all(&self.db)
            .await
            .map_err(backend)?;
        rows.into_iter().map(convert::exchange_rate).collect()
    }

    async fn insert_exchange_rate(&self, rate: &ExchangeRate) -> Result<(), StoreError> {
        let inserted = exchange_rates::Entity::insert(convert::exchange_rate_model(rate, now()))
            .on_conflict(
                OnConflict::columns([
                    exchange_rates::Column::RateDate,
                    exchange_rates::Column::FromCurrency,
                    exchange_rates::Column::ToCurrency,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(backend)?;
        if inserted > 0 {
            return Ok(());
        }

        // Rates are immutable: the stored row wins, and only the same value is accepted.
        let existing = exchange_rates::Entity::find()
            .filter(exchange_rates::Column::RateDate.eq(rate.date))
            .filter(exchange_rates::Column::FromCurrency.eq(rate.from_currency.as_str()))
            .filter(exchange_rates::Column::ToCurrency.eq(rate.to_currency.as_str()))
            .one(&self.db)
            .await
            .map_err(backend)?
            .ok_or_else(|| StoreError::Backend("conflicting exchange rate row vanished".to_string()))?;
        if existing.rate == rate.rate {
            Ok(())
        } else {
            Err(StoreError::RateConflict {
                from: rate.from_currency,
                to: rate.to_currency,
                date: rate.date,
                existing: existing.rate,
            })
        }
    }
}

#[async_trait]
impl SettingsStore for DbStore {
    async fn ledger_locks(&self) -> Result<Vec<LedgerLock>, StoreError> {
        let rows = ledger_locks::Entity::find()
            .order_by_asc(ledger_locks::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(backend)?;
        Ok(rows.into_iter().map(convert::ledger_lock).collect())
    }

    async fn recovery_rates(&self) -> Result<Vec<RecoveryRate>, StoreError> {
        let rows = recovery_rates::Entity::find()
            .order_by_asc(recovery_rates::Column::Year)
            .order_by_asc(recovery_rates::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(backend)?;
        Ok(rows.into_iter().map(convert::recovery_rate).collect())
    }
}
