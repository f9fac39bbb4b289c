//! Row <-> domain mapping.
//!
//! Enum columns hold the domain labels (`as_str` / `FromStr`). A label or
//! currency the domain does not recognise means the row was written outside
//! this crate and is surfaced as a backend error.

use std::collections::BTreeSet;
use std::str::FromStr;

use chargebook_core::charge::{
    BusinessTripCategory, Charge, ChargeSummary, Document, RecoveryRate, SalaryRecord, Transaction, VatReportRecord,
};
use chargebook_core::currency::ExchangeRate;
use chargebook_core::ledger::{LedgerLeg, LedgerLock, LedgerRecord};
use chargebook_core::reconciliation::{CancellationGroup, CancellationKind};
use chargebook_core::store::StoreError;
use chargebook_shared::types::{
    BusinessTripId, CancellationGroupId, ChargeId, CurrencyCode, DocumentId, FinancialEntityId, LedgerRecordId, Money,
    TransactionId,
};
use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use sea_orm::{DbErr, Set};
use serde_json::Value as Json;
use uuid::Uuid;

use crate::entities::{
    balance_cancellations, charges, documents, exchange_rates, ledger_locks, ledger_records, recovery_rates,
    salary_records, transactions, vat_report_records,
};

/// Maps a driver error to the storage seam.
pub(crate) fn backend(err: DbErr) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn label<T>(column: &str, value: &str) -> Result<T, StoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|err| StoreError::Backend(format!("column {column}: {err}")))
}

fn currency(column: &str, value: &str) -> Result<CurrencyCode, StoreError> {
    label(column, value)
}

fn utc(at: DateTime<FixedOffset>) -> DateTime<Utc> {
    at.with_timezone(&Utc)
}

// ========== Charges ==========

pub(crate) fn business_ids_json(ids: &BTreeSet<FinancialEntityId>) -> Json {
    Json::Array(ids.iter().map(|id| Json::String(id.to_string())).collect())
}

fn business_ids(json: Json) -> Result<BTreeSet<FinancialEntityId>, StoreError> {
    let ids: Vec<Uuid> = serde_json::from_value(json)
        .map_err(|err| StoreError::Backend(format!("column business_ids: {err}")))?;
    Ok(ids.into_iter().map(FinancialEntityId::from_uuid).collect())
}

pub(crate) fn charge(model: charges::Model) -> Result<Charge, StoreError> {
    Ok(Charge {
        id: ChargeId::from_uuid(model.id),
        charge_type: model
            .charge_type
            .as_deref()
            .map(|value| label("charge_type", value))
            .transpose()?,
        business_ids: business_ids(model.business_ids)?,
        is_conversion: model.is_conversion,
        is_salary: model.is_salary,
        is_property: model.is_property,
        business_trip_id: model.business_trip_id.map(BusinessTripId::from_uuid),
        is_dividend: model.is_dividend,
        is_bank_deposit: model.is_bank_deposit,
        is_creditcard_bank: model.is_creditcard_bank,
        is_monthly_vat: model.is_monthly_vat,
        is_financial: model.is_financial,
        tax_category_id: model.tax_category_id.map(FinancialEntityId::from_uuid),
        user_description: model.user_description,
        summary: ChargeSummary {
            currency: model
                .summary_currency
                .as_deref()
                .map(|value| currency("summary_currency", value))
                .transpose()?,
            total_amount: model.summary_total_amount,
            min_event_date: model.min_event_date,
            min_debit_date: model.min_debit_date,
            min_documents_date: model.min_documents_date,
            counterparty_id: model.counterparty_id.map(FinancialEntityId::from_uuid),
        },
        accountant_approval_status: label("accountant_approval_status", &model.accountant_approval_status)?,
        closed_at: model.closed_at.map(utc),
    })
}

pub(crate) fn charge_model(charge: &Charge, now: DateTime<FixedOffset>) -> charges::ActiveModel {
    charges::ActiveModel {
        id: Set(charge.id.into_inner()),
        charge_type: Set(charge.charge_type.map(|t| t.as_str().to_string())),
        business_ids: Set(business_ids_json(&charge.business_ids)),
        is_conversion: Set(charge.is_conversion),
        is_salary: Set(charge.is_salary),
        is_property: Set(charge.is_property),
        business_trip_id: Set(charge.business_trip_id.map(BusinessTripId::into_inner)),
        is_dividend: Set(charge.is_dividend),
        is_bank_deposit: Set(charge.is_bank_deposit),
        is_creditcard_bank: Set(charge.is_creditcard_bank),
        is_monthly_vat: Set(charge.is_monthly_vat),
        is_financial: Set(charge.is_financial),
        tax_category_id: Set(charge.tax_category_id.map(FinancialEntityId::into_inner)),
        user_description: Set(charge.user_description.clone()),
        summary_currency: Set(charge.summary.currency.map(|c| c.as_str().to_string())),
        summary_total_amount: Set(charge.summary.total_amount),
        min_event_date: Set(charge.summary.min_event_date),
        min_debit_date: Set(charge.summary.min_debit_date),
        min_documents_date: Set(charge.summary.min_documents_date),
        counterparty_id: Set(charge.summary.counterparty_id.map(FinancialEntityId::into_inner)),
        accountant_approval_status: Set(charge.accountant_approval_status.as_str().to_string()),
        closed_at: Set(charge.closed_at.map(Into::into)),
        created_at: Set(now),
        updated_at: Set(now),
    }
}

// ========== Items ==========

pub(crate) fn transaction(model: transactions::Model) -> Result<Transaction, StoreError> {
    Ok(Transaction {
        id: TransactionId::from_uuid(model.id),
        charge_id: model.charge_id.map(ChargeId::from_uuid),
        account_id: FinancialEntityId::from_uuid(model.account_id),
        account_type: label("account_type", &model.account_type)?,
        business_id: model.business_id.map(FinancialEntityId::from_uuid),
        currency: currency("currency", &model.currency)?,
        amount: model.amount,
        event_date: model.event_date,
        debit_date: model.debit_date,
        debit_date_override: model.debit_date_override,
        debit_timestamp: model.debit_timestamp.map(utc),
        source_description: model.source_description,
        reference_key: model.reference_key,
        business_trip_category: model
            .business_trip_category
            .as_deref()
            .map(|value| label::<BusinessTripCategory>("business_trip_category", value))
            .transpose()?,
    })
}

pub(crate) fn transaction_model(tx: &Transaction, now: DateTime<FixedOffset>) -> transactions::ActiveModel {
    transactions::ActiveModel {
        id: Set(tx.id.into_inner()),
        charge_id: Set(tx.charge_id.map(ChargeId::into_inner)),
        account_id: Set(tx.account_id.into_inner()),
        account_type: Set(tx.account_type.as_str().to_string()),
        business_id: Set(tx.business_id.map(FinancialEntityId::into_inner)),
        currency: Set(tx.currency.as_str().to_string()),
        amount: Set(tx.amount),
        event_date: Set(tx.event_date),
        debit_date: Set(tx.debit_date),
        debit_date_override: Set(tx.debit_date_override),
        debit_timestamp: Set(tx.debit_timestamp.map(Into::into)),
        source_description: Set(tx.source_description.clone()),
        reference_key: Set(tx.reference_key.clone()),
        business_trip_category: Set(tx.business_trip_category.map(|c| c.as_str().to_string())),
        created_at: Set(now),
    }
}

pub(crate) fn document(model: documents::Model) -> Result<Document, StoreError> {
    Ok(Document {
        id: DocumentId::from_uuid(model.id),
        charge_id: model.charge_id.map(ChargeId::from_uuid),
        document_type: label("document_type", &model.document_type)?,
        date: model.date,
        debtor_id: model.debtor_id.map(FinancialEntityId::from_uuid),
        creditor_id: model.creditor_id.map(FinancialEntityId::from_uuid),
        vat_amount: model.vat_amount,
        total_amount: model.total_amount,
        currency_code: model.currency_code,
        serial_number: model.serial_number,
    })
}

pub(crate) fn document_model(doc: &Document, now: DateTime<FixedOffset>) -> documents::ActiveModel {
    documents::ActiveModel {
        id: Set(doc.id.into_inner()),
        charge_id: Set(doc.charge_id.map(ChargeId::into_inner)),
        document_type: Set(doc.document_type.as_str().to_string()),
        date: Set(doc.date),
        debtor_id: Set(doc.debtor_id.map(FinancialEntityId::into_inner)),
        creditor_id: Set(doc.creditor_id.map(FinancialEntityId::into_inner)),
        vat_amount: Set(doc.vat_amount),
        total_amount: Set(doc.total_amount),
        currency_code: Set(doc.currency_code.clone()),
        serial_number: Set(doc.serial_number.clone()),
        created_at: Set(now),
    }
}

pub(crate) fn salary_record(model: salary_records::Model) -> SalaryRecord {
    SalaryRecord {
        charge_id: ChargeId::from_uuid(model.charge_id),
        employee_id: FinancialEntityId::from_uuid(model.employee_id),
        month: model.month,
        base_salary: model.base_salary,
        job_percentage: model.job_percentage,
        travel_and_subsistence: model.travel_and_subsistence,
        income_tax: model.income_tax,
        social_security: model.social_security,
        pension: model.pension,
        recovery_days_per_year: model.recovery_days_per_year,
    }
}

pub(crate) fn salary_record_model(record: &SalaryRecord) -> salary_records::ActiveModel {
    salary_records::ActiveModel {
        id: Set(Uuid::now_v7()),
        charge_id: Set(record.charge_id.into_inner()),
        employee_id: Set(record.employee_id.into_inner()),
        month: Set(record.month),
        base_salary: Set(record.base_salary),
        job_percentage: Set(record.job_percentage),
        travel_and_subsistence: Set(record.travel_and_subsistence),
        income_tax: Set(record.income_tax),
        social_security: Set(record.social_security),
        pension: Set(record.pension),
        recovery_days_per_year: Set(record.recovery_days_per_year),
    }
}

pub(crate) fn vat_record(model: vat_report_records::Model) -> Result<VatReportRecord, StoreError> {
    Ok(VatReportRecord {
        charge_id: ChargeId::from_uuid(model.charge_id),
        document_id: DocumentId::from_uuid(model.document_id),
        kind: label("kind", &model.kind)?,
        local_vat_after_deduction: model.local_vat_after_deduction,
        rounded_vat_to_add: model.rounded_vat_to_add,
    })
}

pub(crate) fn vat_record_model(record: &VatReportRecord) -> vat_report_records::ActiveModel {
    vat_report_records::ActiveModel {
        id: Set(Uuid::now_v7()),
        charge_id: Set(record.charge_id.into_inner()),
        document_id: Set(record.document_id.into_inner()),
        kind: Set(record.kind.as_str().to_string()),
        local_vat_after_deduction: Set(record.local_vat_after_deduction),
        rounded_vat_to_add: Set(record.rounded_vat_to_add),
    }
}

// ========== Ledger ==========

fn leg(
    side: &str,
    entity: Option<Uuid>,
    local_amount: Option<Decimal>,
    foreign_amount: Option<Decimal>,
    foreign_currency: Option<&str>,
) -> Result<Option<LedgerLeg>, StoreError> {
    let (Some(entity), Some(local_amount)) = (entity, local_amount) else {
        return Ok(None);
    };
    let foreign = match (foreign_amount, foreign_currency) {
        (Some(amount), Some(code)) => Some(Money::new(amount, currency(side, code)?)),
        (None, None) => None,
        _ => {
            return Err(StoreError::Backend(format!(
                "column {side}: foreign amount and currency must be set together"
            )));
        }
    };
    Ok(Some(LedgerLeg {
        entity: FinancialEntityId::from_uuid(entity),
        local_amount,
        foreign,
    }))
}

fn required(side: &str, leg: Option<LedgerLeg>) -> Result<LedgerLeg, StoreError> {
    leg.ok_or_else(|| StoreError::Backend(format!("column {side}: missing first leg")))
}

/// Foreign amount and currency columns of a leg.
fn foreign_columns(leg: Option<&LedgerLeg>) -> (Option<Decimal>, Option<String>) {
    leg.and_then(|leg| leg.foreign)
        .map_or((None, None), |money| (Some(money.amount), Some(money.currency.as_str().to_string())))
}

pub(crate) fn ledger_record(model: ledger_records::Model) -> Result<LedgerRecord, StoreError> {
    let debit_1 = leg(
        "debit_1",
        Some(model.debit_entity_1),
        Some(model.debit_amount_1),
        model.debit_foreign_amount_1,
        model.debit_currency_1.as_deref(),
    )?;
    let credit_1 = leg(
        "credit_1",
        Some(model.credit_entity_1),
        Some(model.credit_amount_1),
        model.credit_foreign_amount_1,
        model.credit_currency_1.as_deref(),
    )?;
    Ok(LedgerRecord {
        id: LedgerRecordId::from_uuid(model.id),
        charge_id: ChargeId::from_uuid(model.charge_id),
        debit_account_1: required("debit_1", debit_1)?,
        debit_account_2: leg(
            "debit_2",
            model.debit_entity_2,
            model.debit_amount_2,
            model.debit_foreign_amount_2,
            model.debit_currency_2.as_deref(),
        )?,
        credit_account_1: required("credit_1", credit_1)?,
        credit_account_2: leg(
            "credit_2",
            model.credit_entity_2,
            model.credit_amount_2,
            model.credit_foreign_amount_2,
            model.credit_currency_2.as_deref(),
        )?,
        invoice_date: model.invoice_date,
        value_date: model.value_date,
        description: model.description,
        reference: model.reference,
        locked: model.locked,
    })
}

pub(crate) fn ledger_record_model(record: &LedgerRecord, now: DateTime<FixedOffset>) -> ledger_records::ActiveModel {
    let debit_2 = record.debit_account_2.as_ref();
    let credit_2 = record.credit_account_2.as_ref();
    let (debit_foreign_amount_1, debit_currency_1) = foreign_columns(Some(&record.debit_account_1));
    let (debit_foreign_amount_2, debit_currency_2) = foreign_columns(debit_2);
    let (credit_foreign_amount_1, credit_currency_1) = foreign_columns(Some(&record.credit_account_1));
    let (credit_foreign_amount_2, credit_currency_2) = foreign_columns(credit_2);

    ledger_records::ActiveModel {
        id: Set(record.id.into_inner()),
        charge_id: Set(record.charge_id.into_inner()),
        debit_entity_1: Set(record.debit_account_1.entity.into_inner()),
        debit_amount_1: Set(record.debit_account_1.local_amount),
        debit_foreign_amount_1: Set(debit_foreign_amount_1),
        debit_currency_1: Set(debit_currency_1),
        debit_entity_2: Set(debit_2.map(|leg| leg.entity.into_inner())),
        debit_amount_2: Set(debit_2.map(|leg| leg.local_amount)),
        debit_foreign_amount_2: Set(debit_foreign_amount_2),
        debit_currency_2: Set(debit_currency_2),
        credit_entity_1: Set(record.credit_account_1.entity.into_inner()),
        credit_amount_1: Set(record.credit_account_1.local_amount),
        credit_foreign_amount_1: Set(credit_foreign_amount_1),
        credit_currency_1: Set(credit_currency_1),
        credit_entity_2: Set(credit_2.map(|leg| leg.entity.into_inner())),
        credit_amount_2: Set(credit_2.map(|leg| leg.local_amount)),
        credit_foreign_amount_2: Set(credit_foreign_amount_2),
        credit_currency_2: Set(credit_currency_2),
        invoice_date: Set(record.invoice_date),
        value_date: Set(record.value_date),
        description: Set(record.description.clone()),
        reference: Set(record.reference.clone()),
        locked: Set(record.locked),
        created_at: Set(now),
    }
}

pub(crate) fn cancellation_group(
    model: balance_cancellations::Model,
    mut record_ids: Vec<LedgerRecordId>,
) -> Result<CancellationGroup, StoreError> {
    let kind = CancellationKind::parse(&model.kind)
        .ok_or_else(|| StoreError::Backend(format!("column kind: unknown cancellation kind '{}'", model.kind)))?;
    record_ids.sort();
    Ok(CancellationGroup {
        id: CancellationGroupId::from_uuid(model.id),
        entity_id: FinancialEntityId::from_uuid(model.entity_id),
        record_ids,
        net: model.net,
        kind,
    })
}

pub(crate) fn cancellation_model(
    group: &CancellationGroup,
    now: DateTime<FixedOffset>,
) -> balance_cancellations::ActiveModel {
    balance_cancellations::ActiveModel {
        id: Set(group.id.into_inner()),
        entity_id: Set(group.entity_id.into_inner()),
        kind: Set(group.kind.as_str().to_string()),
        net: Set(group.net),
        created_at: Set(now),
    }
}

// ========== Settings ==========

pub(crate) fn exchange_rate(model: exchange_rates::Model) -> Result<ExchangeRate, StoreError> {
    Ok(ExchangeRate {
        date: model.rate_date,
        from_currency: currency("from_currency", &model.from_currency)?,
        to_currency: currency("to_currency", &model.to_currency)?,
        rate: model.rate,
    })
}

pub(crate) fn exchange_rate_model(rate: &ExchangeRate, now: DateTime<FixedOffset>) -> exchange_rates::ActiveModel {
    exchange_rates::ActiveModel {
        id: Set(Uuid::now_v7()),
        rate_date: Set(rate.date),
        from_currency: Set(rate.from_currency.as_str().to_string()),
        to_currency: Set(rate.to_currency.as_str().to_string()),
        rate: Set(rate.rate),
        created_at: Set(now),
    }
}

pub(crate) fn ledger_lock(model: ledger_locks::Model) -> LedgerLock {
    LedgerLock {
        lock_date: model.lock_date,
        created_at: utc(model.created_at),
    }
}

pub(crate) fn recovery_rate(model: recovery_rates::Model) -> RecoveryRate {
    RecoveryRate {
        year: model.year,
        daily_rate: model.daily_rate,
        created_at: utc(model.created_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chargebook_core::charge::{ApprovalStatus, ChargeType, DocumentType};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn now() -> DateTime<FixedOffset> {
        Utc::now().into()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ledger_row() -> ledger_records::Model {
        ledger_records::Model {
            id: Uuid::now_v7(),
            charge_id: Uuid::now_v7(),
            debit_entity_1: Uuid::now_v7(),
            debit_amount_1: dec!(360),
            debit_foreign_amount_1: Some(dec!(100)),
            debit_currency_1: Some("USD".to_string()),
            debit_entity_2: None,
            debit_amount_2: None,
            debit_foreign_amount_2: None,
            debit_currency_2: None,
            credit_entity_1: Uuid::now_v7(),
            credit_amount_1: dec!(300),
            credit_foreign_amount_1: None,
            credit_currency_1: None,
            credit_entity_2: Some(Uuid::now_v7()),
            credit_amount_2: Some(dec!(60)),
            credit_foreign_amount_2: None,
            credit_currency_2: None,
            invoice_date: date(2025, 1, 10),
            value_date: date(2025, 1, 12),
            description: Some("invoice".to_string()),
            reference: None,
            locked: false,
            created_at: now(),
        }
    }

    #[test]
    fn test_ledger_row_maps_legs() {
        let row = ledger_row();
        let record = ledger_record(row.clone()).unwrap();

        assert_eq!(record.debit_account_1.local_amount, dec!(360));
        assert_eq!(
            record.debit_account_1.foreign,
            Some(Money::new(dec!(100), CurrencyCode::USD))
        );
        assert!(record.debit_account_2.is_none());
        assert_eq!(
            record.credit_account_2.map(|leg| leg.entity.into_inner()),
            row.credit_entity_2
        );
        assert_eq!(record.value_date, date(2025, 1, 12));
    }

    #[test]
    fn test_ledger_record_columns_mirror_legs() {
        let record = ledger_record(ledger_row()).unwrap();
        let model = ledger_record_model(&record, now());

        assert_eq!(model.debit_amount_1, Set(dec!(360)));
        assert_eq!(model.debit_currency_1, Set(Some("USD".to_string())));
        assert_eq!(model.debit_entity_2, Set(None));
        assert_eq!(model.credit_amount_2, Set(Some(dec!(60))));
    }

    #[test]
    fn test_half_set_foreign_amount_is_rejected() {
        let row = ledger_records::Model {
            debit_currency_1: None,
            ..ledger_row()
        };
        assert!(matches!(ledger_record(row), Err(StoreError::Backend(_))));
    }

    #[test]
    fn test_charge_labels_are_parsed() {
        let mut domain = Charge::new(ChargeId::new());
        domain.charge_type = Some(ChargeType::Dividend);
        domain.accountant_approval_status = ApprovalStatus::Pending;
        domain.business_ids.insert(FinancialEntityId::new());

        let row = charges::Model {
            id: domain.id.into_inner(),
            charge_type: Some(ChargeType::Dividend.as_str().to_string()),
            business_ids: business_ids_json(&domain.business_ids),
            is_conversion: false,
            is_salary: false,
            is_property: false,
            business_trip_id: None,
            is_dividend: false,
            is_bank_deposit: false,
            is_creditcard_bank: false,
            is_monthly_vat: false,
            is_financial: false,
            tax_category_id: None,
            user_description: None,
            summary_currency: None,
            summary_total_amount: None,
            min_event_date: None,
            min_debit_date: None,
            min_documents_date: None,
            counterparty_id: None,
            accountant_approval_status: ApprovalStatus::Pending.as_str().to_string(),
            closed_at: None,
            created_at: now(),
            updated_at: now(),
        };
        assert_eq!(charge(row.clone()).unwrap(), domain);

        let bad = charges::Model {
            charge_type: Some("mystery".to_string()),
            ..row
        };
        let err = charge(bad).unwrap_err();
        assert!(err.to_string().contains("charge_type"));
    }

    #[test]
    fn test_document_keeps_raw_currency_text() {
        let row = documents::Model {
            id: Uuid::now_v7(),
            charge_id: None,
            document_type: DocumentType::Receipt.as_str().to_string(),
            date: Some(date(2025, 2, 1)),
            debtor_id: None,
            creditor_id: None,
            vat_amount: None,
            total_amount: Some(dec!(10)),
            currency_code: Some("us$".to_string()),
            serial_number: None,
            created_at: now(),
        };
        let doc = document(row).unwrap();
        assert_eq!(doc.currency_code.as_deref(), Some("us$"));
        assert_eq!(doc.document_type, DocumentType::Receipt);
    }

    #[test]
    fn test_bad_transaction_currency_is_backend_error() {
        let row = transactions::Model {
            id: Uuid::now_v7(),
            charge_id: None,
            account_id: Uuid::now_v7(),
            account_type: "bank_account".to_string(),
            business_id: None,
            currency: "??".to_string(),
            amount: dec!(1),
            event_date: date(2025, 1, 1),
            debit_date: None,
            debit_date_override: None,
            debit_timestamp: None,
            source_description: None,
            reference_key: None,
            business_trip_category: None,
            created_at: now(),
        };
        assert!(matches!(transaction(row), Err(StoreError::Backend(_))));
    }

    #[test]
    fn test_cancellation_members_are_sorted() {
        let mut ids = vec![LedgerRecordId::new(), LedgerRecordId::new()];
        ids.reverse();
        let row = balance_cancellations::Model {
            id: Uuid::now_v7(),
            entity_id: Uuid::now_v7(),
            kind: "pair".to_string(),
            net: dec!(0),
            created_at: now(),
        };
        let group = cancellation_group(row, ids).unwrap();
        assert!(group.record_ids.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(group.kind, CancellationKind::Pair);
    }
}
