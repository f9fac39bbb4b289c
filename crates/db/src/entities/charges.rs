//! `SeaORM` Entity for charges table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "charges")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub charge_type: Option<String>,
    #[sea_orm(column_type = "JsonBinary")]
    pub business_ids: Json,
    pub is_conversion: bool,
    pub is_salary: bool,
    pub is_property: bool,
    pub business_trip_id: Option<Uuid>,
    pub is_dividend: bool,
    pub is_bank_deposit: bool,
    pub is_creditcard_bank: bool,
    pub is_monthly_vat: bool,
    pub is_financial: bool,
    pub tax_category_id: Option<Uuid>,
    pub user_description: Option<String>,
    pub summary_currency: Option<String>,
    pub summary_total_amount: Option<Decimal>,
    pub min_event_date: Option<Date>,
    pub min_debit_date: Option<Date>,
    pub min_documents_date: Option<Date>,
    pub counterparty_id: Option<Uuid>,
    pub accountant_approval_status: String,
    pub closed_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
    #[sea_orm(has_many = "super::documents::Entity")]
    Documents,
    #[sea_orm(has_many = "super::ledger_records::Entity")]
    LedgerRecords,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl Related<super::documents::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Documents.def()
    }
}

impl Related<super::ledger_records::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LedgerRecords.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
