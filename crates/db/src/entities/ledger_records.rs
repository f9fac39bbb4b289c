//! `SeaORM` Entity for ledger_records table.
//!
//! Each side carries up to two legs, flattened into numbered columns.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "ledger_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub charge_id: Uuid,
    pub debit_entity_1: Uuid,
    pub debit_amount_1: Decimal,
    pub debit_foreign_amount_1: Option<Decimal>,
    pub debit_currency_1: Option<String>,
    pub debit_entity_2: Option<Uuid>,
    pub debit_amount_2: Option<Decimal>,
    pub debit_foreign_amount_2: Option<Decimal>,
    pub debit_currency_2: Option<String>,
    pub credit_entity_1: Uuid,
    pub credit_amount_1: Decimal,
    pub credit_foreign_amount_1: Option<Decimal>,
    pub credit_currency_1: Option<String>,
    pub credit_entity_2: Option<Uuid>,
    pub credit_amount_2: Option<Decimal>,
    pub credit_foreign_amount_2: Option<Decimal>,
    pub credit_currency_2: Option<String>,
    pub invoice_date: Date,
    pub value_date: Date,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub locked: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::charges::Entity",
        from = "Column::ChargeId",
        to = "super::charges::Column::Id"
    )]
    Charges,
}

impl Related<super::charges::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Charges.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
