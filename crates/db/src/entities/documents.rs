//! `SeaORM` Entity for documents table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "documents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub charge_id: Option<Uuid>,
    pub document_type: String,
    pub date: Option<Date>,
    pub debtor_id: Option<Uuid>,
    pub creditor_id: Option<Uuid>,
    pub vat_amount: Option<Decimal>,
    pub total_amount: Option<Decimal>,
    /// As printed on the document; not validated.
    pub currency_code: Option<String>,
    pub serial_number: Option<String>,
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
