//! `SeaORM` Entity for transactions table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub charge_id: Option<Uuid>,
    pub account_id: Uuid,
    pub account_type: String,
    pub business_id: Option<Uuid>,
    pub currency: String,
    pub amount: Decimal,
    pub event_date: Date,
    pub debit_date: Option<Date>,
    pub debit_date_override: Option<Date>,
    pub debit_timestamp: Option<DateTimeWithTimeZone>,
    pub source_description: Option<String>,
    pub reference_key: Option<String>,
    pub business_trip_category: Option<String>,
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
