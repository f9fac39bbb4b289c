//! `SeaORM` Entity for balance_cancellation_records table.
//!
//! Membership of ledger records in cancellation groups.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "balance_cancellation_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub cancellation_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub ledger_record_id: Uuid,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::balance_cancellations::Entity",
        from = "Column::CancellationId",
        to = "super::balance_cancellations::Column::Id",
        on_delete = "Cascade"
    )]
    BalanceCancellations,
}

impl Related<super::balance_cancellations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BalanceCancellations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
