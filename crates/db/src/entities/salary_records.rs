//! `SeaORM` Entity for salary_records table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "salary_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub charge_id: Uuid,
    pub employee_id: Uuid,
    pub month: Date,
    pub base_salary: Decimal,
    pub job_percentage: Decimal,
    pub travel_and_subsistence: Decimal,
    pub income_tax: Decimal,
    pub social_security: Decimal,
    pub pension: Decimal,
    pub recovery_days_per_year: Option<Decimal>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
