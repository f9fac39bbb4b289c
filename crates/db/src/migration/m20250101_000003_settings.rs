//! Exchange rates, recovery rates and the payroll and VAT inputs.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(EXCHANGE_RATES_SQL).await?;
        db.execute_unprepared(RECOVERY_RATES_SQL).await?;
        db.execute_unprepared(SALARY_RECORDS_SQL).await?;
        db.execute_unprepared(VAT_REPORT_RECORDS_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            "DROP TABLE IF EXISTS vat_report_records, salary_records, recovery_rates, exchange_rates CASCADE;",
        )
        .await?;
        Ok(())
    }
}

const EXCHANGE_RATES_SQL: &str = r"
-- One immutable rate per date and pair
CREATE TABLE exchange_rates (
    id UUID PRIMARY KEY,
    rate_date DATE NOT NULL,
    from_currency CHAR(3) NOT NULL,
    to_currency CHAR(3) NOT NULL,
    rate NUMERIC(20, 10) NOT NULL CHECK (rate > 0),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_exchange_rates_date_pair UNIQUE (rate_date, from_currency, to_currency),
    CONSTRAINT chk_exchange_rates_pair CHECK (from_currency <> to_currency)
);

CREATE INDEX idx_exchange_rates_date ON exchange_rates(rate_date);
";

const RECOVERY_RATES_SQL: &str = r"
-- Versioned daily recovery pay; the newest row per year is in force
CREATE TABLE recovery_rates (
    id UUID PRIMARY KEY,
    year INTEGER NOT NULL,
    daily_rate NUMERIC(20, 2) NOT NULL CHECK (daily_rate >= 0),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_recovery_rates_year ON recovery_rates(year, created_at DESC);
";

const SALARY_RECORDS_SQL: &str = r"
CREATE TABLE salary_records (
    id UUID PRIMARY KEY,
    charge_id UUID NOT NULL REFERENCES charges(id),
    employee_id UUID NOT NULL,
    month DATE NOT NULL,
    base_salary NUMERIC(20, 2) NOT NULL,
    job_percentage NUMERIC(5, 2) NOT NULL CHECK (job_percentage BETWEEN 0 AND 100),
    travel_and_subsistence NUMERIC(20, 2) NOT NULL DEFAULT 0,
    income_tax NUMERIC(20, 2) NOT NULL DEFAULT 0,
    social_security NUMERIC(20, 2) NOT NULL DEFAULT 0,
    pension NUMERIC(20, 2) NOT NULL DEFAULT 0,
    recovery_days_per_year NUMERIC(6, 2)
);

CREATE INDEX idx_salary_records_charge ON salary_records(charge_id);
";

const VAT_REPORT_RECORDS_SQL: &str = r"
CREATE TABLE vat_report_records (
    id UUID PRIMARY KEY,
    charge_id UUID NOT NULL REFERENCES charges(id),
    document_id UUID NOT NULL REFERENCES documents(id),
    kind VARCHAR(16) NOT NULL CHECK (kind IN ('income', 'expense')),
    local_vat_after_deduction NUMERIC(20, 2) NOT NULL,
    rounded_vat_to_add NUMERIC(20, 2) NOT NULL
);

CREATE INDEX idx_vat_report_records_charge ON vat_report_records(charge_id);
";
