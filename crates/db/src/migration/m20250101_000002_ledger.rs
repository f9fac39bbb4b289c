//! Ledger records, lock dates and balance cancellations.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(LEDGER_RECORDS_SQL).await?;
        db.execute_unprepared(LEDGER_LOCKS_SQL).await?;
        db.execute_unprepared(LOCK_TRIGGER_SQL).await?;
        db.execute_unprepared(BALANCE_CANCELLATIONS_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_SQL).await?;
        Ok(())
    }
}

const LEDGER_RECORDS_SQL: &str = r"
CREATE TABLE ledger_records (
    id UUID PRIMARY KEY,
    charge_id UUID NOT NULL REFERENCES charges(id),
    debit_entity_1 UUID NOT NULL,
    debit_amount_1 NUMERIC(20, 2) NOT NULL CHECK (debit_amount_1 >= 0),
    debit_foreign_amount_1 NUMERIC(20, 6),
    debit_currency_1 CHAR(3),
    debit_entity_2 UUID,
    debit_amount_2 NUMERIC(20, 2) CHECK (debit_amount_2 >= 0),
    debit_foreign_amount_2 NUMERIC(20, 6),
    debit_currency_2 CHAR(3),
    credit_entity_1 UUID NOT NULL,
    credit_amount_1 NUMERIC(20, 2) NOT NULL CHECK (credit_amount_1 >= 0),
    credit_foreign_amount_1 NUMERIC(20, 6),
    credit_currency_1 CHAR(3),
    credit_entity_2 UUID,
    credit_amount_2 NUMERIC(20, 2) CHECK (credit_amount_2 >= 0),
    credit_foreign_amount_2 NUMERIC(20, 6),
    credit_currency_2 CHAR(3),
    invoice_date DATE NOT NULL,
    value_date DATE NOT NULL,
    description TEXT,
    reference TEXT,
    locked BOOLEAN NOT NULL DEFAULT false,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_ledger_balanced CHECK (
        debit_amount_1 + COALESCE(debit_amount_2, 0) = credit_amount_1 + COALESCE(credit_amount_2, 0)
    )
);

CREATE INDEX idx_ledger_records_charge ON ledger_records(charge_id);
CREATE INDEX idx_ledger_records_debit_1 ON ledger_records(debit_entity_1);
CREATE INDEX idx_ledger_records_debit_2 ON ledger_records(debit_entity_2) WHERE debit_entity_2 IS NOT NULL;
CREATE INDEX idx_ledger_records_credit_1 ON ledger_records(credit_entity_1);
CREATE INDEX idx_ledger_records_credit_2 ON ledger_records(credit_entity_2) WHERE credit_entity_2 IS NOT NULL;
";

const LEDGER_LOCKS_SQL: &str = r"
-- Versioned tenant lock date; the newest row is in force
CREATE TABLE ledger_locks (
    id UUID PRIMARY KEY,
    lock_date DATE NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_ledger_locks_created ON ledger_locks(created_at DESC);
";

const LOCK_TRIGGER_SQL: &str = r"
-- ============================================================
-- FUNCTION: prevent_locked_ledger_change
-- Rejects writes to records dated on or before the lock date,
-- and any change to records flagged as locked
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_locked_ledger_change()
RETURNS TRIGGER AS $$
DECLARE
    current_lock DATE;
BEGIN
    SELECT lock_date INTO current_lock
    FROM ledger_locks
    ORDER BY created_at DESC
    LIMIT 1;

    IF TG_OP IN ('UPDATE', 'DELETE') THEN
        IF OLD.locked OR (current_lock IS NOT NULL AND OLD.value_date <= current_lock) THEN
            RAISE EXCEPTION 'Ledger record % is locked', OLD.id;
        END IF;
    END IF;

    IF TG_OP IN ('INSERT', 'UPDATE') THEN
        IF current_lock IS NOT NULL AND NEW.value_date <= current_lock THEN
            RAISE EXCEPTION 'Ledger is locked through %', current_lock;
        END IF;
        RETURN NEW;
    END IF;

    RETURN OLD;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_ledger_lock
BEFORE INSERT OR UPDATE OR DELETE ON ledger_records
FOR EACH ROW
EXECUTE FUNCTION prevent_locked_ledger_change();
";

const BALANCE_CANCELLATIONS_SQL: &str = r"
CREATE TABLE balance_cancellations (
    id UUID PRIMARY KEY,
    entity_id UUID NOT NULL,
    kind VARCHAR(16) NOT NULL CHECK (kind IN ('pair', 'settlement')),
    net NUMERIC(20, 2) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_balance_cancellations_entity ON balance_cancellations(entity_id);

CREATE TABLE balance_cancellation_records (
    cancellation_id UUID NOT NULL REFERENCES balance_cancellations(id) ON DELETE CASCADE,
    ledger_record_id UUID NOT NULL REFERENCES ledger_records(id) ON DELETE CASCADE,
    PRIMARY KEY (cancellation_id, ledger_record_id)
);
";

const DROP_SQL: &str = r"
DROP TABLE IF EXISTS balance_cancellation_records CASCADE;
DROP TABLE IF EXISTS balance_cancellations CASCADE;
DROP TRIGGER IF EXISTS trg_ledger_lock ON ledger_records;
DROP FUNCTION IF EXISTS prevent_locked_ledger_change();
DROP TABLE IF EXISTS ledger_locks CASCADE;
DROP TABLE IF EXISTS ledger_records CASCADE;
";
