//! Charges and their items.
//!
//! Creates financial entities, charges, transactions and documents.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(FINANCIAL_ENTITIES_SQL).await?;
        db.execute_unprepared(CHARGES_SQL).await?;
        db.execute_unprepared(TRANSACTIONS_SQL).await?;
        db.execute_unprepared(DOCUMENTS_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            "DROP TABLE IF EXISTS documents, transactions, charges, financial_entities CASCADE;",
        )
        .await?;
        Ok(())
    }
}

const FINANCIAL_ENTITIES_SQL: &str = r"
-- Businesses, tax categories and bank accounts. Referenced, never owned.
CREATE TABLE financial_entities (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    kind VARCHAR(32) NOT NULL CHECK (kind IN ('business', 'tax_category', 'bank_account')),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const CHARGES_SQL: &str = r"
CREATE TABLE charges (
    id UUID PRIMARY KEY,
    charge_type VARCHAR(32),
    business_ids JSONB NOT NULL DEFAULT '[]'::jsonb,
    is_conversion BOOLEAN NOT NULL DEFAULT false,
    is_salary BOOLEAN NOT NULL DEFAULT false,
    is_property BOOLEAN NOT NULL DEFAULT false,
    business_trip_id UUID,
    is_dividend BOOLEAN NOT NULL DEFAULT false,
    is_bank_deposit BOOLEAN NOT NULL DEFAULT false,
    is_creditcard_bank BOOLEAN NOT NULL DEFAULT false,
    is_monthly_vat BOOLEAN NOT NULL DEFAULT false,
    is_financial BOOLEAN NOT NULL DEFAULT false,
    tax_category_id UUID REFERENCES financial_entities(id),
    user_description TEXT,
    summary_currency CHAR(3),
    summary_total_amount NUMERIC(20, 6),
    min_event_date DATE,
    min_debit_date DATE,
    min_documents_date DATE,
    counterparty_id UUID,
    accountant_approval_status VARCHAR(16) NOT NULL DEFAULT 'unapproved'
        CHECK (accountant_approval_status IN ('unapproved', 'pending', 'approved')),
    closed_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

-- Candidate search only looks at open charges
CREATE INDEX idx_charges_open ON charges(id)
    WHERE closed_at IS NULL AND accountant_approval_status <> 'approved';
";

const TRANSACTIONS_SQL: &str = r"
CREATE TABLE transactions (
    id UUID PRIMARY KEY,
    charge_id UUID REFERENCES charges(id),
    account_id UUID NOT NULL,
    account_type VARCHAR(16) NOT NULL CHECK (account_type IN ('bank_account', 'credit_card', 'wallet')),
    business_id UUID,
    currency CHAR(3) NOT NULL,
    amount NUMERIC(20, 6) NOT NULL,
    event_date DATE NOT NULL,
    debit_date DATE,
    debit_date_override DATE,
    debit_timestamp TIMESTAMPTZ,
    source_description TEXT,
    reference_key TEXT,
    business_trip_category VARCHAR(32),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_transactions_charge ON transactions(charge_id);
CREATE INDEX idx_transactions_unassigned ON transactions(id) WHERE charge_id IS NULL;
";

const DOCUMENTS_SQL: &str = r"
CREATE TABLE documents (
    id UUID PRIMARY KEY,
    charge_id UUID REFERENCES charges(id),
    document_type VARCHAR(32) NOT NULL,
    date DATE,
    debtor_id UUID,
    creditor_id UUID,
    vat_amount NUMERIC(20, 6),
    total_amount NUMERIC(20, 6),
    -- As read by OCR; may be malformed
    currency_code TEXT,
    serial_number TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_documents_charge ON documents(charge_id);
CREATE INDEX idx_documents_unassigned ON documents(id) WHERE charge_id IS NULL;
";
