//! `SeaORM` entities, one module per table.

pub mod balance_cancellation_records;
pub mod balance_cancellations;
pub mod charges;
pub mod documents;
pub mod exchange_rates;
pub mod financial_entities;
pub mod ledger_locks;
pub mod ledger_records;
pub mod recovery_rates;
pub mod salary_records;
pub mod transactions;
pub mod vat_report_records;
