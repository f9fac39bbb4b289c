//! Builders shared by unit tests.

use chargebook_shared::config::{BusinessTripAccounts, LedgerAccounts, LedgerConfig};
use chargebook_shared::types::{CurrencyCode, DocumentId, FinancialEntityId, TransactionId};
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::charge::{AccountType, Document, DocumentType, Transaction};

pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Ledger settings with a fresh id for the owner and every account.
pub(crate) fn ledger_config() -> LedgerConfig {
    LedgerConfig {
        local_currency: CurrencyCode::ILS,
        owner_id: FinancialEntityId::new(),
        internal_wallet_ids: Vec::new(),
        accounts: LedgerAccounts {
            exchange_rates: FinancialEntityId::new(),
            input_vat: FinancialEntityId::new(),
            output_vat: FinancialEntityId::new(),
            vat_authority: FinancialEntityId::new(),
            internal_transfer: FinancialEntityId::new(),
            bank_deposit: FinancialEntityId::new(),
            dividend_payable: FinancialEntityId::new(),
            salary_expense: FinancialEntityId::new(),
            salary_withholdings: FinancialEntityId::new(),
            recovery_reserve_expense: FinancialEntityId::new(),
            recovery_reserve_provision: FinancialEntityId::new(),
            business_trip: BusinessTripAccounts::default(),
        },
    }
}

/// A transaction dated `event_date` with no debit information.
pub(crate) fn transaction(
    account_id: FinancialEntityId,
    business_id: Option<FinancialEntityId>,
    currency: CurrencyCode,
    amount: Decimal,
    event_date: NaiveDate,
) -> Transaction {
    Transaction {
        id: TransactionId::new(),
        charge_id: None,
        account_id,
        account_type: AccountType::BankAccount,
        business_id,
        currency,
        amount,
        event_date,
        debit_date: None,
        debit_date_override: None,
        debit_timestamp: None,
        source_description: None,
        reference_key: None,
        business_trip_category: None,
    }
}

/// A fully read document.
pub(crate) fn document(
    document_type: DocumentType,
    debtor_id: FinancialEntityId,
    creditor_id: FinancialEntityId,
    total_amount: Decimal,
    vat_amount: Decimal,
    currency: &str,
    date: NaiveDate,
) -> Document {
    Document {
        id: DocumentId::new(),
        charge_id: None,
        document_type,
        date: Some(date),
        debtor_id: Some(debtor_id),
        creditor_id: Some(creditor_id),
        vat_amount: Some(vat_amount),
        total_amount: Some(total_amount),
        currency_code: Some(currency.to_string()),
        serial_number: None,
    }
}
