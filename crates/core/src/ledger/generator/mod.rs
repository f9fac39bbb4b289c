//! Per-charge-type ledger generation.
//!
//! The generator classifies the charge and dispatches to one algorithm per
//! [`ChargeType`]. Every algorithm returns plain records; balance verification,
//! date aggregation and entity balances are computed here for all of them.

mod common;
mod conversion;
mod dividend;
mod financial;
mod salary;
mod transfer;
mod trip;
mod vat;

#[cfg(test)]
mod balance_props;

use std::collections::BTreeMap;
use std::sync::Arc;

use chargebook_shared::config::{DividendConfig, LedgerConfig, SalaryConfig};
use chargebook_shared::types::{ChargeId, CurrencyCode, FinancialEntityId, Money};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use super::error::LedgerError;
use super::record::{LedgerLeg, LedgerRecord};
use super::validation::{entity_balances, validate_balanced};
use crate::charge::{
    BatchedChargePredicate, Charge, ChargeClassifier, ChargeType, Document, KeywordBatchPredicate,
    SalaryRecord, Transaction, VatReportRecord, effective_date, min_date,
};
use crate::currency::{CurrencyService, RateLookup};

pub use salary::RecoveryRateTable;

/// Everything the generator reads for one charge.
///
/// Rates, recovery rates and VAT lines are loaded for this operation only.
pub struct GenerationInput<'a> {
    /// The charge.
    pub charge: &'a Charge,
    /// Its transactions.
    pub transactions: &'a [Transaction],
    /// Its documents.
    pub documents: &'a [Document],
    /// Payslips paid by the charge.
    pub salary_records: &'a [SalaryRecord],
    /// VAT report lines settled by the charge.
    pub vat_records: &'a [VatReportRecord],
    /// Recovery-pay daily rates.
    pub recovery_rates: &'a RecoveryRateTable,
    /// Exchange rates into local currency.
    pub rates: &'a dyn RateLookup,
}

/// A charge's generated ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedLedger {
    /// Charge ID.
    pub charge_id: ChargeId,
    /// Type the charge was classified as.
    pub charge_type: ChargeType,
    /// Balanced records.
    pub records: Vec<LedgerRecord>,
    /// Earliest invoice date, `None` when there are no records.
    pub min_invoice_date: Option<NaiveDate>,
    /// Earliest value date, `None` when there are no records.
    pub min_value_date: Option<NaiveDate>,
    /// Net local balance per entity left open by this charge.
    pub entity_balances: BTreeMap<FinancialEntityId, Decimal>,
}

/// Generates balanced ledger records for a charge.
pub struct LedgerGenerator {
    ledger: LedgerConfig,
    dividend: DividendConfig,
    batched_employee_business_id: Option<FinancialEntityId>,
    classifier: ChargeClassifier,
    batch_predicate: Arc<dyn BatchedChargePredicate>,
}

impl LedgerGenerator {
    /// Creates a generator using the keyword batch predicate from the salary settings.
    #[must_use]
    pub fn new(ledger: LedgerConfig, dividend: DividendConfig, salary: &SalaryConfig) -> Self {
        let predicate =
            KeywordBatchPredicate::new(salary.batched_employee_business_id, &salary.batch_keywords);
        Self::with_batch_predicate(ledger, dividend, salary, Arc::new(predicate))
    }

    /// Creates a generator with a custom batch predicate.
    #[must_use]
    pub fn with_batch_predicate(
        ledger: LedgerConfig,
        dividend: DividendConfig,
        salary: &SalaryConfig,
        batch_predicate: Arc<dyn BatchedChargePredicate>,
    ) -> Self {
        let classifier = ChargeClassifier::new(ledger.internal_wallet_ids.iter().copied());
        Self {
            ledger,
            dividend,
            batched_employee_business_id: salary.batched_employee_business_id,
            classifier,
            batch_predicate,
        }
    }

    /// Returns the classifier used for dispatch.
    #[must_use]
    pub const fn classifier(&self) -> &ChargeClassifier {
        &self.classifier
    }

    /// Generates the charge's ledger.
    ///
    /// # Errors
    ///
    /// Returns a `LedgerError` if the charge cannot be booked, or
    /// `LedgerError::UnbalancedLedger` if the result does not balance.
    pub fn generate(&self, input: &GenerationInput<'_>) -> Result<GeneratedLedger, LedgerError> {
        let charge_type = self.classifier.classify(input.charge);
        let ctx = Context {
            input,
            ledger: &self.ledger,
        };

        let records = match charge_type {
            ChargeType::Common => common::generate(&ctx)?,
            ChargeType::Conversion => conversion::generate(&ctx)?,
            ChargeType::Salary => {
                let batched = self.batch_predicate.is_batched(input.charge);
                salary::generate(&ctx, batched, self.batched_employee_business_id)?
            }
            ChargeType::InternalTransfer => {
                transfer::generate(&ctx, self.ledger.accounts.internal_transfer)?
            }
            ChargeType::BusinessTrip => trip::generate(&ctx)?,
            ChargeType::Dividend => dividend::generate(&ctx, &self.dividend)?,
            ChargeType::BankDeposit => transfer::generate(&ctx, self.ledger.accounts.bank_deposit)?,
            ChargeType::CreditcardBank => common::generate_creditcard_bank(&ctx)?,
            ChargeType::MonthlyVat => vat::generate(&ctx)?,
            ChargeType::Financial => financial::generate(&ctx)?,
        };

        if let Err(err) = validate_balanced(input.charge.id, &records) {
            tracing::error!(
                charge_id = %input.charge.id,
                charge_type = %charge_type,
                records = records.len(),
                error = %err,
                "Generated ledger is unbalanced"
            );
            return Err(err);
        }

        Ok(GeneratedLedger {
            charge_id: input.charge.id,
            charge_type,
            min_invoice_date: min_date(records.iter().map(|r| Some(r.invoice_date))),
            min_value_date: min_date(records.iter().map(|r| Some(r.value_date))),
            entity_balances: entity_balances(&records),
            records,
        })
    }
}

/// Shared helpers for the per-type algorithms.
pub(crate) struct Context<'a> {
    input: &'a GenerationInput<'a>,
    ledger: &'a LedgerConfig,
}

impl Context<'_> {
    fn charge(&self) -> &Charge {
        self.input.charge
    }

    fn charge_id(&self) -> ChargeId {
        self.input.charge.id
    }

    fn local_currency(&self) -> CurrencyCode {
        self.ledger.local_currency
    }

    fn effective_date(&self, tx: &Transaction) -> Result<NaiveDate, LedgerError> {
        effective_date(tx, self.local_currency())
            .ok_or(LedgerError::MissingEffectiveDate { transaction_id: tx.id })
    }

    fn tax_category(&self) -> Result<FinancialEntityId, LedgerError> {
        self.charge()
            .tax_category_id
            .ok_or(LedgerError::MissingTaxCategory {
                charge_id: self.charge_id(),
            })
    }

    /// Converts `money` at the rate on `date` into a leg carrying the signed local amount.
    fn leg(&self, entity: FinancialEntityId, money: Money, date: NaiveDate) -> Result<LedgerLeg, LedgerError> {
        let rate = self.input.rates.rate_on(money.currency, date)?;
        let local_amount = CurrencyService::convert(money.amount, rate);
        Ok(if money.currency == self.local_currency() {
            LedgerLeg::local(entity, local_amount)
        } else {
            LedgerLeg::converted(entity, local_amount, money)
        })
    }

    /// Books a transaction between its account and `counter`.
    ///
    /// Money in debits the account; money out credits it.
    fn transaction_record(
        &self,
        tx: &Transaction,
        counter: FinancialEntityId,
    ) -> Result<Option<LedgerRecord>, LedgerError> {
        if tx.amount.is_zero() {
            return Ok(None);
        }
        let value_date = self.effective_date(tx)?;
        let account = self.leg(tx.account_id, tx.money(), value_date)?;
        let counter = LedgerLeg { entity: counter, ..account };
        let mut record = LedgerRecord::transfer(self.charge_id(), account, counter, tx.event_date, value_date)
            .with_reference(tx.reference_key.clone());
        if let Some(description) = &tx.source_description {
            record = record.with_description(description.clone());
        }
        Ok(Some(record))
    }

    /// Builds a record from up to two legs per side, dropping zero legs.
    ///
    /// Returns `None` when either side ends up empty.
    fn record_from_legs(
        &self,
        debits: Vec<LedgerLeg>,
        credits: Vec<LedgerLeg>,
        invoice_date: NaiveDate,
        value_date: NaiveDate,
    ) -> Result<Option<LedgerRecord>, LedgerError> {
        let mut debits = debits.into_iter().filter(|leg| !leg.local_amount.is_zero());
        let mut credits = credits.into_iter().filter(|leg| !leg.local_amount.is_zero());

        let (Some(debit_1), Some(credit_1)) = (debits.next(), credits.next()) else {
            return Ok(None);
        };
        let debit_2 = debits.next();
        let credit_2 = credits.next();
        if debits.next().is_some() || credits.next().is_some() {
            return Err(LedgerError::TooManySubAccounts {
                charge_id: self.charge_id(),
            });
        }

        let mut record = LedgerRecord::transfer(self.charge_id(), debit_1, credit_1, invoice_date, value_date);
        record.debit_account_2 = debit_2;
        record.credit_account_2 = credit_2;
        Ok(Some(record))
    }
}
