//! Ledger records.
//!
//! A record has a debit side and a credit side, each with one or two
//! sub-accounts. Leg amounts are non-negative local-currency values; the
//! original-currency amount is kept alongside when the leg was converted.

use chargebook_shared::types::{ChargeId, FinancialEntityId, LedgerRecordId, Money};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One sub-account line on either side of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerLeg {
    /// Account (business, tax category or bank account) the leg is booked to.
    pub entity: FinancialEntityId,
    /// Amount in local currency.
    pub local_amount: Decimal,
    /// Original-currency amount, for converted legs.
    pub foreign: Option<Money>,
}

impl LedgerLeg {
    /// Creates a local-currency leg.
    #[must_use]
    pub const fn local(entity: FinancialEntityId, local_amount: Decimal) -> Self {
        Self {
            entity,
            local_amount,
            foreign: None,
        }
    }

    /// Creates a converted leg.
    #[must_use]
    pub const fn converted(entity: FinancialEntityId, local_amount: Decimal, foreign: Money) -> Self {
        Self {
            entity,
            local_amount,
            foreign: Some(foreign),
        }
    }

    /// Returns the leg with its amounts made non-negative.
    #[must_use]
    pub fn abs(self) -> Self {
        Self {
            entity: self.entity,
            local_amount: self.local_amount.abs(),
            foreign: self.foreign.map(Money::abs),
        }
    }
}

/// Debit or credit side of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Debit side.
    Debit,
    /// Credit side.
    Credit,
}

/// A balanced double-entry line derived from a charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// Record ID.
    pub id: LedgerRecordId,
    /// Charge the record was generated from.
    pub charge_id: ChargeId,
    /// First debit sub-account.
    pub debit_account_1: LedgerLeg,
    /// Second debit sub-account.
    pub debit_account_2: Option<LedgerLeg>,
    /// First credit sub-account.
    pub credit_account_1: LedgerLeg,
    /// Second credit sub-account.
    pub credit_account_2: Option<LedgerLeg>,
    /// Date of the underlying invoice or event.
    pub invoice_date: NaiveDate,
    /// Date the record takes effect; governs locking.
    pub value_date: NaiveDate,
    /// Free-text description.
    pub description: Option<String>,
    /// External reference such as a bank reference or invoice serial.
    pub reference: Option<String>,
    /// Explicitly frozen, independent of the lock date.
    pub locked: bool,
}

impl LedgerRecord {
    /// Creates a two-leg record moving `debit.local_amount` from `credit` to `debit`.
    ///
    /// A negative amount swaps the sides, so legs always carry non-negative amounts.
    #[must_use]
    pub fn transfer(
        charge_id: ChargeId,
        debit: LedgerLeg,
        credit: LedgerLeg,
        invoice_date: NaiveDate,
        value_date: NaiveDate,
    ) -> Self {
        let (debit, credit) = if debit.local_amount < Decimal::ZERO {
            (credit.abs(), debit.abs())
        } else {
            (debit, credit)
        };
        Self {
            id: LedgerRecordId::new(),
            charge_id,
            debit_account_1: debit,
            debit_account_2: None,
            credit_account_1: credit,
            credit_account_2: None,
            invoice_date,
            value_date,
            description: None,
            reference: None,
            locked: false,
        }
    }

    /// Sets the second debit sub-account.
    #[must_use]
    pub fn with_debit_2(mut self, leg: LedgerLeg) -> Self {
        self.debit_account_2 = Some(leg);
        self
    }

    /// Sets the second credit sub-account.
    #[must_use]
    pub fn with_credit_2(mut self, leg: LedgerLeg) -> Self {
        self.credit_account_2 = Some(leg);
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the reference when one is present.
    #[must_use]
    pub fn with_reference(mut self, reference: Option<String>) -> Self {
        self.reference = reference;
        self
    }

    /// Swaps the debit and credit sides.
    #[must_use]
    pub fn reversed(self) -> Self {
        Self {
            debit_account_1: self.credit_account_1,
            debit_account_2: self.credit_account_2,
            credit_account_1: self.debit_account_1,
            credit_account_2: self.debit_account_2,
            ..self
        }
    }

    /// Iterates over the debit legs.
    pub fn debit_legs(&self) -> impl Iterator<Item = &LedgerLeg> {
        std::iter::once(&self.debit_account_1).chain(self.debit_account_2.as_ref())
    }

    /// Iterates over the credit legs.
    pub fn credit_legs(&self) -> impl Iterator<Item = &LedgerLeg> {
        std::iter::once(&self.credit_account_1).chain(self.credit_account_2.as_ref())
    }

    /// Iterates over every leg with its side.
    pub fn legs(&self) -> impl Iterator<Item = (Side, &LedgerLeg)> {
        self.debit_legs()
            .map(|leg| (Side::Debit, leg))
            .chain(self.credit_legs().map(|leg| (Side::Credit, leg)))
    }

    /// Sum of local debit amounts.
    #[must_use]
    pub fn debit_total(&self) -> Decimal {
        self.debit_legs().map(|leg| leg.local_amount).sum()
    }

    /// Sum of local credit amounts.
    #[must_use]
    pub fn credit_total(&self) -> Decimal {
        self.credit_legs().map(|leg| leg.local_amount).sum()
    }

    /// Returns true if local debits equal local credits exactly.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.debit_total() == self.credit_total()
    }

    /// Returns the signed movement of every leg: debit positive, credit negative.
    pub fn movements(&self) -> impl Iterator<Item = (FinancialEntityId, Decimal)> + '_ {
        self.legs().map(|(side, leg)| match side {
            Side::Debit => (leg.entity, leg.local_amount),
            Side::Credit => (leg.entity, -leg.local_amount),
        })
    }

    /// Returns true if both records book the same thing, ignoring identity and lock flag.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.charge_id == other.charge_id
            && self.debit_account_1 == other.debit_account_1
            && self.debit_account_2 == other.debit_account_2
            && self.credit_account_1 == other.credit_account_1
            && self.credit_account_2 == other.credit_account_2
            && self.invoice_date == other.invoice_date
            && self.value_date == other.value_date
            && self.description == other.description
            && self.reference == other.reference
    }
}
