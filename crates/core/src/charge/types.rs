//! Charge domain types.
//!
//! A charge groups the bank transactions and documents that describe one
//! real-world financial event. Charges are soft-closed, never deleted.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chargebook_shared::types::{
    BusinessTripId, ChargeId, CurrencyCode, DocumentId, FinancialEntityId, Money, TransactionId,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a stored enum label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind}: '{value}'")]
pub struct UnknownVariant {
    /// Name of the enum being parsed.
    pub kind: &'static str,
    /// Rejected label.
    pub value: String,
}

/// Implements `as_str`, `Display` and `FromStr` over a fixed label table.
macro_rules! labelled_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Returns the stable snake_case label used in storage and APIs.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

/// Ledger-generation algorithm a charge is booked with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeType {
    /// Ordinary income or expense.
    Common,
    /// Currency conversion between two of the owner's accounts.
    Conversion,
    /// Monthly payroll.
    Salary,
    /// Transfer between the owner's own wallets.
    InternalTransfer,
    /// Expenses of a business trip.
    BusinessTrip,
    /// Dividend distribution and its withholding tax.
    Dividend,
    /// Money moved into or out of a bank deposit.
    BankDeposit,
    /// Credit card bill settled from a bank account.
    CreditcardBank,
    /// Monthly VAT report settlement.
    MonthlyVat,
    /// Bank fees, interest and similar financial items.
    Financial,
}

labelled_enum!(ChargeType, "charge type", {
    Common => "common",
    Conversion => "conversion",
    Salary => "salary",
    InternalTransfer => "internal_transfer",
    BusinessTrip => "business_trip",
    Dividend => "dividend",
    BankDeposit => "bank_deposit",
    CreditcardBank => "creditcard_bank",
    MonthlyVat => "monthly_vat",
    Financial => "financial",
});

/// Accountant review state of a charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Not yet reviewed.
    #[default]
    Unapproved,
    /// Under review.
    Pending,
    /// Reviewed and approved; no longer a matching candidate.
    Approved,
}

labelled_enum!(ApprovalStatus, "approval status", {
    Unapproved => "unapproved",
    Pending => "pending",
    Approved => "approved",
});

/// Kind of account a transaction was recorded on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// Bank checking account.
    BankAccount,
    /// Credit card.
    CreditCard,
    /// Digital or crypto wallet.
    Wallet,
}

labelled_enum!(AccountType, "account type", {
    BankAccount => "bank_account",
    CreditCard => "credit_card",
    Wallet => "wallet",
});

/// Document type as recognised by the document pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Tax invoice.
    Invoice,
    /// Receipt for a payment.
    Receipt,
    /// Combined invoice and receipt.
    InvoiceReceipt,
    /// Credit note reversing an invoice.
    CreditInvoice,
    /// Proforma invoice; never booked.
    Proforma,
    /// Anything else.
    Other,
    /// Not yet processed by OCR.
    Unprocessed,
}

labelled_enum!(DocumentType, "document type", {
    Invoice => "invoice",
    Receipt => "receipt",
    InvoiceReceipt => "invoice_receipt",
    CreditInvoice => "credit_invoice",
    Proforma => "proforma",
    Other => "other",
    Unprocessed => "unprocessed",
});

impl DocumentType {
    /// Returns true for documents that carry tax-invoice weight.
    #[must_use]
    pub const fn is_invoice(self) -> bool {
        matches!(self, Self::Invoice | Self::InvoiceReceipt | Self::CreditInvoice)
    }

    /// Returns true if a document of this type is booked.
    ///
    /// Receipts only stand in for an invoice when the charge has none.
    #[must_use]
    pub const fn is_bookable(self, charge_has_invoice: bool) -> bool {
        match self {
            Self::Invoice | Self::InvoiceReceipt | Self::CreditInvoice => true,
            Self::Receipt => !charge_has_invoice,
            Self::Proforma | Self::Other | Self::Unprocessed => false,
        }
    }
}

/// Expense category of a business-trip transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessTripCategory {
    /// Hotels and lodging.
    Accommodation,
    /// Flights.
    Flight,
    /// Daily travel and subsistence allowance.
    TravelAndSubsistence,
    /// Car rental.
    CarRental,
    /// Any other trip expense.
    Other,
}

labelled_enum!(BusinessTripCategory, "business trip category", {
    Accommodation => "accommodation",
    Flight => "flight",
    TravelAndSubsistence => "travel_and_subsistence",
    CarRental => "car_rental",
    Other => "other",
});

/// Figures derived from a charge's transactions and documents.
///
/// Recomputed whenever the charge gains or loses an item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeSummary {
    /// Common currency of the charge's items, when there is exactly one.
    pub currency: Option<CurrencyCode>,
    /// Signed total in `currency`.
    pub total_amount: Option<Decimal>,
    /// Earliest transaction event date.
    pub min_event_date: Option<NaiveDate>,
    /// Earliest transaction effective date.
    pub min_debit_date: Option<NaiveDate>,
    /// Earliest document date.
    pub min_documents_date: Option<NaiveDate>,
    /// The single counterparty business, if unambiguous.
    pub counterparty_id: Option<FinancialEntityId>,
}

/// A charge and its classification attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Charge {
    /// Charge ID.
    pub id: ChargeId,
    /// Type assigned by the last classification run.
    pub charge_type: Option<ChargeType>,
    /// Businesses taking part in this charge.
    pub business_ids: BTreeSet<FinancialEntityId>,
    /// Charge is a currency conversion.
    pub is_conversion: bool,
    /// Charge is a payroll charge.
    pub is_salary: bool,
    /// Charge relates to property.
    pub is_property: bool,
    /// Business trip this charge belongs to.
    pub business_trip_id: Option<BusinessTripId>,
    /// Charge is a dividend distribution.
    pub is_dividend: bool,
    /// Charge moves money to or from a bank deposit.
    pub is_bank_deposit: bool,
    /// Charge settles a credit card bill.
    pub is_creditcard_bank: bool,
    /// Charge settles a monthly VAT report.
    pub is_monthly_vat: bool,
    /// Charge is a bank fee, interest or similar.
    pub is_financial: bool,
    /// Income or expense category the charge is booked to.
    pub tax_category_id: Option<FinancialEntityId>,
    /// Free-text description entered by the user.
    pub user_description: Option<String>,
    /// Derived figures.
    pub summary: ChargeSummary,
    /// Accountant review state.
    pub accountant_approval_status: ApprovalStatus,
    /// When the charge was soft-closed.
    pub closed_at: Option<DateTime<Utc>>,
}

impl Charge {
    /// Creates an open charge with no flags set.
    #[must_use]
    pub fn new(id: ChargeId) -> Self {
        Self {
            id,
            charge_type: None,
            business_ids: BTreeSet::new(),
            is_conversion: false,
            is_salary: false,
            is_property: false,
            business_trip_id: None,
            is_dividend: false,
            is_bank_deposit: false,
            is_creditcard_bank: false,
            is_monthly_vat: false,
            is_financial: false,
            tax_category_id: None,
            user_description: None,
            summary: ChargeSummary::default(),
            accountant_approval_status: ApprovalStatus::Unapproved,
            closed_at: None,
        }
    }

    /// Returns true if the charge may still receive matched items.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.closed_at.is_none() && self.accountant_approval_status != ApprovalStatus::Approved
    }
}

/// A bank, card or wallet transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction ID.
    pub id: TransactionId,
    /// Owning charge, if assigned.
    pub charge_id: Option<ChargeId>,
    /// Ledger entity of the account the transaction was recorded on.
    pub account_id: FinancialEntityId,
    /// Kind of that account.
    pub account_type: AccountType,
    /// Counterparty business.
    pub business_id: Option<FinancialEntityId>,
    /// Transaction currency.
    pub currency: CurrencyCode,
    /// Signed amount; positive means money in.
    pub amount: Decimal,
    /// Date the transaction happened.
    pub event_date: NaiveDate,
    /// Date the account was debited.
    pub debit_date: Option<NaiveDate>,
    /// Manually corrected debit date.
    pub debit_date_override: Option<NaiveDate>,
    /// Exact settlement time reported by the bank.
    pub debit_timestamp: Option<DateTime<Utc>>,
    /// Description from the bank statement.
    pub source_description: Option<String>,
    /// Bank reference.
    pub reference_key: Option<String>,
    /// Category when the transaction belongs to a business trip.
    pub business_trip_category: Option<BusinessTripCategory>,
}

impl Transaction {
    /// Returns the signed amount as money.
    #[must_use]
    pub const fn money(&self) -> Money {
        Money::new(self.amount, self.currency)
    }
}

/// An invoice, receipt or other document, as read by OCR.
///
/// Everything except the id and type may be missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Document ID.
    pub id: DocumentId,
    /// Owning charge, if assigned.
    pub charge_id: Option<ChargeId>,
    /// Document type.
    pub document_type: DocumentType,
    /// Issue date.
    pub date: Option<NaiveDate>,
    /// Business that owes the amount.
    pub debtor_id: Option<FinancialEntityId>,
    /// Business that is owed the amount.
    pub creditor_id: Option<FinancialEntityId>,
    /// VAT part of the total.
    pub vat_amount: Option<Decimal>,
    /// Total including VAT.
    pub total_amount: Option<Decimal>,
    /// Currency code as printed; may be malformed.
    pub currency_code: Option<String>,
    /// Document serial number.
    pub serial_number: Option<String>,
}

impl Document {
    /// Returns the parsed currency, or `None` if missing or malformed.
    #[must_use]
    pub fn currency(&self) -> Option<CurrencyCode> {
        self.currency_code
            .as_deref()
            .and_then(|code| CurrencyCode::parse(code).ok())
    }

    /// Returns the business on the other side of the document from `owner`.
    #[must_use]
    pub fn counterparty(&self, owner: FinancialEntityId) -> Option<FinancialEntityId> {
        match (self.debtor_id, self.creditor_id) {
            (Some(debtor), Some(creditor)) if creditor == owner => Some(debtor),
            (Some(debtor), Some(creditor)) if debtor == owner => Some(creditor),
            (Some(debtor), None) if debtor != owner => Some(debtor),
            (None, Some(creditor)) if creditor != owner => Some(creditor),
            _ => None,
        }
    }
}

/// One employee's payslip for a month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryRecord {
    /// Salary charge this payslip is paid by.
    pub charge_id: ChargeId,
    /// Employee business.
    pub employee_id: FinancialEntityId,
    /// Any date within the salary month.
    pub month: NaiveDate,
    /// Full-time base salary.
    pub base_salary: Decimal,
    /// Job percentage, 0 to 100.
    pub job_percentage: Decimal,
    /// Travel and subsistence supplement.
    pub travel_and_subsistence: Decimal,
    /// Income tax withheld.
    pub income_tax: Decimal,
    /// Social security withheld.
    pub social_security: Decimal,
    /// Pension withheld.
    pub pension: Decimal,
    /// Recovery days the employee is entitled to this year.
    pub recovery_days_per_year: Option<Decimal>,
}

/// Whether a VAT report line is income or expense VAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VatRecordKind {
    /// Output VAT on income.
    Income,
    /// Input VAT on expenses.
    Expense,
}

labelled_enum!(VatRecordKind, "VAT record kind", {
    Income => "income",
    Expense => "expense",
});

/// A precomputed line of the monthly VAT report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VatReportRecord {
    /// Monthly VAT charge this line is settled by.
    pub charge_id: ChargeId,
    /// Source document.
    pub document_id: DocumentId,
    /// Income or expense line.
    pub kind: VatRecordKind,
    /// Deductible VAT in local currency.
    pub local_vat_after_deduction: Decimal,
    /// VAT to add, rounded to whole local units.
    pub rounded_vat_to_add: Decimal,
}

/// One version of the recovery-pay daily rate for a year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryRate {
    /// Calendar year the rate applies to.
    pub year: i32,
    /// Daily recovery pay.
    pub daily_rate: Decimal,
    /// When this version was recorded.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_charge_type_labels_round_trip() {
        for charge_type in ChargeType::ALL {
            assert_eq!(charge_type.as_str().parse::<ChargeType>(), Ok(*charge_type));
        }
        assert_eq!(ChargeType::ALL.len(), 10);
    }

    #[test]
    fn test_unknown_label_is_rejected() {
        let err = "payroll".parse::<ChargeType>().unwrap_err();
        assert_eq!(err.kind, "charge type");
        assert_eq!(err.to_string(), "Unknown charge type: 'payroll'");
    }

    #[test]
    fn test_serde_matches_labels() {
        let json = serde_json::to_string(&ChargeType::InternalTransfer).unwrap();
        assert_eq!(json, "\"internal_transfer\"");
    }

    #[rstest]
    #[case(DocumentType::Invoice, false, true)]
    #[case(DocumentType::Invoice, true, true)]
    #[case(DocumentType::CreditInvoice, true, true)]
    #[case(DocumentType::Receipt, false, true)]
    #[case(DocumentType::Receipt, true, false)]
    #[case(DocumentType::Proforma, false, false)]
    #[case(DocumentType::Unprocessed, false, false)]
    fn test_bookable_documents(
        #[case] document_type: DocumentType,
        #[case] has_invoice: bool,
        #[case] expected: bool,
    ) {
        assert_eq!(document_type.is_bookable(has_invoice), expected);
    }

    fn document(debtor: Option<FinancialEntityId>, creditor: Option<FinancialEntityId>) -> Document {
        Document {
            id: DocumentId::new(),
            charge_id: None,
            document_type: DocumentType::Invoice,
            date: None,
            debtor_id: debtor,
            creditor_id: creditor,
            vat_amount: None,
            total_amount: None,
            currency_code: Some(" usd ".to_string()),
            serial_number: None,
        }
    }

    #[test]
    fn test_document_counterparty() {
        let owner = FinancialEntityId::new();
        let client = FinancialEntityId::new();

        assert_eq!(document(Some(client), Some(owner)).counterparty(owner), Some(client));
        assert_eq!(document(Some(owner), Some(client)).counterparty(owner), Some(client));
        assert_eq!(document(None, Some(client)).counterparty(owner), Some(client));
        assert_eq!(document(None, Some(owner)).counterparty(owner), None);
        assert_eq!(document(None, None).counterparty(owner), None);
    }

    #[test]
    fn test_document_currency_is_lenient() {
        let mut doc = document(None, None);
        assert_eq!(doc.currency(), Some(CurrencyCode::USD));
        doc.currency_code = Some("dollars".to_string());
        assert_eq!(doc.currency(), None);
    }

    #[test]
    fn test_open_charge() {
        let mut charge = Charge::new(ChargeId::new());
        assert!(charge.is_open());
        charge.accountant_approval_status = ApprovalStatus::Approved;
        assert!(!charge.is_open());
        charge.accountant_approval_status = ApprovalStatus::Pending;
        charge.closed_at = Some(Utc::now());
        assert!(!charge.is_open());
    }
}
