//! Application configuration management.
//!
//! Besides server and database settings this holds every tuning constant of the
//! reconciliation core: the chart of ledger accounts the generator books to, the
//! dividend and salary business identifiers, and the matcher's weights and
//! thresholds. Nothing in the core reads these from ambient state; they are
//! passed in explicitly.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::types::{CurrencyCode, FinancialEntityId};

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Ledger generation configuration.
    pub ledger: LedgerConfig,
    /// Dividend partitioning configuration.
    #[serde(default)]
    pub dividend: DividendConfig,
    /// Salary batching configuration.
    #[serde(default)]
    pub salary: SalaryConfig,
    /// Charge matcher tuning.
    #[serde(default)]
    pub matching: MatchingConfig,
    /// Balance cancellation tuning.
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    /// Engine runtime limits.
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Tenant-wide ledger settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// The tenant's local (functional) currency.
    #[serde(default = "default_local_currency")]
    pub local_currency: CurrencyCode,
    /// The business that owns these books. Documents are income when it is the
    /// creditor and expense when it is the debtor.
    pub owner_id: FinancialEntityId,
    /// Businesses that represent the owner's own wallets and bank accounts.
    #[serde(default)]
    pub internal_wallet_ids: Vec<FinancialEntityId>,
    /// Accounts the generator books reconciling entries to.
    pub accounts: LedgerAccounts,
}

fn default_local_currency() -> CurrencyCode {
    CurrencyCode::ILS
}

/// Ledger accounts used by the per-charge-type generators.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerAccounts {
    /// Realized exchange-rate gains and losses.
    pub exchange_rates: FinancialEntityId,
    /// Deductible input VAT.
    pub input_vat: FinancialEntityId,
    /// Output VAT collected on income.
    pub output_vat: FinancialEntityId,
    /// The VAT authority.
    pub vat_authority: FinancialEntityId,
    /// Clearing account for transfers between internal wallets.
    pub internal_transfer: FinancialEntityId,
    /// Bank deposits.
    pub bank_deposit: FinancialEntityId,
    /// Dividends declared and payable to shareholders.
    pub dividend_payable: FinancialEntityId,
    /// Salary expense.
    pub salary_expense: FinancialEntityId,
    /// Income tax, social security and pension withheld from salaries.
    pub salary_withholdings: FinancialEntityId,
    /// Recovery-reserve expense.
    pub recovery_reserve_expense: FinancialEntityId,
    /// Recovery-reserve provision (liability).
    pub recovery_reserve_provision: FinancialEntityId,
    /// Per-category accounts for business trip expenses.
    #[serde(default)]
    pub business_trip: BusinessTripAccounts,
}

/// Business trip expense accounts, one per category.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BusinessTripAccounts {
    /// Hotels and other lodging.
    pub accommodation: Option<FinancialEntityId>,
    /// Flights.
    pub flight: Option<FinancialEntityId>,
    /// Per-diem travel and subsistence.
    pub travel_and_subsistence: Option<FinancialEntityId>,
    /// Car rental.
    pub car_rental: Option<FinancialEntityId>,
    /// Anything else.
    pub other: Option<FinancialEntityId>,
}

/// Business identifiers that partition dividend charges.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DividendConfig {
    /// The tax authority receiving withholding tax on dividends.
    pub withholding_tax_business_id: Option<FinancialEntityId>,
    /// Shareholders receiving dividend payments.
    #[serde(default)]
    pub payment_business_ids: Vec<FinancialEntityId>,
}

/// Salary batching configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SalaryConfig {
    /// Reserved business standing in for "all employees" on batched charges.
    pub batched_employee_business_id: Option<FinancialEntityId>,
    /// Description markers that flag a charge as batched.
    #[serde(default = "default_batch_keywords")]
    pub batch_keywords: Vec<String>,
}

fn default_batch_keywords() -> Vec<String> {
    vec!["batched".to_string(), "מרוכז".to_string()]
}

impl Default for SalaryConfig {
    fn default() -> Self {
        Self {
            batched_employee_business_id: None,
            batch_keywords: default_batch_keywords(),
        }
    }
}

/// Weights of the component scores in the overall match confidence.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MatchWeights {
    /// Weight of the business score.
    pub business: Decimal,
    /// Weight of the currency score.
    pub currency: Decimal,
    /// Weight of the amount score.
    pub amount: Decimal,
}

impl MatchWeights {
    /// Returns the sum of all weights.
    #[must_use]
    pub fn sum(&self) -> Decimal {
        self.business + self.currency + self.amount
    }
}

impl Default for MatchWeights {
    fn default() -> Self {
        let third = Decimal::ONE / Decimal::from(3);
        Self {
            business: third,
            currency: third,
            amount: third,
        }
    }
}

/// Charge matcher tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Component weights.
    pub weights: MatchWeights,
    /// Minimum overall score for a candidate to be offered for manual review.
    pub review_floor: Decimal,
    /// The top candidate must score strictly above this to be auto-assigned.
    pub auto_assign_threshold: Decimal,
    /// The runner-up must trail the top candidate by more than this.
    pub ambiguity_margin: Decimal,
    /// Absolute difference treated as an exact amount match.
    pub amount_epsilon: Decimal,
    /// Relative difference beyond which amounts score zero.
    pub amount_tolerance: Decimal,
    /// Maximum number of ranked matches returned for one charge.
    pub max_results: usize,
    /// Candidates further apart than this (in days) are not considered.
    pub max_date_distance_days: i64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            weights: MatchWeights::default(),
            review_floor: Decimal::new(5, 1),
            auto_assign_threshold: Decimal::new(9, 1),
            ambiguity_margin: Decimal::new(5, 2),
            amount_epsilon: Decimal::new(1, 2),
            amount_tolerance: Decimal::new(5, 2),
            max_results: 10,
            max_date_distance_days: 365,
        }
    }
}

impl MatchingConfig {
    /// Validates weights and thresholds.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` describing the first inconsistency found.
    pub fn validate(&self) -> AppResult<()> {
        let weights = &self.weights;
        if [weights.business, weights.currency, weights.amount]
            .iter()
            .any(|w| w.is_sign_negative() && !w.is_zero())
        {
            return Err(AppError::Validation(
                "matching weights must not be negative".to_string(),
            ));
        }
        if (weights.sum() - Decimal::ONE).abs() > Decimal::new(1, 6) {
            return Err(AppError::Validation(format!(
                "matching weights must sum to 1, got {}",
                weights.sum()
            )));
        }
        let unit = Decimal::ZERO..=Decimal::ONE;
        if !unit.contains(&self.review_floor) || !unit.contains(&self.auto_assign_threshold) {
            return Err(AppError::Validation(
                "matching thresholds must lie in [0, 1]".to_string(),
            ));
        }
        if self.auto_assign_threshold <= self.review_floor {
            return Err(AppError::Validation(
                "auto-assign threshold must be stricter than the review floor".to_string(),
            ));
        }
        if self.ambiguity_margin < Decimal::ZERO
            || self.amount_epsilon < Decimal::ZERO
            || self.amount_tolerance <= Decimal::ZERO
        {
            return Err(AppError::Validation(
                "matching margins and tolerances must be positive".to_string(),
            ));
        }
        if self.max_date_distance_days < 0 {
            return Err(AppError::Validation(
                "max_date_distance_days must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Balance cancellation tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// Residual (in local currency) still treated as fully settled.
    pub tolerance: Decimal,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            tolerance: Decimal::new(1, 2),
        }
    }
}

/// Engine runtime limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound for every store lookup, in milliseconds.
    pub lookup_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lookup_timeout_ms: 5_000,
        }
    }
}

impl EngineConfig {
    /// Returns the lookup timeout as a `Duration`.
    #[must_use]
    pub const fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or fails validation.
    pub fn load() -> AppResult<Self> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("CHARGEBOOK")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("ledger.internal_wallet_ids")
                    .with_list_parse_key("dividend.payment_business_ids")
                    .with_list_parse_key("salary.batch_keywords")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validates cross-field invariants that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` on the first violated invariant.
    pub fn validate(&self) -> AppResult<()> {
        self.matching.validate()?;
        if self.reconciliation.tolerance < Decimal::ZERO {
            return Err(AppError::Validation(
                "reconciliation tolerance must not be negative".to_string(),
            ));
        }
        if self.engine.lookup_timeout_ms == 0 {
            return Err(AppError::Validation(
                "engine lookup timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
