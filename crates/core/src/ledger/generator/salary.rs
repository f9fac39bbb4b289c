//! Payroll charges.
//!
//! Each payslip books gross salary as expense against the employee's net pay
//! and the withholdings. A batched charge pays everyone through one aggregate
//! line. Recovery-pay accrual is booked separately, pro-rated by job percentage
//! and spread over twelve months.

use std::collections::BTreeMap;

use chargebook_shared::types::FinancialEntityId;
use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;

use super::{Context, common};
use crate::charge::{RecoveryRate, SalaryRecord};
use crate::currency::{CurrencyService, LOCAL_DECIMAL_PLACES};
use crate::ledger::error::LedgerError;
use crate::ledger::record::{LedgerLeg, LedgerRecord};

/// Recovery-pay daily rate per year, resolved from versioned rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryRateTable {
    rates: BTreeMap<i32, Decimal>,
}

impl RecoveryRateTable {
    /// Builds the table; for each year the newest version wins.
    #[must_use]
    pub fn from_versions(versions: &[RecoveryRate]) -> Self {
        let mut newest: BTreeMap<i32, &RecoveryRate> = BTreeMap::new();
        for version in versions {
            newest
                .entry(version.year)
                .and_modify(|current| {
                    if version.created_at > current.created_at {
                        *current = version;
                    }
                })
                .or_insert(version);
        }
        Self {
            rates: newest
                .into_iter()
                .map(|(year, version)| (year, version.daily_rate))
                .collect(),
        }
    }

    /// Returns the daily rate for a year.
    #[must_use]
    pub fn rate_for(&self, year: i32) -> Option<Decimal> {
        self.rates.get(&year).copied()
    }
}

/// Computed figures of one payslip.
struct Payslip {
    employee_id: FinancialEntityId,
    month_end: NaiveDate,
    gross: Decimal,
    withholdings: Decimal,
    net: Decimal,
    recovery_accrual: Decimal,
}

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;
const MONTHS_PER_YEAR: Decimal = Decimal::from_parts(12, 0, 0, false, 0);

fn month_end(date: NaiveDate) -> NaiveDate {
    date.with_day(1)
        .and_then(|first| first.checked_add_months(Months::new(1)))
        .and_then(|next| next.pred_opt())
        .unwrap_or(date)
}

fn payslip(record: &SalaryRecord, rates: &RecoveryRateTable) -> Result<Payslip, LedgerError> {
    let invalid = |reason| LedgerError::InvalidSalaryRecord {
        employee_id: record.employee_id,
        reason,
    };

    if record.job_percentage < Decimal::ZERO || record.job_percentage > HUNDRED {
        return Err(invalid("job percentage must be between 0 and 100"));
    }
    let components = [
        record.base_salary,
        record.travel_and_subsistence,
        record.income_tax,
        record.social_security,
        record.pension,
    ];
    if components.iter().any(|amount| *amount < Decimal::ZERO) {
        return Err(invalid("salary components must not be negative"));
    }

    let scaled = CurrencyService::round(record.base_salary * record.job_percentage / HUNDRED, LOCAL_DECIMAL_PLACES);
    let gross = scaled + record.travel_and_subsistence;
    let withholdings = record.income_tax + record.social_security + record.pension;
    let net = gross - withholdings;
    if net < Decimal::ZERO {
        return Err(invalid("withholdings exceed gross salary"));
    }

    let recovery_accrual = match record.recovery_days_per_year {
        Some(days) => {
            let year = record.month.year();
            let daily_rate = rates
                .rate_for(year)
                .ok_or(LedgerError::MissingRecoveryRate { year })?;
            CurrencyService::round(
                days * daily_rate * record.job_percentage / HUNDRED / MONTHS_PER_YEAR,
                LOCAL_DECIMAL_PLACES,
            )
        }
        None => Decimal::ZERO,
    };

    Ok(Payslip {
        employee_id: record.employee_id,
        month_end: month_end(record.month),
        gross,
        withholdings,
        net,
        recovery_accrual,
    })
}

pub(super) fn generate(
    ctx: &Context<'_>,
    batched: bool,
    batched_employee_business_id: Option<FinancialEntityId>,
) -> Result<Vec<LedgerRecord>, LedgerError> {
    let payslips = ctx
        .input
        .salary_records
        .iter()
        .map(|record| payslip(record, ctx.input.recovery_rates))
        .collect::<Result<Vec<_>, _>>()?;

    let mut records = if batched {
        let business = batched_employee_business_id.ok_or(LedgerError::MissingCounterparty {
            charge_id: ctx.charge_id(),
        })?;
        batched_records(ctx, &payslips, business)?
    } else {
        let mut records = Vec::new();
        for slip in &payslips {
            records.extend(salary_record(ctx, slip.employee_id, slip.gross, slip.net, slip.withholdings, slip.month_end)?);
            records.extend(accrual_record(ctx, slip.recovery_accrual, slip.month_end));
        }
        records
    };

    records.extend(common::transaction_records(ctx)?);
    Ok(records)
}

fn batched_records(
    ctx: &Context<'_>,
    payslips: &[Payslip],
    business: FinancialEntityId,
) -> Result<Vec<LedgerRecord>, LedgerError> {
    let Some(month_end) = payslips.iter().map(|slip| slip.month_end).max() else {
        return Ok(Vec::new());
    };
    let gross = payslips.iter().map(|slip| slip.gross).sum();
    let net = payslips.iter().map(|slip| slip.net).sum();
    let withholdings = payslips.iter().map(|slip| slip.withholdings).sum();
    let accrual = payslips.iter().map(|slip| slip.recovery_accrual).sum();

    let mut records = Vec::new();
    records.extend(salary_record(ctx, business, gross, net, withholdings, month_end)?);
    records.extend(accrual_record(ctx, accrual, month_end));
    Ok(records)
}

fn salary_record(
    ctx: &Context<'_>,
    payee: FinancialEntityId,
    gross: Decimal,
    net: Decimal,
    withholdings: Decimal,
    month_end: NaiveDate,
) -> Result<Option<LedgerRecord>, LedgerError> {
    let accounts = &ctx.ledger.accounts;
    let record = ctx.record_from_legs(
        vec![LedgerLeg::local(accounts.salary_expense, gross)],
        vec![
            LedgerLeg::local(payee, net),
            LedgerLeg::local(accounts.salary_withholdings, withholdings),
        ],
        month_end,
        month_end,
    )?;
    Ok(record.map(|r| r.with_description(format!("Salary {}", month_end.format("%Y-%m")))))
}

fn accrual_record(ctx: &Context<'_>, accrual: Decimal, month_end: NaiveDate) -> Option<LedgerRecord> {
    if accrual.is_zero() {
        return None;
    }
    let accounts = &ctx.ledger.accounts;
    Some(
        LedgerRecord::transfer(
            ctx.charge_id(),
            LedgerLeg::local(accounts.recovery_reserve_expense, accrual),
            LedgerLeg::local(accounts.recovery_reserve_provision, accrual),
            month_end,
            month_end,
        )
        .with_description(format!("Recovery reserve {}", month_end.format("%Y-%m"))),
    )
}
