//! Ledger lock guard.
//!
//! Records whose value date falls on or before the current lock date, or that
//! are individually flagged as locked, are immutable. Every mutation entry
//! point (generation, assignment, cancellation marking) asks the guard first.

use std::fmt;

use chargebook_shared::types::LedgerRecordId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::record::LedgerRecord;

/// One version of the tenant-wide lock date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerLock {
    /// Records with a value date on or before this date are frozen.
    pub lock_date: NaiveDate,
    /// When this version was recorded.
    pub created_at: DateTime<Utc>,
}

impl LedgerLock {
    /// Returns the lock date of the newest version.
    #[must_use]
    pub fn current(versions: &[Self]) -> Option<NaiveDate> {
        versions
            .iter()
            .max_by_key(|version| version.created_at)
            .map(|version| version.lock_date)
    }
}

/// A write touched a locked ledger record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct LedgerLockError {
    /// Existing record that would have been changed.
    pub record_id: Option<LedgerRecordId>,
    /// Value date of the rejected write.
    pub value_date: NaiveDate,
    /// Lock date in force; `None` when the record itself is flagged locked.
    pub lock_date: Option<NaiveDate>,
}

impl fmt::Display for LedgerLockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subject = match self.record_id {
            Some(id) => format!("ledger record {id}"),
            None => "ledger record".to_string(),
        };
        match self.lock_date {
            Some(lock) => write!(
                f,
                "Ledger is locked through {lock}: cannot write {subject} dated {}",
                self.value_date
            ),
            None => write!(f, "Cannot write locked {subject} dated {}", self.value_date),
        }
    }
}

impl LedgerLockError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        "LEDGER_LOCKED"
    }
}

/// What a ledger replacement has to do after the lock check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplacementPlan {
    /// The proposed set books exactly what is stored; nothing is written.
    Unchanged,
    /// Delete and insert the listed records; all others stay as stored.
    Replace {
        /// Stored records to delete.
        delete: Vec<LedgerRecordId>,
        /// Proposed records to insert.
        insert: Vec<LedgerRecord>,
    },
}

/// Enforces immutability of locked ledger records.
///
/// Built per operation from the lock versions read for that operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedgerLockGuard {
    lock_date: Option<NaiveDate>,
}

impl LedgerLockGuard {
    /// Creates a guard for the given lock date (`None` means nothing is locked).
    #[must_use]
    pub const fn new(lock_date: Option<NaiveDate>) -> Self {
        Self { lock_date }
    }

    /// Creates a guard from the stored lock versions.
    #[must_use]
    pub fn from_versions(versions: &[LedgerLock]) -> Self {
        Self::new(LedgerLock::current(versions))
    }

    /// Returns the lock date in force.
    #[must_use]
    pub const fn lock_date(&self) -> Option<NaiveDate> {
        self.lock_date
    }

    /// Returns true if the date falls inside the locked period.
    #[must_use]
    pub fn is_date_locked(&self, date: NaiveDate) -> bool {
        self.lock_date.is_some_and(|lock| date <= lock)
    }

    /// Returns true if the record may not be changed.
    #[must_use]
    pub fn is_locked(&self, record: &LedgerRecord) -> bool {
        record.locked || self.is_date_locked(record.value_date)
    }

    /// Checks a new write with the given value date.
    ///
    /// # Errors
    ///
    /// Returns `LedgerLockError` if the value date is inside the locked period.
    pub fn check_write(&self, value_date: NaiveDate) -> Result<(), LedgerLockError> {
        if self.is_date_locked(value_date) {
            return Err(LedgerLockError {
                record_id: None,
                value_date,
                lock_date: self.lock_date,
            });
        }
        Ok(())
    }

    /// Checks an update or delete of an existing record.
    ///
    /// # Errors
    ///
    /// Returns `LedgerLockError` if the record is locked.
    pub fn check_record(&self, record: &LedgerRecord) -> Result<(), LedgerLockError> {
        if self.is_date_locked(record.value_date) {
            return Err(LedgerLockError {
                record_id: Some(record.id),
                value_date: record.value_date,
                lock_date: self.lock_date,
            });
        }
        if record.locked {
            return Err(LedgerLockError {
                record_id: Some(record.id),
                value_date: record.value_date,
                lock_date: None,
            });
        }
        Ok(())
    }

    /// Plans replacing a charge's stored records with a regenerated set.
    ///
    /// Records present in both sets with the same content are kept untouched,
    /// so regenerating a locked charge that did not change is not an error.
    /// Every record that would be deleted or inserted must pass the guard.
    ///
    /// # Errors
    ///
    /// Returns the first `LedgerLockError` found.
    pub fn check_replacement(
        &self,
        existing: &[LedgerRecord],
        proposed: &[LedgerRecord],
    ) -> Result<ReplacementPlan, LedgerLockError> {
        let mut unmatched: Vec<&LedgerRecord> = existing.iter().collect();
        let mut insert = Vec::new();

        for record in proposed {
            match unmatched.iter().position(|stored| stored.same_content(record)) {
                Some(index) => {
                    unmatched.swap_remove(index);
                }
                None => insert.push(record.clone()),
            }
        }

        if unmatched.is_empty() && insert.is_empty() {
            return Ok(ReplacementPlan::Unchanged);
        }

        for stored in &unmatched {
            self.check_record(stored)?;
        }
        for record in &insert {
            self.check_write(record.value_date)?;
        }

        Ok(ReplacementPlan::Replace {
            delete: unmatched.iter().map(|stored| stored.id).collect(),
            insert,
        })
    }
}
