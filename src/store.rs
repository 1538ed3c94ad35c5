//! Storage Boundary
//!
//! Traits the core consumes from its storage collaborator. Two backends
//! implement them: [`crate::db::PgLedger`] (PostgreSQL) and
//! [`crate::memory::MemoryLedger`] (in-process, also the test double).
//!
//! # Unit of work
//!
//! [`UnitOfWork::commit`] and [`UnitOfWork::rollback`] consume the unit, so a
//! finished unit cannot be committed or rolled back twice. Dropping a unit
//! without committing rolls it back; this covers callers that time out or
//! are cancelled mid-transfer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::account::{Account, AccountId};
use crate::money::{Amount, Balance};
use crate::transfer::TransferRecord;

/// Last-modified stamp of a balance row
pub type VersionStamp = DateTime<Utc>;

/// PostgreSQL SQLSTATE for check constraint violations
pub const CHECK_VIOLATION: &str = "23514";
/// PostgreSQL SQLSTATE for unique constraint violations
pub const UNIQUE_VIOLATION: &str = "23505";
/// PostgreSQL SQLSTATE for a value outside the column's numeric range
pub const NUMERIC_OUT_OF_RANGE: &str = "22003";

/// Name of the `balance >= 0` constraint on `account_balance`
pub const BALANCE_CHECK_CONSTRAINT: &str = "account_balance_balance_check";

/// Storage-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Account {0} has no balance row")]
    NotFound(AccountId),

    /// Non-negativity constraint on `balance` rejected the write
    #[error("Check constraint violated: {0}")]
    CheckViolation(String),

    /// Value does not fit the balance column
    #[error("Numeric value out of range: {0}")]
    OutOfRange(String),

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        e.as_database_error()
            .and_then(|db_err| {
                classify(
                    db_err.code().as_deref(),
                    db_err.constraint(),
                    db_err.message(),
                )
            })
            .unwrap_or_else(|| StoreError::Backend(e.to_string()))
    }
}

/// Typed error for the database failures callers act on; `None` for the rest.
///
/// Only the balance constraint means an overdraft. Other check constraints
/// (log amount, distinct accounts) stay opaque backend errors.
fn classify(code: Option<&str>, constraint: Option<&str>, message: &str) -> Option<StoreError> {
    match (code, constraint) {
        (Some(CHECK_VIOLATION), Some(BALANCE_CHECK_CONSTRAINT)) => {
            Some(StoreError::CheckViolation(message.to_string()))
        }
        (Some(UNIQUE_VIOLATION), _) => Some(StoreError::UniqueViolation(message.to_string())),
        (Some(NUMERIC_OUT_OF_RANGE), _) => Some(StoreError::OutOfRange(message.to_string())),
        _ => None,
    }
}

/// Balance row as observed under an exclusive lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedRow {
    pub id: AccountId,
    pub balance: Decimal,
    pub version: VersionStamp,
}

/// Both rows of a transfer, in the order they were locked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedPair {
    pub first: LockedRow,
    pub second: LockedRow,
}

/// One atomic, all-or-nothing group of storage operations
#[async_trait]
pub trait UnitOfWork: Send {
    /// Lock both rows exclusively, `first` before `second`, and read them.
    ///
    /// Fails with [`StoreError::NotFound`] naming the absent id.
    async fn lock_and_read_pair(
        &mut self,
        first: AccountId,
        second: AccountId,
    ) -> Result<LockedPair, StoreError>;

    /// Write `new_balance` only if the row's version still equals
    /// `expected_version`. Returns the number of rows affected.
    async fn conditional_update_balance(
        &mut self,
        id: AccountId,
        new_balance: Decimal,
        expected_version: VersionStamp,
    ) -> Result<u64, StoreError>;

    /// Append one immutable transfer log entry
    async fn append_transfer_record(
        &mut self,
        source: AccountId,
        destination: AccountId,
        amount: Amount,
    ) -> Result<(), StoreError>;

    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}

/// Factory for units of work
#[async_trait]
pub trait LedgerStore: Send + Sync {
    type Unit: UnitOfWork;

    async fn begin(&self) -> Result<Self::Unit, StoreError>;

    /// Liveness check for /health
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Single-row account access (no locking)
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn fetch_account(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    async fn account_exists(&self, id: AccountId) -> Result<bool, StoreError>;

    /// Insert a new row. A duplicate id surfaces as [`StoreError::UniqueViolation`].
    async fn insert_account(&self, id: AccountId, initial: Balance) -> Result<Account, StoreError>;
}

/// Read side of the transfer log
#[async_trait]
pub trait TransferLog: Send + Sync {
    /// Records touching `id`, newest first
    async fn history(&self, id: AccountId, limit: i64) -> Result<Vec<TransferRecord>, StoreError>;

    /// Sum of amounts received minus sum of amounts sent by `id`
    async fn net_flow(&self, id: AccountId) -> Result<Decimal, StoreError>;
}

/// Everything the service layer needs from one backend
pub trait LedgerBackend: LedgerStore + AccountStore + TransferLog + 'static {}

impl<T> LedgerBackend for T where T: LedgerStore + AccountStore + TransferLog + 'static {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_sqlx_error_is_backend() {
        let err: StoreError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, StoreError::Backend(_)));

        let err: StoreError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[test]
    fn test_only_balance_constraint_is_check_violation() {
        assert!(matches!(
            classify(Some(CHECK_VIOLATION), Some(BALANCE_CHECK_CONSTRAINT), "overdraft"),
            Some(StoreError::CheckViolation(_))
        ));
        assert_eq!(
            classify(Some(CHECK_VIOLATION), Some("account_transactions_amount_check"), "x"),
            None
        );
        assert_eq!(
            classify(Some(CHECK_VIOLATION), Some("account_transactions_check"), "x"),
            None
        );
        assert_eq!(classify(Some(CHECK_VIOLATION), None, "x"), None);
    }

    #[test]
    fn test_unique_and_range_codes() {
        assert!(matches!(
            classify(Some(UNIQUE_VIOLATION), Some("account_balance_pkey"), "dup"),
            Some(StoreError::UniqueViolation(_))
        ));
        assert!(matches!(
            classify(Some(NUMERIC_OUT_OF_RANGE), None, "numeric field overflow"),
            Some(StoreError::OutOfRange(_))
        ));
        assert_eq!(classify(Some("40001"), None, "serialization failure"), None);
        assert_eq!(classify(None, None, "no code"), None);
    }
}
