//! Transfer Error Types

use thiserror::Error;

use super::types::Side;
use crate::account::AccountId;
use crate::money::MoneyError;
use crate::store::StoreError;

/// Transfer error types
///
/// `InsufficientFunds`, `AccountNotFound` and the validation errors are
/// terminal. `ConcurrencyConflict` is transient and may be retried by the
/// caller. `StorageFault` is retried only if the caller opts in.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    // === Validation Errors ===
    #[error("Transferring to the same account is not allowed")]
    SameAccount,

    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] MoneyError),

    // === Account Errors ===
    #[error("{side} account {account} does not exist")]
    AccountNotFound { side: Side, account: AccountId },

    #[error("Insufficient balance for transaction to happen")]
    InsufficientFunds,

    #[error("Balance overflow on account {0}")]
    Overflow(AccountId),

    // === Concurrency Errors ===
    #[error("Account {0} was modified concurrently")]
    ConcurrencyConflict(AccountId),

    #[error("Transfer attempt timed out")]
    Timeout,

    // === System Errors ===
    #[error("Storage error: {0}")]
    StorageFault(String),
}

impl TransferError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::SameAccount => "SAME_ACCOUNT",
            TransferError::InvalidAmount(_) => "INVALID_AMOUNT",
            TransferError::AccountNotFound {
                side: Side::Source, ..
            } => "SOURCE_ACCOUNT_NOT_FOUND",
            TransferError::AccountNotFound {
                side: Side::Destination,
                ..
            } => "DESTINATION_ACCOUNT_NOT_FOUND",
            TransferError::InsufficientFunds => "INSUFFICIENT_BALANCE",
            TransferError::Overflow(_) => "OVERFLOW",
            TransferError::ConcurrencyConflict(_) => "CONCURRENCY_CONFLICT",
            TransferError::Timeout => "TIMEOUT",
            TransferError::StorageFault(_) => "STORAGE_FAULT",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            TransferError::SameAccount
            | TransferError::InvalidAmount(_)
            | TransferError::InsufficientFunds
            | TransferError::Overflow(_) => 400,
            TransferError::AccountNotFound { .. } => 404,
            TransferError::ConcurrencyConflict(_) => 409,
            TransferError::StorageFault(_) => 500,
            TransferError::Timeout => 504,
        }
    }

    /// Transient concurrency failure, safe to re-run unchanged
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransferError::ConcurrencyConflict(_))
    }

    /// Opaque infrastructure failure (retry is the integrator's call)
    #[inline]
    pub fn is_storage_fault(&self) -> bool {
        matches!(self, TransferError::StorageFault(_))
    }
}

/// `NotFound` is translated by the engine, which knows the side; anything
/// reaching this conversion is treated as a fault.
impl From<StoreError> for TransferError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::CheckViolation(_) => TransferError::InsufficientFunds,
            other => TransferError::StorageFault(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(TransferError::SameAccount.code(), "SAME_ACCOUNT");
        assert_eq!(
            TransferError::InsufficientFunds.code(),
            "INSUFFICIENT_BALANCE"
        );
        assert_eq!(
            TransferError::AccountNotFound {
                side: Side::Destination,
                account: AccountId::new(4)
            }
            .code(),
            "DESTINATION_ACCOUNT_NOT_FOUND"
        );
    }

    #[test]
    fn test_http_status() {
        assert_eq!(TransferError::InsufficientFunds.http_status(), 400);
        assert_eq!(
            TransferError::AccountNotFound {
                side: Side::Source,
                account: AccountId::new(1)
            }
            .http_status(),
            404
        );
        assert_eq!(
            TransferError::ConcurrencyConflict(AccountId::new(1)).http_status(),
            409
        );
        assert_eq!(TransferError::StorageFault("x".into()).http_status(), 500);
        assert_eq!(TransferError::Timeout.http_status(), 504);
    }

    #[test]
    fn test_only_conflict_is_retryable() {
        assert!(TransferError::ConcurrencyConflict(AccountId::new(1)).is_retryable());
        assert!(!TransferError::InsufficientFunds.is_retryable());
        assert!(
            !TransferError::AccountNotFound {
                side: Side::Source,
                account: AccountId::new(1)
            }
            .is_retryable()
        );
        assert!(!TransferError::StorageFault("boom".into()).is_retryable());
        assert!(!TransferError::Timeout.is_retryable());
    }

    #[test]
    fn test_store_error_mapping() {
        let err: TransferError = StoreError::CheckViolation("balance_non_negative".into()).into();
        assert_eq!(err, TransferError::InsufficientFunds);

        let err: TransferError = StoreError::Backend("connection reset".into()).into();
        assert!(err.is_storage_fault());
    }

    #[test]
    fn test_display_names_side() {
        let err = TransferError::AccountNotFound {
            side: Side::Destination,
            account: AccountId::new(4),
        };
        assert_eq!(err.to_string(), "destination account 4 does not exist");
    }
}
