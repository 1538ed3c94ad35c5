//! Account Error Types

use thiserror::Error;

use super::models::AccountId;
use crate::store::StoreError;

/// Errors surfaced by [`super::AccountService`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("Account {0} does not exist")]
    NotFound(AccountId),

    #[error("Account {0} already exists")]
    AlreadyExists(AccountId),

    #[error("Storage error: {0}")]
    StorageFault(String),
}

impl AccountError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            AccountError::NotFound(_) => "ACCOUNT_NOT_FOUND",
            AccountError::AlreadyExists(_) => "ACCOUNT_ALREADY_EXISTS",
            AccountError::StorageFault(_) => "STORAGE_FAULT",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            AccountError::NotFound(_) => 404,
            AccountError::AlreadyExists(_) => 409,
            AccountError::StorageFault(_) => 500,
        }
    }
}

/// Unique violations are not mapped here: only the create path knows which
/// id collided, so it translates them to [`AccountError::AlreadyExists`].
impl From<StoreError> for AccountError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => AccountError::NotFound(id),
            other => AccountError::StorageFault(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_and_status() {
        let id = AccountId::new(9);
        assert_eq!(AccountError::NotFound(id).code(), "ACCOUNT_NOT_FOUND");
        assert_eq!(AccountError::NotFound(id).http_status(), 404);
        assert_eq!(AccountError::AlreadyExists(id).http_status(), 409);
        assert_eq!(AccountError::StorageFault("x".into()).http_status(), 500);
    }

    #[test]
    fn test_display() {
        let err = AccountError::AlreadyExists(AccountId::new(3));
        assert_eq!(err.to_string(), "Account 3 already exists");
    }
}
