//! Gateway request/response types
//!
//! - `ApiResponse<T>`: unified `{code, msg, data}` envelope
//! - `ApiError`: error response carrying its HTTP status
//! - Request DTOs (strict: unknown fields rejected) and response views

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::account::{Account, AccountError, AccountId};
use crate::money::{self, Amount, Balance};
use crate::service::AccountHistory;
use crate::transfer::{TransferError, TransferRecord, TransferRequest};

/// Unified API response wrapper
///
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: payload on success, absent on error
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

/// Standard API error codes
pub mod error_codes {
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const INSUFFICIENT_BALANCE: i32 = 1002;
    pub const SAME_ACCOUNT: i32 = 1003;
    pub const INVALID_AMOUNT: i32 = 1004;
    pub const BALANCE_OVERFLOW: i32 = 1005;

    // Resource errors (4xxx)
    pub const ACCOUNT_NOT_FOUND: i32 = 4001;
    pub const SOURCE_ACCOUNT_NOT_FOUND: i32 = 4002;
    pub const DESTINATION_ACCOUNT_NOT_FOUND: i32 = 4003;
    pub const ACCOUNT_ALREADY_EXISTS: i32 = 4091;
    pub const CONCURRENCY_CONFLICT: i32 = 4092;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SERVICE_UNAVAILABLE: i32 = 5001;
    pub const TIMEOUT: i32 = 5004;
}

/// Error response: HTTP status plus envelope code and message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub msg: String,
}

pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::success(data))))
}

pub fn created<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::success(data))))
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            msg: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_codes::INVALID_PARAMETER, msg)
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            error_codes::SERVICE_UNAVAILABLE,
            msg,
        )
    }

    pub fn into_err<T>(self) -> ApiResult<T> {
        Err(self)
    }
}

fn status_of(http_status: u16) -> StatusCode {
    StatusCode::from_u16(http_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl From<AccountError> for ApiError {
    fn from(e: AccountError) -> Self {
        let code = match e {
            AccountError::NotFound(_) => error_codes::ACCOUNT_NOT_FOUND,
            AccountError::AlreadyExists(_) => error_codes::ACCOUNT_ALREADY_EXISTS,
            AccountError::StorageFault(_) => error_codes::INTERNAL_ERROR,
        };
        let msg = match &e {
            AccountError::StorageFault(detail) => {
                tracing::error!(error = %detail, "Account storage fault");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        Self::new(status_of(e.http_status()), code, msg)
    }
}

impl From<TransferError> for ApiError {
    fn from(e: TransferError) -> Self {
        use crate::transfer::Side;

        let code = match e {
            TransferError::SameAccount => error_codes::SAME_ACCOUNT,
            TransferError::InvalidAmount(_) => error_codes::INVALID_AMOUNT,
            TransferError::AccountNotFound {
                side: Side::Source, ..
            } => error_codes::SOURCE_ACCOUNT_NOT_FOUND,
            TransferError::AccountNotFound {
                side: Side::Destination,
                ..
            } => error_codes::DESTINATION_ACCOUNT_NOT_FOUND,
            TransferError::InsufficientFunds => error_codes::INSUFFICIENT_BALANCE,
            TransferError::Overflow(_) => error_codes::BALANCE_OVERFLOW,
            TransferError::ConcurrencyConflict(_) => error_codes::CONCURRENCY_CONFLICT,
            TransferError::Timeout => error_codes::TIMEOUT,
            TransferError::StorageFault(_) => error_codes::INTERNAL_ERROR,
        };
        // Storage details stay in the logs
        let msg = if e.is_storage_fault() {
            "internal error".to_string()
        } else {
            e.to_string()
        };
        Self::new(status_of(e.http_status()), code, msg)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::error(self.code, self.msg))).into_response()
    }
}

// ============================================================================
// Requests
// ============================================================================

/// POST /accounts
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateAccountRequest {
    pub account_id: i64,
    #[serde(deserialize_with = "money::deserialize_decimal")]
    pub balance: Decimal,
}

impl CreateAccountRequest {
    pub fn validate(&self) -> Result<(AccountId, Balance), ApiError> {
        let balance = Balance::new(self.balance)
            .map_err(|e| ApiError::bad_request(format!("Invalid balance: {e}")))?;
        Ok((AccountId::new(self.account_id), balance))
    }
}

/// POST /transactions
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTransferRequest {
    pub source_account_id: i64,
    pub destination_account_id: i64,
    #[serde(deserialize_with = "money::deserialize_decimal")]
    pub amount: Decimal,
}

impl CreateTransferRequest {
    pub fn validate(&self) -> Result<TransferRequest, TransferError> {
        let amount = Amount::new(self.amount)?;
        TransferRequest::new(
            AccountId::new(self.source_account_id),
            AccountId::new(self.destination_account_id),
            amount,
        )
    }
}

/// Query string for GET /accounts/{account_id}/transactions
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountView {
    pub account_id: AccountId,
    pub balance: String,
}

impl From<Account> for AccountView {
    fn from(account: Account) -> Self {
        Self {
            account_id: account.id,
            balance: account.balance.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferView {
    pub source_account_id: AccountId,
    pub destination_account_id: AccountId,
    pub amount: String,
}

impl From<TransferRequest> for TransferView {
    fn from(request: TransferRequest) -> Self {
        Self {
            source_account_id: request.source(),
            destination_account_id: request.destination(),
            amount: request.amount().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryView {
    pub account_id: AccountId,
    pub net_flow: String,
    pub transactions: Vec<TransferRecord>,
}

impl From<AccountHistory> for HistoryView {
    fn from(history: AccountHistory) -> Self {
        Self {
            account_id: history.account,
            net_flow: history.net_flow.normalize().to_string(),
            transactions: history.records,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub timestamp_ms: i64,
}
