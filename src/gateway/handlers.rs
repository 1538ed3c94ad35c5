//! HTTP handlers
//!
//! Thin adapters: parse, call [`crate::service::LedgerService`], map errors.

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
};
use chrono::Utc;

use super::state::AppState;
use super::types::{
    AccountView, ApiError, ApiResult, CreateAccountRequest, CreateTransferRequest,
    HealthResponse, HistoryQuery, HistoryView, TransferView, created, ok,
};
use crate::account::AccountId;
use crate::service::DEFAULT_HISTORY_LIMIT;
use crate::store::LedgerBackend;

fn account_path(path: Result<Path<i64>, PathRejection>) -> Result<AccountId, ApiError> {
    let Path(raw) = path.map_err(|e| ApiError::bad_request(format!("Invalid account id: {e}")))?;
    Ok(AccountId::new(raw))
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    let Json(value) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    Ok(value)
}

/// GET /accounts/{account_id}
pub async fn get_account<S: LedgerBackend>(
    State(state): State<AppState<S>>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<AccountView> {
    let id = account_path(path)?;
    let account = state.ledger.get_account(id).await?;
    ok(account.into())
}

/// POST /accounts
pub async fn create_account<S: LedgerBackend>(
    State(state): State<AppState<S>>,
    body: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> ApiResult<AccountView> {
    let (id, balance) = json_body(body)?.validate()?;
    let account = state.ledger.create_account(id, balance).await?;
    created(account.into())
}

/// POST /transactions
pub async fn create_transfer<S: LedgerBackend>(
    State(state): State<AppState<S>>,
    body: Result<Json<CreateTransferRequest>, JsonRejection>,
) -> ApiResult<TransferView> {
    let request = json_body(body)?.validate()?;
    state.ledger.transfer(request).await?;
    created(request.into())
}

/// GET /accounts/{account_id}/transactions?limit=N
pub async fn get_history<S: LedgerBackend>(
    State(state): State<AppState<S>>,
    path: Result<Path<i64>, PathRejection>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult<HistoryView> {
    let id = account_path(path)?;
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let history = state
        .ledger
        .history(id, query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
        .await?;
    ok(history.into())
}

/// GET /health
///
/// - Healthy: 200 OK + {code: 0, data: {timestamp_ms}}
/// - Unhealthy: 503 + {code: 5001, msg: "unavailable"}
pub async fn health_check<S: LedgerBackend>(
    State(state): State<AppState<S>>,
) -> ApiResult<HealthResponse> {
    if let Err(e) = state.ledger.ping().await {
        tracing::error!(error = %e, "[HEALTH] storage ping failed");
        return ApiError::service_unavailable("unavailable").into_err();
    }
    ok(HealthResponse {
        timestamp_ms: Utc::now().timestamp_millis(),
    })
}
