//! HTTP gateway
//!
//! ```text
//! GET  /health
//! GET  /accounts/{account_id}
//! POST /accounts
//! GET  /accounts/{account_id}/transactions
//! POST /transactions
//! ```

pub mod handlers;
pub mod state;
pub mod types;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;

use crate::store::LedgerBackend;
use state::AppState;

/// Build the router over any ledger backend
pub fn router<S: LedgerBackend>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check::<S>))
        .route("/accounts", post(handlers::create_account::<S>))
        .route("/accounts/{account_id}", get(handlers::get_account::<S>))
        .route(
            "/accounts/{account_id}/transactions",
            get(handlers::get_history::<S>),
        )
        .route("/transactions", post(handlers::create_transfer::<S>))
        .with_state(state)
}

/// Serve until Ctrl-C
pub async fn run_server<S: LedgerBackend>(addr: &str, state: AppState<S>) -> anyhow::Result<()> {
    let app = router(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    tracing::info!("Gateway listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl-C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
