//! pairledger - account balance ledger
//!
//! ```text
//! ┌──────────┐    ┌───────────────┐    ┌────────────────┐    ┌──────────────┐
//! │ Gateway  │───▶│ LedgerService │───▶│ TransferEngine │───▶│  PgLedger /  │
//! │  (HTTP)  │    │ (retry, t/o)  │    │ (lock order)   │    │ MemoryLedger │
//! └──────────┘    └───────────────┘    └────────────────┘    └──────────────┘
//! ```
//!
//! Usage: `pairledger [--env <name>] [--port <port>]`

use std::sync::Arc;

use anyhow::Context;

use pairledger::config::AppConfig;
use pairledger::db::{Database, init_schema};
use pairledger::gateway::{self, state::AppState};
use pairledger::memory::MemoryLedger;
use pairledger::service::LedgerService;
use pairledger::store::LedgerBackend;

fn get_arg(names: &[&str]) -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    args.iter()
        .position(|a| names.contains(&a.as_str()))
        .and_then(|i| args.get(i + 1).cloned())
}

fn get_env() -> String {
    get_arg(&["--env", "-e"]).unwrap_or_else(|| "dev".to_string())
}

/// Get port override from command line (--port argument)
fn get_port_override() -> anyhow::Result<Option<u16>> {
    get_arg(&["--port"])
        .map(|p| p.parse::<u16>().with_context(|| format!("Invalid --port value: {p}")))
        .transpose()
}

async fn serve<S: LedgerBackend>(config: &AppConfig, addr: &str, store: S) -> anyhow::Result<()> {
    let ledger = LedgerService::from_config(Arc::new(store), &config.transfer);
    gateway::run_server(addr, AppState::new(ledger)).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let mut config = AppConfig::load(&env)?;
    if let Some(port) = get_port_override()? {
        config.gateway.port = port;
    }
    let _log_guard = pairledger::logging::init_logging(&config);

    tracing::info!("Starting pairledger in {} mode", env);
    let addr = config.gateway_addr();

    match config.postgres_url.as_deref() {
        Some(url) => {
            let db = Database::connect(url, &config.database)
                .await
                .context("Failed to connect to PostgreSQL")?;
            init_schema(db.pool()).await?;
            serve(&config, &addr, db.ledger()).await
        }
        None => {
            tracing::warn!("postgres_url not configured, balances are kept in memory only");
            serve(&config, &addr, MemoryLedger::new()).await
        }
    }
}
