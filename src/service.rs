//! Ledger Service
//!
//! Integrating layer over one storage backend. Transfers go through:
//!
//! 1. request validation (done by [`TransferRequest::new`] and [`crate::money::Amount`])
//! 2. destination then source existence check
//! 3. [`TransferEngine::transfer`] under [`RetryPolicy::run`], each attempt
//!    bounded by a timeout
//!
//! A timed-out attempt is dropped, which drops its unit of work and rolls
//! it back.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::account::{Account, AccountError, AccountId, AccountService};
use crate::config::TransferConfig;
use crate::money::Balance;
use crate::store::{LedgerBackend, StoreError};
use crate::transfer::{RetryPolicy, Side, TransferEngine, TransferError, TransferRecord, TransferRequest};

pub const DEFAULT_HISTORY_LIMIT: i64 = 50;
pub const MAX_HISTORY_LIMIT: i64 = 1000;

/// Transfer log slice for one account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountHistory {
    pub account: AccountId,
    /// Received minus sent over the whole log
    pub net_flow: Decimal,
    /// Newest first
    pub records: Vec<TransferRecord>,
}

pub struct LedgerService<S> {
    store: Arc<S>,
    accounts: AccountService<S>,
    engine: TransferEngine<S>,
    retry: RetryPolicy,
    attempt_timeout: Duration,
}

impl<S> Clone for LedgerService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            accounts: self.accounts.clone(),
            engine: self.engine.clone(),
            retry: self.retry,
            attempt_timeout: self.attempt_timeout,
        }
    }
}

impl<S: LedgerBackend> LedgerService<S> {
    pub fn new(store: Arc<S>, retry: RetryPolicy, attempt_timeout: Duration) -> Self {
        Self {
            accounts: AccountService::new(Arc::clone(&store)),
            engine: TransferEngine::new(Arc::clone(&store)),
            store,
            retry,
            attempt_timeout,
        }
    }

    pub fn from_config(store: Arc<S>, config: &TransferConfig) -> Self {
        Self::new(store, config.retry_policy(), config.attempt_timeout())
    }

    pub fn accounts(&self) -> &AccountService<S> {
        &self.accounts
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Account, AccountError> {
        self.accounts.get_account(id).await
    }

    pub async fn create_account(
        &self,
        id: AccountId,
        initial: Balance,
    ) -> Result<Account, AccountError> {
        self.accounts.create_account(id, initial).await
    }

    /// Move funds with bounded retry of transient failures
    pub async fn transfer(&self, request: TransferRequest) -> Result<(), TransferError> {
        self.ensure_exists(request.destination(), Side::Destination).await?;
        self.ensure_exists(request.source(), Side::Source).await?;

        let engine = &self.engine;
        let timeout = self.attempt_timeout;
        let result = self
            .retry
            .run(|_attempt| async move {
                match tokio::time::timeout(timeout, engine.transfer(&request)).await {
                    Ok(result) => result,
                    Err(_) => Err(TransferError::Timeout),
                }
            })
            .await;

        match &result {
            Ok(()) => info!(
                source = %request.source(),
                destination = %request.destination(),
                amount = %request.amount(),
                "Transfer completed"
            ),
            Err(e) => warn!(
                source = %request.source(),
                destination = %request.destination(),
                amount = %request.amount(),
                error = %e,
                code = e.code(),
                "Transfer failed"
            ),
        }
        result
    }

    /// Newest-first log entries touching `id`, plus its net flow
    pub async fn history(&self, id: AccountId, limit: i64) -> Result<AccountHistory, AccountError> {
        if !self.accounts.exists(id).await? {
            return Err(AccountError::NotFound(id));
        }
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);
        let records = self.store.history(id, limit).await?;
        let net_flow = self.store.net_flow(id).await?;
        Ok(AccountHistory {
            account: id,
            net_flow,
            records,
        })
    }

    /// Storage liveness
    pub async fn ping(&self) -> Result<(), StoreError> {
        self.store.ping().await
    }

    async fn ensure_exists(&self, account: AccountId, side: Side) -> Result<(), TransferError> {
        match self.store.account_exists(account).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(TransferError::AccountNotFound { side, account }),
            Err(e) => Err(TransferError::StorageFault(e.to_string())),
        }
    }
}
