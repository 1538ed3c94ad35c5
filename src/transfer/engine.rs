//! Transfer Engine
//!
//! One call to [`TransferEngine::transfer`] is one attempt: one unit of work,
//! committed on success and rolled back on any failure.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, error};

use super::error::TransferError;
use super::lock_order::LockPlan;
use super::types::TransferRequest;
use crate::account::AccountId;
use crate::money::within_limit;
use crate::store::{LedgerStore, StoreError, UnitOfWork, VersionStamp};

/// Sole writer of balances and transfer log entries
pub struct TransferEngine<S> {
    store: Arc<S>,
}

impl<S> Clone for TransferEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: LedgerStore> TransferEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Atomically move the request's amount from source to destination.
    ///
    /// Never retries internally. On failure nothing is written: the unit of
    /// work is rolled back, and a rollback failure is logged without masking
    /// the original error.
    pub async fn transfer(&self, request: &TransferRequest) -> Result<(), TransferError> {
        let mut unit = self.store.begin().await?;

        match apply(&mut unit, request).await {
            Ok(()) => {
                unit.commit().await.map_err(|e| {
                    error!(
                        source = %request.source(),
                        destination = %request.destination(),
                        error = %e,
                        "Failed to commit transfer"
                    );
                    TransferError::from(e)
                })?;
                debug!(
                    source = %request.source(),
                    destination = %request.destination(),
                    amount = %request.amount(),
                    "Transfer committed"
                );
                Ok(())
            }
            Err(err) => {
                if let Err(rollback_err) = unit.rollback().await {
                    error!(
                        source = %request.source(),
                        destination = %request.destination(),
                        error = %rollback_err,
                        original_error = %err,
                        "Failed to roll back transfer"
                    );
                }
                if err.is_storage_fault() {
                    error!(
                        source = %request.source(),
                        destination = %request.destination(),
                        error = %err,
                        "Transfer aborted by storage fault"
                    );
                }
                Err(err)
            }
        }
    }
}

/// Steps 2-7 of the protocol, all inside `unit`
async fn apply<U: UnitOfWork>(unit: &mut U, request: &TransferRequest) -> Result<(), TransferError> {
    let plan = LockPlan::for_transfer(request.source(), request.destination(), request.amount());

    let pair = unit
        .lock_and_read_pair(plan.first, plan.second)
        .await
        .map_err(|e| match e {
            StoreError::NotFound(account) => TransferError::AccountNotFound {
                side: plan.side_of(account),
                account,
            },
            other => other.into(),
        })?;

    let first_balance = shifted(pair.first.balance, plan.first_delta, plan.first)?;
    let second_balance = shifted(pair.second.balance, plan.second_delta, plan.second)?;

    // The storage check constraint rejects a negative result (InsufficientFunds)
    update(unit, plan.first, first_balance, pair.first.version).await?;
    update(unit, plan.second, second_balance, pair.second.version).await?;

    unit.append_transfer_record(request.source(), request.destination(), request.amount())
        .await?;

    Ok(())
}

/// New balance, or `Overflow` if it no longer fits the balance column
fn shifted(balance: Decimal, delta: Decimal, account: AccountId) -> Result<Decimal, TransferError> {
    balance
        .checked_add(delta)
        .filter(|v| within_limit(*v))
        .ok_or(TransferError::Overflow(account))
}

async fn update<U: UnitOfWork>(
    unit: &mut U,
    account: AccountId,
    new_balance: Decimal,
    expected_version: VersionStamp,
) -> Result<(), TransferError> {
    let rows = unit
        .conditional_update_balance(account, new_balance, expected_version)
        .await
        .map_err(|e| match e {
            StoreError::OutOfRange(_) => TransferError::Overflow(account),
            other => other.into(),
        })?;
    if rows == 0 {
        return Err(TransferError::ConcurrencyConflict(account));
    }
    Ok(())
}
