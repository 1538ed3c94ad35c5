//! Account Service
//!
//! Lookup and creation of accounts. Creation is check-then-insert; the
//! primary key settles the race between two concurrent creators.

use std::sync::Arc;

use tracing::{info, warn};

use super::error::AccountError;
use super::models::{Account, AccountId};
use crate::money::Balance;
use crate::store::{AccountStore, StoreError};

pub struct AccountService<S> {
    store: Arc<S>,
}

impl<S> Clone for AccountService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: AccountStore> AccountService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Current committed balance of `id`
    pub async fn get_account(&self, id: AccountId) -> Result<Account, AccountError> {
        self.store
            .fetch_account(id)
            .await?
            .ok_or(AccountError::NotFound(id))
    }

    pub async fn exists(&self, id: AccountId) -> Result<bool, AccountError> {
        Ok(self.store.account_exists(id).await?)
    }

    /// Create an account holding `initial`
    pub async fn create_account(
        &self,
        id: AccountId,
        initial: Balance,
    ) -> Result<Account, AccountError> {
        if self.store.account_exists(id).await? {
            return Err(AccountError::AlreadyExists(id));
        }

        match self.store.insert_account(id, initial).await {
            Ok(account) => {
                info!(account_id = %id, balance = %initial, "Account created");
                Ok(account)
            }
            Err(StoreError::UniqueViolation(detail)) => {
                warn!(account_id = %id, %detail, "Lost account creation race");
                Err(AccountError::AlreadyExists(id))
            }
            Err(e) => Err(e.into()),
        }
    }
}
