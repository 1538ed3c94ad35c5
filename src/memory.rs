//! In-memory ledger backend
//!
//! Implements the storage traits with the same guarantees the PostgreSQL
//! backend gets from the database:
//!
//! - per-row exclusive locks (`tokio::sync::Mutex`) held until the unit of
//!   work commits, rolls back, or is dropped
//! - writes staged inside the unit and published atomically at commit
//! - unlocked reads see only committed state
//! - `balance >= 0` enforced as a check constraint
//! - balances bounded by the `NUMERIC(20,4)` range
//! - strictly increasing version stamps
//!
//! Used when no PostgreSQL URL is configured and as the test double.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use rust_decimal::Decimal;
use tokio::sync::OwnedMutexGuard;

use crate::account::{Account, AccountId};
use crate::money::{Amount, Balance, within_limit};
use crate::store::{
    AccountStore, BALANCE_CHECK_CONSTRAINT, LedgerStore, LockedPair, LockedRow, StoreError,
    TransferLog, UnitOfWork, VersionStamp,
};
use crate::transfer::TransferRecord;

#[derive(Debug, Clone, Copy)]
struct RowState {
    balance: Decimal,
    version: VersionStamp,
}

struct RowSlot {
    lock: Arc<tokio::sync::Mutex<()>>,
    state: Mutex<RowState>,
}

struct Inner {
    rows: RwLock<HashMap<AccountId, Arc<RowSlot>>>,
    log: RwLock<Vec<TransferRecord>>,
    /// Held for writing while a commit publishes, for reading by snapshots
    commit_gate: RwLock<()>,
    last_stamp: Mutex<VersionStamp>,
    next_record_id: AtomicI64,
    stale_injections: AtomicUsize,
}

impl Inner {
    fn slot(&self, id: AccountId) -> Option<Arc<RowSlot>> {
        read(&self.rows).get(&id).cloned()
    }

    fn next_stamp(&self) -> VersionStamp {
        let mut last = lock(&self.last_stamp);
        let now = Utc::now();
        let stamp = if now > *last {
            now
        } else {
            *last + TimeDelta::microseconds(1)
        };
        *last = stamp;
        stamp
    }

    fn take_stale_injection(&self) -> bool {
        self.stale_injections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// In-process ledger
#[derive(Clone)]
pub struct MemoryLedger {
    inner: Arc<Inner>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                rows: RwLock::new(HashMap::new()),
                log: RwLock::new(Vec::new()),
                commit_gate: RwLock::new(()),
                last_stamp: Mutex::new(VersionStamp::MIN_UTC),
                next_record_id: AtomicI64::new(1),
                stale_injections: AtomicUsize::new(0),
            }),
        }
    }

    /// Make the next `n` conditional balance updates miss, as if another
    /// writer had bumped the version in between.
    pub fn inject_stale_version(&self, n: usize) {
        self.inner.stale_injections.fetch_add(n, Ordering::SeqCst);
    }

    /// Committed balances of every account
    pub fn balances(&self) -> BTreeMap<AccountId, Decimal> {
        let _gate = read(&self.inner.commit_gate);
        read(&self.inner.rows)
            .iter()
            .map(|(id, slot)| (*id, lock(&slot.state).balance))
            .collect()
    }

    /// Full transfer log, oldest first
    pub fn records(&self) -> Vec<TransferRecord> {
        let _gate = read(&self.inner.commit_gate);
        read(&self.inner.log).clone()
    }
}

/// Unit of work over [`MemoryLedger`]
///
/// Dropping it releases its row locks and discards staged writes.
pub struct MemoryUnit {
    inner: Arc<Inner>,
    locked: Vec<(AccountId, Arc<RowSlot>, OwnedMutexGuard<()>)>,
    staged: HashMap<AccountId, RowState>,
    pending: Vec<(AccountId, AccountId, Amount)>,
}

impl MemoryUnit {
    fn locked_slot(&self, id: AccountId) -> Option<&Arc<RowSlot>> {
        self.locked
            .iter()
            .find(|(locked_id, _, _)| *locked_id == id)
            .map(|(_, slot, _)| slot)
    }

    fn locked_row(&self, id: AccountId) -> Result<LockedRow, StoreError> {
        let slot = self.locked_slot(id).ok_or(StoreError::NotFound(id))?;
        let state = match self.staged.get(&id) {
            Some(state) => *state,
            None => *lock(&slot.state),
        };
        Ok(LockedRow {
            id,
            balance: state.balance,
            version: state.version,
        })
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnit {
    async fn lock_and_read_pair(
        &mut self,
        first: AccountId,
        second: AccountId,
    ) -> Result<LockedPair, StoreError> {
        if first == second {
            return Err(StoreError::Backend(format!(
                "cannot lock account {first} twice"
            )));
        }

        for id in [first, second] {
            if self.locked_slot(id).is_some() {
                continue;
            }
            let slot = self.inner.slot(id).ok_or(StoreError::NotFound(id))?;
            let guard = Arc::clone(&slot.lock).lock_owned().await;
            self.locked.push((id, slot, guard));
        }

        Ok(LockedPair {
            first: self.locked_row(first)?,
            second: self.locked_row(second)?,
        })
    }

    async fn conditional_update_balance(
        &mut self,
        id: AccountId,
        new_balance: Decimal,
        expected_version: VersionStamp,
    ) -> Result<u64, StoreError> {
        if self.locked_slot(id).is_none() {
            return Err(StoreError::Backend(format!(
                "account {id} is not locked by this unit of work"
            )));
        }

        let current = self.locked_row(id)?;
        if self.inner.take_stale_injection() || current.version != expected_version {
            return Ok(0);
        }
        if new_balance < Decimal::ZERO {
            return Err(StoreError::CheckViolation(BALANCE_CHECK_CONSTRAINT.to_string()));
        }
        if !within_limit(new_balance) {
            return Err(StoreError::OutOfRange(format!(
                "balance {new_balance} of account {id}"
            )));
        }

        let version = self.inner.next_stamp();
        self.staged.insert(
            id,
            RowState {
                balance: new_balance,
                version,
            },
        );
        Ok(1)
    }

    async fn append_transfer_record(
        &mut self,
        source: AccountId,
        destination: AccountId,
        amount: Amount,
    ) -> Result<(), StoreError> {
        self.pending.push((source, destination, amount));
        Ok(())
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        let inner = Arc::clone(&self.inner);
        let _gate = write(&inner.commit_gate);

        for (id, state) in self.staged.drain() {
            let slot = self
                .locked
                .iter()
                .find(|(locked_id, _, _)| *locked_id == id)
                .map(|(_, slot, _)| slot)
                .ok_or_else(|| StoreError::Backend(format!("staged write to unlocked account {id}")))?;
            *lock(&slot.state) = state;
        }

        if !self.pending.is_empty() {
            let created_at = inner.next_stamp();
            let mut log = write(&inner.log);
            for (source, destination, amount) in self.pending.drain(..) {
                log.push(TransferRecord {
                    id: inner.next_record_id.fetch_add(1, Ordering::SeqCst),
                    source,
                    destination,
                    amount,
                    created_at,
                });
            }
        }

        // Row locks are released when `self` drops
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        drop(self);
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    type Unit = MemoryUnit;

    async fn begin(&self) -> Result<MemoryUnit, StoreError> {
        Ok(MemoryUnit {
            inner: Arc::clone(&self.inner),
            locked: Vec::with_capacity(2),
            staged: HashMap::new(),
            pending: Vec::new(),
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl AccountStore for MemoryLedger {
    async fn fetch_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let _gate = read(&self.inner.commit_gate);
        let Some(slot) = self.inner.slot(id) else {
            return Ok(None);
        };
        let state = *lock(&slot.state);
        let balance = Balance::new(state.balance).map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Some(Account {
            id,
            balance,
            version: state.version,
        }))
    }

    async fn account_exists(&self, id: AccountId) -> Result<bool, StoreError> {
        Ok(read(&self.inner.rows).contains_key(&id))
    }

    async fn insert_account(&self, id: AccountId, initial: Balance) -> Result<Account, StoreError> {
        let mut rows = write(&self.inner.rows);
        if rows.contains_key(&id) {
            return Err(StoreError::UniqueViolation(format!(
                "duplicate key value violates unique constraint: account_id={id}"
            )));
        }
        let version = self.inner.next_stamp();
        rows.insert(
            id,
            Arc::new(RowSlot {
                lock: Arc::new(tokio::sync::Mutex::new(())),
                state: Mutex::new(RowState {
                    balance: initial.value(),
                    version,
                }),
            }),
        );
        Ok(Account {
            id,
            balance: initial,
            version,
        })
    }
}

#[async_trait]
impl TransferLog for MemoryLedger {
    async fn history(&self, id: AccountId, limit: i64) -> Result<Vec<TransferRecord>, StoreError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(read(&self.inner.log)
            .iter()
            .rev()
            .filter(|r| r.source == id || r.destination == id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn net_flow(&self, id: AccountId) -> Result<Decimal, StoreError> {
        Ok(read(&self.inner.log).iter().map(|r| r.effect_on(id)).sum())
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(l: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    l.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(l: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    l.write().unwrap_or_else(PoisonError::into_inner)
}
