//! PostgreSQL ledger backend
//!
//! A unit of work is one database transaction. Row locks come from
//! `SELECT ... FOR UPDATE`; the `balance >= 0` check constraint rejects
//! overdrafts, surfacing as SQLSTATE 23514.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::account::{Account, AccountId};
use crate::money::{Amount, Balance};
use crate::store::{
    AccountStore, LedgerStore, LockedPair, LockedRow, StoreError, TransferLog, UnitOfWork,
    VersionStamp,
};
use crate::transfer::TransferRecord;

/// Locks rows in the order of the bound id array
const LOCK_PAIR_SQL: &str = r#"
SELECT account_id, balance, updated_at
FROM account_balance
WHERE account_id = ANY($1)
ORDER BY array_position($1, account_id)
FOR UPDATE
"#;

const CONDITIONAL_UPDATE_SQL: &str = r#"
UPDATE account_balance
SET balance = $1, updated_at = clock_timestamp()
WHERE account_id = $2 AND updated_at = $3
"#;

const INSERT_TRANSFER_SQL: &str = r#"
INSERT INTO account_transactions (account_transfer_out, account_transfer_in, amount)
VALUES ($1, $2, $3)
"#;

const SELECT_ACCOUNT_SQL: &str =
    "SELECT account_id, balance, updated_at FROM account_balance WHERE account_id = $1";

const ACCOUNT_EXISTS_SQL: &str =
    "SELECT EXISTS (SELECT 1 FROM account_balance WHERE account_id = $1)";

const INSERT_ACCOUNT_SQL: &str = r#"
INSERT INTO account_balance (account_id, balance)
VALUES ($1, $2)
RETURNING updated_at
"#;

const HISTORY_SQL: &str = r#"
SELECT id, account_transfer_out, account_transfer_in, amount, created_at
FROM account_transactions
WHERE account_transfer_out = $1 OR account_transfer_in = $1
ORDER BY id DESC
LIMIT $2
"#;

const NET_FLOW_SQL: &str = r#"
SELECT COALESCE(SUM(CASE WHEN account_transfer_in = $1 THEN amount ELSE -amount END), 0) AS net
FROM account_transactions
WHERE account_transfer_out = $1 OR account_transfer_in = $1
"#;

/// Ledger backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// One open database transaction.
///
/// Dropping it without `commit` rolls the transaction back.
pub struct PgUnit {
    tx: Transaction<'static, Postgres>,
}

fn locked_row(row: &PgRow) -> Result<LockedRow, StoreError> {
    Ok(LockedRow {
        id: AccountId::new(row.try_get("account_id")?),
        balance: row.try_get("balance")?,
        version: row.try_get("updated_at")?,
    })
}

fn transfer_record(row: &PgRow) -> Result<TransferRecord, StoreError> {
    let amount: Decimal = row.try_get("amount")?;
    Ok(TransferRecord {
        id: row.try_get("id")?,
        source: AccountId::new(row.try_get("account_transfer_out")?),
        destination: AccountId::new(row.try_get("account_transfer_in")?),
        amount: Amount::new(amount).map_err(|e| StoreError::Backend(e.to_string()))?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl UnitOfWork for PgUnit {
    async fn lock_and_read_pair(
        &mut self,
        first: AccountId,
        second: AccountId,
    ) -> Result<LockedPair, StoreError> {
        let ids = [first.get(), second.get()];
        let rows = sqlx::query(LOCK_PAIR_SQL)
            .bind(&ids[..])
            .fetch_all(&mut *self.tx)
            .await?;

        let mut locked = rows.iter().map(locked_row).collect::<Result<Vec<_>, _>>()?;
        let take = |locked: &mut Vec<LockedRow>, id: AccountId| {
            locked
                .iter()
                .position(|row| row.id == id)
                .map(|pos| locked.swap_remove(pos))
                .ok_or(StoreError::NotFound(id))
        };

        let first_row = take(&mut locked, first)?;
        let second_row = take(&mut locked, second)?;
        Ok(LockedPair {
            first: first_row,
            second: second_row,
        })
    }

    async fn conditional_update_balance(
        &mut self,
        id: AccountId,
        new_balance: Decimal,
        expected_version: VersionStamp,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(CONDITIONAL_UPDATE_SQL)
            .bind(new_balance)
            .bind(id.get())
            .bind(expected_version)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn append_transfer_record(
        &mut self,
        source: AccountId,
        destination: AccountId,
        amount: Amount,
    ) -> Result<(), StoreError> {
        sqlx::query(INSERT_TRANSFER_SQL)
            .bind(source.get())
            .bind(destination.get())
            .bind(amount.value())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PgLedger {
    type Unit = PgUnit;

    async fn begin(&self) -> Result<PgUnit, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(PgUnit { tx })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl AccountStore for PgLedger {
    async fn fetch_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let Some(row) = sqlx::query(SELECT_ACCOUNT_SQL)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let row = locked_row(&row)?;
        let balance = Balance::new(row.balance).map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Some(Account {
            id,
            balance,
            version: row.version,
        }))
    }

    async fn account_exists(&self, id: AccountId) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(ACCOUNT_EXISTS_SQL)
            .bind(id.get())
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn insert_account(&self, id: AccountId, initial: Balance) -> Result<Account, StoreError> {
        let version: DateTime<Utc> = sqlx::query_scalar(INSERT_ACCOUNT_SQL)
            .bind(id.get())
            .bind(initial.value())
            .fetch_one(&self.pool)
            .await?;
        Ok(Account {
            id,
            balance: initial,
            version,
        })
    }
}

#[async_trait]
impl TransferLog for PgLedger {
    async fn history(&self, id: AccountId, limit: i64) -> Result<Vec<TransferRecord>, StoreError> {
        let rows = sqlx::query(HISTORY_SQL)
            .bind(id.get())
            .bind(limit.max(0))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(transfer_record).collect()
    }

    async fn net_flow(&self, id: AccountId) -> Result<Decimal, StoreError> {
        let net: Decimal = sqlx::query_scalar(NET_FLOW_SQL)
            .bind(id.get())
            .fetch_one(&self.pool)
            .await?;
        Ok(net)
    }
}
