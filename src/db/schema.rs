use anyhow::{Context, Result};
use sqlx::PgPool;

/// Create the balance table and transfer log if they do not exist
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    tracing::info!("Initializing ledger schema...");

    sqlx::query(CREATE_ACCOUNT_BALANCE_TABLE)
        .execute(pool)
        .await
        .context("Failed to create account_balance table")?;

    sqlx::query(CREATE_ACCOUNT_TRANSACTIONS_TABLE)
        .execute(pool)
        .await
        .context("Failed to create account_transactions table")?;

    for index in [CREATE_TRANSFER_OUT_INDEX, CREATE_TRANSFER_IN_INDEX] {
        sqlx::query(index)
            .execute(pool)
            .await
            .context("Failed to create account_transactions index")?;
    }

    tracing::info!("Ledger schema initialized successfully");
    Ok(())
}

/// One row per account. The named CHECK constraint is what rejects overdrafts.
pub const CREATE_ACCOUNT_BALANCE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS account_balance (
    account_id BIGINT PRIMARY KEY,
    balance NUMERIC(20, 4) NOT NULL
        CONSTRAINT account_balance_balance_check CHECK (balance >= 0),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT clock_timestamp()
)
"#;

/// Append-only transfer log. Account ids are plain values: the log has no
/// foreign key into `account_balance`.
pub const CREATE_ACCOUNT_TRANSACTIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS account_transactions (
    id BIGSERIAL PRIMARY KEY,
    account_transfer_out BIGINT NOT NULL,
    account_transfer_in BIGINT NOT NULL,
    amount NUMERIC(20, 4) NOT NULL CHECK (amount > 0),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CHECK (account_transfer_out <> account_transfer_in)
)
"#;

pub const CREATE_TRANSFER_OUT_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_account_transactions_out
    ON account_transactions (account_transfer_out, id DESC)
"#;

pub const CREATE_TRANSFER_IN_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_account_transactions_in
    ON account_transactions (account_transfer_in, id DESC)
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::BALANCE_CHECK_CONSTRAINT;

    #[test]
    fn test_balance_table_enforces_non_negative() {
        assert!(CREATE_ACCOUNT_BALANCE_TABLE.contains("CHECK (balance >= 0)"));
        assert!(CREATE_ACCOUNT_BALANCE_TABLE.contains("NUMERIC(20, 4)"));
        assert!(CREATE_ACCOUNT_BALANCE_TABLE.contains(&format!(
            "CONSTRAINT {BALANCE_CHECK_CONSTRAINT} CHECK"
        )));
    }

    #[test]
    fn test_log_table_rejects_non_positive_amount() {
        assert!(CREATE_ACCOUNT_TRANSACTIONS_TABLE.contains("CHECK (amount > 0)"));
    }

    #[test]
    fn test_log_table_not_coupled_to_balances() {
        let ddl = CREATE_ACCOUNT_TRANSACTIONS_TABLE.to_uppercase();
        assert!(!ddl.contains("REFERENCES"));
        assert!(!ddl.contains("FOREIGN KEY"));
        assert!(!ddl.contains("ACCOUNT_BALANCE"));
    }
}
