//! pairledger - Account Balance Ledger
//!
//! Money moves between account balances only through the transfer engine,
//! which locks both rows in a canonical order, applies the debit and credit
//! with an optimistic version check, and appends a log entry, all in one
//! unit of work.
//!
//! # Modules
//!
//! - [`money`] - Validated `Amount` / `Balance` types
//! - [`store`] - Storage boundary traits and `StoreError`
//! - [`account`] - Account lookup and creation
//! - [`transfer`] - Transfer engine, lock ordering, retry policy
//! - [`db`] - PostgreSQL backend
//! - [`memory`] - In-memory backend
//! - [`service`] - Integrating layer (existence checks, retry, timeout)
//! - [`gateway`] - HTTP adapter
//! - [`config`] / [`logging`] - Application config and tracing setup

pub mod config;
pub mod logging;
pub mod money;

pub mod account;
pub mod store;
pub mod transfer;

pub mod db;
pub mod memory;

pub mod gateway;
pub mod service;

// Convenient re-exports at crate root
pub use account::{Account, AccountError, AccountId, AccountService};
pub use memory::MemoryLedger;
pub use money::{Amount, Balance, MoneyError};
pub use service::LedgerService;
pub use store::{LedgerBackend, StoreError};
pub use transfer::{RetryPolicy, TransferEngine, TransferError, TransferRecord, TransferRequest};
