//! Transfer Engine
//!
//! Moves money between two balance rows inside one unit of work.
//!
//! # Protocol (single attempt)
//!
//! ```text
//! BEGIN → LOCK(min id, max id) → compute → CAS update ×2 → append log → COMMIT
//!                  ↓                            ↓              ↓
//!               ROLLBACK ←──────────────────────┴──────────────┘
//! ```
//!
//! # Safety Invariants
//!
//! 1. **Canonical lock order**: rows are always locked smaller id first, so
//!    transfers sharing accounts cannot form a waiter cycle.
//! 2. **Row lock is primary**: the version compare-and-swap is a second line
//!    of defence and reports [`TransferError::ConcurrencyConflict`] if it ever
//!    trips.
//! 3. **Log as requested**: the log stores the caller's source/destination,
//!    never the lock-ordered pair.
//! 4. **No internal retry**: the engine makes exactly one attempt. Retry
//!    policy belongs to the caller ([`RetryPolicy`]).

pub mod engine;
pub mod error;
pub mod lock_order;
pub mod retry;
pub mod types;

// Re-exports for convenience
pub use engine::TransferEngine;
pub use error::TransferError;
pub use lock_order::LockPlan;
pub use retry::RetryPolicy;
pub use types::{Side, TransferRecord, TransferRequest};
