//! Caller-level retry policy
//!
//! The engine never retries. Integrating layers wrap engine calls in
//! [`RetryPolicy::run`], which re-runs only transient failures and gives up
//! after a fixed number of attempts. No backoff: the row lock already
//! serializes contenders.

use std::future::Future;

use tracing::warn;

use super::error::TransferError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Also retry opaque storage faults
    pub retry_storage_faults: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_storage_faults: false,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, retry_storage_faults: bool) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            retry_storage_faults,
        }
    }

    /// Single attempt, no retry
    pub fn none() -> Self {
        Self::new(1, false)
    }

    pub fn should_retry(&self, err: &TransferError) -> bool {
        err.is_retryable() || (self.retry_storage_faults && err.is_storage_fault())
    }

    /// Run `op` until it succeeds, fails terminally, or attempts run out.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, TransferError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, TransferError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max_attempts && self.should_retry(&err) => {
                    warn!(
                        attempt = attempt,
                        max_attempts = max_attempts,
                        error = %err,
                        "Transient transfer failure, retrying"
                    );
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
