//! Bounded retry for optimistic-concurrency write conflicts.
//!
//! The session coordinator does not hold application-level locks; it
//! relies on the store's own conflict detection and re-runs the whole
//! transactional body when a conflict surfaces. The policy lives here so
//! it can be tested apart from any transaction.

use std::future::Future;
use std::time::Duration;

use crate::error::MazurkaError;

/// Attempt budget and backoff schedule for a conflicted write.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        RetryPolicy {
            max_attempts,
            base_delay,
        }
    }

    /// Delay before the attempt following `attempt` (1-based): attempt N
    /// waits N times the base delay.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Run `op` until it succeeds, the error is not retryable, or the
/// attempt budget is spent. The final error is returned as-is; callers
/// decide how to surface exhaustion.
pub async fn with_retry<T, F, Fut, P>(
    policy: RetryPolicy,
    is_retryable: P,
    mut op: F,
) -> Result<T, MazurkaError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, MazurkaError>>,
    P: Fn(&MazurkaError) -> bool,
{
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts && is_retryable(&err) => {
                tracing::warn!(attempt, error = %err, "write conflict, backing off before retry");
                tokio::time::sleep(policy.delay_for(attempt)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Whether a store error is the optimistic-concurrency kind worth
/// retrying: SQLite busy/locked, Postgres serialization failure or
/// deadlock. Anything else propagates immediately.
pub fn is_write_conflict(err: &MazurkaError) -> bool {
    match err {
        MazurkaError::Database(db_err) => {
            let msg = db_err.to_string().to_lowercase();
            msg.contains("database is locked")
                || msg.contains("database table is locked")
                || msg.contains("deadlock")
                || msg.contains("could not serialize")
                || msg.contains("serialization failure")
        }
        _ => false,
    }
}
