//! Timeout-bounded polling

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::{Error, Result};

/// Result type for polling check functions.
///
/// - `Ok(Some(value))` - Condition met, return the value
/// - `Ok(None)` - Condition not met yet, keep polling
/// - `Err(e)` - Fatal error, stop polling immediately
pub type PollResult<T> = Result<Option<T>>;

/// Poll `check_fn` every `interval` until it yields a value.
///
/// Errors from `check_fn` are not retried; they are returned as-is. Once
/// `timeout` has elapsed without a value, fails with [`Error::NotReady`] for
/// `description`. A timeout too large to represent as a deadline polls
/// without one.
pub async fn wait_with_timeout<T, F, Fut>(
    timeout: Duration,
    interval: Duration,
    description: &str,
    mut check_fn: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PollResult<T>>,
{
    let deadline = Instant::now().checked_add(timeout);

    loop {
        if let Some(value) = check_fn().await? {
            return Ok(value);
        }

        let sleep_for = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(Error::not_ready(description));
                }
                interval.min(deadline - now)
            }
            None => interval,
        };

        debug!("Waiting for {}...", description);
        tokio::time::sleep(sleep_for).await;
    }
}
