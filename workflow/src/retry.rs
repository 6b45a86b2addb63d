//! Engine-level activity retry with exponential backoff.
//!
//! Transient activity failures (gateway hiccups, store unavailability) are
//! retried here before the engine gives up and fails the workflow
//! instance. This is independent of the broker-side reliability pipeline:
//! it retries a side-effecting step inside one transition, not a message.

use std::time::Duration;
use tokio::time::sleep;

/// Exponential backoff policy for activity execution.
#[derive(Debug, Clone)]
pub struct ActivityRetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: usize,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap on the backoff delay.
    pub max_delay: Duration,
    /// Backoff multiplier per retry.
    pub multiplier: f64,
}

impl Default for ActivityRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl ActivityRetryPolicy {
    /// Delay for a given retry attempt (0-based), capped at `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return self.initial_delay;
        }

        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let delay_ms =
            (self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32)) as u64;
        let delay = Duration::from_millis(delay_ms);

        delay.min(self.max_delay)
    }
}

/// Execute `operation` under `policy`.
///
/// Runs at most `max_retries + 1` executions. Earlier failures are logged
/// and discarded; only the error from the final execution is returned, so
/// callers never see an accumulated history.
///
/// # Errors
///
/// The error from the final execution once the retry budget runs out.
pub async fn execute_with_retry<F, Fut, T, E>(
    policy: &ActivityRetryPolicy,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut retries_used = 0;

    loop {
        let err = match operation().await {
            Ok(value) => {
                if retries_used > 0 {
                    tracing::info!(retries_used, "Activity recovered after retrying");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if retries_used == policy.max_retries {
            tracing::error!(retries_used, error = %err, "Activity retry budget exhausted");
            return Err(err);
        }

        let delay = policy.delay_for_attempt(retries_used);
        tracing::warn!(
            retries_used,
            delay_ms = delay.as_millis(),
            error = %err,
            "Activity attempt failed, backing off"
        );
        sleep(delay).await;
        retries_used += 1;
    }
}
