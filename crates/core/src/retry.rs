//! Retry policy for transient host errors
//!
//! Only errors that [`TransportError::is_retryable`] accepts are retried.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::TransportError;

/// Retry policy for failed host requests
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetryPolicy {
    /// No retries
    None,

    /// Fixed number of retry attempts with constant delay
    Fixed {
        /// Number of retry attempts
        attempts: usize,
        /// Delay between retries
        delay_ms: u64,
    },

    /// Exponential backoff retries
    Exponential {
        base_delay_ms: u64,
        max_delay_ms: u64,
        max_attempts: usize,
        /// Backoff multiplier (typically 2.0)
        multiplier: f64,
    },
}

impl RetryPolicy {
    /// Create a fixed retry policy
    pub fn fixed(attempts: usize, delay: Duration) -> Self {
        RetryPolicy::Fixed {
            attempts,
            delay_ms: delay.as_millis() as u64,
        }
    }

    /// Create an exponential backoff policy
    pub fn exponential(max_attempts: usize) -> Self {
        RetryPolicy::Exponential {
            base_delay_ms: 100,
            max_delay_ms: 30_000,
            max_attempts,
            multiplier: 2.0,
        }
    }

    /// Get delay for a specific retry number (0-indexed)
    pub fn delay_for_attempt(&self, attempt: usize) -> Option<Duration> {
        match self {
            RetryPolicy::None => None,
            RetryPolicy::Fixed { attempts, delay_ms } => {
                (attempt < *attempts).then(|| Duration::from_millis(*delay_ms))
            }
            RetryPolicy::Exponential {
                base_delay_ms,
                max_delay_ms,
                max_attempts,
                multiplier,
            } => {
                if attempt >= *max_attempts {
                    return None;
                }
                let delay_ms = (*base_delay_ms as f64) * multiplier.powi(attempt as i32);
                Some(Duration::from_millis((delay_ms as u64).min(*max_delay_ms)))
            }
        }
    }

    /// Get maximum number of retries
    pub fn max_attempts(&self) -> usize {
        match self {
            RetryPolicy::None => 0,
            RetryPolicy::Fixed { attempts, .. } => *attempts,
            RetryPolicy::Exponential { max_attempts, .. } => *max_attempts,
        }
    }
}

impl Default for RetryPolicy {
    /// A host that answers "service unavailable" is usually still starting
    /// its streaming service: retry once after 5 seconds.
    fn default() -> Self {
        RetryPolicy::Fixed {
            attempts: 1,
            delay_ms: 5_000,
        }
    }
}

/// Execute a host request with retry logic
///
/// ```
/// use playlink_core::retry::execute_with_retry;
/// use playlink_core::{RetryPolicy, TransportError};
///
/// # tokio_test::block_on(async {
/// let info = execute_with_retry(RetryPolicy::None, || async {
///     Ok::<_, TransportError>("host-info")
/// })
/// .await;
/// assert_eq!(info, Ok("host-info"));
/// # });
/// ```
pub async fn execute_with_retry<F, Fut, T>(
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) if err.is_retryable() => match policy.delay_for_attempt(attempt) {
                Some(delay) => {
                    attempt += 1;
                    tracing::warn!(
                        "Host request failed (retry {}/{}), retrying in {:?}: {}",
                        attempt,
                        max_attempts,
                        delay,
                        err
                    );
                    sleep(delay).await;
                }
                None => return Err(err),
            },
            Err(err) => return Err(err),
        }
    }
}
