//! Call-level retry for transient generation failures
//!
//! Retries are deliberately shallow: a fixed pause and a small attempt cap.
//! Anything that is not `ProviderError::is_retryable` fails immediately.

use crate::error::ProviderError;
use std::future::Future;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial attempt)
    pub max_attempts: u32,
    /// Fixed pause in milliseconds before each retry
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            delay_ms: 500,
        }
    }
}

impl RetryConfig {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            delay_ms: 0,
        }
    }
}

/// Retry an async operation on retryable errors
///
/// # Example
/// ```ignore
/// let config = RetryConfig::default();
/// let text = with_retry(&config, || client.generate(&request)).await?;
/// ```
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(attempt = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(err) => {
                if !err.is_retryable() {
                    debug!(error = %err, "Error is not retryable, failing immediately");
                    return Err(err);
                }

                if attempt >= max_attempts {
                    warn!(
                        attempt = attempt,
                        max_attempts = max_attempts,
                        error = %err,
                        "Max retry attempts reached, failing"
                    );
                    return Err(err);
                }

                warn!(
                    attempt = attempt,
                    delay_ms = config.delay_ms,
                    error = %err,
                    "Retryable error, retrying"
                );
                if config.delay_ms > 0 {
                    sleep(Duration::from_millis(config.delay_ms)).await;
                }
                attempt += 1;
            }
        }
    }
}
