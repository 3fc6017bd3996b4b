// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Bounded retry with exponential backoff for idempotent reads.
///
/// Every GitHub and raw-content request goes through [`retry_with_backoff`]
/// so a transient failure does not cost a whole scheduled run.
use std::{fmt::Display, future::Future, time::Duration};

use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for retry behavior with exponential backoff.
#[derive(Debug, Clone, PartialEq,)]
pub struct RetryConfig
{
    /// Maximum number of attempts including the first one (default: 3).
    pub max_attempts:     u32,
    /// Delay before the second attempt in milliseconds (default: 1000).
    pub initial_delay_ms: u64,
    /// Multiplier applied to the delay after each failure (default: 2.0).
    pub backoff_factor:   f64,
}

impl Default for RetryConfig
{
    fn default() -> Self
    {
        Self {
            max_attempts: 3, initial_delay_ms: 1000, backoff_factor: 2.0,
        }
    }
}

#[cfg(test)]
impl RetryConfig
{
    /// Returns a configuration that performs exactly one attempt.
    pub fn disabled() -> Self
    {
        Self {
            max_attempts: 1, initial_delay_ms: 0, backoff_factor: 1.0,
        }
    }
}

/// Executes an async operation, retrying failures with exponential backoff.
///
/// # Arguments
///
/// * `config` - Retry configuration (max attempts, delays)
/// * `operation_name` - Name of the operation for logging
/// * `f` - Async function producing a fresh attempt on every call
///
/// # Errors
///
/// Returns the last error encountered if all attempts fail.
///
/// # Example
///
/// ```no_run
/// use github_metrics::{Error, retry::{RetryConfig, retry_with_backoff}};
///
/// # async fn example() -> Result<(), Error> {
/// let config = RetryConfig::default();
/// let stars = retry_with_backoff(&config, "fetch stars", || async { Ok::<_, Error,>(42u64,) },)
///     .await?;
/// # Ok(())
/// # }
/// ```
pub async fn retry_with_backoff<F, Fut, T, E,>(
    config: &RetryConfig,
    operation_name: &str,
    f: F,
) -> Result<T, E,>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E,>,>,
    E: Display,
{
    retry_with_backoff_if(config, operation_name, |_| true, f,).await
}

/// Like [`retry_with_backoff`], but gives up as soon as `should_retry`
/// returns `false` for an error.
///
/// # Errors
///
/// Returns the first non-retryable error, or the last error once every
/// attempt has failed.
pub async fn retry_with_backoff_if<F, Fut, T, E, P,>(
    config: &RetryConfig,
    operation_name: &str,
    should_retry: P,
    mut f: F,
) -> Result<T, E,>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E,>,>,
    E: Display,
    P: Fn(&E,) -> bool,
{
    let max_attempts = config.max_attempts.max(1,);
    let mut attempt = 1;
    let mut delay_ms = config.initial_delay_ms;

    loop {
        match f().await {
            Ok(result,) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", operation_name, attempt);
                }
                return Ok(result,);
            }
            Err(error,) => {
                if !should_retry(&error,) {
                    debug!("{} failed permanently on attempt {}: {}", operation_name, attempt, error);
                    return Err(error,);
                }

                if attempt >= max_attempts {
                    if max_attempts > 1 {
                        warn!("{} failed after {} attempts: {}", operation_name, max_attempts, error);
                    }
                    return Err(error,);
                }

                warn!(
                    "{} failed on attempt {}/{}: {}. Retrying in {}ms...",
                    operation_name, attempt, max_attempts, error, delay_ms
                );

                sleep(Duration::from_millis(delay_ms,),).await;
                delay_ms = (delay_ms as f64 * config.backoff_factor) as u64;
                attempt += 1;
            }
        }
    }
}
