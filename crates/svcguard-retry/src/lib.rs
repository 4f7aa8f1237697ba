//! Retry executor with exponential backoff and jitter.
//!
//! [`execute_with_retry`] invokes an async operation, and after each
//! retryable failure waits for a backoff delay before trying again:
//!
//! - a non-retryable error is returned immediately as
//!   [`RetryError::NotRetryable`];
//! - once `max_attempts` invocations have failed, the last error is returned
//!   as [`RetryError::Exhausted`];
//! - waiting uses `tokio::time::sleep` and suspends only the calling task.
//!
//! The delay after the n-th failed attempt is
//! `min(max_delay, base_delay * multiplier^(n-1))`, then jittered and clamped
//! to `[0, max_delay]`.
//!
//! # Examples
//!
//! ```
//! use svcguard_retry::{execute_with_retry, Jitter, RetryConfig, RetryError};
//! use std::time::Duration;
//!
//! # #[derive(Debug, Clone, PartialEq)]
//! # enum ApiError { Overloaded, BadRequest }
//! # async fn example() {
//! let config = RetryConfig::builder()
//!     .max_attempts(4)
//!     .base_delay(Duration::from_millis(50))
//!     .jitter(Jitter::Full)
//!     .retry_on(|e: &ApiError| *e == ApiError::Overloaded)
//!     .build();
//!
//! let result: Result<(), _> = execute_with_retry(|| async { Err(ApiError::BadRequest) }, &config).await;
//! assert_eq!(result, Err(RetryError::NotRetryable(ApiError::BadRequest)));
//! # }
//! ```

mod backoff;
mod config;
mod error;
mod events;
mod policy;

pub use backoff::{ExponentialBackoff, FixedInterval, FnInterval, IntervalFunction, Jitter};
pub use config::{RetryConfig, RetryConfigBuilder};
pub use error::RetryError;
pub use events::RetryEvent;
pub use policy::{RetryPolicy, RetryPredicate};

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};
use std::future::Future;
use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::time::Instant;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

pub(crate) fn describe_metrics() {
    #[cfg(feature = "metrics")]
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "retry_calls_total",
            "Total retry sequences, by outcome (success, exhausted, not_retryable)"
        );
        describe_counter!(
            "retry_attempts_total",
            "Total retries performed after a failed attempt"
        );
    });
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or
/// `config`'s attempts are used up.
pub async fn execute_with_retry<T, E, F, Fut>(
    op: F,
    config: &RetryConfig<E>,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    execute_with_retry_if(op, config, |e: &E| config.policy.should_retry(e)).await
}

/// Like [`execute_with_retry`], but `should_retry` decides retryability
/// instead of the config's predicate.
///
/// The config still supplies attempts, backoff, jitter and listeners. This is
/// how callers retry an error type that wraps `E`, such as a classified error.
pub async fn execute_with_retry_if<T, X, E, F, Fut, P>(
    mut op: F,
    config: &RetryConfig<E>,
    should_retry: P,
) -> Result<T, RetryError<X>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, X>>,
    P: Fn(&X) -> bool,
{
    let policy = &config.policy;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        match op().await {
            Ok(value) => {
                config.event_listeners.emit(&RetryEvent::Success {
                    service: config.name.clone(),
                    timestamp: Instant::now(),
                    attempts: attempt,
                });

                #[cfg(feature = "metrics")]
                counter!("retry_calls_total", "retry" => config.name.clone(), "outcome" => "success").increment(1);

                return Ok(value);
            }
            Err(error) => {
                if !should_retry(&error) {
                    config.event_listeners.emit(&RetryEvent::IgnoredError {
                        service: config.name.clone(),
                        timestamp: Instant::now(),
                        attempt,
                    });

                    #[cfg(feature = "tracing")]
                    tracing::debug!(service = %config.name, attempt, "error is not retryable");

                    #[cfg(feature = "metrics")]
                    counter!("retry_calls_total", "retry" => config.name.clone(), "outcome" => "not_retryable").increment(1);

                    return Err(RetryError::NotRetryable(error));
                }

                if attempt >= policy.max_attempts {
                    config.event_listeners.emit(&RetryEvent::Exhausted {
                        service: config.name.clone(),
                        timestamp: Instant::now(),
                        attempts: attempt,
                    });

                    #[cfg(feature = "tracing")]
                    tracing::warn!(service = %config.name, attempts = attempt, "retries exhausted");

                    #[cfg(feature = "metrics")]
                    counter!("retry_calls_total", "retry" => config.name.clone(), "outcome" => "exhausted").increment(1);

                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last_error: error,
                    });
                }

                let delay = policy.next_backoff(attempt);
                config.event_listeners.emit(&RetryEvent::Retry {
                    service: config.name.clone(),
                    timestamp: Instant::now(),
                    attempt,
                    delay,
                });

                #[cfg(feature = "tracing")]
                tracing::debug!(service = %config.name, attempt, delay_ms = delay.as_millis() as u64, "retrying after backoff");

                #[cfg(feature = "metrics")]
                counter!("retry_attempts_total", "retry" => config.name.clone()).increment(1);

                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// A reusable handle bundling a shared [`RetryConfig`].
pub struct RetryExecutor<E> {
    config: Arc<RetryConfig<E>>,
}

impl<E> RetryExecutor<E> {
    /// Creates an executor from a configuration.
    pub fn new(config: RetryConfig<E>) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// The executor's configuration.
    pub fn config(&self) -> &RetryConfig<E> {
        &self.config
    }

    /// Runs `op` with this executor's policy.
    pub async fn execute<T, F, Fut>(&self, op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        execute_with_retry(op, &self.config).await
    }
}

impl<E> Clone for RetryExecutor<E> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
        }
    }
}
