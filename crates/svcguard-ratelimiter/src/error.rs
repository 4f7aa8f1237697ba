use std::time::Duration;
use svcguard_core::ResilienceError;
use thiserror::Error;

/// A rate limiter denied the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rate limit exceeded for '{service}'{}", retry_hint(.retry_after))]
pub struct RateLimitExceeded {
    /// Service whose limiter denied the request.
    pub service: String,
    /// How long until enough capacity frees up; `None` if it never will.
    pub retry_after: Option<Duration>,
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(", retry after {:?}", d),
        None => String::new(),
    }
}

impl<E> From<RateLimitExceeded> for ResilienceError<E> {
    fn from(err: RateLimitExceeded) -> Self {
        ResilienceError::RateLimited {
            service: err.service,
            retry_after: err.retry_after,
        }
    }
}
