//! The unified error taxonomy returned by the coordinator.
//!
//! Every call routed through svcguard resolves to either the operation's
//! success value or a [`ResilienceError<E>`], where `E` is the operation's own
//! error type. The variants describe *why* the call did not succeed:
//!
//! ```rust
//! use svcguard_core::ResilienceError;
//!
//! #[derive(Debug)]
//! struct ApiError(u16);
//!
//! impl std::fmt::Display for ApiError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "status {}", self.0)
//!     }
//! }
//!
//! impl std::error::Error for ApiError {}
//!
//! fn describe(err: &ResilienceError<ApiError>) -> String {
//!     match err {
//!         ResilienceError::Permanent(e) => format!("gave up: {e}"),
//!         ResilienceError::CircuitOpen { service } => format!("{service} is tripped"),
//!         ResilienceError::RateLimited { retry_after, .. } => {
//!             format!("slow down ({retry_after:?})")
//!         }
//!         ResilienceError::RetryExhausted { attempts, .. } => format!("{attempts} attempts"),
//!         ResilienceError::FallbackExhausted { tried, .. } => format!("tried {tried:?}"),
//!     }
//! }
//!
//! let err = ResilienceError::Permanent(ApiError(400));
//! assert_eq!(describe(&err), "gave up: status 400");
//! ```
//!
//! `From` conversions for the per-pattern errors (`CircuitOpenError`,
//! `RetryError`, `RateLimitExceeded`, `FallbackExhausted`) live in the pattern
//! crates so this crate does not depend on them.

use std::fmt;
use std::time::Duration;

/// Why a protected call did not produce a value.
#[derive(Debug, Clone, PartialEq)]
pub enum ResilienceError<E> {
    /// The operation failed with an error classified as not retryable.
    Permanent(E),

    /// The service's circuit breaker rejected the call without running it.
    CircuitOpen {
        /// Service whose breaker is open.
        service: String,
    },

    /// The service's rate limiter denied the call.
    RateLimited {
        /// Service whose limiter denied the call.
        service: String,
        /// How long until capacity frees up. `None` if the request can never
        /// be satisfied.
        retry_after: Option<Duration>,
    },

    /// Every retry attempt failed with a retryable error.
    RetryExhausted {
        /// Number of times the operation was invoked.
        attempts: u32,
        /// The error from the final attempt.
        last_error: E,
    },

    /// The call failed with a fallback-eligible error and no fallback strategy
    /// produced a value.
    FallbackExhausted {
        /// The error that triggered the fallback chain.
        original: Box<ResilienceError<E>>,
        /// Names of the strategies that were consulted, in order.
        tried: Vec<String>,
    },
}

impl<E> fmt::Display for ResilienceError<E>
where
    E: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResilienceError::Permanent(e) => write!(f, "operation failed: {}", e),
            ResilienceError::CircuitOpen { service } => {
                write!(f, "circuit breaker for '{}' is open", service)
            }
            ResilienceError::RateLimited {
                service,
                retry_after,
            } => match retry_after {
                Some(d) => write!(f, "rate limited on '{}', retry after {:?}", service, d),
                None => write!(f, "rate limited on '{}'", service),
            },
            ResilienceError::RetryExhausted {
                attempts,
                last_error,
            } => write!(
                f,
                "retries exhausted after {} attempts: {}",
                attempts, last_error
            ),
            ResilienceError::FallbackExhausted { original, tried } => write!(
                f,
                "no fallback produced a value (tried [{}]) for: {}",
                tried.join(", "),
                original
            ),
        }
    }
}

impl<E> std::error::Error for ResilienceError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResilienceError::Permanent(e) => Some(e),
            ResilienceError::RetryExhausted { last_error, .. } => Some(last_error),
            ResilienceError::FallbackExhausted { original, .. } => Some(original.as_ref()),
            ResilienceError::CircuitOpen { .. } | ResilienceError::RateLimited { .. } => None,
        }
    }
}

impl<E> ResilienceError<E> {
    /// Returns `true` if this is a permanent operation error.
    pub fn is_permanent(&self) -> bool {
        matches!(self, ResilienceError::Permanent(_))
    }

    /// Returns `true` if the circuit breaker rejected the call.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen { .. })
    }

    /// Returns `true` if the rate limiter rejected the call.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ResilienceError::RateLimited { .. })
    }

    /// Returns `true` if retries ran out.
    pub fn is_retry_exhausted(&self) -> bool {
        matches!(self, ResilienceError::RetryExhausted { .. })
    }

    /// Returns `true` if the fallback chain ran and produced nothing.
    pub fn is_fallback_exhausted(&self) -> bool {
        matches!(self, ResilienceError::FallbackExhausted { .. })
    }

    /// Returns `true` for the errors a fallback chain is allowed to recover:
    /// an open circuit, a rate limit, or exhausted retries.
    pub fn recoverable_by_fallback(&self) -> bool {
        matches!(
            self,
            ResilienceError::CircuitOpen { .. }
                | ResilienceError::RateLimited { .. }
                | ResilienceError::RetryExhausted { .. }
        )
    }

    /// The service that rejected the call, for rejections.
    pub fn service(&self) -> Option<&str> {
        match self {
            ResilienceError::CircuitOpen { service } => Some(service),
            ResilienceError::RateLimited { service, .. } => Some(service),
            ResilienceError::FallbackExhausted { original, .. } => original.service(),
            _ => None,
        }
    }

    /// The rate limiter's hint, if the call was rate limited.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ResilienceError::RateLimited { retry_after, .. } => *retry_after,
            ResilienceError::FallbackExhausted { original, .. } => original.retry_after(),
            _ => None,
        }
    }

    /// Number of operation invocations, if retries were exhausted.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            ResilienceError::RetryExhausted { attempts, .. } => Some(*attempts),
            ResilienceError::FallbackExhausted { original, .. } => original.attempts(),
            _ => None,
        }
    }

    /// Borrows the operation's own error, if one exists.
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            ResilienceError::Permanent(e) => Some(e),
            ResilienceError::RetryExhausted { last_error, .. } => Some(last_error),
            ResilienceError::FallbackExhausted { original, .. } => original.operation_error(),
            _ => None,
        }
    }

    /// Extracts the operation's own error, if one exists.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            ResilienceError::Permanent(e) => Some(e),
            ResilienceError::RetryExhausted { last_error, .. } => Some(last_error),
            ResilienceError::FallbackExhausted { original, .. } => original.into_operation_error(),
            _ => None,
        }
    }

    /// Maps the operation error using a function.
    ///
    /// ```
    /// use svcguard_core::ResilienceError;
    ///
    /// let err: ResilienceError<String> = ResilienceError::Permanent("boom".to_string());
    /// let mapped: ResilienceError<usize> = err.map_operation_error(|s| s.len());
    /// assert_eq!(mapped.into_operation_error(), Some(4));
    /// ```
    pub fn map_operation_error<F, T>(self, f: F) -> ResilienceError<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            ResilienceError::Permanent(e) => ResilienceError::Permanent(f(e)),
            ResilienceError::CircuitOpen { service } => ResilienceError::CircuitOpen { service },
            ResilienceError::RateLimited {
                service,
                retry_after,
            } => ResilienceError::RateLimited {
                service,
                retry_after,
            },
            ResilienceError::RetryExhausted {
                attempts,
                last_error,
            } => ResilienceError::RetryExhausted {
                attempts,
                last_error: f(last_error),
            },
            ResilienceError::FallbackExhausted { original, tried } => {
                ResilienceError::FallbackExhausted {
                    original: Box::new(original.map_operation_error(f)),
                    tried,
                }
            }
        }
    }
}
