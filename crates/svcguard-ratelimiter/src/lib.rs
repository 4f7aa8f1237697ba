//! Rate limiting for outbound calls.
//!
//! Two algorithms are available:
//!
//! - **Token bucket**: allows bursts up to a capacity while refilling
//!   continuously at a fixed rate.
//! - **Sliding window**: allows at most `limit` permits in any trailing
//!   window, counted in fixed-width buckets.
//!
//! A denied request comes back with a `retry_after` hint when one exists. A
//! request larger than the limiter's capacity can never succeed and gets no
//! hint.
//!
//! ```rust
//! use svcguard_ratelimiter::{RateLimiter, RateLimiterConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let limiter = RateLimiter::new(
//!     RateLimiterConfig::builder()
//!         .name("embeddings")
//!         .token_bucket(2.0, 1.0)
//!         .build(),
//! );
//!
//! assert!(limiter.try_acquire().allowed);
//! assert!(limiter.try_acquire().allowed);
//!
//! let denied = limiter.try_acquire();
//! assert!(!denied.allowed);
//! assert!(denied.retry_after.is_some());
//! # }
//! ```
//!
//! [`RateLimiterRegistry`] keys limiters by service and optional caller
//! identity.

#[cfg(feature = "metrics")]
use metrics::describe_counter;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::time::Duration;

pub use config::{Algorithm, RateLimiterConfig, RateLimiterConfigBuilder};
pub use error::RateLimitExceeded;
pub use events::RateLimiterEvent;
pub use limiter::RateLimiter;
pub use registry::RateLimiterRegistry;

mod config;
mod error;
mod events;
mod limiter;
mod registry;
mod sliding_window;
mod token_bucket;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

pub(crate) fn describe_metrics() {
    #[cfg(feature = "metrics")]
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "ratelimiter_calls_total",
            "Total number of permit requests, by outcome (allowed or rejected)"
        );
    });
}

/// The result of asking a limiter for permits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether the permits were granted.
    pub allowed: bool,
    /// How long until the same request could succeed. Always `None` when
    /// allowed, and `None` when the request can never succeed.
    pub retry_after: Option<Duration>,
    /// Permits left after this decision.
    pub remaining: u64,
}

impl Decision {
    pub(crate) fn allowed(remaining: u64) -> Self {
        Self {
            allowed: true,
            retry_after: None,
            remaining,
        }
    }

    pub(crate) fn denied(retry_after: Option<Duration>, remaining: u64) -> Self {
        Self {
            allowed: false,
            retry_after,
            remaining,
        }
    }

    /// Decision for a service with no limiter.
    pub fn unlimited() -> Self {
        Self::allowed(u64::MAX)
    }

    /// Converts a denial into a [`RateLimitExceeded`] error for `service`.
    pub fn into_result(self, service: &str) -> Result<Self, RateLimitExceeded> {
        if self.allowed {
            Ok(self)
        } else {
            Err(RateLimitExceeded {
                service: service.to_string(),
                retry_after: self.retry_after,
            })
        }
    }
}
