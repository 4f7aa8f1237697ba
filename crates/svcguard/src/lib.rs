//! Per-service resilience for calls to unreliable dependencies.
//!
//! `svcguard` puts four protections in front of every call to a named
//! service:
//!
//! - [`ratelimiter`]: token bucket or sliding window admission, optionally
//!   per caller identity
//! - [`circuitbreaker`]: stops calling a failing service until it has had
//!   time to recover
//! - [`retry`]: re-runs transient failures with exponential backoff
//! - [`fallback`]: an ordered chain of substitutes for calls that could not
//!   be served
//!
//! A [`ResilienceCoordinator`] composes them in that order. A
//! [`healthcheck`] monitor can run alongside and report readiness.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use svcguard::circuitbreaker::CircuitBreakerConfig;
//! use svcguard::fallback::FallbackChain;
//! use svcguard::retry::RetryConfig;
//! use svcguard::{ResilienceCoordinator, ServicePolicy};
//!
//! #[derive(Debug)]
//! struct UpstreamError;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let coordinator = ResilienceCoordinator::<String, UpstreamError>::builder()
//!     .circuit_breaker(
//!         "profile",
//!         CircuitBreakerConfig::builder()
//!             .failure_threshold(5)
//!             .recovery_timeout(Duration::from_secs(30))
//!             .build(),
//!     )
//!     .policy(
//!         "profile",
//!         ServicePolicy::builder()
//!             .retry(RetryConfig::builder().max_attempts(2).build())
//!             .build(),
//!     )
//!     .fallback(
//!         "profile",
//!         FallbackChain::builder()
//!             .static_value("anonymous".to_string())
//!             .build(),
//!     )
//!     .build();
//!
//! let name = coordinator
//!     .call("profile", || async { Err::<String, _>(UpstreamError) })
//!     .await;
//! assert_eq!(name.unwrap(), "anonymous");
//!
//! let stats = coordinator.metrics("profile").calls;
//! assert_eq!(stats.fallbacks, 1);
//! # }
//! ```
//!
//! # Configuration
//!
//! Per-service settings can be loaded from any serde format into
//! [`ResilienceSettings`] and applied with
//! [`CoordinatorBuilder::settings`]. See the [`settings`] module.
//!
//! # Tower
//!
//! [`GuardLayer`] wraps any Tower service whose requests are `Clone`.
//!
//! # Features
//!
//! - `tracing` (default): structured debug logs for every state change
//! - `metrics`: counters and gauges through the `metrics` facade

#[cfg(feature = "metrics")]
use metrics::describe_counter;
#[cfg(feature = "metrics")]
use std::sync::Once;

pub use coordinator::{CoordinatorBuilder, ResilienceCoordinator};
pub use layer::{GuardLayer, GuardService};
pub use stats::{CallStats, ServiceMetrics};
pub use policy::{BreakerScope, ServicePolicy, ServicePolicyBuilder};
pub use settings::{
    CircuitBreakerSettings, ConfigError, HealthCheckSettings, JitterSetting, RateLimitSettings,
    ResilienceSettings, RetrySettings, ServiceSettings,
};

pub use svcguard_core::{
    CallContext, Classification, Classified, Classifier, Classify, ResilienceError,
};

pub use svcguard_circuitbreaker as circuitbreaker;
pub use svcguard_fallback as fallback;
pub use svcguard_healthcheck as healthcheck;
pub use svcguard_ratelimiter as ratelimiter;
pub use svcguard_retry as retry;

mod coordinator;
mod layer;
mod policy;
pub mod settings;
mod stats;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

pub(crate) fn describe_metrics() {
    #[cfg(feature = "metrics")]
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "coordinator_calls_total",
            "Total number of coordinated calls, by service and outcome"
        );
    });
}
