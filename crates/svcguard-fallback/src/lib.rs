//! Fallback chains for degraded responses.
//!
//! When a protected call finally fails (breaker open, rate limited, or
//! retries exhausted) a [`FallbackChain`] offers ordered alternatives:
//!
//! - [`CachedValue`]: the last good value for the same cache key, within a TTL
//! - [`StaticValue`]: a constant default
//! - [`Alternate`]: a different implementation, such as a smaller model
//! - [`FnStrategy`]: a value computed from the failure
//!
//! Strategies that do not apply are skipped. Strategies that fail, or
//! panic, are treated the same way. The first value produced wins.
//!
//! ```rust
//! use svcguard_core::{CallContext, ResilienceError};
//! use svcguard_fallback::{FallbackChain, FallbackHandler};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let chain = FallbackChain::<String, std::io::Error>::builder()
//!     .cached(Duration::from_secs(300))
//!     .static_value("service is busy, try again shortly".to_string())
//!     .build();
//! let handler = FallbackHandler::new().with_chain("llm", chain);
//!
//! let error = ResilienceError::CircuitOpen { service: "llm".to_string() };
//! let value = handler.handle("llm", error, &CallContext::new()).await.unwrap();
//! assert_eq!(value, "service is busy, try again shortly");
//! # }
//! ```

#[cfg(feature = "metrics")]
use metrics::describe_counter;
#[cfg(feature = "metrics")]
use std::sync::Once;

pub use chain::{FallbackChain, FallbackChainBuilder};
pub use error::FallbackExhausted;
pub use events::FallbackEvent;
pub use handler::FallbackHandler;
pub use strategy::{
    Alternate, Attempt, CachedValue, FallbackContext, FallbackStrategy, FnStrategy, StaticValue,
};

mod chain;
mod error;
mod events;
mod handler;
mod strategy;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

pub(crate) fn describe_metrics() {
    #[cfg(feature = "metrics")]
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "fallback_calls_total",
            "Total number of fallback chain runs, by result (applied or exhausted)"
        );
    });
}
