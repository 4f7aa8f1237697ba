use crate::events::RateLimiterEvent;
use std::time::Duration;
use svcguard_core::events::{EventListeners, FnListener};

/// Which algorithm a limiter runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Algorithm {
    /// Continuous refill: bursts up to `capacity`, sustained
    /// `refill_per_sec` permits per second.
    TokenBucket {
        /// Maximum tokens held.
        capacity: f64,
        /// Tokens added per second.
        refill_per_sec: f64,
    },
    /// At most `limit` permits in any trailing `window`, counted in
    /// `buckets` sub-intervals.
    SlidingWindow {
        /// Permits allowed per window.
        limit: u64,
        /// Length of the trailing window.
        window: Duration,
        /// Number of buckets the window is divided into.
        buckets: u32,
    },
}

/// Configuration for the rate limiter pattern.
#[derive(Clone, Debug)]
pub struct RateLimiterConfig {
    pub(crate) algorithm: Algorithm,
    pub(crate) event_listeners: EventListeners<RateLimiterEvent>,
    pub(crate) name: String,
}

impl RateLimiterConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> RateLimiterConfigBuilder {
        RateLimiterConfigBuilder::new()
    }

    /// The configured algorithm.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// The name reported in events, logs and metrics.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        RateLimiterConfigBuilder::new().build()
    }
}

/// Builder for [`RateLimiterConfig`].
pub struct RateLimiterConfigBuilder {
    algorithm: Algorithm,
    event_listeners: EventListeners<RateLimiterEvent>,
    name: String,
}

impl Default for RateLimiterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiterConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - algorithm: token bucket, capacity 50, refilled at 50 per second
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        crate::describe_metrics();
        Self {
            algorithm: Algorithm::TokenBucket {
                capacity: 50.0,
                refill_per_sec: 50.0,
            },
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Uses a token bucket holding up to `capacity` tokens, refilled at
    /// `refill_per_sec` tokens per second. Negative or non-finite values are
    /// treated as zero.
    pub fn token_bucket(mut self, capacity: f64, refill_per_sec: f64) -> Self {
        let sanitize = |v: f64| if v.is_finite() { v.max(0.0) } else { 0.0 };
        self.algorithm = Algorithm::TokenBucket {
            capacity: sanitize(capacity),
            refill_per_sec: sanitize(refill_per_sec),
        };
        self
    }

    /// Uses a sliding window allowing `limit` permits per trailing `window`,
    /// counted in 10 buckets unless [`buckets`](Self::buckets) says otherwise.
    pub fn sliding_window(mut self, limit: u64, window: Duration) -> Self {
        self.algorithm = Algorithm::SlidingWindow {
            limit,
            window,
            buckets: 10,
        };
        self
    }

    /// Sets the number of buckets a sliding window is divided into. More
    /// buckets release capacity more smoothly. Ignored for token buckets.
    pub fn buckets(mut self, count: u32) -> Self {
        if let Algorithm::SlidingWindow { buckets, .. } = &mut self.algorithm {
            *buckets = count.max(1);
        }
        self
    }

    /// Sets the name for this rate limiter instance (used in events).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback when a permit is acquired.
    ///
    /// # Callback Signature
    /// `Fn(u64)`: permits remaining after this request.
    pub fn on_permit_acquired<F>(mut self, f: F) -> Self
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimiterEvent::PermitAcquired { remaining, .. } = event {
                f(*remaining);
            }
        }));
        self
    }

    /// Registers a callback when a request is denied.
    ///
    /// # Callback Signature
    /// `Fn(Option<Duration>)`: the suggested wait, `None` if the request can
    /// never be satisfied.
    pub fn on_permit_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<Duration>) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimiterEvent::PermitRejected { retry_after, .. } = event {
                f(*retry_after);
            }
        }));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> RateLimiterConfig {
        RateLimiterConfig {
            algorithm: self.algorithm,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }
}
