use crate::config::{Algorithm, RateLimiterConfig};
use crate::events::RateLimiterEvent;
use crate::sliding_window::SlidingWindow;
use crate::token_bucket::TokenBucket;
use crate::{Decision, RateLimitExceeded};
#[cfg(feature = "metrics")]
use metrics::counter;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
enum State {
    TokenBucket(TokenBucket),
    SlidingWindow(SlidingWindow),
}

impl State {
    fn new(algorithm: Algorithm, now: Instant) -> Self {
        match algorithm {
            Algorithm::TokenBucket {
                capacity,
                refill_per_sec,
            } => State::TokenBucket(TokenBucket::new(capacity, refill_per_sec, now)),
            Algorithm::SlidingWindow {
                limit,
                window,
                buckets,
            } => State::SlidingWindow(SlidingWindow::new(limit, window, buckets, now)),
        }
    }

    fn at_full_capacity(&mut self, now: Instant) -> bool {
        match self {
            State::TokenBucket(bucket) => bucket.is_full_at(now),
            State::SlidingWindow(window) => window.is_empty_at(now),
        }
    }
}

#[derive(Debug)]
struct Slot {
    state: State,
    last_used: Instant,
}

impl Slot {
    fn new(algorithm: Algorithm, now: Instant) -> Self {
        Self {
            state: State::new(algorithm, now),
            last_used: now,
        }
    }
}

/// A single rate limiter. Cheap to clone; clones share state.
///
/// Every decision is made under one lock, so concurrent callers never
/// overdraw the limiter.
#[derive(Clone)]
pub struct RateLimiter {
    slot: Arc<Mutex<Slot>>,
    config: Arc<RateLimiterConfig>,
}

impl RateLimiter {
    /// Creates a limiter, initially at full capacity.
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot::new(config.algorithm, Instant::now()))),
            config: Arc::new(config),
        }
    }

    /// The limiter's name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Asks for a single permit.
    pub fn try_acquire(&self) -> Decision {
        self.try_acquire_n(1)
    }

    /// Asks for `n` permits at once.
    pub fn try_acquire_n(&self, n: u64) -> Decision {
        let decision = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            let now = Instant::now();
            slot.last_used = now;
            match &mut slot.state {
                State::TokenBucket(bucket) => bucket.try_consume(n as f64, now),
                State::SlidingWindow(window) => window.try_consume(n, now),
            }
        };

        if decision.allowed {
            self.config
                .event_listeners
                .emit(&RateLimiterEvent::PermitAcquired {
                    service: self.config.name.clone(),
                    timestamp: std::time::Instant::now(),
                    permits: n,
                    remaining: decision.remaining,
                });

            #[cfg(feature = "metrics")]
            counter!("ratelimiter_calls_total", "ratelimiter" => self.config.name.clone(), "outcome" => "allowed").increment(1);
        } else {
            self.config
                .event_listeners
                .emit(&RateLimiterEvent::PermitRejected {
                    service: self.config.name.clone(),
                    timestamp: std::time::Instant::now(),
                    permits: n,
                    retry_after: decision.retry_after,
                });

            #[cfg(feature = "tracing")]
            tracing::debug!(service = %self.config.name, permits = n, retry_after = ?decision.retry_after, "rate limit exceeded");

            #[cfg(feature = "metrics")]
            counter!("ratelimiter_calls_total", "ratelimiter" => self.config.name.clone(), "outcome" => "rejected").increment(1);
        }

        decision
    }

    /// Asks for a single permit, returning an error on denial.
    pub fn check(&self) -> Result<Decision, RateLimitExceeded> {
        self.try_acquire().into_result(&self.config.name)
    }

    /// Permits currently available, without consuming any.
    pub fn remaining(&self) -> u64 {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        match &mut slot.state {
            State::TokenBucket(bucket) => bucket.remaining_at(now),
            State::SlidingWindow(window) => window.remaining_at(now),
        }
    }

    /// Restores full capacity.
    pub fn reset(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Slot::new(self.config.algorithm, Instant::now());
    }

    /// Returns `true` once the limiter is back at full capacity and no
    /// permit has been requested for at least `idle_for`.
    pub fn is_idle(&self, idle_for: Duration) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        now.saturating_duration_since(slot.last_used) >= idle_for
            && slot.state.at_full_capacity(now)
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("name", &self.config.name)
            .field("algorithm", &self.config.algorithm)
            .finish()
    }
}
