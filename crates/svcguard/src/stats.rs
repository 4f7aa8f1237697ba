//! Per-service call counters and metric snapshots.

use std::sync::atomic::{AtomicU64, Ordering};
use svcguard_circuitbreaker::{CircuitMetrics, CircuitState};
use svcguard_healthcheck::HealthStatus;

/// How a coordinated call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum CallOutcome {
    Success,
    Fallback,
    Permanent,
    CircuitOpen,
    RateLimited,
    RetryExhausted,
    FallbackExhausted,
}

impl CallOutcome {
    #[cfg(any(feature = "tracing", feature = "metrics"))]
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Success => "success",
            CallOutcome::Fallback => "fallback",
            CallOutcome::Permanent => "permanent",
            CallOutcome::CircuitOpen => "circuit_open",
            CallOutcome::RateLimited => "rate_limited",
            CallOutcome::RetryExhausted => "retry_exhausted",
            CallOutcome::FallbackExhausted => "fallback_exhausted",
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct CallCounters {
    total: AtomicU64,
    succeeded: AtomicU64,
    fallbacks: AtomicU64,
    permanent: AtomicU64,
    circuit_open: AtomicU64,
    rate_limited: AtomicU64,
    retry_exhausted: AtomicU64,
    fallback_exhausted: AtomicU64,
}

impl CallCounters {
    pub(crate) fn record(&self, outcome: CallOutcome) {
        self.total.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            CallOutcome::Success => &self.succeeded,
            CallOutcome::Fallback => &self.fallbacks,
            CallOutcome::Permanent => &self.permanent,
            CallOutcome::CircuitOpen => &self.circuit_open,
            CallOutcome::RateLimited => &self.rate_limited,
            CallOutcome::RetryExhausted => &self.retry_exhausted,
            CallOutcome::FallbackExhausted => &self.fallback_exhausted,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CallStats {
        CallStats {
            total: self.total.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            permanent_failures: self.permanent.load(Ordering::Relaxed),
            circuit_open: self.circuit_open.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            retry_exhausted: self.retry_exhausted.load(Ordering::Relaxed),
            fallback_exhausted: self.fallback_exhausted.load(Ordering::Relaxed),
        }
    }
}

/// Counts of coordinated calls by how they ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallStats {
    pub total: u64,
    /// Returned the operation's own value.
    pub succeeded: u64,
    /// Returned a fallback value.
    pub fallbacks: u64,
    pub permanent_failures: u64,
    pub circuit_open: u64,
    pub rate_limited: u64,
    pub retry_exhausted: u64,
    pub fallback_exhausted: u64,
}

/// Point-in-time view of one service.
#[derive(Debug, Clone)]
pub struct ServiceMetrics {
    pub service: String,
    pub calls: CallStats,
    /// `None` until the service's breaker has been created.
    pub breaker: Option<CircuitMetrics>,
    /// Shared (identity-less) limiter capacity; `None` if not rate limited.
    pub rate_limit_remaining: Option<u64>,
    /// `None` if the service is not health checked.
    pub health: Option<HealthStatus>,
}

impl ServiceMetrics {
    /// Breaker state, treating a breaker that does not exist yet as closed.
    pub fn breaker_state(&self) -> CircuitState {
        self.breaker
            .as_ref()
            .map_or(CircuitState::Closed, |m| m.state)
    }
}
