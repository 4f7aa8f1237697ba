use std::time::{Duration, Instant};
use svcguard_core::events::ResilienceEvent;

/// Events emitted by a rate limiter.
#[derive(Debug, Clone)]
pub enum RateLimiterEvent {
    /// A request obtained its permits.
    PermitAcquired {
        service: String,
        timestamp: Instant,
        permits: u64,
        remaining: u64,
    },
    /// A request was denied.
    PermitRejected {
        service: String,
        timestamp: Instant,
        permits: u64,
        /// `None` when the request can never be satisfied.
        retry_after: Option<Duration>,
    },
}

impl ResilienceEvent for RateLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RateLimiterEvent::PermitAcquired { .. } => "permit_acquired",
            RateLimiterEvent::PermitRejected { .. } => "permit_rejected",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RateLimiterEvent::PermitAcquired { timestamp, .. }
            | RateLimiterEvent::PermitRejected { timestamp, .. } => *timestamp,
        }
    }

    fn service(&self) -> &str {
        match self {
            RateLimiterEvent::PermitAcquired { service, .. }
            | RateLimiterEvent::PermitRejected { service, .. } => service,
        }
    }
}
