use std::time::{Duration, Instant};
use svcguard_core::events::ResilienceEvent;

/// Events emitted by the retry executor.
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// An attempt failed and another one will follow after `delay`.
    Retry {
        service: String,
        timestamp: Instant,
        /// The attempt that just failed (1-indexed).
        attempt: u32,
        delay: Duration,
    },
    /// The operation succeeded, on the first try or after retries.
    Success {
        service: String,
        timestamp: Instant,
        attempts: u32,
    },
    /// Every attempt failed with a retryable error.
    Exhausted {
        service: String,
        timestamp: Instant,
        attempts: u32,
    },
    /// An error was not retried because it is not retryable.
    IgnoredError {
        service: String,
        timestamp: Instant,
        attempt: u32,
    },
}

impl ResilienceEvent for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RetryEvent::Retry { .. } => "retry",
            RetryEvent::Success { .. } => "success",
            RetryEvent::Exhausted { .. } => "exhausted",
            RetryEvent::IgnoredError { .. } => "ignored_error",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RetryEvent::Retry { timestamp, .. }
            | RetryEvent::Success { timestamp, .. }
            | RetryEvent::Exhausted { timestamp, .. }
            | RetryEvent::IgnoredError { timestamp, .. } => *timestamp,
        }
    }

    fn service(&self) -> &str {
        match self {
            RetryEvent::Retry { service, .. }
            | RetryEvent::Success { service, .. }
            | RetryEvent::Exhausted { service, .. }
            | RetryEvent::IgnoredError { service, .. } => service,
        }
    }
}
