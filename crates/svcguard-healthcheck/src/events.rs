use crate::HealthState;
use std::time::Instant;
use svcguard_core::ResilienceEvent;

/// Events emitted by the [`HealthMonitor`](crate::HealthMonitor).
#[derive(Debug, Clone)]
pub enum HealthEvent {
    /// A probe failed, timed out or panicked.
    CheckFailed {
        service: String,
        timestamp: Instant,
        /// Rendered failure.
        error: String,
    },

    /// A service's health state changed.
    StateChanged {
        service: String,
        timestamp: Instant,
        from: HealthState,
        to: HealthState,
    },
}

impl ResilienceEvent for HealthEvent {
    fn event_type(&self) -> &'static str {
        match self {
            HealthEvent::CheckFailed { .. } => "check_failed",
            HealthEvent::StateChanged { .. } => "state_changed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            HealthEvent::CheckFailed { timestamp, .. }
            | HealthEvent::StateChanged { timestamp, .. } => *timestamp,
        }
    }

    fn service(&self) -> &str {
        match self {
            HealthEvent::CheckFailed { service, .. } | HealthEvent::StateChanged { service, .. } => {
                service
            }
        }
    }
}
