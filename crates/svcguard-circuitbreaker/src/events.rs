use crate::CircuitState;
use std::time::Instant;
use svcguard_core::ResilienceEvent;

/// Events emitted by a circuit breaker.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// A call was permitted through the circuit breaker.
    CallPermitted {
        service: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A call was rejected without running the operation.
    CallRejected {
        service: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// The circuit breaker transitioned between states.
    StateTransition {
        service: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    /// A successful call was recorded.
    SuccessRecorded {
        service: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A failed call was recorded.
    FailureRecorded {
        service: String,
        timestamp: Instant,
        state: CircuitState,
        failure_count: u32,
    },
    /// A call finished with an error the classifier chose to ignore.
    IgnoredRecorded {
        service: String,
        timestamp: Instant,
        state: CircuitState,
    },
}

impl ResilienceEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::CallPermitted { .. } => "call_permitted",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::SuccessRecorded { .. } => "success_recorded",
            CircuitBreakerEvent::FailureRecorded { .. } => "failure_recorded",
            CircuitBreakerEvent::IgnoredRecorded { .. } => "ignored_recorded",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::CallPermitted { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. }
            | CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::SuccessRecorded { timestamp, .. }
            | CircuitBreakerEvent::FailureRecorded { timestamp, .. }
            | CircuitBreakerEvent::IgnoredRecorded { timestamp, .. } => *timestamp,
        }
    }

    fn service(&self) -> &str {
        match self {
            CircuitBreakerEvent::CallPermitted { service, .. }
            | CircuitBreakerEvent::CallRejected { service, .. }
            | CircuitBreakerEvent::StateTransition { service, .. }
            | CircuitBreakerEvent::SuccessRecorded { service, .. }
            | CircuitBreakerEvent::FailureRecorded { service, .. }
            | CircuitBreakerEvent::IgnoredRecorded { service, .. } => service,
        }
    }
}
