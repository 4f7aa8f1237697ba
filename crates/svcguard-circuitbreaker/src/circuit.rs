use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::time::{Duration, Instant};

/// Represents the state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CircuitState {
    /// The circuit is closed and calls are allowed.
    Closed = 0,
    /// The circuit is open and calls are rejected.
    Open = 1,
    /// The circuit admits a single trial call to probe recovery.
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    /// Stable lowercase label, used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time snapshot of a circuit breaker.
///
/// `failure_count` and `success_count` cover the period since the circuit
/// last entered `Closed`; `total_requests` and `rejected_count` cover the
/// breaker's lifetime (or since the last [`reset`](crate::CircuitBreaker::reset)).
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitMetrics {
    /// Current state of the circuit breaker.
    pub state: CircuitState,
    /// Failures recorded since the circuit last closed.
    pub failure_count: u32,
    /// Successes recorded since the circuit last closed.
    pub success_count: u32,
    /// Calls the breaker admitted.
    pub total_requests: u64,
    /// Calls the breaker rejected.
    pub rejected_count: u64,
    /// When the most recent failure was recorded.
    pub last_failure_time: Option<Instant>,
    /// When the most recent success was recorded.
    pub last_success_time: Option<Instant>,
    /// Time since the last state transition.
    pub time_since_state_change: Duration,
}

/// Result of asking the circuit for permission to run a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    /// The call may proceed. `trial` carries the half-open epoch when this
    /// call is the single recovery probe.
    Permitted { trial: Option<u64> },
    /// The call is refused; carries the state that refused it.
    Rejected(CircuitState),
}

/// How a completed call is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Success,
    Failure,
    Ignored,
}

pub(crate) struct Circuit {
    state: CircuitState,
    state_atomic: Arc<AtomicU8>,
    last_state_change: Instant,
    failure_count: u32,
    success_count: u32,
    total_requests: u64,
    rejected_count: u64,
    last_failure_time: Option<Instant>,
    last_success_time: Option<Instant>,
    trial_in_flight: bool,
    // Bumped on every transition so a stale half-open permit cannot settle a
    // later half-open episode.
    epoch: u64,
    pending: Vec<CircuitBreakerEvent>,
}

impl Circuit {
    pub(crate) fn new_with_atomic(state_atomic: Arc<AtomicU8>) -> Self {
        state_atomic.store(CircuitState::Closed as u8, Ordering::Release);
        Self {
            state: CircuitState::Closed,
            state_atomic,
            last_state_change: Instant::now(),
            failure_count: 0,
            success_count: 0,
            total_requests: 0,
            rejected_count: 0,
            last_failure_time: None,
            last_success_time: None,
            trial_in_flight: false,
            epoch: 0,
            pending: Vec::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn new() -> Self {
        Self::new_with_atomic(Arc::new(AtomicU8::new(CircuitState::Closed as u8)))
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    pub(crate) fn metrics(&self) -> CircuitMetrics {
        CircuitMetrics {
            state: self.state,
            failure_count: self.failure_count,
            success_count: self.success_count,
            total_requests: self.total_requests,
            rejected_count: self.rejected_count,
            last_failure_time: self.last_failure_time,
            last_success_time: self.last_success_time,
            time_since_state_change: self.last_state_change.elapsed(),
        }
    }

    /// Drains the events produced since the last call, so they can be emitted
    /// after the lock is released.
    pub(crate) fn take_events(&mut self) -> Vec<CircuitBreakerEvent> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn try_acquire(&mut self, config: &CircuitBreakerConfig) -> Admission {
        match self.state {
            CircuitState::Closed => self.permit(config, None),
            CircuitState::Open => {
                if self.open_elapsed() >= config.recovery_timeout {
                    self.transition_to(CircuitState::HalfOpen, config);
                    self.trial_in_flight = true;
                    self.permit(config, Some(self.epoch))
                } else {
                    self.reject(config)
                }
            }
            CircuitState::HalfOpen => {
                if self.trial_in_flight {
                    self.reject(config)
                } else {
                    self.trial_in_flight = true;
                    self.permit(config, Some(self.epoch))
                }
            }
        }
    }

    pub(crate) fn record(
        &mut self,
        config: &CircuitBreakerConfig,
        outcome: Outcome,
        trial: Option<u64>,
    ) {
        let is_trial = self.state == CircuitState::HalfOpen && trial == Some(self.epoch);
        let now = Instant::now();

        match outcome {
            Outcome::Success => {
                self.success_count = self.success_count.saturating_add(1);
                self.last_success_time = Some(now);
                self.pending.push(CircuitBreakerEvent::SuccessRecorded {
                    service: config.name.clone(),
                    timestamp: std::time::Instant::now(),
                    state: self.state,
                });

                if is_trial {
                    self.transition_to(CircuitState::Closed, config);
                }
            }
            Outcome::Failure => {
                self.failure_count = self.failure_count.saturating_add(1);
                self.last_failure_time = Some(now);
                self.pending.push(CircuitBreakerEvent::FailureRecorded {
                    service: config.name.clone(),
                    timestamp: std::time::Instant::now(),
                    state: self.state,
                    failure_count: self.failure_count,
                });

                if is_trial
                    || (self.state == CircuitState::Closed
                        && self.failure_count >= config.failure_threshold)
                {
                    self.transition_to(CircuitState::Open, config);
                }
            }
            Outcome::Ignored => {
                self.pending.push(CircuitBreakerEvent::IgnoredRecorded {
                    service: config.name.clone(),
                    timestamp: std::time::Instant::now(),
                    state: self.state,
                });

                if is_trial {
                    self.trial_in_flight = false;
                }
            }
        }

        #[cfg(feature = "metrics")]
        counter!(
            "circuitbreaker_calls_total",
            "circuitbreaker" => config.name.clone(),
            "outcome" => match outcome {
                Outcome::Success => "success",
                Outcome::Failure => "failure",
                Outcome::Ignored => "ignored",
            }
        )
        .increment(1);
    }

    /// Frees the half-open slot held by an abandoned permit without recording
    /// an outcome.
    pub(crate) fn release(&mut self, trial: Option<u64>) {
        if self.state == CircuitState::HalfOpen && trial == Some(self.epoch) {
            self.trial_in_flight = false;
        }
    }

    pub(crate) fn force_open(&mut self, config: &CircuitBreakerConfig) {
        self.transition_to(CircuitState::Open, config);
    }

    pub(crate) fn force_closed(&mut self, config: &CircuitBreakerConfig) {
        self.transition_to(CircuitState::Closed, config);
    }

    pub(crate) fn reset(&mut self, config: &CircuitBreakerConfig) {
        self.transition_to(CircuitState::Closed, config);
        self.failure_count = 0;
        self.success_count = 0;
        self.total_requests = 0;
        self.rejected_count = 0;
        self.last_failure_time = None;
        self.last_success_time = None;
    }

    fn open_elapsed(&self) -> Duration {
        let since = match self.last_failure_time {
            Some(failed) => failed.max(self.last_state_change),
            None => self.last_state_change,
        };
        since.elapsed()
    }

    fn permit(&mut self, config: &CircuitBreakerConfig, trial: Option<u64>) -> Admission {
        self.total_requests = self.total_requests.saturating_add(1);
        self.pending.push(CircuitBreakerEvent::CallPermitted {
            service: config.name.clone(),
            timestamp: std::time::Instant::now(),
            state: self.state,
        });
        Admission::Permitted { trial }
    }

    fn reject(&mut self, config: &CircuitBreakerConfig) -> Admission {
        self.rejected_count = self.rejected_count.saturating_add(1);
        self.pending.push(CircuitBreakerEvent::CallRejected {
            service: config.name.clone(),
            timestamp: std::time::Instant::now(),
            state: self.state,
        });

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "rejected").increment(1);

        Admission::Rejected(self.state)
    }

    fn transition_to(&mut self, state: CircuitState, config: &CircuitBreakerConfig) {
        if self.state == state {
            return;
        }

        let from_state = self.state;

        self.pending.push(CircuitBreakerEvent::StateTransition {
            service: config.name.clone(),
            timestamp: std::time::Instant::now(),
            from_state,
            to_state: state,
        });

        #[cfg(feature = "tracing")]
        tracing::info!(service = %config.name, from = %from_state, to = %state, "circuit state transition");

        #[cfg(feature = "metrics")]
        {
            counter!(
                "circuitbreaker_transitions_total",
                "circuitbreaker" => config.name.clone(),
                "from" => from_state.as_str(),
                "to" => state.as_str()
            )
            .increment(1);

            gauge!("circuitbreaker_state", "circuitbreaker" => config.name.clone())
                .set(state as u8 as f64);
        }

        self.state = state;
        self.state_atomic.store(state as u8, Ordering::Release);
        self.last_state_change = Instant::now();
        self.epoch = self.epoch.wrapping_add(1);
        self.trial_in_flight = false;

        if state == CircuitState::Closed {
            self.failure_count = 0;
            self.success_count = 0;
        }
    }
}
