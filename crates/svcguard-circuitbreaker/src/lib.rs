//! Per-service circuit breakers.
//!
//! A circuit breaker stops calling a dependency that keeps failing, then
//! probes it with a single trial call once a recovery timeout has passed.
//!
//! ## States
//! - **Closed**: calls pass through; failures are counted and the circuit
//!   opens once `failure_threshold` is reached.
//! - **Open**: calls are rejected immediately without running the operation.
//! - **Half-Open**: exactly one trial call is admitted. Success closes the
//!   circuit, failure re-opens it and restarts the recovery timer. Concurrent
//!   callers are rejected while the trial is in flight.
//!
//! ## Usage
//!
//! ```rust
//! use svcguard_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let breaker = CircuitBreaker::new(
//!     CircuitBreakerConfig::builder()
//!         .name("vector-store")
//!         .failure_threshold(3)
//!         .recovery_timeout(Duration::from_secs(10))
//!         .build(),
//! );
//!
//! let result = breaker
//!     .call(|| async { Ok::<_, std::io::Error>("hit") })
//!     .await;
//! assert!(result.is_ok());
//! assert_eq!(breaker.state(), CircuitState::Closed);
//! # }
//! ```
//!
//! ## Permits
//!
//! When the caller needs to decide the outcome itself, take a [`CallPermit`]
//! and record the outcome on it. Dropping a permit without recording
//! anything (for example because the caller's future was cancelled) records
//! nothing and frees the half-open trial slot.
//!
//! ```rust
//! use svcguard_circuitbreaker::CircuitBreaker;
//!
//! let breaker = CircuitBreaker::default();
//! let permit = breaker.try_acquire().expect("closed breaker admits calls");
//! permit.ignore();
//! ```
//!
//! ## Registry
//!
//! [`CircuitBreakerRegistry`] creates one breaker per service name on first
//! use, from a per-service config or a default.

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
use metrics::{describe_counter, describe_gauge};
use svcguard_core::Classified;

pub use circuit::{CircuitMetrics, CircuitState};
pub use classifier::{DefaultClassifier, ErrorClassifier, FailureClassifier, FnClassifier};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use error::{CircuitBreakerError, CircuitOpenError};
pub use events::CircuitBreakerEvent;
pub use registry::CircuitBreakerRegistry;

use circuit::{Admission, Circuit, Outcome};

mod circuit;
pub mod classifier;
mod config;
mod error;
mod events;
mod registry;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

pub(crate) fn describe_metrics() {
    #[cfg(feature = "metrics")]
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "circuitbreaker_calls_total",
            "Total number of calls through the circuit breaker, by outcome"
        );
        describe_counter!(
            "circuitbreaker_transitions_total",
            "Total number of circuit breaker state transitions"
        );
        describe_gauge!(
            "circuitbreaker_state",
            "Current state of the circuit breaker (0 closed, 1 open, 2 half-open)"
        );
    });
}

struct Shared {
    circuit: Mutex<Circuit>,
    state_atomic: Arc<AtomicU8>,
    config: CircuitBreakerConfig,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Circuit> {
        self.circuit.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` under the circuit lock, then emits the events it produced
    /// once the lock is released so listeners may call back into the breaker.
    fn with_circuit<R>(&self, f: impl FnOnce(&mut Circuit, &CircuitBreakerConfig) -> R) -> R {
        let (result, events) = {
            let mut circuit = self.lock();
            let result = f(&mut circuit, &self.config);
            (result, circuit.take_events())
        };

        for event in &events {
            self.config.event_listeners.emit(event);
        }

        result
    }
}

/// A circuit breaker guarding one service.
///
/// Cheap to clone; clones share the same circuit.
#[derive(Clone)]
pub struct CircuitBreaker {
    shared: Arc<Shared>,
}

impl CircuitBreaker {
    /// Creates a breaker from a configuration.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        let state_atomic = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        Self {
            shared: Arc::new(Shared {
                circuit: Mutex::new(Circuit::new_with_atomic(Arc::clone(&state_atomic))),
                state_atomic,
                config,
            }),
        }
    }

    /// The service name this breaker reports under.
    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    /// The breaker's configuration.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.shared.config
    }

    /// Asks for permission to run one call.
    ///
    /// Returns [`CircuitOpenError`] while the circuit is open, or while it is
    /// half-open and the trial call is already in flight.
    pub fn try_acquire(&self) -> Result<CallPermit, CircuitOpenError> {
        let admission = self.shared.with_circuit(|c, config| c.try_acquire(config));

        match admission {
            Admission::Permitted { trial } => {
                #[cfg(feature = "tracing")]
                tracing::trace!(service = %self.name(), trial = trial.is_some(), "circuit breaker permitted call");

                Ok(CallPermit {
                    shared: Arc::clone(&self.shared),
                    trial,
                    settled: false,
                })
            }
            Admission::Rejected(_state) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(service = %self.name(), state = %_state, "circuit breaker rejected call");

                Err(CircuitOpenError {
                    service: self.name().to_string(),
                })
            }
        }
    }

    /// Runs `op` through the breaker, counting every error as a failure.
    pub async fn call<F, Fut, T, E>(&self, op: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_classified(&DefaultClassifier, op).await
    }

    /// Runs `op` through the breaker, letting `classifier` decide how the
    /// result is recorded. Errors the classifier does not count as failures
    /// are ignored rather than recorded as successes.
    pub async fn call_classified<C, F, Fut, T, E>(
        &self,
        classifier: &C,
        op: F,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        C: FailureClassifier<T, E> + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.try_acquire()?;
        let result = op().await;

        match (classifier.classify(&result), result.is_ok()) {
            (true, _) => permit.failure(),
            (false, true) => permit.success(),
            (false, false) => permit.ignore(),
        }

        result.map_err(CircuitBreakerError::Inner)
    }

    /// Returns the current state without taking the lock.
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.shared.state_atomic.load(Ordering::Acquire))
    }

    /// Returns a consistent snapshot of the breaker's counters.
    pub fn metrics(&self) -> CircuitMetrics {
        self.shared.lock().metrics()
    }

    /// Returns whether the circuit is currently open.
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Returns a simple health label: "healthy" when closed, "degraded" when
    /// half-open, "unhealthy" when open.
    pub fn health_status(&self) -> &'static str {
        match self.state() {
            CircuitState::Closed => "healthy",
            CircuitState::HalfOpen => "degraded",
            CircuitState::Open => "unhealthy",
        }
    }

    /// Closes the circuit and clears all counters.
    pub fn reset(&self) {
        self.shared.with_circuit(|c, config| c.reset(config));
    }

    /// Forces the circuit into the open state. The recovery timer starts now.
    pub fn force_open(&self) {
        self.shared.with_circuit(|c, config| c.force_open(config));
    }

    /// Forces the circuit into the closed state.
    pub fn force_closed(&self) {
        self.shared.with_circuit(|c, config| c.force_closed(config));
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name())
            .field("state", &self.state())
            .finish()
    }
}

/// Permission to run one call through a [`CircuitBreaker`].
///
/// Record the outcome with [`success`](Self::success),
/// [`failure`](Self::failure) or [`ignore`](Self::ignore). A permit dropped
/// without an outcome records nothing.
#[must_use = "an unrecorded permit counts as an abandoned call"]
pub struct CallPermit {
    shared: Arc<Shared>,
    trial: Option<u64>,
    settled: bool,
}

impl CallPermit {
    /// Returns `true` if this permit is the half-open trial call.
    pub fn is_trial(&self) -> bool {
        self.trial.is_some()
    }

    /// Records a successful call.
    pub fn success(self) {
        self.settle(Outcome::Success);
    }

    /// Records a failed call.
    pub fn failure(self) {
        self.settle(Outcome::Failure);
    }

    /// Records a call whose error should not affect the breaker.
    pub fn ignore(self) {
        self.settle(Outcome::Ignored);
    }

    /// Records a classified operation error: a failure if it counts as one,
    /// otherwise ignored.
    pub fn error<E>(self, error: &Classified<E>) {
        if error.counts_as_failure() {
            self.failure();
        } else {
            self.ignore();
        }
    }

    fn settle(mut self, outcome: Outcome) {
        self.settled = true;
        let trial = self.trial;
        self.shared
            .with_circuit(|c, config| c.record(config, outcome, trial));
    }
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        if self.settled {
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(service = %self.shared.config.name, "call abandoned before completion; nothing recorded");

        let trial = self.trial;
        self.shared.lock().release(trial);
    }
}

impl std::fmt::Debug for CallPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallPermit")
            .field("service", &self.shared.config.name)
            .field("trial", &self.trial.is_some())
            .finish()
    }
}
