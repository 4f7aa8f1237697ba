use svcguard_core::ResilienceError;
use thiserror::Error;

/// Returned by [`CircuitBreaker::try_acquire`](crate::CircuitBreaker::try_acquire)
/// when the breaker refuses the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit breaker for '{service}' is open; call not permitted")]
pub struct CircuitOpenError {
    /// Service whose breaker rejected the call.
    pub service: String,
}

/// Errors returned by [`CircuitBreaker::call`](crate::CircuitBreaker::call).
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; the operation was not invoked.
    #[error(transparent)]
    OpenCircuit(#[from] CircuitOpenError),

    /// The operation ran and returned an error.
    #[error("operation error: {0}")]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    /// Returns true if the error indicates the circuit is open.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CircuitBreakerError::OpenCircuit(_))
    }

    /// Returns the operation error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            CircuitBreakerError::OpenCircuit(_) => None,
        }
    }
}

impl<E> From<CircuitOpenError> for ResilienceError<E> {
    fn from(err: CircuitOpenError) -> Self {
        ResilienceError::CircuitOpen {
            service: err.service,
        }
    }
}

impl<E> From<CircuitBreakerError<E>> for ResilienceError<E> {
    fn from(err: CircuitBreakerError<E>) -> Self {
        match err {
            CircuitBreakerError::OpenCircuit(open) => open.into(),
            CircuitBreakerError::Inner(e) => ResilienceError::Permanent(e),
        }
    }
}
