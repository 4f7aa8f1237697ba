use svcguard_core::ResilienceError;
use thiserror::Error;

/// Why [`execute_with_retry`](crate::execute_with_retry) gave up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryError<E> {
    /// The operation failed with an error that is not retryable. It was
    /// returned immediately, without waiting.
    #[error("non-retryable error: {0}")]
    NotRetryable(E),

    /// Every allowed attempt failed with a retryable error.
    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    Exhausted {
        /// Number of times the operation was invoked.
        attempts: u32,
        /// The error from the final attempt.
        last_error: E,
    },
}

impl<E> RetryError<E> {
    /// Returns the operation error that ended the sequence.
    pub fn into_inner(self) -> E {
        match self {
            RetryError::NotRetryable(e) => e,
            RetryError::Exhausted { last_error, .. } => last_error,
        }
    }

    /// Borrows the operation error that ended the sequence.
    pub fn inner(&self) -> &E {
        match self {
            RetryError::NotRetryable(e) => e,
            RetryError::Exhausted { last_error, .. } => last_error,
        }
    }

    /// Returns true if retries ran out.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    /// Maps the operation error.
    pub fn map<F, T>(self, f: F) -> RetryError<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            RetryError::NotRetryable(e) => RetryError::NotRetryable(f(e)),
            RetryError::Exhausted {
                attempts,
                last_error,
            } => RetryError::Exhausted {
                attempts,
                last_error: f(last_error),
            },
        }
    }
}

impl<E> From<RetryError<E>> for ResilienceError<E> {
    fn from(err: RetryError<E>) -> Self {
        match err {
            RetryError::NotRetryable(e) => ResilienceError::Permanent(e),
            RetryError::Exhausted {
                attempts,
                last_error,
            } => ResilienceError::RetryExhausted {
                attempts,
                last_error,
            },
        }
    }
}
