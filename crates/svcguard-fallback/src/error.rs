use svcguard_core::ResilienceError;
use thiserror::Error;

/// Every strategy in a service's fallback chain was skipped or failed.
#[derive(Debug, Clone, Error)]
#[error("all fallback strategies for '{service}' were exhausted (tried [{}])", .tried.join(", "))]
pub struct FallbackExhausted<E> {
    /// Service whose call fell back.
    pub service: String,
    /// The error that triggered the fallback.
    pub original: ResilienceError<E>,
    /// Strategies consulted, in order. Empty when the service has no chain.
    pub tried: Vec<String>,
}

impl<E> FallbackExhausted<E> {
    /// Returns the error that triggered the fallback.
    pub fn into_original(self) -> ResilienceError<E> {
        self.original
    }
}

impl<E> From<FallbackExhausted<E>> for ResilienceError<E> {
    fn from(err: FallbackExhausted<E>) -> Self {
        ResilienceError::FallbackExhausted {
            original: Box::new(err.original),
            tried: err.tried,
        }
    }
}
