//! Failure classification for circuit breaker decisions.
//!
//! A [`FailureClassifier`] looks at a finished call's result and decides
//! whether the breaker should count it as a failure. Used by
//! [`CircuitBreaker::call_classified`](crate::CircuitBreaker::call_classified):
//!
//! - `Ok` classified as a failure is recorded as a failure (e.g. a response
//!   carrying a 5xx status).
//! - `Ok` not classified as a failure is recorded as a success.
//! - `Err` classified as a failure is recorded as a failure.
//! - `Err` not classified as a failure is ignored and moves no counters.

use std::sync::Arc;
use svcguard_core::Classifier;

/// Decides whether a call result counts against the breaker.
pub trait FailureClassifier<Res, Err>: Send + Sync {
    /// Returns `true` if the result should be recorded as a failure.
    fn classify(&self, result: &Result<Res, Err>) -> bool;
}

/// Treats every error as a failure.
///
/// ```rust
/// use svcguard_circuitbreaker::{DefaultClassifier, FailureClassifier};
///
/// let classifier = DefaultClassifier;
/// assert!(!FailureClassifier::<u32, &str>::classify(&classifier, &Ok(1)));
/// assert!(FailureClassifier::<u32, &str>::classify(&classifier, &Err("down")));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl<Res, Err> FailureClassifier<Res, Err> for DefaultClassifier {
    fn classify(&self, result: &Result<Res, Err>) -> bool {
        result.is_err()
    }
}

/// A failure classifier backed by a closure.
///
/// ```rust
/// use svcguard_circuitbreaker::{FailureClassifier, FnClassifier};
/// use std::io::{Error, ErrorKind};
///
/// // Invalid input is the caller's fault, not the dependency's.
/// let classifier = FnClassifier::new(|result: &Result<String, Error>| match result {
///     Ok(_) => false,
///     Err(e) => e.kind() != ErrorKind::InvalidInput,
/// });
///
/// assert!(!classifier.classify(&Err(Error::new(ErrorKind::InvalidInput, "bad"))));
/// assert!(classifier.classify(&Err(Error::new(ErrorKind::ConnectionReset, "reset"))));
/// ```
#[derive(Clone)]
pub struct FnClassifier<F> {
    f: Arc<F>,
}

impl<F> FnClassifier<F> {
    /// Creates a new `FnClassifier` from the given closure.
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

impl<F, Res, Err> FailureClassifier<Res, Err> for FnClassifier<F>
where
    F: Fn(&Result<Res, Err>) -> bool + Send + Sync,
{
    fn classify(&self, result: &Result<Res, Err>) -> bool {
        (self.f)(result)
    }
}

impl<F> std::fmt::Debug for FnClassifier<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnClassifier").finish_non_exhaustive()
    }
}

/// Adapts a shared error [`Classifier`] so its `counts_as_failure` verdict
/// drives the breaker. Successful results are never failures.
pub struct ErrorClassifier<E> {
    inner: Classifier<E>,
}

impl<E> ErrorClassifier<E> {
    /// Wraps a shared classifier.
    pub fn new(inner: Classifier<E>) -> Self {
        Self { inner }
    }
}

impl<E> Clone for ErrorClassifier<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<Res, E> FailureClassifier<Res, E> for ErrorClassifier<E> {
    fn classify(&self, result: &Result<Res, E>) -> bool {
        match result {
            Ok(_) => false,
            Err(e) => (self.inner)(e).counts_as_failure,
        }
    }
}
