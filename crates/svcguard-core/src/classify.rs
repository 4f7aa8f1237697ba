//! Error classification.
//!
//! An operation error is classified exactly once, at the point the operation
//! fails. The resulting [`Classification`] travels with the error inside
//! [`Classified`] so that the retry executor and the circuit breaker read the
//! same verdict instead of classifying again.

use std::fmt;
use std::sync::Arc;

/// How an operation error should be treated by the resilience stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Classification {
    /// The error is transient and the operation may be retried.
    pub retryable: bool,
    /// The error counts toward the circuit breaker's failure threshold.
    pub counts_as_failure: bool,
}

impl Classification {
    /// A transient error: retried, and counted against the breaker.
    pub const fn transient() -> Self {
        Self {
            retryable: true,
            counts_as_failure: true,
        }
    }

    /// A permanent error: propagated immediately, and counted against the breaker.
    pub const fn permanent() -> Self {
        Self {
            retryable: false,
            counts_as_failure: true,
        }
    }

    /// An error the breaker should not see at all (e.g. a caller mistake such
    /// as an invalid request). Not retried.
    pub const fn ignored() -> Self {
        Self {
            retryable: false,
            counts_as_failure: false,
        }
    }
}

/// Implemented by error types that know their own classification.
///
/// ```
/// use svcguard_core::{Classification, Classify};
///
/// enum LlmError {
///     Overloaded,
///     BadPrompt,
/// }
///
/// impl Classify for LlmError {
///     fn classification(&self) -> Classification {
///         match self {
///             LlmError::Overloaded => Classification::transient(),
///             LlmError::BadPrompt => Classification::ignored(),
///         }
///     }
/// }
///
/// assert!(LlmError::Overloaded.classification().retryable);
/// assert!(!LlmError::BadPrompt.classification().counts_as_failure);
/// ```
pub trait Classify {
    /// Returns how this error should be handled.
    fn classification(&self) -> Classification;
}

/// A per-service classification function.
pub type Classifier<E> = Arc<dyn Fn(&E) -> Classification + Send + Sync>;

/// Builds a [`Classifier`] from a closure.
pub fn classifier<E, F>(f: F) -> Classifier<E>
where
    F: Fn(&E) -> Classification + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A classifier that treats every error as transient.
pub fn all_transient<E>() -> Classifier<E> {
    Arc::new(|_| Classification::transient())
}

/// A classifier that defers to the error's own [`Classify`] impl.
pub fn from_classify<E: Classify>() -> Classifier<E> {
    Arc::new(|e: &E| e.classification())
}

/// An operation error paired with its classification.
#[derive(Clone, PartialEq, Eq)]
pub struct Classified<E> {
    /// The original error.
    pub error: E,
    /// The verdict assigned when the error occurred.
    pub class: Classification,
}

impl<E> Classified<E> {
    /// Classifies `error` with `classifier`.
    pub fn new(error: E, classifier: &Classifier<E>) -> Self {
        let class = classifier(&error);
        Self { error, class }
    }

    /// Pairs an error with an already known classification.
    pub fn with_class(error: E, class: Classification) -> Self {
        Self { error, class }
    }

    /// Returns `true` if the error may be retried.
    pub fn is_retryable(&self) -> bool {
        self.class.retryable
    }

    /// Returns `true` if the error should count against the circuit breaker.
    pub fn counts_as_failure(&self) -> bool {
        self.class.counts_as_failure
    }

    /// Discards the classification.
    pub fn into_inner(self) -> E {
        self.error
    }
}

impl<E: fmt::Debug> fmt::Debug for Classified<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classified")
            .field("error", &self.error)
            .field("retryable", &self.class.retryable)
            .field("counts_as_failure", &self.class.counts_as_failure)
            .finish()
    }
}

impl<E: fmt::Display> fmt::Display for Classified<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}
