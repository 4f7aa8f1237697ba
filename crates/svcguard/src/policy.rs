use serde::{Deserialize, Serialize};
use svcguard_core::classify::{self, Classifier};
use svcguard_retry::RetryConfig;

/// What the circuit breaker counts as one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerScope {
    /// The whole retry sequence is one breaker call: N failed attempts
    /// record a single failure, and an open breaker rejects before the first
    /// attempt.
    #[default]
    WholeSequence,
    /// Every attempt asks the breaker for a permit and records its own
    /// outcome. An open breaker ends the sequence at the next attempt.
    PerAttempt,
}

/// How calls to one service are classified and retried.
pub struct ServicePolicy<E> {
    pub(crate) classifier: Classifier<E>,
    pub(crate) retry: RetryConfig<E>,
    pub(crate) breaker_scope: BreakerScope,
}

impl<E> Clone for ServicePolicy<E> {
    fn clone(&self) -> Self {
        Self {
            classifier: self.classifier.clone(),
            retry: self.retry.clone(),
            breaker_scope: self.breaker_scope,
        }
    }
}

impl<E> Default for ServicePolicy<E> {
    fn default() -> Self {
        ServicePolicyBuilder::new().build()
    }
}

impl<E> std::fmt::Debug for ServicePolicy<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServicePolicy")
            .field("retry", &self.retry)
            .field("breaker_scope", &self.breaker_scope)
            .finish()
    }
}

impl<E> ServicePolicy<E> {
    pub fn builder() -> ServicePolicyBuilder<E> {
        ServicePolicyBuilder::new()
    }

    pub fn classifier(&self) -> &Classifier<E> {
        &self.classifier
    }

    pub fn retry(&self) -> &RetryConfig<E> {
        &self.retry
    }

    pub fn breaker_scope(&self) -> BreakerScope {
        self.breaker_scope
    }

    /// The same policy reporting retries under `service`.
    pub(crate) fn named(&self, service: &str) -> Self {
        Self {
            classifier: self.classifier.clone(),
            retry: self.retry.with_name(service),
            breaker_scope: self.breaker_scope,
        }
    }
}

/// Builder for [`ServicePolicy`].
pub struct ServicePolicyBuilder<E> {
    classifier: Classifier<E>,
    retry: RetryConfig<E>,
    breaker_scope: BreakerScope,
}

impl<E> Default for ServicePolicyBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> ServicePolicyBuilder<E> {
    /// Defaults:
    /// - classifier: every error is transient and counts as a breaker failure
    /// - retry: [`RetryConfig::default`] (3 attempts, exponential from 100ms)
    /// - breaker scope: [`BreakerScope::WholeSequence`]
    pub fn new() -> Self {
        Self {
            classifier: classify::all_transient(),
            retry: RetryConfig::default(),
            breaker_scope: BreakerScope::default(),
        }
    }

    /// Sets the classifier run once on every failed attempt.
    pub fn classifier<F>(mut self, f: F) -> Self
    where
        F: Fn(&E) -> svcguard_core::Classification + Send + Sync + 'static,
    {
        self.classifier = classify::classifier(f);
        self
    }

    /// Uses an already shared classifier.
    pub fn shared_classifier(mut self, classifier: Classifier<E>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Sets attempts and backoff. The config's retry predicate is not
    /// consulted; the classifier decides what is retryable.
    pub fn retry(mut self, retry: RetryConfig<E>) -> Self {
        self.retry = retry;
        self
    }

    pub fn breaker_scope(mut self, scope: BreakerScope) -> Self {
        self.breaker_scope = scope;
        self
    }

    pub fn build(self) -> ServicePolicy<E> {
        ServicePolicy {
            classifier: self.classifier,
            retry: self.retry,
            breaker_scope: self.breaker_scope,
        }
    }
}
