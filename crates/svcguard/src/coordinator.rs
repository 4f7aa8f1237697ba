//! The composition root: rate limit, circuit breaker, retry, fallback.

use crate::stats::{CallCounters, CallOutcome, ServiceMetrics};
use crate::policy::{BreakerScope, ServicePolicy};
use crate::settings::{ConfigError, ResilienceSettings};
use dashmap::DashMap;
use futures::FutureExt;
#[cfg(feature = "metrics")]
use metrics::counter;
use std::borrow::Cow;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use svcguard_circuitbreaker::{CircuitBreakerConfig, CircuitBreakerRegistry, CircuitOpenError};
use svcguard_core::{CallContext, Classified, ResilienceError};
use svcguard_fallback::{FallbackChain, FallbackHandler};
use svcguard_healthcheck::HealthMonitor;
use svcguard_ratelimiter::{RateLimiterConfig, RateLimiterRegistry};
use svcguard_retry::{execute_with_retry_if, RetryError};

/// Why one attempt under [`BreakerScope::PerAttempt`] did not produce a value.
enum AttemptError<E> {
    Open(CircuitOpenError),
    Failed(Classified<E>),
}

struct Inner<T, E> {
    breakers: Arc<CircuitBreakerRegistry>,
    limiters: Arc<RateLimiterRegistry>,
    monitor: Option<HealthMonitor>,
    fallbacks: FallbackHandler<T, E>,
    policies: HashMap<String, ServicePolicy<E>>,
    default_policy: ServicePolicy<E>,
    counters: DashMap<String, Arc<CallCounters>>,
}

/// Protects calls to named services.
///
/// Every call goes through, in order:
///
/// 1. the service's **rate limiter**, which rejects before any breaker or
///    retry budget is spent;
/// 2. the service's **circuit breaker**, which rejects without running the
///    operation while open;
/// 3. **retry**, which re-runs the operation on transient errors with
///    backoff;
/// 4. the service's **fallback chain**, consulted only when the call ended
///    with an open circuit, a rate limit or exhausted retries.
///
/// Errors are classified once, when the operation fails. Permanent errors
/// skip retry and fallback and come back as [`ResilienceError::Permanent`].
///
/// By default the breaker sees the whole retry sequence as one call, so a
/// sequence of failed attempts records a single breaker failure. See
/// [`BreakerScope`].
///
/// Cheap to clone; clones share all state.
pub struct ResilienceCoordinator<T, E> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Clone for ResilienceCoordinator<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> std::fmt::Debug for ResilienceCoordinator<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilienceCoordinator")
            .field("breakers", &self.inner.breakers)
            .field("limiters", &self.inner.limiters)
            .field("policies", &self.inner.policies.keys().collect::<Vec<_>>())
            .field("fallbacks", &self.inner.fallbacks)
            .finish()
    }
}

impl<T, E> ResilienceCoordinator<T, E> {
    /// Creates a new coordinator builder.
    pub fn builder() -> CoordinatorBuilder<T, E> {
        CoordinatorBuilder::new()
    }

    /// Runs `op` for `service` under the service's policies.
    ///
    /// `op` may be invoked several times (once per retry attempt) or not at
    /// all (rate limited or circuit open).
    pub async fn call<F, Fut>(&self, service: &str, op: F) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_with(service, &CallContext::default(), op).await
    }

    /// Like [`call`](Self::call), with a caller identity for rate limiting
    /// and a cache key for fallbacks.
    pub async fn call_with<F, Fut>(
        &self,
        service: &str,
        call: &CallContext,
        op: F,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let (outcome, result) = match self.protected(service, call, op).await {
            Ok(value) => {
                self.inner.fallbacks.observe_success(service, call, &value);
                (CallOutcome::Success, Ok(value))
            }
            Err(error)
                if error.recoverable_by_fallback() && self.inner.fallbacks.has_chain(service) =>
            {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    service,
                    cause = outcome_of(&error).as_str(),
                    "primary path failed, trying fallback"
                );

                match self.inner.fallbacks.handle(service, error, call).await {
                    Ok(value) => (CallOutcome::Fallback, Ok(value)),
                    Err(exhausted) => (CallOutcome::FallbackExhausted, Err(exhausted.into())),
                }
            }
            Err(error) => (outcome_of(&error), Err(error)),
        };

        self.record(service, outcome);
        result
    }

    /// Rate limit, breaker and retry, without fallback.
    async fn protected<F, Fut>(
        &self,
        service: &str,
        call: &CallContext,
        mut op: F,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.inner
            .limiters
            .consume(service, call.identity_str())
            .into_result(service)?;

        let policy = self.policy(service);
        let classifier = &policy.classifier;
        let breaker = self.inner.breakers.get_or_create(service);

        match policy.breaker_scope {
            BreakerScope::WholeSequence => {
                let permit = breaker.try_acquire()?;

                let result = execute_with_retry_if(
                    || op().map(move |r| r.map_err(|e| Classified::new(e, classifier))),
                    &policy.retry,
                    |e: &Classified<E>| e.is_retryable(),
                )
                .await;

                match result {
                    Ok(value) => {
                        permit.success();
                        Ok(value)
                    }
                    Err(RetryError::NotRetryable(error)) => {
                        permit.error(&error);
                        Err(ResilienceError::Permanent(error.into_inner()))
                    }
                    Err(RetryError::Exhausted {
                        attempts,
                        last_error,
                    }) => {
                        permit.error(&last_error);
                        Err(ResilienceError::RetryExhausted {
                            attempts,
                            last_error: last_error.into_inner(),
                        })
                    }
                }
            }
            BreakerScope::PerAttempt => {
                let result = execute_with_retry_if(
                    || {
                        let admitted = breaker.try_acquire().map(|permit| (permit, op()));
                        async move {
                            let (permit, fut) = match admitted {
                                Ok(admitted) => admitted,
                                Err(open) => return Err(AttemptError::Open(open)),
                            };
                            match fut.await {
                                Ok(value) => {
                                    permit.success();
                                    Ok(value)
                                }
                                Err(e) => {
                                    let error = Classified::new(e, classifier);
                                    permit.error(&error);
                                    Err(AttemptError::Failed(error))
                                }
                            }
                        }
                    },
                    &policy.retry,
                    |e: &AttemptError<E>| matches!(e, AttemptError::Failed(c) if c.is_retryable()),
                )
                .await;

                result.map_err(|err| match err {
                    RetryError::NotRetryable(AttemptError::Open(open))
                    | RetryError::Exhausted {
                        last_error: AttemptError::Open(open),
                        ..
                    } => open.into(),
                    RetryError::NotRetryable(AttemptError::Failed(error)) => {
                        ResilienceError::Permanent(error.into_inner())
                    }
                    RetryError::Exhausted {
                        attempts,
                        last_error: AttemptError::Failed(error),
                    } => ResilienceError::RetryExhausted {
                        attempts,
                        last_error: error.into_inner(),
                    },
                })
            }
        }
    }

    fn policy(&self, service: &str) -> Cow<'_, ServicePolicy<E>> {
        match self.inner.policies.get(service) {
            Some(policy) => Cow::Borrowed(policy),
            None => Cow::Owned(self.inner.default_policy.named(service)),
        }
    }

    fn record(&self, service: &str, outcome: CallOutcome) {
        let counters = match self.inner.counters.get(service) {
            Some(counters) => Arc::clone(&counters),
            None => self
                .inner
                .counters
                .entry(service.to_string())
                .or_default()
                .clone(),
        };
        counters.record(outcome);

        #[cfg(feature = "tracing")]
        tracing::debug!(service, outcome = outcome.as_str(), "call finished");

        #[cfg(feature = "metrics")]
        counter!(
            "coordinator_calls_total",
            "service" => service.to_string(),
            "outcome" => outcome.as_str()
        )
        .increment(1);
    }

    /// Snapshot of one service: call counters, breaker, limiter and health.
    pub fn metrics(&self, service: &str) -> ServiceMetrics {
        ServiceMetrics {
            service: service.to_string(),
            calls: self
                .inner
                .counters
                .get(service)
                .map(|c| c.snapshot())
                .unwrap_or_default(),
            breaker: self.inner.breakers.get(service).map(|b| b.metrics()),
            rate_limit_remaining: self.inner.limiters.remaining(service, None),
            health: self.inner.monitor.as_ref().and_then(|m| m.status(service)),
        }
    }

    /// Every critical health-checked service is healthy. True without a
    /// monitor.
    pub fn is_ready(&self) -> bool {
        self.inner.monitor.as_ref().map_or(true, HealthMonitor::is_ready)
    }

    /// No critical health-checked service is unhealthy. True without a
    /// monitor.
    pub fn is_live(&self) -> bool {
        self.inner.monitor.as_ref().map_or(true, HealthMonitor::is_live)
    }

    /// The circuit breaker registry, for inspection and administrative resets.
    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.inner.breakers
    }

    /// The rate limiter registry. Call
    /// [`RateLimiterRegistry::spawn_cleanup`] on it to evict idle per-caller
    /// limiters.
    pub fn limiters(&self) -> &Arc<RateLimiterRegistry> {
        &self.inner.limiters
    }

    /// The health monitor, if one was configured.
    pub fn health_monitor(&self) -> Option<&HealthMonitor> {
        self.inner.monitor.as_ref()
    }

    /// The per-service fallback chains.
    pub fn fallbacks(&self) -> &FallbackHandler<T, E> {
        &self.inner.fallbacks
    }
}

fn outcome_of<E>(error: &ResilienceError<E>) -> CallOutcome {
    match error {
        ResilienceError::Permanent(_) => CallOutcome::Permanent,
        ResilienceError::CircuitOpen { .. } => CallOutcome::CircuitOpen,
        ResilienceError::RateLimited { .. } => CallOutcome::RateLimited,
        ResilienceError::RetryExhausted { .. } => CallOutcome::RetryExhausted,
        ResilienceError::FallbackExhausted { .. } => CallOutcome::FallbackExhausted,
    }
}

/// Builder for [`ResilienceCoordinator`].
///
/// Registries default to empty ones with default breaker settings. A
/// service without a rate limiter config is not rate limited; a service
/// without a fallback chain propagates its errors unchanged.
pub struct CoordinatorBuilder<T, E> {
    breakers: Option<Arc<CircuitBreakerRegistry>>,
    limiters: Option<Arc<RateLimiterRegistry>>,
    monitor: Option<HealthMonitor>,
    fallbacks: FallbackHandler<T, E>,
    policies: HashMap<String, ServicePolicy<E>>,
    default_policy: ServicePolicy<E>,
    breaker_configs: Vec<(String, CircuitBreakerConfig)>,
    limiter_configs: Vec<(String, RateLimiterConfig)>,
}

impl<T, E> Default for CoordinatorBuilder<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> CoordinatorBuilder<T, E> {
    /// Creates a builder with empty registries and the default policy.
    pub fn new() -> Self {
        crate::describe_metrics();
        Self {
            breakers: None,
            limiters: None,
            monitor: None,
            fallbacks: FallbackHandler::new(),
            policies: HashMap::new(),
            default_policy: ServicePolicy::default(),
            breaker_configs: Vec::new(),
            limiter_configs: Vec::new(),
        }
    }

    /// Uses a shared breaker registry.
    pub fn breakers(mut self, registry: Arc<CircuitBreakerRegistry>) -> Self {
        self.breakers = Some(registry);
        self
    }

    /// Uses a shared limiter registry.
    pub fn limiters(mut self, registry: Arc<RateLimiterRegistry>) -> Self {
        self.limiters = Some(registry);
        self
    }

    /// Health monitor backing readiness, liveness and per-service health.
    pub fn health_monitor(mut self, monitor: HealthMonitor) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Policy for services without their own.
    pub fn default_policy(mut self, policy: ServicePolicy<E>) -> Self {
        self.default_policy = policy;
        self
    }

    /// Classifier, retry and breaker scope for `service`.
    pub fn policy(mut self, service: impl Into<String>, policy: ServicePolicy<E>) -> Self {
        self.policies.insert(service.into(), policy);
        self
    }

    /// Fallback chain tried when `service` is rate limited, open or out of retries.
    pub fn fallback(mut self, service: impl Into<String>, chain: FallbackChain<T, E>) -> Self {
        self.fallbacks.register(service, chain);
        self
    }

    /// Circuit breaker settings for `service`.
    pub fn circuit_breaker(mut self, service: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        self.breaker_configs.push((service.into(), config));
        self
    }

    /// Rate limiter settings for `service`; services without one are unlimited.
    pub fn rate_limit(mut self, service: impl Into<String>, config: RateLimiterConfig) -> Self {
        self.limiter_configs.push((service.into(), config));
        self
    }

    /// Applies validated settings: retry, breaker scope, circuit breaker and
    /// rate limit per service.
    ///
    /// Retry settings keep the classifier of the service's existing policy,
    /// or of the default policy, so set those first. Health checks need
    /// probes and are registered on the [`HealthMonitor`] directly, using
    /// [`ServiceSettings::health_check_config`](crate::ServiceSettings::health_check_config).
    pub fn settings(mut self, settings: &ResilienceSettings) -> Result<Self, ConfigError> {
        settings.validate()?;

        for (service, s) in &settings.services {
            let mut policy = self
                .policies
                .get(service)
                .cloned()
                .unwrap_or_else(|| self.default_policy.clone());
            if let Some(retry) = s.retry_config(service) {
                policy.retry = retry;
            }
            policy.breaker_scope = s.breaker_scope;
            self.policies.insert(service.clone(), policy);

            if let Some(config) = s.circuit_breaker_config() {
                self.breaker_configs.push((service.clone(), config));
            }
            if let Some(config) = s.rate_limiter_config() {
                self.limiter_configs.push((service.clone(), config));
            }
        }

        #[cfg(feature = "tracing")]
        tracing::info!(services = settings.services.len(), "resilience settings applied");

        Ok(self)
    }

    /// Builds the coordinator, registering breaker and limiter configs.
    pub fn build(self) -> ResilienceCoordinator<T, E> {
        let breakers = self.breakers.unwrap_or_default();
        for (service, config) in self.breaker_configs {
            breakers.configure(service, config);
        }

        let limiters = self.limiters.unwrap_or_default();
        for (service, config) in self.limiter_configs {
            limiters.configure(service, config);
        }

        let policies = self
            .policies
            .into_iter()
            .map(|(service, policy)| {
                let policy = policy.named(&service);
                (service, policy)
            })
            .collect();

        ResilienceCoordinator {
            inner: Arc::new(Inner {
                breakers,
                limiters,
                monitor: self.monitor,
                fallbacks: self.fallbacks,
                policies,
                default_policy: self.default_policy,
                counters: DashMap::new(),
            }),
        }
    }
}
