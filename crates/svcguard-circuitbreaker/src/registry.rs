//! Lazily populated per-service breaker registry.

use crate::{CircuitBreaker, CircuitBreakerConfig};
use dashmap::DashMap;

/// Holds one [`CircuitBreaker`] per service name.
///
/// Breakers are created on first use from the service's registered config,
/// or from the default config when none was registered. Breakers for
/// different services live in different map shards and never share a lock.
///
/// ```rust
/// use svcguard_circuitbreaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
///
/// let registry = CircuitBreakerRegistry::new(CircuitBreakerConfig::default());
/// registry.configure(
///     "llm",
///     CircuitBreakerConfig::builder().failure_threshold(2).build(),
/// );
///
/// let llm = registry.get_or_create("llm");
/// assert_eq!(llm.config().failure_threshold(), 2);
/// assert_eq!(llm.name(), "llm");
/// assert_eq!(registry.get_or_create("search").config().failure_threshold(), 5);
/// ```
pub struct CircuitBreakerRegistry {
    default_config: CircuitBreakerConfig,
    configs: DashMap<String, CircuitBreakerConfig>,
    breakers: DashMap<String, CircuitBreaker>,
}

impl CircuitBreakerRegistry {
    /// Creates an empty registry that falls back to `default_config`.
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            default_config,
            configs: DashMap::new(),
            breakers: DashMap::new(),
        }
    }

    /// Registers the config used for `service`.
    ///
    /// Only breakers created after this call see the config; an existing
    /// breaker keeps its settings until it is [`remove`](Self::remove)d.
    pub fn configure(&self, service: impl Into<String>, config: CircuitBreakerConfig) {
        self.configs.insert(service.into(), config);
    }

    /// Returns the breaker for `service`, creating it on first use.
    pub fn get_or_create(&self, service: &str) -> CircuitBreaker {
        if let Some(breaker) = self.breakers.get(service) {
            return breaker.clone();
        }

        self.breakers
            .entry(service.to_string())
            .or_insert_with(|| {
                let config = self
                    .configs
                    .get(service)
                    .map(|c| c.clone())
                    .unwrap_or_else(|| self.default_config.clone());

                #[cfg(feature = "tracing")]
                tracing::debug!(service, "creating circuit breaker");

                CircuitBreaker::new(config.with_name(service))
            })
            .clone()
    }

    /// Returns the breaker for `service` if one has been created.
    pub fn get(&self, service: &str) -> Option<CircuitBreaker> {
        self.breakers.get(service).map(|b| b.clone())
    }

    /// Names of all services with a live breaker, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Resets one service's breaker. Returns `false` if it does not exist.
    pub fn reset(&self, service: &str) -> bool {
        match self.get(service) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    /// Resets every breaker.
    pub fn reset_all(&self) {
        let breakers: Vec<CircuitBreaker> = self.breakers.iter().map(|e| e.value().clone()).collect();
        for breaker in breakers {
            breaker.reset();
        }
    }

    /// Drops a service's breaker; the next call recreates it from config.
    pub fn remove(&self, service: &str) -> Option<CircuitBreaker> {
        self.breakers.remove(service).map(|(_, b)| b)
    }

    /// Number of live breakers.
    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    /// Returns `true` if no breaker has been created yet.
    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl std::fmt::Debug for CircuitBreakerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerRegistry")
            .field("breakers", &self.names())
            .finish()
    }
}
