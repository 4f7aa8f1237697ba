//! Per-service, per-caller limiter registry.

use crate::{Decision, RateLimiter, RateLimiterConfig};
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

type LimiterKey = (String, Option<String>);

/// Holds one [`RateLimiter`] per `(service, identity)` pair.
///
/// Limiters are created on first use from the service's config. Services
/// without a config are not limited. Passing an identity gives each caller
/// its own limiter with the service's settings; `None` shares one limiter
/// across all callers of the service.
///
/// Per-identity limiters are dropped by [`cleanup`](Self::cleanup) once they
/// have refilled and sat unused; [`spawn_cleanup`](Self::spawn_cleanup) runs
/// it periodically.
///
/// ```rust
/// use svcguard_ratelimiter::{RateLimiterConfig, RateLimiterRegistry};
/// use std::time::Duration;
///
/// let registry = RateLimiterRegistry::new();
/// registry.configure(
///     "llm",
///     RateLimiterConfig::builder().sliding_window(1, Duration::from_secs(60)).build(),
/// );
///
/// assert!(registry.consume("llm", Some("alice")).allowed);
/// assert!(!registry.consume("llm", Some("alice")).allowed);
/// assert!(registry.consume("llm", Some("bob")).allowed);
/// assert!(registry.consume("unlimited", None).allowed);
/// ```
#[derive(Default)]
pub struct RateLimiterRegistry {
    configs: DashMap<String, RateLimiterConfig>,
    limiters: DashMap<LimiterKey, RateLimiter>,
}

impl RateLimiterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the config used for `service`.
    ///
    /// Limiters already created for the service keep their settings until
    /// [`reset`](Self::reset).
    pub fn configure(&self, service: impl Into<String>, config: RateLimiterConfig) {
        self.configs.insert(service.into(), config);
    }

    /// Returns `true` if `service` has a limiter config.
    pub fn is_limited(&self, service: &str) -> bool {
        self.configs.contains_key(service)
    }

    /// Returns the limiter for `(service, identity)`, creating it on first
    /// use. `None` if the service is not limited.
    pub fn get_or_create(&self, service: &str, identity: Option<&str>) -> Option<RateLimiter> {
        let key = (service.to_string(), identity.map(str::to_string));
        if let Some(limiter) = self.limiters.get(&key) {
            return Some(limiter.clone());
        }

        let config = self.configs.get(service).map(|c| c.clone())?;
        let limiter = self
            .limiters
            .entry(key)
            .or_insert_with(|| {
                #[cfg(feature = "tracing")]
                tracing::debug!(service, identity, "creating rate limiter");

                RateLimiter::new(config.with_name(service))
            })
            .clone();
        Some(limiter)
    }

    /// Takes one permit for `(service, identity)`.
    pub fn consume(&self, service: &str, identity: Option<&str>) -> Decision {
        self.consume_n(service, identity, 1)
    }

    /// Takes `n` permits for `(service, identity)`.
    pub fn consume_n(&self, service: &str, identity: Option<&str>, n: u64) -> Decision {
        match self.get_or_create(service, identity) {
            Some(limiter) => limiter.try_acquire_n(n),
            None => Decision::unlimited(),
        }
    }

    /// Permits currently available to `(service, identity)`. `None` if the
    /// service is not limited.
    pub fn remaining(&self, service: &str, identity: Option<&str>) -> Option<u64> {
        self.get_or_create(service, identity).map(|l| l.remaining())
    }

    /// Drops every limiter belonging to `service`; they are recreated at full
    /// capacity, from the current config, on next use.
    pub fn reset(&self, service: &str) {
        self.limiters.retain(|(s, _), _| s != service);
    }

    /// Drops every limiter.
    pub fn reset_all(&self) {
        self.limiters.clear();
    }

    /// Drops per-identity limiters that are at full capacity and have not
    /// been asked for a permit within `idle_for`. Returns how many were
    /// removed.
    ///
    /// Shared limiters (no identity) are kept.
    pub fn cleanup(&self, idle_for: Duration) -> usize {
        let before = self.limiters.len();
        self.limiters
            .retain(|(_, identity), limiter| identity.is_none() || !limiter.is_idle(idle_for));
        let removed = before.saturating_sub(self.limiters.len());

        #[cfg(feature = "tracing")]
        if removed > 0 {
            tracing::debug!(removed, live = self.limiters.len(), "evicted idle rate limiters");
        }

        removed
    }

    /// Runs [`cleanup`](Self::cleanup) every `every` on a background task.
    ///
    /// The task holds only a weak reference and ends once the registry is
    /// dropped. Must be called from within a tokio runtime.
    pub fn spawn_cleanup(self: &Arc<Self>, every: Duration, idle_for: Duration) -> JoinHandle<()> {
        let registry: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                interval.tick().await;
                match registry.upgrade() {
                    Some(registry) => {
                        registry.cleanup(idle_for);
                    }
                    None => break,
                }
            }
        })
    }

    /// Number of live limiters across all services and identities.
    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    /// Returns `true` if no limiter has been created yet.
    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }
}

impl std::fmt::Debug for RateLimiterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiterRegistry")
            .field("services", &self.configs.len())
            .field("limiters", &self.limiters.len())
            .finish()
    }
}
