//! Declarative per-service settings.
//!
//! The settings tree deserializes from any serde format. Durations are
//! whole milliseconds and field names are camelCase:
//!
//! ```json
//! {
//!   "services": {
//!     "llm": {
//!       "retry": { "maxAttempts": 3, "baseDelayMs": 1000, "multiplier": 2.0, "jitter": "full" },
//!       "circuitBreaker": { "failureThreshold": 3, "recoveryTimeoutMs": 10000 },
//!       "rateLimit": { "algorithm": "token_bucket", "capacity": 5, "refillRate": 1 },
//!       "healthCheck": { "intervalMs": 5000, "timeoutMs": 2000 },
//!       "breakerScope": "whole_sequence"
//!     }
//!   }
//! }
//! ```
//!
//! Fallback strategies are code, and are registered on the
//! [`CoordinatorBuilder`](crate::CoordinatorBuilder).

use crate::policy::BreakerScope;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use svcguard_circuitbreaker::CircuitBreakerConfig;
use svcguard_healthcheck::HealthCheckConfig;
use svcguard_ratelimiter::RateLimiterConfig;
use svcguard_retry::{Jitter, RetryConfig};
use thiserror::Error;

/// Invalid settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("service names must not be empty")]
    EmptyServiceName,

    #[error("invalid {field} for service '{service}': {reason}")]
    Invalid {
        service: String,
        field: &'static str,
        reason: String,
    },
}

fn invalid(service: &str, field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        service: service.to_string(),
        field,
        reason: reason.into(),
    }
}

/// Settings for every service, keyed by service name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResilienceSettings {
    pub services: BTreeMap<String, ServiceSettings>,
}

impl ResilienceSettings {
    /// Checks every service's settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (service, settings) in &self.services {
            if service.trim().is_empty() {
                return Err(ConfigError::EmptyServiceName);
            }
            settings.validate(service)?;
        }
        Ok(())
    }

    pub fn service(&self, name: &str) -> Option<&ServiceSettings> {
        self.services.get(name)
    }
}

/// Settings for one service. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceSettings {
    pub retry: Option<RetrySettings>,
    pub circuit_breaker: Option<CircuitBreakerSettings>,
    pub rate_limit: Option<RateLimitSettings>,
    pub health_check: Option<HealthCheckSettings>,
    pub breaker_scope: BreakerScope,
}

impl ServiceSettings {
    pub fn validate(&self, service: &str) -> Result<(), ConfigError> {
        if let Some(retry) = &self.retry {
            retry.validate(service)?;
        }
        if let Some(cb) = &self.circuit_breaker {
            if cb.failure_threshold == 0 {
                return Err(invalid(service, "circuitBreaker.failureThreshold", "must be at least 1"));
            }
        }
        if let Some(rate_limit) = &self.rate_limit {
            rate_limit.validate(service)?;
        }
        if let Some(hc) = &self.health_check {
            if hc.interval_ms == 0 {
                return Err(invalid(service, "healthCheck.intervalMs", "must be at least 1"));
            }
            if hc.timeout_ms == 0 {
                return Err(invalid(service, "healthCheck.timeoutMs", "must be at least 1"));
            }
        }
        Ok(())
    }

    /// Retry config named after `service`. `None` without a retry section.
    pub fn retry_config<E>(&self, service: &str) -> Option<RetryConfig<E>> {
        self.retry.as_ref().map(|r| {
            RetryConfig::builder()
                .name(service)
                .max_attempts(r.max_attempts)
                .base_delay(Duration::from_millis(r.base_delay_ms))
                .max_delay(Duration::from_millis(r.max_delay_ms))
                .multiplier(r.multiplier)
                .jitter(r.jitter.into())
                .build()
        })
    }

    pub fn circuit_breaker_config(&self) -> Option<CircuitBreakerConfig> {
        self.circuit_breaker.as_ref().map(|cb| {
            CircuitBreakerConfig::builder()
                .failure_threshold(cb.failure_threshold)
                .recovery_timeout(Duration::from_millis(cb.recovery_timeout_ms))
                .build()
        })
    }

    pub fn rate_limiter_config(&self) -> Option<RateLimiterConfig> {
        self.rate_limit.as_ref().map(|rl| match *rl {
            RateLimitSettings::TokenBucket {
                capacity,
                refill_rate,
            } => RateLimiterConfig::builder()
                .token_bucket(capacity, refill_rate)
                .build(),
            RateLimitSettings::SlidingWindow {
                limit,
                window_ms,
                buckets,
            } => RateLimiterConfig::builder()
                .sliding_window(limit, Duration::from_millis(window_ms))
                .buckets(buckets)
                .build(),
        })
    }

    pub fn health_check_config(&self) -> Option<HealthCheckConfig> {
        self.health_check.as_ref().map(|hc| {
            HealthCheckConfig::builder()
                .interval(Duration::from_millis(hc.interval_ms))
                .timeout(Duration::from_millis(hc.timeout_ms))
                .initial_delay(Duration::from_millis(hc.initial_delay_ms))
                .failure_threshold(hc.failure_threshold)
                .success_threshold(hc.success_threshold)
                .critical(hc.critical)
                .build()
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterSetting {
    #[default]
    None,
    Full,
    Equal,
    /// Spread of ±fraction around the delay, between 0 and 1.
    Proportional(f64),
}

impl From<JitterSetting> for Jitter {
    fn from(setting: JitterSetting) -> Self {
        match setting {
            JitterSetting::None => Jitter::None,
            JitterSetting::Full => Jitter::Full,
            JitterSetting::Equal => Jitter::Equal,
            JitterSetting::Proportional(f) => Jitter::Proportional(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub jitter: JitterSetting,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 30_000,
            multiplier: 2.0,
            jitter: JitterSetting::None,
        }
    }
}

impl RetrySettings {
    fn validate(&self, service: &str) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(invalid(service, "retry.maxAttempts", "must be at least 1"));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(invalid(service, "retry.multiplier", "must be a finite number >= 1"));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(invalid(service, "retry.baseDelayMs", "must not exceed maxDelayMs"));
        }
        if let JitterSetting::Proportional(f) = self.jitter {
            if !(0.0..=1.0).contains(&f) {
                return Err(invalid(service, "retry.jitter", "proportional jitter must be within 0..=1"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub recovery_timeout_ms: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_ms: 30_000,
        }
    }
}

fn default_buckets() -> u32 {
    10
}

/// Rate limiter algorithm and its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum RateLimitSettings {
    #[serde(rename_all = "camelCase")]
    TokenBucket { capacity: f64, refill_rate: f64 },
    #[serde(rename_all = "camelCase")]
    SlidingWindow {
        limit: u64,
        window_ms: u64,
        #[serde(default = "default_buckets")]
        buckets: u32,
    },
}

impl RateLimitSettings {
    fn validate(&self, service: &str) -> Result<(), ConfigError> {
        match *self {
            RateLimitSettings::TokenBucket {
                capacity,
                refill_rate,
            } => {
                if !capacity.is_finite() || capacity <= 0.0 {
                    return Err(invalid(service, "rateLimit.capacity", "must be a positive number"));
                }
                if !refill_rate.is_finite() || refill_rate < 0.0 {
                    return Err(invalid(service, "rateLimit.refillRate", "must be a non-negative number"));
                }
            }
            RateLimitSettings::SlidingWindow {
                limit,
                window_ms,
                buckets,
            } => {
                if limit == 0 {
                    return Err(invalid(service, "rateLimit.limit", "must be at least 1"));
                }
                if window_ms == 0 {
                    return Err(invalid(service, "rateLimit.windowMs", "must be at least 1"));
                }
                if buckets == 0 {
                    return Err(invalid(service, "rateLimit.buckets", "must be at least 1"));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HealthCheckSettings {
    pub interval_ms: u64,
    pub timeout_ms: u64,
    pub initial_delay_ms: u64,
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub critical: bool,
}

impl Default for HealthCheckSettings {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            timeout_ms: 2_000,
            initial_delay_ms: 0,
            failure_threshold: 2,
            success_threshold: 1,
            critical: true,
        }
    }
}
