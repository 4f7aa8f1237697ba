//! Configuration for health checking behavior.

use std::time::Duration;

/// Per-service health check settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckConfig {
    pub(crate) interval: Duration,
    pub(crate) timeout: Duration,
    pub(crate) initial_delay: Duration,
    pub(crate) failure_threshold: u32,
    pub(crate) success_threshold: u32,
    pub(crate) critical: bool,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(2),
            initial_delay: Duration::ZERO,
            failure_threshold: 2,
            success_threshold: 1,
            critical: true,
        }
    }
}

impl HealthCheckConfig {
    /// Create a new builder.
    pub fn builder() -> HealthCheckConfigBuilder {
        HealthCheckConfigBuilder::default()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn success_threshold(&self) -> u32 {
        self.success_threshold
    }

    /// Whether this service counts towards aggregate readiness and liveness.
    pub fn critical(&self) -> bool {
        self.critical
    }
}

/// Builder for [`HealthCheckConfig`].
#[derive(Debug, Default)]
pub struct HealthCheckConfigBuilder {
    interval: Option<Duration>,
    timeout: Option<Duration>,
    initial_delay: Option<Duration>,
    failure_threshold: Option<u32>,
    success_threshold: Option<u32>,
    critical: Option<bool>,
}

impl HealthCheckConfigBuilder {
    /// Time between checks. Zero is raised to one millisecond.
    ///
    /// Default: 5 seconds
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval.max(Duration::from_millis(1)));
        self
    }

    /// Upper bound on a single check; exceeding it fails the check.
    ///
    /// Default: 2 seconds
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Delay before the first check.
    ///
    /// Default: none
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Consecutive failed checks before the service is marked unhealthy.
    ///
    /// Default: 2
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = Some(threshold.max(1));
        self
    }

    /// Consecutive passed checks before the service is marked healthy.
    ///
    /// Default: 1
    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = Some(threshold.max(1));
        self
    }

    /// Non-critical services are tracked but ignored by
    /// [`is_ready`](crate::HealthMonitor::is_ready) and
    /// [`is_live`](crate::HealthMonitor::is_live).
    ///
    /// Default: true
    pub fn critical(mut self, critical: bool) -> Self {
        self.critical = Some(critical);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> HealthCheckConfig {
        let default = HealthCheckConfig::default();
        HealthCheckConfig {
            interval: self.interval.unwrap_or(default.interval),
            timeout: self.timeout.unwrap_or(default.timeout),
            initial_delay: self.initial_delay.unwrap_or(default.initial_delay),
            failure_threshold: self.failure_threshold.unwrap_or(default.failure_threshold),
            success_threshold: self.success_threshold.unwrap_or(default.success_threshold),
            critical: self.critical.unwrap_or(default.critical),
        }
    }
}
