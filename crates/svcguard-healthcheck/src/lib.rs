//! Background health checking for protected dependencies.
//!
//! A [`HealthMonitor`] runs one periodic [`HealthProbe`] per service, each in
//! its own cancellable tokio task, and keeps a [`HealthStatus`] per service:
//!
//! - a failed or timed-out check increments `consecutive_failures`; reaching
//!   `failure_threshold` marks the service [`HealthState::Unhealthy`]
//! - a passed check increments `consecutive_successes`; reaching
//!   `success_threshold` marks it [`HealthState::Healthy`]
//!
//! Health is advisory. Probe failures are logged and counted, but never
//! surface to callers of the protected operations.
//!
//! # Aggregates
//!
//! - [`HealthMonitor::is_ready`]: every critical service is healthy
//! - [`HealthMonitor::is_live`]: no critical service is unhealthy
//!
//! # Example
//!
//! ```rust
//! use svcguard_healthcheck::{HealthCheckConfig, HealthMonitor};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let monitor = HealthMonitor::builder()
//!     .service(
//!         "llm",
//!         || async { Ok::<_, std::io::Error>(()) },
//!         HealthCheckConfig::builder()
//!             .interval(Duration::from_secs(30))
//!             .timeout(Duration::from_secs(2))
//!             .build(),
//!     )
//!     .on_health_change(|service, from, to| {
//!         println!("{service}: {from} -> {to}");
//!     })
//!     .build();
//!
//! monitor.start();
//! // ...
//! monitor.shutdown(Duration::from_secs(5)).await;
//! # }
//! ```

use std::fmt;
#[cfg(feature = "metrics")]
use std::sync::Once;
use tokio::time::Instant;

#[cfg(feature = "metrics")]
use metrics::describe_counter;

mod config;
mod events;
mod monitor;
mod probe;

pub use config::{HealthCheckConfig, HealthCheckConfigBuilder};
pub use events::HealthEvent;
pub use monitor::{HealthMonitor, HealthMonitorBuilder};
pub use probe::HealthProbe;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

pub(crate) fn describe_metrics() {
    #[cfg(feature = "metrics")]
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "healthcheck_checks_total",
            "Total number of health checks, by service and result"
        );
    });
}

/// Health of a monitored service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealthState {
    /// Not checked yet, or not enough checks to decide.
    Unknown,
    /// Passed `success_threshold` consecutive checks.
    Healthy,
    /// Failed `failure_threshold` consecutive checks.
    Unhealthy,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Unknown => "unknown",
            HealthState::Healthy => "healthy",
            HealthState::Unhealthy => "unhealthy",
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one service's health record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    pub service: String,
    pub state: HealthState,
    pub last_check_time: Option<Instant>,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    /// Whether the service counts towards readiness and liveness.
    pub critical: bool,
}

impl HealthStatus {
    pub(crate) fn new(service: &str, critical: bool) -> Self {
        Self {
            service: service.to_string(),
            state: HealthState::Unknown,
            last_check_time: None,
            consecutive_failures: 0,
            consecutive_successes: 0,
            critical,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.state == HealthState::Healthy
    }
}
