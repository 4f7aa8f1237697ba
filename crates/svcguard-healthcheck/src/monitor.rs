//! The background health monitor.

use crate::events::HealthEvent;
use crate::{HealthCheckConfig, HealthProbe, HealthState, HealthStatus};
use futures::FutureExt;
#[cfg(feature = "metrics")]
use metrics::counter;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use svcguard_core::events::{EventListeners, FnListener};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// State shared between one service's task, `check_now` and readers.
struct Probed {
    service: String,
    probe: Arc<dyn HealthProbe>,
    config: HealthCheckConfig,
    status: Mutex<HealthStatus>,
    listeners: EventListeners<HealthEvent>,
}

impl Probed {
    fn status(&self) -> HealthStatus {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Runs the probe once and folds the outcome into the status.
    async fn check(&self) -> HealthState {
        let outcome = tokio::time::timeout(
            self.config.timeout,
            AssertUnwindSafe(self.probe.check()).catch_unwind(),
        )
        .await;

        let failure = match outcome {
            Ok(Ok(Ok(()))) => None,
            Ok(Ok(Err(e))) => Some(e.to_string()),
            Ok(Err(_)) => Some("probe panicked".to_string()),
            Err(_) => Some(format!("probe timed out after {:?}", self.config.timeout)),
        };

        #[cfg(feature = "metrics")]
        counter!(
            "healthcheck_checks_total",
            "service" => self.service.clone(),
            "result" => if failure.is_none() { "success" } else { "failure" }
        )
        .increment(1);

        let (from, to) = {
            let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
            let from = status.state;
            status.last_check_time = Some(Instant::now());

            if failure.is_none() {
                status.consecutive_successes = status.consecutive_successes.saturating_add(1);
                status.consecutive_failures = 0;
                if status.consecutive_successes >= self.config.success_threshold {
                    status.state = HealthState::Healthy;
                }
            } else {
                status.consecutive_failures = status.consecutive_failures.saturating_add(1);
                status.consecutive_successes = 0;
                if status.consecutive_failures >= self.config.failure_threshold {
                    status.state = HealthState::Unhealthy;
                }
            }
            (from, status.state)
        };

        if let Some(error) = failure {
            #[cfg(feature = "tracing")]
            tracing::warn!(service = %self.service, error = %error, "health check failed");

            self.listeners.emit(&HealthEvent::CheckFailed {
                service: self.service.clone(),
                timestamp: std::time::Instant::now(),
                error,
            });
        }

        if from != to {
            #[cfg(feature = "tracing")]
            tracing::info!(service = %self.service, from = %from, to = %to, "health state changed");

            self.listeners.emit(&HealthEvent::StateChanged {
                service: self.service.clone(),
                timestamp: std::time::Instant::now(),
                from,
                to,
            });
        }

        to
    }

    async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        if !self.config.initial_delay.is_zero() {
            tokio::select! {
                biased;
                _ = shutdown.changed() => return,
                _ = tokio::time::sleep(self.config.initial_delay) => {}
            }
        }

        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = interval.tick() => {}
            }

            // An in-flight check is allowed to finish; shutdown waits for it
            // up to its grace period.
            self.check().await;

            if *shutdown.borrow() {
                break;
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(service = %self.service, "health check task stopped");
    }
}

struct Task {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct Entry {
    probed: Arc<Probed>,
    task: Option<Task>,
}

struct Inner {
    entries: Mutex<HashMap<String, Entry>>,
    listeners: EventListeners<HealthEvent>,
    started: AtomicBool,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let entries = self
            .entries
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for entry in entries.values_mut() {
            if let Some(task) = entry.task.take() {
                task.handle.abort();
            }
        }
    }
}

/// Runs a periodic health probe per registered service.
///
/// Each service gets its own tokio task that can be stopped without
/// touching the others. Probe failures never reach callers of protected
/// operations; they only change the service's [`HealthStatus`].
///
/// Cheap to clone; clones share the same tasks and state. Dropping the last
/// clone aborts every task.
///
/// ```rust
/// use svcguard_healthcheck::{HealthCheckConfig, HealthMonitor, HealthState};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let monitor = HealthMonitor::builder()
///     .service(
///         "vector-store",
///         || async { Ok::<_, std::io::Error>(()) },
///         HealthCheckConfig::builder().interval(Duration::from_secs(10)).build(),
///     )
///     .build();
///
/// assert_eq!(monitor.check_now("vector-store").await, Some(HealthState::Healthy));
/// assert!(monitor.is_ready());
///
/// monitor.start();
/// monitor.shutdown(Duration::from_secs(1)).await;
/// # }
/// ```
#[derive(Clone)]
pub struct HealthMonitor {
    inner: Arc<Inner>,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthMonitor {
    /// A monitor with no services and no listeners.
    pub fn new() -> Self {
        HealthMonitorBuilder::new().build()
    }

    pub fn builder() -> HealthMonitorBuilder {
        HealthMonitorBuilder::new()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `service`, replacing (and stopping) any previous probe for
    /// it. If the monitor is already started the new probe starts at once.
    ///
    /// Must be called from within a tokio runtime once the monitor is
    /// started.
    pub fn register<P>(&self, service: impl Into<String>, probe: P, config: HealthCheckConfig)
    where
        P: HealthProbe + 'static,
    {
        let service = service.into();
        let probed = Arc::new(Probed {
            status: Mutex::new(HealthStatus::new(&service, config.critical)),
            service: service.clone(),
            probe: Arc::new(probe),
            config,
            listeners: self.inner.listeners.clone(),
        });

        let mut entries = self.entries();
        if let Some(old) = entries.remove(&service) {
            stop_task(old.task);
        }

        let task = self
            .inner
            .started
            .load(Ordering::Acquire)
            .then(|| spawn(&probed));
        entries.insert(service, Entry { probed, task });
    }

    /// Starts a background task for every registered service that does not
    /// have one. Must be called from within a tokio runtime.
    pub fn start(&self) {
        self.inner.started.store(true, Ordering::Release);
        let mut entries = self.entries();
        for entry in entries.values_mut() {
            if entry.task.is_none() {
                entry.task = Some(spawn(&entry.probed));
            }
        }

        #[cfg(feature = "tracing")]
        tracing::info!(services = entries.len(), "health monitor started");
    }

    /// Stops the background task of `service`. Its last status is kept.
    /// Returns `false` if the service has no running task.
    pub fn stop(&self, service: &str) -> bool {
        let task = self
            .entries()
            .get_mut(service)
            .and_then(|entry| entry.task.take());
        let stopped = task.is_some();
        stop_task(task);
        stopped
    }

    /// Stops scheduling new checks everywhere, waits up to `grace` for
    /// in-flight checks to finish, then aborts whatever is left.
    pub async fn shutdown(&self, grace: Duration) {
        self.inner.started.store(false, Ordering::Release);

        let tasks: Vec<Task> = self
            .entries()
            .values_mut()
            .filter_map(|entry| entry.task.take())
            .collect();

        let mut handles = Vec::with_capacity(tasks.len());
        for task in tasks {
            let _ = task.shutdown.send(true);
            handles.push(task.handle);
        }

        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
        if tokio::time::timeout(grace, futures::future::join_all(handles))
            .await
            .is_err()
        {
            #[cfg(feature = "tracing")]
            tracing::warn!(?grace, "health checks still running after grace period, aborting");

            for abort in aborts {
                abort.abort();
            }
        }
    }

    /// Runs one check for `service` right away, outside its schedule.
    /// `None` if the service is not registered.
    pub async fn check_now(&self, service: &str) -> Option<HealthState> {
        let probed = self
            .entries()
            .get(service)
            .map(|entry| Arc::clone(&entry.probed))?;
        Some(probed.check().await)
    }

    /// Snapshot of one service's health.
    pub fn status(&self, service: &str) -> Option<HealthStatus> {
        self.entries().get(service).map(|entry| entry.probed.status())
    }

    /// Snapshots of every service, sorted by name.
    pub fn statuses(&self) -> Vec<HealthStatus> {
        let mut statuses: Vec<_> = self
            .entries()
            .values()
            .map(|entry| entry.probed.status())
            .collect();
        statuses.sort_by(|a, b| a.service.cmp(&b.service));
        statuses
    }

    /// `true` if the service has a running background task.
    pub fn is_running(&self, service: &str) -> bool {
        self.entries()
            .get(service)
            .and_then(|entry| entry.task.as_ref())
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Every critical service is healthy. Vacuously true with no critical
    /// services.
    pub fn is_ready(&self) -> bool {
        self.statuses()
            .iter()
            .filter(|s| s.critical)
            .all(HealthStatus::is_healthy)
    }

    /// No critical service is unhealthy. Services that have not been checked
    /// yet do not count against liveness.
    pub fn is_live(&self) -> bool {
        !self
            .statuses()
            .iter()
            .any(|s| s.critical && s.state == HealthState::Unhealthy)
    }
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("services", &self.statuses())
            .finish()
    }
}

fn spawn(probed: &Arc<Probed>) -> Task {
    let (shutdown, rx) = watch::channel(false);
    let handle = tokio::spawn(Arc::clone(probed).run(rx));
    Task { shutdown, handle }
}

fn stop_task(task: Option<Task>) {
    if let Some(task) = task {
        let _ = task.shutdown.send(true);
        task.handle.abort();
    }
}

/// Builder for [`HealthMonitor`].
pub struct HealthMonitorBuilder {
    services: Vec<(String, Arc<dyn HealthProbe>, HealthCheckConfig)>,
    listeners: EventListeners<HealthEvent>,
}

impl Default for HealthMonitorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthMonitorBuilder {
    pub fn new() -> Self {
        crate::describe_metrics();
        Self {
            services: Vec::new(),
            listeners: EventListeners::new(),
        }
    }

    /// Adds a service to monitor.
    pub fn service<P>(mut self, name: impl Into<String>, probe: P, config: HealthCheckConfig) -> Self
    where
        P: HealthProbe + 'static,
    {
        self.services.push((name.into(), Arc::new(probe), config));
        self
    }

    /// Callback when a service's health state changes.
    ///
    /// The callback receives: (service, old_state, new_state)
    pub fn on_health_change<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, HealthState, HealthState) + Send + Sync + 'static,
    {
        self.listeners.add(FnListener::new(move |event| {
            if let HealthEvent::StateChanged {
                service, from, to, ..
            } = event
            {
                f(service, *from, *to);
            }
        }));
        self
    }

    /// Callback when a check fails.
    ///
    /// The callback receives: (service, rendered error)
    pub fn on_check_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.listeners.add(FnListener::new(move |event| {
            if let HealthEvent::CheckFailed { service, error, .. } = event {
                f(service, error);
            }
        }));
        self
    }

    pub fn build(self) -> HealthMonitor {
        let entries = self
            .services
            .into_iter()
            .map(|(service, probe, config)| {
                let probed = Arc::new(Probed {
                    status: Mutex::new(HealthStatus::new(&service, config.critical)),
                    service: service.clone(),
                    probe,
                    config,
                    listeners: self.listeners.clone(),
                });
                (service, Entry { probed, task: None })
            })
            .collect();

        HealthMonitor {
            inner: Arc::new(Inner {
                entries: Mutex::new(entries),
                listeners: self.listeners,
                started: AtomicBool::new(false),
            }),
        }
    }
}
