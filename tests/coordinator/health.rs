use super::UpstreamError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use svcguard::healthcheck::{HealthCheckConfig, HealthMonitor, HealthState};
use svcguard::ResilienceCoordinator;

fn config(critical: bool) -> HealthCheckConfig {
    HealthCheckConfig::builder()
        .interval(Duration::from_secs(5))
        .timeout(Duration::from_secs(1))
        .failure_threshold(1)
        .critical(critical)
        .build()
}

#[tokio::test(start_paused = true)]
async fn readiness_follows_critical_probes() {
    let database_up = Arc::new(AtomicBool::new(true));
    let up = Arc::clone(&database_up);

    let monitor = HealthMonitor::builder()
        .service(
            "database",
            move || {
                let up = up.load(Ordering::SeqCst);
                async move {
                    if up {
                        Ok(())
                    } else {
                        Err("connection refused")
                    }
                }
            },
            config(true),
        )
        .service(
            "recommendations",
            || async { Err::<(), _>("timeout") },
            config(false),
        )
        .build();

    let coordinator = ResilienceCoordinator::<u32, UpstreamError>::builder()
        .health_monitor(monitor.clone())
        .build();
    assert!(!coordinator.is_ready());
    assert!(coordinator.is_live());

    monitor.check_now("database").await;
    monitor.check_now("recommendations").await;
    assert!(coordinator.is_ready());

    let health = coordinator.metrics("recommendations").health.unwrap();
    assert_eq!(health.state, HealthState::Unhealthy);
    assert_eq!(health.consecutive_failures, 1);

    database_up.store(false, Ordering::SeqCst);
    assert_eq!(
        monitor.check_now("database").await,
        Some(HealthState::Unhealthy)
    );
    assert!(!coordinator.is_ready());
    assert!(!coordinator.is_live());
}

#[tokio::test(start_paused = true)]
async fn background_checks_stop_on_shutdown() {
    let monitor = HealthMonitor::builder()
        .service("cache", || async { Ok::<_, std::io::Error>(()) }, config(true))
        .build();
    monitor.start();

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(
        monitor.status("cache").map(|s| s.state),
        Some(HealthState::Healthy)
    );
    assert!(monitor.is_running("cache"));

    monitor.shutdown(Duration::from_secs(1)).await;
    assert!(!monitor.is_running("cache"));
}

#[tokio::test]
async fn without_a_monitor_the_coordinator_is_ready() {
    let coordinator = ResilienceCoordinator::<u32, UpstreamError>::builder().build();
    assert!(coordinator.is_ready());
    assert!(coordinator.is_live());
    assert!(coordinator.metrics("anything").health.is_none());
}
