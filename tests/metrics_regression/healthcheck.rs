//! Health check metrics regression tests

use super::helpers::*;
use serial_test::serial;
use svcguard_healthcheck::{HealthCheckConfig, HealthMonitor};

#[tokio::test]
#[serial]
async fn healthcheck_metrics_exist() {
    init_recorder();

    let monitor = HealthMonitor::builder()
        .service(
            "test_hc_up",
            || async { Ok::<_, std::io::Error>(()) },
            HealthCheckConfig::default(),
        )
        .service(
            "test_hc_down",
            || async { Err::<(), _>("unreachable") },
            HealthCheckConfig::default(),
        )
        .build();

    monitor.check_now("test_hc_up").await;
    monitor.check_now("test_hc_down").await;

    assert_counter_exists("healthcheck_checks_total");
    assert_metric_has_label("healthcheck_checks_total", "service", "test_hc_up");
    assert_metric_has_label("healthcheck_checks_total", "result", "success");
    assert_metric_has_label("healthcheck_checks_total", "result", "failure");
}
