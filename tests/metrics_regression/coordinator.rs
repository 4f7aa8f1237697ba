//! Coordinator metrics regression tests

use super::helpers::*;
use serial_test::serial;
use svcguard::retry::RetryConfig;
use svcguard::{ResilienceCoordinator, ServicePolicy};

#[tokio::test]
#[serial]
async fn coordinator_metrics_exist() {
    init_recorder();

    let coordinator = ResilienceCoordinator::<u32, &'static str>::builder()
        .default_policy(
            ServicePolicy::builder()
                .retry(RetryConfig::builder().max_attempts(1).build())
                .build(),
        )
        .build();

    let _ = coordinator.call("test_coord", || async { Ok(1) }).await;
    let _ = coordinator.call("test_coord", || async { Err("down") }).await;

    assert_counter_exists("coordinator_calls_total");
    assert_metric_has_label("coordinator_calls_total", "service", "test_coord");
    assert_metric_has_label("coordinator_calls_total", "outcome", "success");
    assert_metric_has_label("coordinator_calls_total", "outcome", "retry_exhausted");

    // Pattern metrics are labelled with the service name.
    assert_metric_has_label("circuitbreaker_calls_total", "circuitbreaker", "test_coord");
    assert_metric_has_label("retry_calls_total", "retry", "test_coord");
}
