//! Retry metrics regression tests

use super::helpers::*;
use serial_test::serial;
use std::time::Duration;
use svcguard_retry::{execute_with_retry, RetryConfig};

#[tokio::test(start_paused = true)]
#[serial]
async fn retry_metrics_exist() {
    init_recorder();

    let config = RetryConfig::<&'static str>::builder()
        .name("test_retry")
        .max_attempts(2)
        .fixed_backoff(Duration::from_millis(10))
        .build();

    let _: Result<(), _> = execute_with_retry(|| async { Err("failure") }, &config).await;
    let _ = execute_with_retry(|| async { Ok::<_, &'static str>(1) }, &config).await;

    assert_counter_exists("retry_calls_total");
    assert_metric_has_label("retry_calls_total", "retry", "test_retry");
    assert_metric_has_label("retry_calls_total", "outcome", "exhausted");
    assert_metric_has_label("retry_calls_total", "outcome", "success");

    assert_counter_exists("retry_attempts_total");
    assert_metric_has_label("retry_attempts_total", "retry", "test_retry");
}
