//! Rate limiter metrics regression tests

use super::helpers::*;
use serial_test::serial;
use svcguard_ratelimiter::{RateLimiter, RateLimiterConfig};

#[tokio::test]
#[serial]
async fn ratelimiter_metrics_exist() {
    init_recorder();

    let limiter = RateLimiter::new(
        RateLimiterConfig::builder()
            .name("test_rl")
            .token_bucket(1.0, 0.0)
            .build(),
    );
    assert!(limiter.try_acquire().allowed);
    assert!(!limiter.try_acquire().allowed);

    assert_counter_exists("ratelimiter_calls_total");
    assert_metric_has_label("ratelimiter_calls_total", "ratelimiter", "test_rl");
    assert_metric_has_label("ratelimiter_calls_total", "outcome", "allowed");
    assert_metric_has_label("ratelimiter_calls_total", "outcome", "rejected");
}
