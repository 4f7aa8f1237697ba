//! Fallback metrics regression tests

use super::helpers::*;
use serial_test::serial;
use svcguard_core::{CallContext, ResilienceError};
use svcguard_fallback::{FallbackChain, FallbackHandler};

#[tokio::test]
#[serial]
async fn fallback_metrics_exist() {
    init_recorder();

    let handler = FallbackHandler::<u32, &'static str>::new()
        .with_chain("test_fb", FallbackChain::builder().static_value(0).build())
        .with_chain(
            "test_fb_empty",
            FallbackChain::builder().compute("never", |_| None).build(),
        );

    let open = |service: &str| ResilienceError::CircuitOpen {
        service: service.to_string(),
    };
    assert_eq!(
        handler
            .handle("test_fb", open("test_fb"), &CallContext::new())
            .await
            .ok(),
        Some(0)
    );
    assert!(handler
        .handle("test_fb_empty", open("test_fb_empty"), &CallContext::new())
        .await
        .is_err());

    assert_counter_exists("fallback_calls_total");
    assert_metric_has_label("fallback_calls_total", "service", "test_fb");
    assert_metric_has_label("fallback_calls_total", "result", "applied");
    assert_metric_has_label("fallback_calls_total", "strategy", "static_value");
    assert_metric_has_label("fallback_calls_total", "result", "exhausted");
}
