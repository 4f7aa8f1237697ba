use super::UpstreamError;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use svcguard::fallback::FallbackChain;
use svcguard::ratelimiter::RateLimiterConfig;
use svcguard::retry::RetryConfig;
use svcguard::{CallContext, ResilienceCoordinator, ResilienceError, ServicePolicy};
use svcguard_core::classify::from_classify;

fn one_shot() -> ServicePolicy<UpstreamError> {
    ServicePolicy::builder()
        .shared_classifier(from_classify())
        .retry(RetryConfig::builder().max_attempts(1).build())
        .build()
}

#[tokio::test(start_paused = true)]
async fn cached_value_serves_rate_limited_callers() {
    let coordinator = ResilienceCoordinator::<String, UpstreamError>::builder()
        .rate_limit(
            "weather",
            RateLimiterConfig::builder()
                .sliding_window(1, Duration::from_secs(60))
                .build(),
        )
        .fallback(
            "weather",
            FallbackChain::builder()
                .cached(Duration::from_secs(300))
                .static_value("unknown".to_string())
                .build(),
        )
        .build();

    let oslo = CallContext::new().cache_key("oslo");
    let fresh = coordinator
        .call_with("weather", &oslo, || async {
            Ok::<_, UpstreamError>("rain".to_string())
        })
        .await
        .unwrap();
    assert_eq!(fresh, "rain");

    let cached = coordinator
        .call_with("weather", &oslo, || async {
            Ok::<_, UpstreamError>("never called".to_string())
        })
        .await
        .unwrap();
    assert_eq!(cached, "rain");

    let lima = CallContext::new().cache_key("lima");
    let fallback = coordinator
        .call_with("weather", &lima, || async {
            Ok::<_, UpstreamError>("never called".to_string())
        })
        .await
        .unwrap();
    assert_eq!(fallback, "unknown");

    let stats = coordinator.metrics("weather").calls;
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.fallbacks, 2);
    assert_eq!(stats.rate_limited, 0);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_fall_back() {
    let coordinator = ResilienceCoordinator::<String, UpstreamError>::builder()
        .policy("llm", one_shot())
        .fallback(
            "llm",
            FallbackChain::builder()
                .alternate("small_model", || async {
                    Ok::<_, std::io::Error>("short answer".to_string())
                })
                .build(),
        )
        .build();

    let value = coordinator
        .call("llm", || async { Err::<String, _>(UpstreamError::Overloaded) })
        .await
        .unwrap();

    assert_eq!(value, "short answer");
}

#[tokio::test(start_paused = true)]
async fn permanent_errors_bypass_fallback() {
    let applied = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&applied);

    let coordinator = ResilienceCoordinator::<String, UpstreamError>::builder()
        .policy("llm", one_shot())
        .fallback(
            "llm",
            FallbackChain::builder()
                .static_value("default".to_string())
                .on_applied(move |name| seen.lock().unwrap().push(name.to_string()))
                .build(),
        )
        .build();

    let err = coordinator
        .call("llm", || async { Err::<String, _>(UpstreamError::BadRequest) })
        .await
        .unwrap_err();

    assert_eq!(err, ResilienceError::Permanent(UpstreamError::BadRequest));
    assert!(applied.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn exhausted_chain_keeps_the_original_error() {
    let coordinator = ResilienceCoordinator::<String, UpstreamError>::builder()
        .policy("llm", one_shot())
        .fallback(
            "llm",
            FallbackChain::builder()
                .cached(Duration::from_secs(60))
                .compute("only_when_open", |ctx| {
                    ctx.error.is_circuit_open().then(|| "maintenance".to_string())
                })
                .build(),
        )
        .build();

    let err = coordinator
        .call("llm", || async { Err::<String, _>(UpstreamError::Overloaded) })
        .await
        .unwrap_err();

    match err {
        ResilienceError::FallbackExhausted { original, tried } => {
            assert_eq!(
                *original,
                ResilienceError::RetryExhausted {
                    attempts: 1,
                    last_error: UpstreamError::Overloaded
                }
            );
            assert_eq!(tried, vec!["cached_value", "only_when_open"]);
        }
        other => panic!("expected fallback exhaustion, got {other:?}"),
    }
    assert_eq!(coordinator.metrics("llm").calls.fallback_exhausted, 1);
}

#[tokio::test(start_paused = true)]
async fn open_circuit_uses_computed_fallback() {
    let coordinator = ResilienceCoordinator::<String, UpstreamError>::builder()
        .fallback(
            "llm",
            FallbackChain::builder()
                .compute("only_when_open", |ctx| {
                    ctx.error
                        .is_circuit_open()
                        .then(|| format!("{} is cooling down", ctx.service))
                })
                .build(),
        )
        .build();
    coordinator.breakers().get_or_create("llm").force_open();

    let value = coordinator
        .call("llm", || async { Ok::<_, UpstreamError>("fresh".to_string()) })
        .await
        .unwrap();

    assert_eq!(value, "llm is cooling down");
}
