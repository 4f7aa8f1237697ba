use super::UpstreamError;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use svcguard::fallback::FallbackChain;
use svcguard::ratelimiter::RateLimiterConfig;
use svcguard::retry::RetryConfig;
use svcguard::{GuardLayer, ResilienceCoordinator, ResilienceError, ServicePolicy};
use svcguard_core::classify::from_classify;
use tower::{Layer, Service, ServiceBuilder, ServiceExt};

#[derive(Debug, Clone)]
struct Lookup {
    key: String,
}

fn coordinator() -> ResilienceCoordinator<String, UpstreamError> {
    ResilienceCoordinator::builder()
        .policy(
            "kv",
            ServicePolicy::builder()
                .shared_classifier(from_classify())
                .retry(
                    RetryConfig::builder()
                        .max_attempts(3)
                        .fixed_backoff(Duration::from_millis(50))
                        .build(),
                )
                .build(),
        )
        .rate_limit(
            "kv",
            RateLimiterConfig::builder()
                .sliding_window(2, Duration::from_secs(60))
                .build(),
        )
        .fallback(
            "kv",
            FallbackChain::builder()
                .static_value("stale".to_string())
                .build(),
        )
        .build()
}

#[tokio::test(start_paused = true)]
async fn layer_applies_the_service_policies() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let backend = tower::service_fn(move |req: Lookup| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if n == 0 {
                Err(UpstreamError::Overloaded)
            } else {
                Ok(format!("value-of-{}", req.key))
            }
        }
    });

    let coordinator = coordinator();
    let mut service = ServiceBuilder::new()
        .layer(GuardLayer::new(coordinator.clone(), "kv"))
        .service(backend);

    let first = service
        .ready()
        .await
        .unwrap()
        .call(Lookup { key: "a".into() })
        .await
        .unwrap();
    assert_eq!(first, "value-of-a");
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let second = service
        .ready()
        .await
        .unwrap()
        .call(Lookup { key: "b".into() })
        .await
        .unwrap();
    assert_eq!(second, "value-of-b");

    // Third request in the window is rate limited and served by the fallback.
    let third = service
        .ready()
        .await
        .unwrap()
        .call(Lookup { key: "c".into() })
        .await
        .unwrap();
    assert_eq!(third, "stale");
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let stats = coordinator.metrics("kv").calls;
    assert_eq!(stats.succeeded, 2);
    assert_eq!(stats.fallbacks, 1);
}

#[tokio::test(start_paused = true)]
async fn layer_surfaces_permanent_errors() {
    let backend =
        tower::service_fn(|_req: Lookup| async { Err::<String, _>(UpstreamError::BadRequest) });
    let service = GuardLayer::new(coordinator(), "kv").layer(backend);

    let err = service
        .oneshot(Lookup { key: "x".into() })
        .await
        .unwrap_err();
    assert_eq!(err, ResilienceError::Permanent(UpstreamError::BadRequest));
}
