use super::{init_tracing, UpstreamError};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use svcguard::circuitbreaker::{CircuitBreakerConfig, CircuitState};
use svcguard::ratelimiter::RateLimiterConfig;
use svcguard::retry::RetryConfig;
use svcguard::{BreakerScope, ResilienceCoordinator, ResilienceError, ServicePolicy};
use svcguard_core::classify::from_classify;
use tokio::time::Instant;

fn retrying(scope: BreakerScope) -> ServicePolicy<UpstreamError> {
    ServicePolicy::builder()
        .shared_classifier(from_classify())
        .retry(
            RetryConfig::builder()
                .max_attempts(3)
                .fixed_backoff(Duration::from_secs(1))
                .build(),
        )
        .breaker_scope(scope)
        .build()
}

#[tokio::test(start_paused = true)]
async fn rate_limit_rejects_before_breaker_is_touched() {
    let coordinator = ResilienceCoordinator::<u32, UpstreamError>::builder()
        .rate_limit(
            "quota",
            RateLimiterConfig::builder()
                .sliding_window(1, Duration::from_secs(60))
                .build(),
        )
        .build();

    let invocations = AtomicU32::new(0);
    let op = || {
        invocations.fetch_add(1, Ordering::SeqCst);
        async { Err::<u32, _>(UpstreamError::Overloaded) }
    };

    let first = coordinator.call("quota", op).await.unwrap_err();
    assert!(first.is_retry_exhausted());
    let failures = coordinator.metrics("quota").breaker.map(|b| b.failure_count);
    assert_eq!(failures, Some(1));

    let second = coordinator.call("quota", op).await.unwrap_err();
    assert!(second.is_rate_limited());
    assert_eq!(invocations.load(Ordering::SeqCst), 3);

    let breaker = coordinator.metrics("quota").breaker.unwrap();
    assert_eq!(breaker.total_requests, 1);
    assert_eq!(breaker.rejected_count, 0);
}

#[tokio::test(start_paused = true)]
async fn limiter_denial_never_creates_a_breaker() {
    let coordinator = ResilienceCoordinator::<u32, UpstreamError>::builder()
        .rate_limit(
            "burst",
            RateLimiterConfig::builder().token_bucket(1.0, 0.0).build(),
        )
        .build();

    coordinator.limiters().consume("burst", None);
    let err = coordinator
        .call("burst", || async { Ok::<_, UpstreamError>(1) })
        .await
        .unwrap_err();

    assert!(err.is_rate_limited());
    // Capacity 1 with no refill can never succeed again.
    assert_eq!(err.retry_after(), None);
    assert!(coordinator.breakers().get("burst").is_none());
}

#[tokio::test(start_paused = true)]
async fn open_breaker_skips_retry_delays() {
    let coordinator = ResilienceCoordinator::<u32, UpstreamError>::builder()
        .policy("ranker", retrying(BreakerScope::WholeSequence))
        .build();
    coordinator.breakers().get_or_create("ranker").force_open();

    let invocations = AtomicU32::new(0);
    let start = Instant::now();
    let err = coordinator
        .call("ranker", || {
            invocations.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, UpstreamError>(1) }
        })
        .await
        .unwrap_err();

    assert!(err.is_circuit_open());
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(invocations.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn whole_sequence_counts_one_breaker_failure() {
    init_tracing();
    let coordinator = ResilienceCoordinator::<u32, UpstreamError>::builder()
        .policy("ranker", retrying(BreakerScope::WholeSequence))
        .build();

    let err = coordinator
        .call("ranker", || async { Err::<u32, _>(UpstreamError::Overloaded) })
        .await
        .unwrap_err();

    assert_eq!(err.attempts(), Some(3));
    let breaker = coordinator.metrics("ranker").breaker.unwrap();
    assert_eq!(breaker.failure_count, 1);
    assert_eq!(breaker.total_requests, 1);
}

#[tokio::test(start_paused = true)]
async fn per_attempt_counts_every_failure() {
    init_tracing();
    let coordinator = ResilienceCoordinator::<u32, UpstreamError>::builder()
        .policy("ranker", retrying(BreakerScope::PerAttempt))
        .build();

    let err = coordinator
        .call("ranker", || async { Err::<u32, _>(UpstreamError::Overloaded) })
        .await
        .unwrap_err();

    assert_eq!(err.attempts(), Some(3));
    let breaker = coordinator.metrics("ranker").breaker.unwrap();
    assert_eq!(breaker.failure_count, 3);
    assert_eq!(breaker.total_requests, 3);
}

#[tokio::test(start_paused = true)]
async fn per_attempt_stops_retrying_once_open() {
    let coordinator = ResilienceCoordinator::<u32, UpstreamError>::builder()
        .circuit_breaker(
            "ranker",
            CircuitBreakerConfig::builder()
                .failure_threshold(2)
                .recovery_timeout(Duration::from_secs(60))
                .build(),
        )
        .policy("ranker", retrying(BreakerScope::PerAttempt))
        .build();

    let invocations = AtomicU32::new(0);
    let err = coordinator
        .call("ranker", || {
            invocations.fetch_add(1, Ordering::SeqCst);
            async { Err::<u32, _>(UpstreamError::Overloaded) }
        })
        .await
        .unwrap_err();

    assert!(err.is_circuit_open());
    assert_eq!(invocations.load(Ordering::SeqCst), 2);
    assert_eq!(
        coordinator.metrics("ranker").breaker_state(),
        CircuitState::Open
    );
}

#[tokio::test(start_paused = true)]
async fn permanent_errors_are_not_retried() {
    let coordinator = ResilienceCoordinator::<u32, UpstreamError>::builder()
        .policy("ranker", retrying(BreakerScope::WholeSequence))
        .build();

    let invocations = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&invocations);
    let start = Instant::now();
    let err = coordinator
        .call("ranker", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<u32, _>(UpstreamError::BadRequest) }
        })
        .await
        .unwrap_err();

    assert_eq!(err, ResilienceError::Permanent(UpstreamError::BadRequest));
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(coordinator.metrics("ranker").calls.permanent_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn success_after_transient_failures() {
    let coordinator = ResilienceCoordinator::<&'static str, UpstreamError>::builder()
        .policy("ranker", retrying(BreakerScope::WholeSequence))
        .build();

    let invocations = AtomicU32::new(0);
    let value = coordinator
        .call("ranker", || {
            let n = invocations.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(UpstreamError::Overloaded)
                } else {
                    Ok("ranked")
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(value, "ranked");
    let metrics = coordinator.metrics("ranker");
    assert_eq!(metrics.calls.succeeded, 1);
    assert_eq!(metrics.breaker.map(|b| b.failure_count), Some(0));
}

#[tokio::test]
async fn services_are_isolated() {
    let coordinator = ResilienceCoordinator::<u32, UpstreamError>::builder()
        .default_policy(
            ServicePolicy::builder()
                .retry(RetryConfig::builder().max_attempts(1).build())
                .build(),
        )
        .circuit_breaker(
            "flaky",
            CircuitBreakerConfig::builder().failure_threshold(1).build(),
        )
        .build();

    let _ = coordinator
        .call("flaky", || async { Err::<u32, _>(UpstreamError::Overloaded) })
        .await;

    assert!(coordinator
        .call("flaky", || async { Ok::<_, UpstreamError>(1) })
        .await
        .unwrap_err()
        .is_circuit_open());
    assert_eq!(
        coordinator
            .call("steady", || async { Ok::<_, UpstreamError>(2) })
            .await,
        Ok(2)
    );
}
