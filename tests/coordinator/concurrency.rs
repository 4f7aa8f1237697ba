use super::UpstreamError;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use svcguard::circuitbreaker::{CircuitBreakerConfig, CircuitState};
use svcguard::ratelimiter::RateLimiterConfig;
use svcguard::retry::RetryConfig;
use svcguard::{CallContext, ResilienceCoordinator, ServicePolicy};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_never_exceed_the_limit() {
    let coordinator = ResilienceCoordinator::<u32, UpstreamError>::builder()
        .rate_limit(
            "payments",
            RateLimiterConfig::builder()
                .sliding_window(25, Duration::from_secs(3600))
                .build(),
        )
        .build();
    let invocations = Arc::new(AtomicU32::new(0));

    let handles: Vec<_> = (0..200)
        .map(|i| {
            let coordinator = coordinator.clone();
            let invocations = Arc::clone(&invocations);
            tokio::spawn(async move {
                coordinator
                    .call("payments", move || {
                        invocations.fetch_add(1, Ordering::SeqCst);
                        async move { Ok::<_, UpstreamError>(i) }
                    })
                    .await
            })
        })
        .collect();

    let mut allowed = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            allowed += 1;
        }
    }

    assert_eq!(allowed, 25);
    assert_eq!(invocations.load(Ordering::SeqCst), 25);
    let stats = coordinator.metrics("payments").calls;
    assert_eq!(stats.total, 200);
    assert_eq!(stats.rate_limited, 175);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn per_identity_limits_are_independent() {
    let coordinator = ResilienceCoordinator::<u32, UpstreamError>::builder()
        .rate_limit(
            "search",
            RateLimiterConfig::builder().token_bucket(3.0, 0.0).build(),
        )
        .build();

    let handles: Vec<_> = ["alice", "bob", "carol", "dave"]
        .into_iter()
        .flat_map(|user| std::iter::repeat(user).take(10))
        .map(|user| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                let ctx = CallContext::new().identity(user);
                let ok = coordinator
                    .call_with("search", &ctx, || async { Ok::<_, UpstreamError>(1) })
                    .await
                    .is_ok();
                (user, ok)
            })
        })
        .collect();

    let mut allowed = std::collections::HashMap::new();
    for handle in handles {
        let (user, ok) = handle.await.unwrap();
        if ok {
            *allowed.entry(user).or_insert(0) += 1;
        }
    }

    for user in ["alice", "bob", "carol", "dave"] {
        assert_eq!(allowed.get(user), Some(&3), "{user}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_failures_open_the_breaker_without_lost_updates() {
    let coordinator = ResilienceCoordinator::<u32, UpstreamError>::builder()
        .circuit_breaker(
            "inventory",
            CircuitBreakerConfig::builder()
                .failure_threshold(10)
                .recovery_timeout(Duration::from_secs(3600))
                .build(),
        )
        .default_policy(
            ServicePolicy::builder()
                .retry(RetryConfig::builder().max_attempts(1).build())
                .build(),
        )
        .build();
    let invocations = Arc::new(AtomicU32::new(0));

    let handles: Vec<_> = (0..100)
        .map(|_| {
            let coordinator = coordinator.clone();
            let invocations = Arc::clone(&invocations);
            tokio::spawn(async move {
                coordinator
                    .call("inventory", move || {
                        invocations.fetch_add(1, Ordering::SeqCst);
                        async { Err::<u32, _>(UpstreamError::Overloaded) }
                    })
                    .await
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().is_err());
    }

    let metrics = coordinator.metrics("inventory");
    let breaker = metrics.breaker.unwrap();
    assert_eq!(breaker.state, CircuitState::Open);
    assert!(breaker.failure_count >= 10);

    // Every admitted call failed and was recorded exactly once.
    let invoked = invocations.load(Ordering::SeqCst);
    assert_eq!(u64::from(invoked), metrics.calls.retry_exhausted);
    assert_eq!(breaker.failure_count, invoked);
    assert_eq!(metrics.calls.retry_exhausted + metrics.calls.circuit_open, 100);
}

#[tokio::test(start_paused = true)]
async fn idle_caller_limiters_are_reclaimed() {
    let coordinator = ResilienceCoordinator::<u32, UpstreamError>::builder()
        .rate_limit(
            "search",
            RateLimiterConfig::builder().token_bucket(1.0, 1.0).build(),
        )
        .build();
    let cleanup = coordinator
        .limiters()
        .spawn_cleanup(Duration::from_secs(300), Duration::from_secs(600));

    for i in 0..10_000 {
        let ctx = CallContext::new().identity(format!("caller-{i}"));
        coordinator
            .call_with("search", &ctx, || async { Ok::<_, UpstreamError>(1) })
            .await
            .unwrap();
    }
    assert_eq!(coordinator.limiters().len(), 10_000);

    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert!(coordinator.limiters().is_empty());

    // An evicted caller starts over with a full bucket.
    let ctx = CallContext::new().identity("caller-0");
    assert_eq!(
        coordinator
            .call_with("search", &ctx, || async { Ok::<_, UpstreamError>(2) })
            .await,
        Ok(2)
    );
    cleanup.abort();
}
