use super::UpstreamError;
use std::time::Duration;
use svcguard::circuitbreaker::{CircuitBreakerConfig, CircuitState};
use svcguard::retry::RetryConfig;
use svcguard::{ResilienceCoordinator, ServicePolicy};

#[tokio::test(start_paused = true)]
async fn dropped_call_records_nothing() {
    let coordinator = ResilienceCoordinator::<u32, UpstreamError>::builder()
        .default_policy(
            ServicePolicy::builder()
                .retry(
                    RetryConfig::builder()
                        .max_attempts(5)
                        .fixed_backoff(Duration::from_secs(1))
                        .build(),
                )
                .build(),
        )
        .build();

    let call = coordinator.call("slow", || async { Err::<u32, _>(UpstreamError::Overloaded) });
    let timed_out = tokio::time::timeout(Duration::from_millis(2500), call).await;
    assert!(timed_out.is_err());

    let metrics = coordinator.metrics("slow");
    assert_eq!(metrics.calls.total, 0);
    let breaker = metrics.breaker.unwrap();
    assert_eq!(breaker.failure_count, 0);
    assert_eq!(breaker.success_count, 0);
    assert_eq!(breaker.state, CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn dropped_trial_frees_the_half_open_slot() {
    let coordinator = ResilienceCoordinator::<u32, UpstreamError>::builder()
        .circuit_breaker(
            "slow",
            CircuitBreakerConfig::builder()
                .failure_threshold(1)
                .recovery_timeout(Duration::from_secs(5))
                .build(),
        )
        .default_policy(
            ServicePolicy::builder()
                .retry(RetryConfig::builder().max_attempts(1).build())
                .build(),
        )
        .build();

    let _ = coordinator
        .call("slow", || async { Err::<u32, _>(UpstreamError::Overloaded) })
        .await;
    tokio::time::advance(Duration::from_secs(5)).await;

    // The trial hangs and its caller gives up.
    let hanging = coordinator.call("slow", || futures::future::pending::<Result<u32, UpstreamError>>());
    assert!(tokio::time::timeout(Duration::from_secs(1), hanging)
        .await
        .is_err());
    assert_eq!(
        coordinator.metrics("slow").breaker_state(),
        CircuitState::HalfOpen
    );

    // A new caller gets the trial instead of being rejected.
    let value = coordinator
        .call("slow", || async { Ok::<_, UpstreamError>(9) })
        .await
        .unwrap();
    assert_eq!(value, 9);
    assert_eq!(
        coordinator.metrics("slow").breaker_state(),
        CircuitState::Closed
    );
}
