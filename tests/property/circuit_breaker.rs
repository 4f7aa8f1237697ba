//! Property tests for the circuit breaker.
//!
//! Invariants tested:
//! - Opens once consecutive failures reach the threshold
//! - Rejects without invoking the operation while open
//! - Admits exactly one trial after the recovery timeout
//! - A successful trial closes the breaker with a clean failure count

use super::paused_runtime;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use svcguard_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

#[derive(Debug, Clone)]
struct TestError;

fn breaker(threshold: u32, recovery: Duration) -> CircuitBreaker {
    CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .name("prop")
            .failure_threshold(threshold)
            .recovery_timeout(recovery)
            .build(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: the breaker opens exactly when the threshold is reached and
    /// then stops invoking the operation.
    #[test]
    fn opens_at_threshold(
        threshold in 1u32..=20,
        extra_calls in 1usize..=30,
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let breaker = breaker(threshold, Duration::from_secs(60));
            let invoked = AtomicUsize::new(0);

            for i in 0..threshold {
                prop_assert_eq!(breaker.state(), CircuitState::Closed, "opened early at {}", i);
                let _ = breaker
                    .call(|| {
                        invoked.fetch_add(1, Ordering::SeqCst);
                        async { Err::<(), _>(TestError) }
                    })
                    .await;
            }
            prop_assert_eq!(breaker.state(), CircuitState::Open);

            for _ in 0..extra_calls {
                let result = breaker
                    .call(|| {
                        invoked.fetch_add(1, Ordering::SeqCst);
                        async { Ok::<_, TestError>(()) }
                    })
                    .await;
                prop_assert!(result.unwrap_err().is_circuit_open());
            }

            prop_assert_eq!(invoked.load(Ordering::SeqCst), threshold as usize);
            prop_assert_eq!(breaker.metrics().rejected_count, extra_calls as u64);
            Ok(())
        })?;
    }

    /// Property: after the recovery timeout only one caller gets through,
    /// and its success closes the breaker.
    #[test]
    fn single_trial_after_recovery(
        threshold in 1u32..=10,
        recovery_ms in 1u64..=10_000,
        waiting_callers in 1usize..=10,
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let recovery = Duration::from_millis(recovery_ms);
            let breaker = breaker(threshold, recovery);
            for _ in 0..threshold {
                breaker.try_acquire().unwrap().failure();
            }

            tokio::time::advance(recovery - Duration::from_millis(1).min(recovery)).await;
            if recovery_ms > 1 {
                prop_assert!(breaker.try_acquire().is_err());
            }
            tokio::time::advance(Duration::from_millis(1)).await;

            let trial = breaker.try_acquire().unwrap();
            prop_assert!(trial.is_trial());
            for _ in 0..waiting_callers {
                prop_assert!(breaker.try_acquire().is_err());
            }

            trial.success();
            prop_assert_eq!(breaker.state(), CircuitState::Closed);
            prop_assert_eq!(breaker.metrics().failure_count, 0);
            Ok(())
        })?;
    }
}
