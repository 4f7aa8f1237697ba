//! Property tests for retry.
//!
//! Invariants tested:
//! - A permanently failing operation runs exactly `max_attempts` times
//! - Exhaustion reports the number of invocations
//! - Jittered delays stay within the exponential cap
//! - A non-retryable error stops after one invocation

use super::paused_runtime;
use proptest::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use svcguard_retry::{execute_with_retry, Jitter, RetryConfig, RetryError};
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
struct TestError(u32);

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: M attempts against an always-failing operation.
    #[test]
    fn exhausts_after_max_attempts(
        max_attempts in 1u32..=10,
        base_ms in 1u64..=500,
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let config = RetryConfig::<TestError>::builder()
                .max_attempts(max_attempts)
                .base_delay(Duration::from_millis(base_ms))
                .build();
            let invoked = AtomicU32::new(0);

            let result: Result<(), _> = execute_with_retry(
                || {
                    let n = invoked.fetch_add(1, Ordering::SeqCst) + 1;
                    async move { Err(TestError(n)) }
                },
                &config,
            )
            .await;

            prop_assert_eq!(invoked.load(Ordering::SeqCst), max_attempts);
            prop_assert_eq!(
                result,
                Err(RetryError::Exhausted {
                    attempts: max_attempts,
                    last_error: TestError(max_attempts),
                })
            );
            Ok(())
        })?;
    }

    /// Property: with full jitter the whole sequence never takes longer than
    /// the unjittered exponential schedule.
    #[test]
    fn jittered_sequence_is_bounded(
        max_attempts in 2u32..=6,
        base_ms in 1u64..=200,
        max_ms in 200u64..=2_000,
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let config = RetryConfig::<TestError>::builder()
                .max_attempts(max_attempts)
                .base_delay(Duration::from_millis(base_ms))
                .max_delay(Duration::from_millis(max_ms))
                .multiplier(2.0)
                .jitter(Jitter::Full)
                .build();

            let ceiling: u64 = (0..max_attempts - 1)
                .map(|i| (base_ms << i).min(max_ms))
                .sum();

            let start = Instant::now();
            let _: Result<(), _> =
                execute_with_retry(|| async { Err(TestError(0)) }, &config).await;

            // The timer rounds each sleep up to the next millisecond.
            let slack = Duration::from_millis(u64::from(max_attempts));
            prop_assert!(start.elapsed() <= Duration::from_millis(ceiling) + slack);
            Ok(())
        })?;
    }

    /// Property: an error the predicate rejects is returned after one call.
    #[test]
    fn non_retryable_stops_immediately(max_attempts in 1u32..=10) {
        let rt = paused_runtime();
        rt.block_on(async {
            let config = RetryConfig::<TestError>::builder()
                .max_attempts(max_attempts)
                .retry_on(|e: &TestError| e.0 != 42)
                .build();
            let invoked = AtomicU32::new(0);

            let result: Result<(), _> = execute_with_retry(
                || {
                    invoked.fetch_add(1, Ordering::SeqCst);
                    async { Err(TestError(42)) }
                },
                &config,
            )
            .await;

            prop_assert_eq!(invoked.load(Ordering::SeqCst), 1);
            prop_assert_eq!(result, Err(RetryError::NotRetryable(TestError(42))));
            Ok(())
        })?;
    }
}
