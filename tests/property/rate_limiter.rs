//! Property tests for the rate limiter.
//!
//! Invariants tested:
//! - Token bucket `retry_after` strictly decreases as the refill rate rises
//! - Token bucket never grants more than capacity plus refill over time
//! - Sliding window never grants more than `limit` within a window

use super::paused_runtime;
use proptest::prelude::*;
use std::time::Duration;
use svcguard_ratelimiter::{RateLimiter, RateLimiterConfig};

fn drained_bucket(capacity: u32, refill: f64) -> RateLimiter {
    let limiter = RateLimiter::new(
        RateLimiterConfig::builder()
            .token_bucket(f64::from(capacity), refill)
            .build(),
    );
    assert!(limiter.try_acquire_n(u64::from(capacity)).allowed);
    limiter
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: a faster refill always means a shorter wait.
    #[test]
    fn retry_after_decreases_with_refill_rate(
        capacity in 1u32..=100,
        slow in 0.1f64..=50.0,
        factor in 1.01f64..=10.0,
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let fast = slow * factor;

            let slow_wait = drained_bucket(capacity, slow).try_acquire().retry_after;
            let fast_wait = drained_bucket(capacity, fast).try_acquire().retry_after;

            let (slow_wait, fast_wait) = (slow_wait.unwrap(), fast_wait.unwrap());
            prop_assert!(
                fast_wait < slow_wait,
                "refill {} waited {:?}, refill {} waited {:?}",
                fast, fast_wait, slow, slow_wait
            );
            Ok(())
        })?;
    }

    /// Property: over any run, grants are bounded by the initial capacity
    /// plus what refilled in the meantime.
    #[test]
    fn token_bucket_grants_are_bounded(
        capacity in 1u32..=20,
        refill in 0.0f64..=20.0,
        gaps_ms in prop::collection::vec(0u64..=200, 1..=100),
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let limiter = RateLimiter::new(
                RateLimiterConfig::builder()
                    .token_bucket(f64::from(capacity), refill)
                    .build(),
            );

            let mut granted = 0u64;
            let mut elapsed = Duration::ZERO;
            for gap in gaps_ms {
                tokio::time::advance(Duration::from_millis(gap)).await;
                elapsed += Duration::from_millis(gap);
                if limiter.try_acquire().allowed {
                    granted += 1;
                }
            }

            let bound = f64::from(capacity) + refill * elapsed.as_secs_f64();
            prop_assert!(
                granted as f64 <= bound + 1e-6,
                "granted {} with bound {}",
                granted,
                bound
            );
            Ok(())
        })?;
    }

    /// Property: any span shorter than the window minus one bucket holds at
    /// most `limit` grants.
    #[test]
    fn sliding_window_respects_limit(
        limit in 1u64..=20,
        buckets in 1u32..=10,
        gaps_ms in prop::collection::vec(0u64..=50, 1..=150),
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let window = Duration::from_millis(500);
            let limiter = RateLimiter::new(
                RateLimiterConfig::builder()
                    .sliding_window(limit, window)
                    .buckets(buckets)
                    .build(),
            );
            let span = window - window / buckets;

            let mut now = Duration::ZERO;
            let mut grants: Vec<Duration> = Vec::new();
            for gap in gaps_ms {
                tokio::time::advance(Duration::from_millis(gap)).await;
                now += Duration::from_millis(gap);
                if limiter.try_acquire().allowed {
                    grants.push(now);
                }
            }

            for (i, start) in grants.iter().enumerate() {
                let in_span = grants[i..]
                    .iter()
                    .take_while(|t| **t < *start + span)
                    .count() as u64;
                prop_assert!(in_span <= limit, "{} grants within {:?}", in_span, span);
            }
            Ok(())
        })?;
    }
}
