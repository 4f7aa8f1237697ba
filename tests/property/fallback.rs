//! Property tests for fallback chains.
//!
//! Invariants tested:
//! - The first strategy that produces a value wins
//! - Pure chains give the same answer for the same failure every time
//! - Exhaustion lists every strategy in order

use super::paused_runtime;
use proptest::prelude::*;
use svcguard_core::{CallContext, ResilienceError};
use svcguard_fallback::{FallbackChain, FallbackHandler};

#[derive(Debug, Clone, PartialEq)]
struct TestError;

/// Each entry is one strategy: `Some(v)` produces `v`, `None` skips.
fn chain(outcomes: &[Option<u32>]) -> FallbackChain<u32, TestError> {
    outcomes
        .iter()
        .enumerate()
        .fold(FallbackChain::builder(), |builder, (i, outcome)| {
            let outcome = *outcome;
            builder.compute(format!("strategy_{i}"), move |_| outcome)
        })
        .build()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn first_producer_wins_deterministically(
        outcomes in prop::collection::vec(prop::option::of(0u32..1000), 0..=8),
        runs in 1usize..=5,
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let handler = FallbackHandler::new().with_chain("svc", chain(&outcomes));
            let expected = outcomes.iter().find_map(|o| *o);

            for _ in 0..runs {
                let error = ResilienceError::CircuitOpen { service: "svc".to_string() };
                let result = handler.handle("svc", error, &CallContext::new()).await;

                match expected {
                    Some(value) => {
                        prop_assert_eq!(result.ok(), Some(value));
                    }
                    None => {
                        let exhausted = result.unwrap_err();
                        let names: Vec<String> =
                            (0..outcomes.len()).map(|i| format!("strategy_{i}")).collect();
                        prop_assert_eq!(&exhausted.tried, &names);
                        prop_assert_eq!(
                            exhausted.into_original(),
                            ResilienceError::CircuitOpen { service: "svc".to_string() }
                        );
                    }
                }
            }
            Ok(())
        })?;
    }
}
