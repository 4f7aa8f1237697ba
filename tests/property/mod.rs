//! Property-based tests for svcguard.
//!
//! Each module drives one building block on a paused tokio clock.

pub mod circuit_breaker;
pub mod fallback;
pub mod rate_limiter;
pub mod retry;

/// A current-thread runtime with the clock paused, so backoff and recovery
/// timeouts elapse instantly.
pub(crate) fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}
