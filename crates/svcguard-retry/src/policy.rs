use crate::backoff::{IntervalFunction, Jitter};
use std::sync::Arc;
use std::time::Duration;

/// Determines whether an error should be retried.
pub type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Policy for retry behavior: how many attempts, how long to wait between
/// them, and which errors are worth retrying.
pub struct RetryPolicy<E> {
    pub(crate) max_attempts: u32,
    pub(crate) interval_fn: Arc<dyn IntervalFunction>,
    pub(crate) jitter: Jitter,
    pub(crate) max_delay: Duration,
    pub(crate) retry_predicate: Option<RetryPredicate<E>>,
}

impl<E> RetryPolicy<E> {
    /// Creates a new retry policy. `max_attempts` counts the initial call and
    /// is raised to at least 1.
    pub fn new(max_attempts: u32, interval_fn: Arc<dyn IntervalFunction>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval_fn,
            jitter: Jitter::None,
            max_delay: Duration::MAX,
            retry_predicate: None,
        }
    }

    /// Sets a predicate to determine which errors should be retried.
    pub fn with_retry_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.retry_predicate = Some(Arc::new(predicate));
        self
    }

    /// Sets the jitter applied to each delay.
    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    /// Caps every delay, including jittered ones.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Total attempts allowed, including the first call.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Checks if the given error should be retried.
    pub fn should_retry(&self, error: &E) -> bool {
        if let Some(predicate) = &self.retry_predicate {
            predicate(error)
        } else {
            true
        }
    }

    /// Delay to wait after `failed_attempts` attempts have failed (1-indexed),
    /// with jitter applied and the result clamped to `[0, max_delay]`.
    pub fn next_backoff(&self, failed_attempts: u32) -> Duration {
        let index = failed_attempts.saturating_sub(1) as usize;
        let base = self.interval_fn.next_interval(index).min(self.max_delay);
        self.jitter.apply(base).min(self.max_delay)
    }
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            interval_fn: Arc::clone(&self.interval_fn),
            jitter: self.jitter,
            max_delay: self.max_delay,
            retry_predicate: self.retry_predicate.clone(),
        }
    }
}

impl<E> std::fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("jitter", &self.jitter)
            .field("max_delay", &self.max_delay)
            .field("has_predicate", &self.retry_predicate.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::{ExponentialBackoff, FixedInterval};

    #[derive(Debug)]
    struct TestError {
        retryable: bool,
    }

    #[test]
    fn retries_all_by_default() {
        let policy = RetryPolicy::new(3, Arc::new(FixedInterval::new(Duration::from_secs(1))));
        assert!(policy.should_retry(&TestError { retryable: false }));
    }

    #[test]
    fn predicate_filters() {
        let policy = RetryPolicy::new(3, Arc::new(FixedInterval::new(Duration::from_secs(1))))
            .with_retry_predicate(|e: &TestError| e.retryable);

        assert!(policy.should_retry(&TestError { retryable: true }));
        assert!(!policy.should_retry(&TestError { retryable: false }));
    }

    #[test]
    fn zero_attempts_means_one() {
        let policy: RetryPolicy<TestError> =
            RetryPolicy::new(0, Arc::new(FixedInterval::new(Duration::ZERO)));
        assert_eq!(policy.max_attempts(), 1);
    }

    #[test]
    fn backoff_is_one_indexed_and_clamped() {
        let policy: RetryPolicy<TestError> = RetryPolicy::new(
            10,
            Arc::new(ExponentialBackoff::new(Duration::from_millis(100))),
        )
        .with_max_delay(Duration::from_millis(350))
        .with_jitter(Jitter::Proportional(1.0));

        for _ in 0..50 {
            assert!(policy.next_backoff(1) <= Duration::from_millis(200));
            assert!(policy.next_backoff(5) <= Duration::from_millis(350));
        }

        let plain: RetryPolicy<TestError> = RetryPolicy::new(
            10,
            Arc::new(ExponentialBackoff::new(Duration::from_millis(100))),
        );
        assert_eq!(plain.next_backoff(1), Duration::from_millis(100));
        assert_eq!(plain.next_backoff(3), Duration::from_millis(400));
    }
}
