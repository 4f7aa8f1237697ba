use crate::Decision;
use tokio::time::{Duration, Instant};

/// Token bucket state: `capacity` tokens, refilled continuously at
/// `refill_rate` tokens per second.
#[derive(Debug, Clone)]
pub(crate) struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Creates a full bucket.
    pub(crate) fn new(capacity: f64, refill_rate: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            capacity,
            refill_rate,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    /// Takes `n` tokens if available.
    ///
    /// Requests larger than the capacity can never succeed and are denied
    /// without a `retry_after`.
    pub(crate) fn try_consume(&mut self, n: f64, now: Instant) -> Decision {
        self.refill(now);

        if n > self.capacity {
            return Decision::denied(None, self.remaining());
        }

        if self.tokens >= n {
            self.tokens -= n;
            return Decision::allowed(self.remaining());
        }

        let retry_after = if self.refill_rate > 0.0 {
            Duration::try_from_secs_f64((n - self.tokens) / self.refill_rate).ok()
        } else {
            None
        };
        Decision::denied(retry_after, self.remaining())
    }

    /// Whole tokens currently available, after refilling up to `now`.
    pub(crate) fn remaining_at(&mut self, now: Instant) -> u64 {
        self.refill(now);
        self.remaining()
    }

    pub(crate) fn is_full_at(&mut self, now: Instant) -> bool {
        self.refill(now);
        self.tokens >= self.capacity
    }

    fn remaining(&self) -> u64 {
        self.tokens.max(0.0).floor() as u64
    }

    #[cfg(test)]
    pub(crate) fn tokens(&self) -> f64 {
        self.tokens
    }
}
