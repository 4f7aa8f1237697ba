use crate::Decision;
use std::collections::VecDeque;
use tokio::time::{Duration, Instant};

/// Sliding window counter: at most `limit` permits within any trailing
/// `window`, tracked in buckets of `bucket_width`.
///
/// A bucket stays live until `bucket_start + window`; its count is released
/// all at once when it expires.
#[derive(Debug, Clone)]
pub(crate) struct SlidingWindow {
    buckets: VecDeque<Bucket>,
    limit: u64,
    window: Duration,
    bucket_width: Duration,
    origin: Instant,
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    start: Instant,
    count: u64,
}

impl SlidingWindow {
    pub(crate) fn new(limit: u64, window: Duration, bucket_count: u32, now: Instant) -> Self {
        let bucket_width = (window / bucket_count.max(1)).max(Duration::from_millis(1));
        Self {
            buckets: VecDeque::new(),
            limit,
            window,
            bucket_width,
            origin: now,
        }
    }

    fn evict(&mut self, now: Instant) {
        while let Some(oldest) = self.buckets.front() {
            if oldest.start + self.window <= now {
                self.buckets.pop_front();
            } else {
                break;
            }
        }
    }

    fn used(&self) -> u64 {
        self.buckets.iter().map(|b| b.count).sum()
    }

    fn bucket_start(&self, now: Instant) -> Instant {
        let since = now.saturating_duration_since(self.origin);
        let width = self.bucket_width.as_nanos().max(1);
        let index = since.as_nanos() / width;
        let offset = u64::try_from(index * width).unwrap_or(u64::MAX);
        self.origin + Duration::from_nanos(offset)
    }

    pub(crate) fn try_consume(&mut self, n: u64, now: Instant) -> Decision {
        self.evict(now);
        let used = self.used();

        if n > self.limit {
            return Decision::denied(None, self.limit.saturating_sub(used));
        }

        if n <= self.limit.saturating_sub(used) {
            let start = self.bucket_start(now);
            match self.buckets.back_mut() {
                Some(current) if current.start == start => current.count += n,
                _ => self.buckets.push_back(Bucket { start, count: n }),
            }
            return Decision::allowed(self.limit - used - n);
        }

        let retry_after = self
            .buckets
            .front()
            .map(|oldest| (oldest.start + self.window).saturating_duration_since(now));
        Decision::denied(retry_after, self.limit.saturating_sub(used))
    }

    pub(crate) fn remaining_at(&mut self, now: Instant) -> u64 {
        self.evict(now);
        self.limit.saturating_sub(self.used())
    }

    pub(crate) fn is_empty_at(&mut self, now: Instant) -> bool {
        self.evict(now);
        self.buckets.is_empty()
    }
}
