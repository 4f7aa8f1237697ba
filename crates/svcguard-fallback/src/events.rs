//! Events emitted while running a fallback chain.

use std::time::Instant;
use svcguard_core::ResilienceEvent;

/// Events emitted by a [`FallbackChain`](crate::FallbackChain).
#[derive(Debug, Clone)]
pub enum FallbackEvent {
    /// A strategy produced the value returned to the caller.
    Applied {
        /// Service whose call fell back.
        service: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Name of the winning strategy.
        strategy: String,
    },

    /// A strategy had nothing to offer, for example an empty cache.
    StrategySkipped {
        service: String,
        timestamp: Instant,
        strategy: String,
    },

    /// A strategy failed or panicked. The chain moves on to the next one.
    StrategyFailed {
        service: String,
        timestamp: Instant,
        strategy: String,
        /// Rendered failure.
        error: String,
    },

    /// No strategy produced a value.
    Exhausted {
        service: String,
        timestamp: Instant,
        /// Strategies consulted, in order.
        tried: Vec<String>,
    },
}

impl ResilienceEvent for FallbackEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Applied { .. } => "applied",
            Self::StrategySkipped { .. } => "strategy_skipped",
            Self::StrategyFailed { .. } => "strategy_failed",
            Self::Exhausted { .. } => "exhausted",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::Applied { timestamp, .. }
            | Self::StrategySkipped { timestamp, .. }
            | Self::StrategyFailed { timestamp, .. }
            | Self::Exhausted { timestamp, .. } => *timestamp,
        }
    }

    fn service(&self) -> &str {
        match self {
            Self::Applied { service, .. }
            | Self::StrategySkipped { service, .. }
            | Self::StrategyFailed { service, .. }
            | Self::Exhausted { service, .. } => service,
        }
    }
}
