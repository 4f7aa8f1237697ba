use crate::events::FallbackEvent;
use crate::strategy::{
    Alternate, Attempt, CachedValue, FallbackContext, FallbackStrategy, FnStrategy, StaticValue,
};
use futures::FutureExt;
#[cfg(feature = "metrics")]
use metrics::counter;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use svcguard_core::events::{EventListeners, FnListener};
use svcguard_core::{BoxError, CallContext};

/// An ordered, immutable list of fallback strategies.
///
/// Strategies are consulted in the order they were added; the first one to
/// produce a value wins. Skipped, failed and panicking strategies are passed
/// over. Cheap to clone.
pub struct FallbackChain<T, E> {
    strategies: Arc<[Arc<dyn FallbackStrategy<T, E>>]>,
    event_listeners: EventListeners<FallbackEvent>,
}

impl<T, E> Clone for FallbackChain<T, E> {
    fn clone(&self) -> Self {
        Self {
            strategies: Arc::clone(&self.strategies),
            event_listeners: self.event_listeners.clone(),
        }
    }
}

impl<T, E> std::fmt::Debug for FallbackChain<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackChain")
            .field("strategies", &self.names())
            .finish()
    }
}

impl<T, E> FallbackChain<T, E> {
    /// Creates a new chain builder.
    pub fn builder() -> FallbackChainBuilder<T, E> {
        FallbackChainBuilder::new()
    }

    /// Strategy names, in order.
    pub fn names(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Lets every strategy see a successful primary result.
    pub fn observe_success(&self, service: &str, call: &CallContext, value: &T) {
        for strategy in self.strategies.iter() {
            strategy.observe_success(service, call, value);
        }
    }

    /// Runs the chain. On exhaustion returns the names of the strategies
    /// that were tried.
    pub async fn execute(&self, ctx: &FallbackContext<'_, E>) -> Result<T, Vec<String>> {
        let mut tried = Vec::with_capacity(self.strategies.len());

        for strategy in self.strategies.iter() {
            let name = strategy.name().to_string();
            let attempt = AssertUnwindSafe(strategy.attempt(ctx))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Attempt::Failed("strategy panicked".into()));

            match attempt {
                Attempt::Produced(value) => {
                    #[cfg(feature = "tracing")]
                    tracing::info!(service = ctx.service, strategy = %name, "fallback applied");

                    #[cfg(feature = "metrics")]
                    counter!(
                        "fallback_calls_total",
                        "service" => ctx.service.to_string(),
                        "result" => "applied",
                        "strategy" => name.clone()
                    )
                    .increment(1);

                    self.event_listeners.emit(&FallbackEvent::Applied {
                        service: ctx.service.to_string(),
                        timestamp: Instant::now(),
                        strategy: name,
                    });
                    return Ok(value);
                }
                Attempt::Skipped => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(service = ctx.service, strategy = %name, "fallback strategy skipped");

                    self.event_listeners.emit(&FallbackEvent::StrategySkipped {
                        service: ctx.service.to_string(),
                        timestamp: Instant::now(),
                        strategy: name.clone(),
                    });
                }
                Attempt::Failed(error) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(service = ctx.service, strategy = %name, error = %error, "fallback strategy failed");

                    self.event_listeners.emit(&FallbackEvent::StrategyFailed {
                        service: ctx.service.to_string(),
                        timestamp: Instant::now(),
                        strategy: name.clone(),
                        error: error.to_string(),
                    });
                }
            }
            tried.push(name);
        }

        #[cfg(feature = "tracing")]
        tracing::warn!(service = ctx.service, tried = ?tried, "fallback chain exhausted");

        #[cfg(feature = "metrics")]
        counter!(
            "fallback_calls_total",
            "service" => ctx.service.to_string(),
            "result" => "exhausted"
        )
        .increment(1);

        self.event_listeners.emit(&FallbackEvent::Exhausted {
            service: ctx.service.to_string(),
            timestamp: Instant::now(),
            tried: tried.clone(),
        });
        Err(tried)
    }
}

/// Builder for [`FallbackChain`].
pub struct FallbackChainBuilder<T, E> {
    strategies: Vec<Arc<dyn FallbackStrategy<T, E>>>,
    event_listeners: EventListeners<FallbackEvent>,
}

impl<T, E> Default for FallbackChainBuilder<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> FallbackChainBuilder<T, E> {
    pub fn new() -> Self {
        crate::describe_metrics();
        Self {
            strategies: Vec::new(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Appends a strategy.
    pub fn strategy<S>(mut self, strategy: S) -> Self
    where
        S: FallbackStrategy<T, E> + 'static,
    {
        self.strategies.push(Arc::new(strategy));
        self
    }

    /// Appends an already shared strategy, for example a cache that is also
    /// inspected elsewhere.
    pub fn shared(mut self, strategy: Arc<dyn FallbackStrategy<T, E>>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Appends a [`StaticValue`].
    pub fn static_value(self, value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        self.strategy(StaticValue::new(value))
    }

    /// Appends a [`CachedValue`] with the given TTL.
    pub fn cached(self, ttl: Duration) -> Self
    where
        T: Clone + Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        self.strategy(CachedValue::new(ttl))
    }

    /// Appends an [`Alternate`].
    pub fn alternate<F, Fut, X>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, X>> + Send + 'static,
        X: Into<BoxError>,
        T: Send + 'static,
        E: Send + Sync + 'static,
    {
        self.strategy(Alternate::new(name, f))
    }

    /// Appends an [`FnStrategy`].
    pub fn compute<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&FallbackContext<'_, E>) -> Option<T> + Send + Sync + 'static,
        T: Send + 'static,
        E: Send + Sync + 'static,
    {
        self.strategy(FnStrategy::new(name, f))
    }

    /// Callback when a strategy produces the value. Receives the strategy name.
    pub fn on_applied<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let FallbackEvent::Applied { strategy, .. } = event {
                f(strategy);
            }
        }));
        self
    }

    /// Callback when a strategy is skipped.
    pub fn on_strategy_skipped<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let FallbackEvent::StrategySkipped { strategy, .. } = event {
                f(strategy);
            }
        }));
        self
    }

    /// Callback when a strategy fails. Receives the strategy name and the
    /// rendered error.
    pub fn on_strategy_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let FallbackEvent::StrategyFailed {
                strategy, error, ..
            } = event
            {
                f(strategy, error);
            }
        }));
        self
    }

    /// Callback when the whole chain is exhausted.
    pub fn on_exhausted<F>(mut self, f: F) -> Self
    where
        F: Fn(&[String]) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let FallbackEvent::Exhausted { tried, .. } = event {
                f(tried);
            }
        }));
        self
    }

    pub fn build(self) -> FallbackChain<T, E> {
        FallbackChain {
            strategies: self.strategies.into(),
            event_listeners: self.event_listeners,
        }
    }
}
