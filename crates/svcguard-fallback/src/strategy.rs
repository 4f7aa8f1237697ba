//! Fallback strategies.

use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use svcguard_core::{BoxError, CallContext, ResilienceError};
use tokio::time::Instant;

/// What a strategy sees when asked for a value.
#[derive(Debug)]
pub struct FallbackContext<'a, E> {
    /// Service whose call failed.
    pub service: &'a str,
    /// The final error of the primary path.
    pub error: &'a ResilienceError<E>,
    /// Caller-supplied context for the call.
    pub call: &'a CallContext,
}

impl<'a, E> FallbackContext<'a, E> {
    pub fn new(service: &'a str, error: &'a ResilienceError<E>, call: &'a CallContext) -> Self {
        Self {
            service,
            error,
            call,
        }
    }

    /// The caller's fallback cache key, if any.
    pub fn cache_key(&self) -> Option<&'a str> {
        self.call.cache_key_str()
    }
}

/// The outcome of asking one strategy for a value.
#[derive(Debug)]
pub enum Attempt<T> {
    /// The strategy produced a value; the chain stops here.
    Produced(T),
    /// The strategy does not apply to this call.
    Skipped,
    /// The strategy tried and failed. Treated like [`Attempt::Skipped`].
    Failed(BoxError),
}

/// One way of producing a value when the primary path failed.
pub trait FallbackStrategy<T, E>: Send + Sync {
    /// Name reported in events and in [`FallbackExhausted::tried`](crate::FallbackExhausted).
    fn name(&self) -> &str;

    /// Tries to produce a value for the failed call.
    fn attempt<'a>(&'a self, ctx: &'a FallbackContext<'a, E>) -> BoxFuture<'a, Attempt<T>>;

    /// Called with every successful primary result. Strategies that remember
    /// good values hook in here.
    fn observe_success(&self, _service: &str, _call: &CallContext, _value: &T) {}
}

/// Always returns a clone of a constant value.
#[derive(Debug, Clone)]
pub struct StaticValue<T> {
    value: T,
}

impl<T> StaticValue<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T, E> FallbackStrategy<T, E> for StaticValue<T>
where
    T: Clone + Send + Sync,
    E: Send + Sync,
{
    fn name(&self) -> &str {
        "static_value"
    }

    fn attempt<'a>(&'a self, _ctx: &'a FallbackContext<'a, E>) -> BoxFuture<'a, Attempt<T>> {
        futures::future::ready(Attempt::Produced(self.value.clone())).boxed()
    }
}

/// Returns the last successful value seen for the same service and cache
/// key, as long as it is younger than the TTL.
///
/// Calls without a cache key share one slot per service.
pub struct CachedValue<T> {
    ttl: Duration,
    entries: DashMap<(String, String), (T, Instant)>,
}

impl<T> CachedValue<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    fn key(service: &str, call: &CallContext) -> (String, String) {
        (
            service.to_string(),
            call.cache_key_str().unwrap_or_default().to_string(),
        )
    }

    /// Number of cached entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> std::fmt::Debug for CachedValue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedValue")
            .field("ttl", &self.ttl)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl<T, E> FallbackStrategy<T, E> for CachedValue<T>
where
    T: Clone + Send + Sync,
    E: Send + Sync,
{
    fn name(&self) -> &str {
        "cached_value"
    }

    fn attempt<'a>(&'a self, ctx: &'a FallbackContext<'a, E>) -> BoxFuture<'a, Attempt<T>> {
        let key = Self::key(ctx.service, ctx.call);
        let now = Instant::now();

        let hit = match self.entries.get(&key) {
            Some(entry) if now.saturating_duration_since(entry.1) < self.ttl => {
                Some(entry.0.clone())
            }
            Some(_) => None,
            None => return futures::future::ready(Attempt::Skipped).boxed(),
        };

        let attempt = match hit {
            Some(value) => Attempt::Produced(value),
            None => {
                self.entries.remove_if(&key, |_, (_, stored)| {
                    now.saturating_duration_since(*stored) >= self.ttl
                });
                Attempt::Skipped
            }
        };
        futures::future::ready(attempt).boxed()
    }

    fn observe_success(&self, service: &str, call: &CallContext, value: &T) {
        self.entries
            .insert(Self::key(service, call), (value.clone(), Instant::now()));
    }
}

type AlternateFn<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, BoxError>> + Send + Sync>;

/// Delegates to an alternate implementation, such as a smaller model or a
/// replica.
pub struct Alternate<T> {
    name: String,
    call: AlternateFn<T>,
}

impl<T> Alternate<T> {
    /// Creates a strategy that runs `f` and uses its result. An error from
    /// `f` fails the strategy.
    pub fn new<F, Fut, X>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, X>> + Send + 'static,
        X: Into<BoxError>,
    {
        Self {
            name: name.into(),
            call: Arc::new(move || f().map(|r| r.map_err(Into::into)).boxed()),
        }
    }
}

impl<T> std::fmt::Debug for Alternate<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Alternate").field("name", &self.name).finish()
    }
}

impl<T, E> FallbackStrategy<T, E> for Alternate<T>
where
    T: Send + 'static,
    E: Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn attempt<'a>(&'a self, _ctx: &'a FallbackContext<'a, E>) -> BoxFuture<'a, Attempt<T>> {
        let fut = (self.call)();
        async move {
            match fut.await {
                Ok(value) => Attempt::Produced(value),
                Err(e) => Attempt::Failed(e),
            }
        }
        .boxed()
    }
}

type ComputeFn<T, E> =
    Box<dyn Fn(&FallbackContext<'_, E>) -> Result<Option<T>, BoxError> + Send + Sync>;

/// Computes a value synchronously from the failure context.
pub struct FnStrategy<T, E> {
    name: String,
    compute: ComputeFn<T, E>,
}

impl<T, E> FnStrategy<T, E> {
    /// `f` returning `None` skips the strategy.
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&FallbackContext<'_, E>) -> Option<T> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            compute: Box::new(move |ctx| Ok(f(ctx))),
        }
    }

    /// Like [`new`](Self::new), but `f` may also fail.
    pub fn fallible<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&FallbackContext<'_, E>) -> Result<Option<T>, BoxError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            compute: Box::new(f),
        }
    }
}

impl<T, E> std::fmt::Debug for FnStrategy<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStrategy").field("name", &self.name).finish()
    }
}

impl<T, E> FallbackStrategy<T, E> for FnStrategy<T, E>
where
    T: Send,
    E: Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn attempt<'a>(&'a self, ctx: &'a FallbackContext<'a, E>) -> BoxFuture<'a, Attempt<T>> {
        let attempt = match (self.compute)(ctx) {
            Ok(Some(value)) => Attempt::Produced(value),
            Ok(None) => Attempt::Skipped,
            Err(e) => Attempt::Failed(e),
        };
        futures::future::ready(attempt).boxed()
    }
}
