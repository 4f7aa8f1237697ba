//! Tower integration.

use crate::ResilienceCoordinator;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use svcguard_core::ResilienceError;
use tower::{Layer, Service, ServiceExt};

/// A Tower [`Layer`] that routes every request through
/// [`ResilienceCoordinator::call`] under one service name.
///
/// Each attempt clones the inner service and drives it with
/// [`ServiceExt::oneshot`], so the inner service's readiness is awaited per
/// attempt. Requests must be `Clone` to be retried.
///
/// ```
/// use svcguard::{GuardLayer, ResilienceCoordinator};
/// use tower::{ServiceBuilder, ServiceExt};
///
/// # #[derive(Debug)]
/// # struct MyError;
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let coordinator = ResilienceCoordinator::<String, MyError>::builder().build();
///
/// let service = ServiceBuilder::new()
///     .layer(GuardLayer::new(coordinator, "echo"))
///     .service(tower::service_fn(|req: String| async move { Ok::<_, MyError>(req) }));
///
/// let response = service.oneshot("hello".to_string()).await.unwrap();
/// assert_eq!(response, "hello");
/// # }
/// ```
pub struct GuardLayer<T, E> {
    coordinator: ResilienceCoordinator<T, E>,
    service: Arc<str>,
}

impl<T, E> GuardLayer<T, E> {
    pub fn new(coordinator: ResilienceCoordinator<T, E>, service: impl Into<String>) -> Self {
        Self {
            coordinator,
            service: Arc::from(service.into()),
        }
    }
}

impl<T, E> Clone for GuardLayer<T, E> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
            service: Arc::clone(&self.service),
        }
    }
}

impl<S, T, E> Layer<S> for GuardLayer<T, E> {
    type Service = GuardService<S, T, E>;

    fn layer(&self, inner: S) -> Self::Service {
        GuardService {
            inner,
            coordinator: self.coordinator.clone(),
            service: Arc::clone(&self.service),
        }
    }
}

/// The service produced by [`GuardLayer`].
pub struct GuardService<S, T, E> {
    inner: S,
    coordinator: ResilienceCoordinator<T, E>,
    service: Arc<str>,
}

impl<S: Clone, T, E> Clone for GuardService<S, T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            coordinator: self.coordinator.clone(),
            service: Arc::clone(&self.service),
        }
    }
}

impl<S, Req, T, E> Service<Req> for GuardService<S, T, E>
where
    S: Service<Req, Response = T, Error = E> + Clone + Send + 'static,
    S::Future: Send + 'static,
    Req: Clone + Send + 'static,
    T: Send + 'static,
    E: Send + Sync + 'static,
{
    type Response = T;
    type Error = ResilienceError<E>;
    type Future = BoxFuture<'static, Result<T, ResilienceError<E>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let coordinator = self.coordinator.clone();
        let service = Arc::clone(&self.service);
        let inner = self.inner.clone();

        Box::pin(async move {
            coordinator
                .call(&service, move || inner.clone().oneshot(req.clone()))
                .await
        })
    }
}
