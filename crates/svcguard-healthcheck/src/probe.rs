//! Health probe trait.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use svcguard_core::BoxError;

/// Checks whether a dependency is reachable.
///
/// `Ok(())` is a passed check; any error is a failed one. The monitor bounds
/// every check with the service's timeout, and a timeout also counts as a
/// failure.
///
/// Closures returning a future implement this trait:
///
/// ```rust
/// use svcguard_healthcheck::HealthProbe;
///
/// let probe = || async { Ok::<_, std::io::Error>(()) };
/// # fn assert_probe<P: HealthProbe>(_: &P) {}
/// # assert_probe(&probe);
/// ```
///
/// Or implement it directly:
///
/// ```rust
/// use futures::future::BoxFuture;
/// use futures::FutureExt;
/// use svcguard_core::BoxError;
/// use svcguard_healthcheck::HealthProbe;
///
/// struct PingProbe {
///     addr: String,
/// }
///
/// impl HealthProbe for PingProbe {
///     fn check(&self) -> BoxFuture<'_, Result<(), BoxError>> {
///         async move {
///             if self.addr.is_empty() {
///                 return Err("no address configured".into());
///             }
///             Ok(())
///         }
///         .boxed()
///     }
/// }
/// ```
pub trait HealthProbe: Send + Sync {
    /// Runs one check.
    fn check(&self) -> BoxFuture<'_, Result<(), BoxError>>;
}

impl<F, Fut, X> HealthProbe for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), X>> + Send + 'static,
    X: Into<BoxError>,
{
    fn check(&self) -> BoxFuture<'_, Result<(), BoxError>> {
        self().map(|r| r.map_err(Into::into)).boxed()
    }
}
