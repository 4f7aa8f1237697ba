mod cancellation;
mod composition;
mod concurrency;
mod fallback;
mod health;
mod layer;

/// Routes svcguard's debug logs to the test output.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Errors produced by the fake upstreams in these tests.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum UpstreamError {
    Overloaded,
    BadRequest,
}

impl std::fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamError::Overloaded => write!(f, "upstream overloaded"),
            UpstreamError::BadRequest => write!(f, "bad request"),
        }
    }
}

impl std::error::Error for UpstreamError {}

impl svcguard::Classify for UpstreamError {
    fn classification(&self) -> svcguard::Classification {
        match self {
            UpstreamError::Overloaded => svcguard::Classification::transient(),
            UpstreamError::BadRequest => svcguard::Classification::permanent(),
        }
    }
}
