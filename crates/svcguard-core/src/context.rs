//! Per-call context passed from the caller down to rate limiting and
//! fallback strategies.

use std::collections::HashMap;

/// Caller-supplied details about one protected call.
///
/// - `identity` selects a per-caller rate limiter instead of the service's
///   shared one.
/// - `cache_key` identifies the request for cached fallback values.
/// - `attributes` are free-form and only read by custom strategies.
///
/// ```rust
/// use svcguard_core::CallContext;
///
/// let ctx = CallContext::new()
///     .identity("tenant-42")
///     .cache_key("summarize:doc-7")
///     .attribute("model", "small");
///
/// assert_eq!(ctx.identity_str(), Some("tenant-42"));
/// assert_eq!(ctx.attribute_value("model"), Some("small"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallContext {
    identity: Option<String>,
    cache_key: Option<String>,
    attributes: HashMap<String, String>,
}

impl CallContext {
    /// An empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rate-limit identity.
    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Sets the fallback cache key.
    pub fn cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    /// Adds a free-form attribute.
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn identity_str(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn cache_key_str(&self) -> Option<&str> {
        self.cache_key.as_deref()
    }

    pub fn attribute_value(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }
}
