//! Core infrastructure for svcguard.
//!
//! This crate provides the pieces shared by every svcguard pattern crate:
//! - Event system for observability
//! - The unified error taxonomy returned by the coordinator
//! - Error classification (retryable / counts as failure)
//! - The per-call context handed to limiters and fallback strategies

pub mod classify;
pub mod context;
pub mod error;
pub mod events;

pub use classify::{Classification, Classified, Classifier, Classify};
pub use context::CallContext;
pub use error::ResilienceError;
pub use events::{EventListener, EventListeners, FnListener, ResilienceEvent};

/// Boxed error used where strategies or probes report failures of any type.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
