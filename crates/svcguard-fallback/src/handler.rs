use crate::{FallbackChain, FallbackContext, FallbackExhausted};
use std::collections::HashMap;
use svcguard_core::{CallContext, ResilienceError};

/// Owns the fallback chain of every service.
///
/// Chains are registered once at startup and never change afterwards.
pub struct FallbackHandler<T, E> {
    chains: HashMap<String, FallbackChain<T, E>>,
}

impl<T, E> Default for FallbackHandler<T, E> {
    fn default() -> Self {
        Self {
            chains: HashMap::new(),
        }
    }
}

impl<T, E> Clone for FallbackHandler<T, E> {
    fn clone(&self) -> Self {
        Self {
            chains: self.chains.clone(),
        }
    }
}

impl<T, E> std::fmt::Debug for FallbackHandler<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.chains.iter()).finish()
    }
}

impl<T, E> FallbackHandler<T, E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `chain` for `service`, replacing any previous chain.
    pub fn with_chain(mut self, service: impl Into<String>, chain: FallbackChain<T, E>) -> Self {
        self.register(service, chain);
        self
    }

    /// Registers `chain` for `service`, replacing any previous chain.
    pub fn register(&mut self, service: impl Into<String>, chain: FallbackChain<T, E>) {
        self.chains.insert(service.into(), chain);
    }

    pub fn chain(&self, service: &str) -> Option<&FallbackChain<T, E>> {
        self.chains.get(service)
    }

    pub fn has_chain(&self, service: &str) -> bool {
        self.chains.contains_key(service)
    }

    /// Feeds a successful primary result to the service's strategies.
    pub fn observe_success(&self, service: &str, call: &CallContext, value: &T) {
        if let Some(chain) = self.chains.get(service) {
            chain.observe_success(service, call, value);
        }
    }

    /// Tries the service's strategies in order for a call that failed with
    /// `error`.
    ///
    /// A service without a chain is exhausted immediately, with nothing
    /// tried.
    pub async fn handle(
        &self,
        service: &str,
        error: ResilienceError<E>,
        call: &CallContext,
    ) -> Result<T, FallbackExhausted<E>> {
        let Some(chain) = self.chains.get(service) else {
            return Err(FallbackExhausted {
                service: service.to_string(),
                original: error,
                tried: Vec::new(),
            });
        };

        let result = {
            let ctx = FallbackContext::new(service, &error, call);
            chain.execute(&ctx).await
        };

        result.map_err(|tried| FallbackExhausted {
            service: service.to_string(),
            original: error,
            tried,
        })
    }
}
