//! Append-only middleware list with snapshot reads.
use std::sync::{Arc, PoisonError, RwLock};

use crate::core::handler::Middleware;

/// An immutable middleware sequence as seen by one dispatch.
pub type Chain = Arc<[Arc<dyn Middleware>]>;

/// Ordered, thread-safe middleware registration.
///
/// Appends copy the current sequence under the write lock, so a [`Chain`] handed out by
/// [`MiddlewareChain::snapshot`] never changes underneath a request already in flight.
pub struct MiddlewareChain {
    handlers: RwLock<Chain>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new().into()),
        }
    }

    pub fn append(&self, middleware: Arc<dyn Middleware>) {
        // The guarded value is only ever swapped whole, so a poisoned lock still holds a
        // consistent chain.
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut extended = Vec::with_capacity(handlers.len() + 1);
        extended.extend(handlers.iter().cloned());
        extended.push(middleware);
        *handlers = extended.into();
    }

    pub fn snapshot(&self) -> Chain {
        Arc::clone(&self.handlers.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MiddlewareChain {
    fn default() -> Self {
        Self::new()
    }
}
