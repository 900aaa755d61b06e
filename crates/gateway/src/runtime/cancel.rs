//! Per-operation cancellation tokens.
//!
//! Each running draft operation registers its `operationId` here so that
//! `POST /v1/drafts/:id/cancel` can reach it. Registration hands back an
//! [`OperationLease`] that unregisters the operation when dropped, which
//! happens when its event stream finishes or the client goes away.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Tracks the cancellation token of every running operation.
#[derive(Default)]
pub struct OperationRegistry {
    tokens: Mutex<HashMap<String, CancellationToken>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh token for `operation_id`.
    ///
    /// Returns `None` if an operation with that id is already running.
    pub fn register(self: &Arc<Self>, operation_id: &str) -> Option<OperationLease> {
        let mut tokens = self.tokens.lock();
        if tokens.contains_key(operation_id) {
            return None;
        }
        let token = CancellationToken::new();
        tokens.insert(operation_id.to_owned(), token.clone());
        Some(OperationLease {
            registry: self.clone(),
            operation_id: operation_id.to_owned(),
            token,
        })
    }

    /// Cancel a running operation. Returns true if one was found.
    pub fn cancel(&self, operation_id: &str) -> bool {
        match self.tokens.lock().get(operation_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel everything (used on shutdown).
    pub fn cancel_all(&self) -> usize {
        let tokens = self.tokens.lock();
        for token in tokens.values() {
            token.cancel();
        }
        tokens.len()
    }

    pub fn is_running(&self, operation_id: &str) -> bool {
        self.tokens.lock().contains_key(operation_id)
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.lock().is_empty()
    }

    fn remove(&self, operation_id: &str) {
        self.tokens.lock().remove(operation_id);
    }
}

/// Registration of one running operation; unregisters on drop.
pub struct OperationLease {
    registry: Arc<OperationRegistry>,
    operation_id: String,
    token: CancellationToken,
}

impl OperationLease {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }
}

impl Drop for OperationLease {
    fn drop(&mut self) {
        self.registry.remove(&self.operation_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_cancel() {
        let registry = Arc::new(OperationRegistry::new());
        let lease = registry.register("op-1").unwrap();
        assert!(registry.is_running("op-1"));
        assert!(!lease.token().is_cancelled());

        assert!(registry.cancel("op-1"));
        assert!(lease.token().is_cancelled());
    }

    #[test]
    fn duplicate_operation_is_refused() {
        let registry = Arc::new(OperationRegistry::new());
        let _first = registry.register("op").unwrap();
        assert!(registry.register("op").is_none());
    }

    #[test]
    fn dropping_the_lease_unregisters() {
        let registry = Arc::new(OperationRegistry::new());
        let lease = registry.register("op").unwrap();
        drop(lease);
        assert!(!registry.is_running("op"));
        assert!(!registry.cancel("op"));
        assert!(registry.register("op").is_some());
    }

    #[test]
    fn cancel_unknown_operation_returns_false() {
        let registry = OperationRegistry::new();
        assert!(!registry.cancel("ghost"));
    }

    #[test]
    fn cancel_all_reaches_every_operation() {
        let registry = Arc::new(OperationRegistry::new());
        let a = registry.register("a").unwrap();
        let b = registry.register("b").unwrap();
        assert_eq!(registry.cancel_all(), 2);
        assert!(a.token().is_cancelled() && b.token().is_cancelled());
        assert_eq!(registry.len(), 2);
    }
}
