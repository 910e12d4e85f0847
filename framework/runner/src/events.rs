//! Explicit subscription to the host engine's lifecycle events.
//!
//! The host engine owns a [LifecycleEvents] registry and emits test-start and test-stop through it.
//! Components that need to react to those events subscribe under a unique name.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

/// Receives the host engine's lifecycle events.
///
/// Implementations handle their own errors. Nothing returned from a listener can disrupt the load
/// test.
#[async_trait]
pub trait LifecycleListener: Send + Sync + 'static {
    async fn on_test_start(&self);

    async fn on_test_stop(&self);
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EventsError {
    #[error("A lifecycle listener named [{0}] is already subscribed")]
    DuplicateListener(String),
}

type NamedListener = (String, Arc<dyn LifecycleListener>);

#[derive(Default)]
pub struct LifecycleEvents {
    listeners: RwLock<Vec<NamedListener>>,
}

impl LifecycleEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a listener to both events. Listeners are notified in subscription order.
    pub fn subscribe(
        &self,
        name: &str,
        listener: Arc<dyn LifecycleListener>,
    ) -> Result<(), EventsError> {
        let mut listeners = self.listeners.write();
        if listeners.iter().any(|(n, _)| n == name) {
            return Err(EventsError::DuplicateListener(name.to_string()));
        }

        log::debug!("Subscribed lifecycle listener [{name}]");
        listeners.push((name.to_string(), listener));
        Ok(())
    }

    /// Returns `true` if a listener was subscribed under this name.
    pub fn unsubscribe(&self, name: &str) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(n, _)| n != name);
        before != listeners.len()
    }

    pub fn subscribers(&self) -> Vec<String> {
        self.listeners.read().iter().map(|(n, _)| n.clone()).collect()
    }

    pub async fn emit_test_start(&self) {
        for (name, listener) in self.snapshot() {
            log::trace!("Delivering test-start to [{name}]");
            listener.on_test_start().await;
        }
    }

    pub async fn emit_test_stop(&self) {
        for (name, listener) in self.snapshot() {
            log::trace!("Delivering test-stop to [{name}]");
            listener.on_test_stop().await;
        }
    }

    // Listeners are awaited without holding the lock so that they may subscribe or unsubscribe.
    fn snapshot(&self) -> Vec<NamedListener> {
        self.listeners.read().clone()
    }
}

impl std::fmt::Debug for LifecycleEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleEvents")
            .field("subscribers", &self.subscribers())
            .finish()
    }
}
