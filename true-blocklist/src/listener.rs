use crate::types::{ContentStream, NewItemsHandler, SubscriptionId};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Owns at most one registration of `handler` with a content stream.
///
/// Subscribing while already subscribed replaces the old registration, so a
/// handler is never invoked twice for the same post.
pub struct Subscription {
    stream: Arc<dyn ContentStream>,
    handler: Arc<dyn NewItemsHandler>,
    active: Mutex<Option<SubscriptionId>>,
}

impl Subscription {
    pub fn new(stream: Arc<dyn ContentStream>, handler: Arc<dyn NewItemsHandler>) -> Self {
        Self {
            stream,
            handler,
            active: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> SubscriptionId {
        let mut active = self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = active.take() {
            self.stream.unsubscribe(previous);
        }
        let id = self.stream.subscribe(self.handler.clone());
        debug!("Subscribed post filter as {:?}", id);
        *active = Some(id);
        id
    }

    /// Returns whether a registration was removed.
    pub fn unsubscribe(&self) -> bool {
        let mut active = self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match active.take() {
            Some(id) => {
                debug!("Unsubscribed post filter {:?}", id);
                self.stream.unsubscribe(id)
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
