//! In-process collaborators.
//!
//! These back the test suites and any host that keeps everything in memory.
//! They follow the same contracts as the real collaborators: hiding a target
//! twice leaves a single marking, and unsubscribing an unknown id is a no-op.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::defs::{
    CollaboratorResult, ContentItem, ContentStream, HideTarget, KeyValueStore, NewItemsHandler,
    PostElement, PreferenceSource, SubscriptionId,
};

#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> CollaboratorResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> CollaboratorResult<()> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> CollaboratorResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// Preference holder whose soft blocklist can be edited while in use.
#[derive(Debug, Default)]
pub struct StaticPreferences {
    soft_blocklist: RwLock<String>,
}

impl StaticPreferences {
    pub fn new(soft_blocklist: impl Into<String>) -> Self {
        Self {
            soft_blocklist: RwLock::new(soft_blocklist.into()),
        }
    }

    pub fn set_soft_blocklist(&self, text: impl Into<String>) {
        *self.soft_blocklist.write() = text.into();
    }
}

#[async_trait]
impl PreferenceSource for StaticPreferences {
    async fn soft_blocklist(&self) -> CollaboratorResult<String> {
        Ok(self.soft_blocklist.read().clone())
    }
}

/// A post with a fixed descriptor that records which units were hidden.
#[derive(Debug)]
pub struct MemoryPost {
    item: ContentItem,
    hidden: Mutex<BTreeSet<HideTarget>>,
    hide_calls: AtomicUsize,
}

impl MemoryPost {
    pub fn new(item: ContentItem) -> Arc<Self> {
        Arc::new(Self {
            item,
            hidden: Mutex::new(BTreeSet::new()),
            hide_calls: AtomicUsize::new(0),
        })
    }

    pub fn hidden_targets(&self) -> BTreeSet<HideTarget> {
        self.hidden.lock().clone()
    }

    pub fn is_visible(&self) -> bool {
        self.hidden.lock().is_empty()
    }

    /// Number of times `hide` was called, including redundant calls.
    pub fn hide_calls(&self) -> usize {
        self.hide_calls.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.hidden.lock().clear();
    }
}

#[async_trait]
impl PostElement for MemoryPost {
    async fn descriptor(&self) -> CollaboratorResult<ContentItem> {
        Ok(self.item.clone())
    }

    fn is_hidden(&self, target: HideTarget) -> bool {
        self.hidden.lock().contains(&target)
    }

    fn hide(&self, target: HideTarget) {
        self.hide_calls.fetch_add(1, Ordering::SeqCst);
        self.hidden.lock().insert(target);
    }
}

/// Content stream driven by explicit [`MemoryContentStream::emit`] calls.
#[derive(Default)]
pub struct MemoryContentStream {
    handlers: Mutex<BTreeMap<SubscriptionId, Arc<dyn NewItemsHandler>>>,
    next_id: AtomicU64,
    observed: Mutex<Vec<Arc<MemoryPost>>>,
}

impl MemoryContentStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.lock().len()
    }

    /// Deliver a batch of posts to every registered handler, in
    /// registration order.
    pub async fn emit(&self, posts: &[Arc<MemoryPost>]) {
        self.observed.lock().extend(posts.iter().cloned());

        let elements: Vec<Arc<dyn PostElement>> = posts
            .iter()
            .map(|post| post.clone() as Arc<dyn PostElement>)
            .collect();
        let handlers: Vec<Arc<dyn NewItemsHandler>> =
            self.handlers.lock().values().cloned().collect();

        for handler in handlers {
            handler.on_new_items(&elements).await;
        }
    }
}

impl ContentStream for MemoryContentStream {
    fn subscribe(&self, handler: Arc<dyn NewItemsHandler>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.handlers.lock().insert(id, handler);
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.handlers.lock().remove(&id).is_some()
    }

    fn clear_hidden(&self) {
        for post in self.observed.lock().iter() {
            post.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingHandler(AtomicUsize);

    #[async_trait]
    impl NewItemsHandler for CountingHandler {
        async fn on_new_items(&self, elements: &[Arc<dyn PostElement>]) {
            self.0.fetch_add(elements.len(), Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn memory_store_replaces_and_removes() {
        let store = MemoryKeyValueStore::new();
        store.set("k", "one").await.unwrap();
        store.set("k", "two").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("two"));

        store.remove("k").await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn unsubscribed_handler_is_not_called() {
        let stream = MemoryContentStream::new();
        let handler = Arc::new(CountingHandler(AtomicUsize::new(0)));
        let id = stream.subscribe(handler.clone());

        stream.emit(&[MemoryPost::new(ContentItem::new("a"))]).await;
        assert!(stream.unsubscribe(id));
        assert!(!stream.unsubscribe(id));
        stream.emit(&[MemoryPost::new(ContentItem::new("b"))]).await;

        assert_eq!(handler.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clear_hidden_resets_observed_posts() {
        let stream = MemoryContentStream::new();
        let post = MemoryPost::new(ContentItem::new("a"));
        stream.observed.lock().push(post.clone());

        post.hide(HideTarget::Item);
        assert!(!post.is_visible());
        stream.clear_hidden();
        assert!(post.is_visible());
    }
}
