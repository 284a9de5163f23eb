use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),
}

pub type CollaboratorResult<T> = std::result::Result<T, CollaboratorError>;

/// One entry of a post's reblog trail, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrailEntry {
    pub attribution: String,
}

/// What the content stream knows about a post once it has been resolved.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContentItem {
    pub primary_attribution: String,
    pub reblogged_from: Option<String>,
    pub trail: Vec<TrailEntry>,
}

impl ContentItem {
    pub fn new(primary_attribution: impl Into<String>) -> Self {
        Self {
            primary_attribution: primary_attribution.into(),
            reblogged_from: None,
            trail: Vec::new(),
        }
    }

    pub fn reblogged_from(mut self, name: impl Into<String>) -> Self {
        self.reblogged_from = Some(name.into());
        self
    }

    pub fn with_trail<I, S>(mut self, attributions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trail = attributions
            .into_iter()
            .map(|attribution| TrailEntry { attribution: attribution.into() })
            .collect();
        self
    }
}

/// A unit of a rendered post that can be hidden on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HideTarget {
    Item,
    TrailEntry(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

// Capability traits.
//
// Everything the blocklist needs from its host is expressed here so that the
// core crate never depends on a particular runtime. Implementations must be
// cheap to share behind an `Arc`.

/// Durable key-value storage. `set` replaces the whole value under `key`.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> CollaboratorResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> CollaboratorResult<()>;
    async fn remove(&self, key: &str) -> CollaboratorResult<()>;
}

/// Read access to the user's free-text preferences.
#[async_trait]
pub trait PreferenceSource: Send + Sync {
    /// Raw comma-separated soft blocklist as typed by the user.
    async fn soft_blocklist(&self) -> CollaboratorResult<String>;
}

/// A rendered post. The descriptor is resolved lazily; visibility is
/// controlled per [`HideTarget`].
#[async_trait]
pub trait PostElement: Send + Sync {
    async fn descriptor(&self) -> CollaboratorResult<ContentItem>;
    fn is_hidden(&self, target: HideTarget) -> bool;
    fn hide(&self, target: HideTarget);
}

/// Callback invoked with every batch of newly observed posts.
#[async_trait]
pub trait NewItemsHandler: Send + Sync {
    async fn on_new_items(&self, elements: &[Arc<dyn PostElement>]);
}

/// Source of newly observed posts.
pub trait ContentStream: Send + Sync {
    fn subscribe(&self, handler: Arc<dyn NewItemsHandler>) -> SubscriptionId;
    /// Returns whether `id` was registered.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
    /// Drop every hide marking applied so far.
    fn clear_hidden(&self);
}
