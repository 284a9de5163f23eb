use crate::soft_blocklist::SoftBlocklistCache;
use crate::state::AggregateStore;
use crate::types::{
    AggregateBlockList, ContentItem, FilterDecision, NewItemsHandler, PostElement, PreferenceSource,
};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Stored aggregate unioned with the soft list, as seen by one evaluation.
#[derive(Debug, Clone, Default)]
pub struct EffectiveBlocklist {
    aggregate: AggregateBlockList,
    soft: Arc<Vec<String>>,
}

impl EffectiveBlocklist {
    pub fn new(aggregate: AggregateBlockList, soft: Arc<Vec<String>>) -> Self {
        Self { aggregate, soft }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.aggregate.contains(name) || self.soft.iter().any(|soft| soft == name)
    }

    pub fn is_empty(&self) -> bool {
        self.aggregate.is_empty() && self.soft.is_empty()
    }
}

/// Decide what to hide for one post.
///
/// The post disappears entirely when its author or the blog it was reblogged
/// from is blocked. Otherwise only the trail entries credited to blocked
/// blogs are hidden.
pub fn classify(item: &ContentItem, blocklist: &EffectiveBlocklist) -> FilterDecision {
    if blocklist.contains(&item.primary_attribution)
        || item
            .reblogged_from
            .as_deref()
            .is_some_and(|name| blocklist.contains(name))
    {
        return FilterDecision::FullHide;
    }

    let indices: BTreeSet<usize> = item
        .trail
        .iter()
        .enumerate()
        .filter(|(_, entry)| blocklist.contains(&entry.attribution))
        .map(|(index, _)| index)
        .collect();

    if indices.is_empty() {
        FilterDecision::Visible
    } else {
        FilterDecision::PartialHide(indices)
    }
}

/// Hide what `decision` names on `element`. Targets that are already hidden
/// are left alone; returns how many new markings were made.
pub fn apply_decision(element: &dyn PostElement, decision: &FilterDecision) -> usize {
    let mut marked = 0;
    for target in decision.targets() {
        if !element.is_hidden(target) {
            element.hide(target);
            marked += 1;
        }
    }
    marked
}

/// Handler registered with the content stream. Rebuilds the effective
/// blocklist for every post so preference edits apply immediately.
pub struct PostFilter {
    store: AggregateStore,
    preferences: Arc<dyn PreferenceSource>,
    soft_cache: SoftBlocklistCache,
}

impl PostFilter {
    pub fn new(store: AggregateStore, preferences: Arc<dyn PreferenceSource>) -> Self {
        Self {
            store,
            preferences,
            soft_cache: SoftBlocklistCache::new(),
        }
    }

    pub async fn effective_blocklist(&self) -> EffectiveBlocklist {
        let aggregate = self.store.get_or_empty().await;
        let soft = match self.preferences.soft_blocklist().await {
            Ok(text) => self.soft_cache.get(&text),
            Err(e) => {
                warn!("Failed to read soft blocklist preference: {}", e);
                Arc::new(Vec::new())
            }
        };
        EffectiveBlocklist::new(aggregate, soft)
    }

    /// Classify and mark one post. Failures stay local to the post.
    pub async fn process(&self, element: &dyn PostElement) -> Option<FilterDecision> {
        let item = match element.descriptor().await {
            Ok(item) => item,
            Err(e) => {
                warn!("Skipping post without a descriptor: {}", e);
                return None;
            }
        };

        let blocklist = self.effective_blocklist().await;
        let decision = classify(&item, &blocklist);
        let marked = apply_decision(element, &decision);

        if marked > 0 {
            debug!(
                "Hid {} unit(s) of post by {}: {:?}",
                marked, item.primary_attribution, decision
            );
        }
        Some(decision)
    }
}

#[async_trait]
impl NewItemsHandler for PostFilter {
    async fn on_new_items(&self, elements: &[Arc<dyn PostElement>]) {
        let evaluations = elements.iter().map(|element| self.process(element.as_ref()));
        futures::future::join_all(evaluations).await;
    }
}
