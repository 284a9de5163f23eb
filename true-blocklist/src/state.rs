use crate::types::{AggregateBlockList, KeyValueStore, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Key holding the serialized aggregate.
pub const OFFICIAL_BLOCKLIST_STORAGE_KEY: &str = "true_blocklist.official_blocklist";

/// Persisted aggregate block list. Every write replaces the previous value
/// wholesale; there is no merge.
#[derive(Clone)]
pub struct AggregateStore {
    kv: Arc<dyn KeyValueStore>,
}

impl AggregateStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// The last committed aggregate, or an empty one if nothing was ever
    /// committed.
    pub async fn get(&self) -> Result<AggregateBlockList> {
        match self.kv.get(OFFICIAL_BLOCKLIST_STORAGE_KEY).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(AggregateBlockList::new()),
        }
    }

    /// Like [`AggregateStore::get`], but a read or decode failure yields an
    /// empty list so filtering keeps going.
    pub async fn get_or_empty(&self) -> AggregateBlockList {
        match self.get().await {
            Ok(list) => list,
            Err(e) => {
                warn!("Failed to read stored blocklist, treating it as empty: {}", e);
                AggregateBlockList::new()
            }
        }
    }

    pub async fn set(&self, list: &AggregateBlockList) -> Result<()> {
        let raw = serde_json::to_string(list)?;
        self.kv.set(OFFICIAL_BLOCKLIST_STORAGE_KEY, &raw).await?;
        info!("Stored blocklist with {} entries", list.len());
        Ok(())
    }

    pub async fn remove(&self) -> Result<()> {
        self.kv.remove(OFFICIAL_BLOCKLIST_STORAGE_KEY).await?;
        debug!("Removed stored blocklist");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interfaces::MemoryKeyValueStore;

    #[tokio::test]
    async fn missing_list_reads_as_empty() {
        let store = AggregateStore::new(Arc::new(MemoryKeyValueStore::new()));
        assert!(store.get().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_replaces_previous_list() {
        let store = AggregateStore::new(Arc::new(MemoryKeyValueStore::new()));

        store.set(&["a", "b"].into_iter().collect()).await.unwrap();
        store.set(&["c"].into_iter().collect()).await.unwrap();

        let expected: AggregateBlockList = ["c"].into_iter().collect();
        assert_eq!(store.get().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn stored_as_sorted_json_array() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let store = AggregateStore::new(kv.clone());

        store.set(&["zed", "amy"].into_iter().collect()).await.unwrap();

        let raw = kv.get(OFFICIAL_BLOCKLIST_STORAGE_KEY).await.unwrap();
        assert_eq!(raw.as_deref(), Some(r#"["amy","zed"]"#));
    }

    #[tokio::test]
    async fn corrupt_value_degrades_to_empty() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        kv.set(OFFICIAL_BLOCKLIST_STORAGE_KEY, "not json").await.unwrap();
        let store = AggregateStore::new(kv);

        assert!(store.get().await.is_err());
        assert!(store.get_or_empty().await.is_empty());
    }

    #[tokio::test]
    async fn remove_clears_list() {
        let store = AggregateStore::new(Arc::new(MemoryKeyValueStore::new()));
        store.set(&["a"].into_iter().collect()).await.unwrap();

        store.remove().await.unwrap();
        assert!(store.get().await.unwrap().is_empty());
    }
}
