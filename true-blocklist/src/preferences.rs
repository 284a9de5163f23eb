//! Soft blocklist preference kept next to the aggregate in the key-value
//! store, for hosts that have no preference UI of their own.

use crate::types::{KeyValueStore, PreferenceSource, Result};
use async_trait::async_trait;
use interfaces::defs::CollaboratorResult;
use std::sync::Arc;

pub const SOFT_BLOCKLIST_STORAGE_KEY: &str = "true_blocklist.preferences.soft_blocklist";

#[derive(Clone)]
pub struct StoredPreferences {
    kv: Arc<dyn KeyValueStore>,
}

impl StoredPreferences {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub async fn set_soft_blocklist(&self, text: &str) -> Result<()> {
        self.kv.set(SOFT_BLOCKLIST_STORAGE_KEY, text).await?;
        Ok(())
    }
}

#[async_trait]
impl PreferenceSource for StoredPreferences {
    async fn soft_blocklist(&self) -> CollaboratorResult<String> {
        Ok(self
            .kv
            .get(SOFT_BLOCKLIST_STORAGE_KEY)
            .await?
            .unwrap_or_default())
    }
}
