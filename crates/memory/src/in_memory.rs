//! In-memory checkpoint store — useful for testing and ephemeral sessions.

use agentloom_core::error::MemoryError;
use agentloom_core::store::KeyValueStore;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A bucketed key/value store held entirely in memory.
#[derive(Default)]
pub struct InMemoryStore {
    buckets: RwLock<HashMap<String, HashMap<String, Vec<u8>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys across all buckets.
    pub async fn len(&self) -> usize {
        self.buckets.read().await.values().map(HashMap::len).sum()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn set(
        &self,
        bucket: &str,
        key: &str,
        value: Vec<u8>,
    ) -> std::result::Result<(), MemoryError> {
        let mut buckets = self.buckets.write().await;
        buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn get(
        &self,
        bucket: &str,
        key: &str,
    ) -> std::result::Result<Option<Vec<u8>>, MemoryError> {
        let buckets = self.buckets.read().await;
        Ok(buckets.get(bucket).and_then(|b| b.get(key)).cloned())
    }
}
