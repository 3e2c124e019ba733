//! File-backed checkpoint store — a single JSON image on disk.
//!
//! The whole bucket map is loaded into memory on open and flushed back on
//! every `set`. This gives fast reads with durable writes, and the file
//! stays human-inspectable.

use agentloom_core::error::MemoryError;
use agentloom_core::store::KeyValueStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{debug, warn};

type Buckets = HashMap<String, HashMap<String, Vec<u8>>>;

/// A key/value store persisted as one JSON file.
pub struct FileStore {
    path: PathBuf,
    buckets: RwLock<Buckets>,
}

impl FileStore {
    /// Open a store at the given path.
    ///
    /// If the file exists its contents are loaded; a corrupted file is
    /// logged and treated as empty rather than failing the open.
    pub fn open(path: PathBuf) -> Self {
        let buckets = Self::load_from_disk(&path);
        debug!(path = %path.display(), buckets = buckets.len(), "File store opened");
        Self {
            path,
            buckets: RwLock::new(buckets),
        }
    }

    fn load_from_disk(path: &PathBuf) -> Buckets {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Buckets::new(), // not created yet
        };
        match serde_json::from_str(&content) {
            Ok(buckets) => buckets,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring corrupted store file");
                Buckets::new()
            }
        }
    }

    async fn flush(&self) -> std::result::Result<(), MemoryError> {
        let buckets = self.buckets.read().await;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MemoryError::Storage(format!("Failed to create store directory: {e}"))
            })?;
        }

        let content = serde_json::to_string(&*buckets)
            .map_err(|e| MemoryError::Storage(format!("Failed to serialize store: {e}")))?;

        std::fs::write(&self.path, content)
            .map_err(|e| MemoryError::Storage(format!("Failed to write store file: {e}")))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn set(
        &self,
        bucket: &str,
        key: &str,
        value: Vec<u8>,
    ) -> std::result::Result<(), MemoryError> {
        {
            let mut buckets = self.buckets.write().await;
            buckets
                .entry(bucket.to_string())
                .or_default()
                .insert(key.to_string(), value);
        }
        self.flush().await
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

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = FileStore::open(path.clone());
        store
            .set("agent-state", "abc", b"history".to_vec())
            .await
            .unwrap();
        drop(store);

        let reopened = FileStore::open(path);
        let value = reopened.get("agent-state", "abc").await.unwrap();
        assert_eq!(value.as_deref(), Some(b"history".as_ref()));
    }

    #[tokio::test]
    async fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("never-written.json"));
        assert!(store.get("b", "k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupted_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "not json at all").unwrap();

        let store = FileStore::open(path);
        assert!(store.get("b", "k").await.unwrap().is_none());
        // And the store is still writable afterwards
        store.set("b", "k", b"v".to_vec()).await.unwrap();
        assert_eq!(store.get("b", "k").await.unwrap().unwrap(), b"v");
    }

    #[tokio::test]
    async fn creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deep").join("store.json");

        let store = FileStore::open(path.clone());
        store.set("b", "k", b"v".to_vec()).await.unwrap();
        assert!(path.exists());
    }
}
