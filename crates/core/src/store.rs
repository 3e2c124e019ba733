//! Checkpoint persistence — a bucketed key/value contract.
//!
//! The agent loop writes one opaque serialized history blob per
//! (agent id or caller-supplied id). Backends range from an in-process
//! map to a durable file; the loop never cares which.

use crate::error::MemoryError;
use async_trait::async_trait;

/// A bucketed key/value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// The backend name (e.g., "in_memory", "file").
    fn name(&self) -> &str;

    /// Store bytes under (bucket, key), replacing any existing value.
    async fn set(
        &self,
        bucket: &str,
        key: &str,
        value: Vec<u8>,
    ) -> std::result::Result<(), MemoryError>;

    /// Fetch the bytes under (bucket, key), or None if absent.
    async fn get(
        &self,
        bucket: &str,
        key: &str,
    ) -> std::result::Result<Option<Vec<u8>>, MemoryError>;
}
