//! Storage Abstractions
//!
//! Two namespaces back the offline library: a blob store for raw audio
//! payloads and a metadata store for JSON records. They are kept apart so
//! that clearing or listing one never touches the other.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use crate::error::Result;

/// Durable key-value store for raw audio bytes.
///
/// Keys are opaque track ids. Implementations do not enforce a library-level
/// quota; running out of host space surfaces as
/// [`BridgeError::StorageFull`](crate::error::BridgeError::StorageFull).
/// Writes to different keys are not atomic as a group.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::BlobStore;
///
/// async fn keep(store: &dyn BlobStore, id: &str, audio: Bytes) -> Result<()> {
///     store.put(id, audio).await?;
///     assert!(store.contains(id).await?);
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under `key`, replacing any previous value.
    async fn put(&self, key: &str, data: Bytes) -> Result<()>;

    /// Fetch bytes for `key`, `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Remove `key`. Removing an absent key succeeds.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Remove every blob.
    async fn clear(&self) -> Result<()>;

    /// Whether a blob exists for `key`.
    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}

/// Durable key-value store for JSON metadata records.
///
/// Values are whole documents; `set` overwrites. Read-modify-write sequences
/// across calls are not atomic, callers serialize them.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Fetch the document stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Store `value` under `key`, replacing any previous document.
    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Remove `key`. Removing an absent key succeeds.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Remove every document.
    async fn clear(&self) -> Result<()>;

    /// List all keys currently stored.
    async fn keys(&self) -> Result<Vec<String>>;
}
