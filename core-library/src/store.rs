//! Typed persistence for the library index and per-item records
//!
//! Layout inside the metadata namespace:
//!
//! | key | value |
//! |---|---|
//! | `library_cache` | [`LibraryIndex`] snapshot |
//! | `<track id>` | [`TrackRecord`] |
//! | `album:<id>` | [`AlbumRecord`] |
//! | `playlist:<id>` | [`PlaylistRecord`] |

use std::sync::Arc;

use bridge_traits::storage::MetadataStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{AlbumRecord, LibraryIndex, PlaylistRecord, TrackRecord};

/// Key of the persisted index snapshot
pub const LIBRARY_INDEX_KEY: &str = "library_cache";

const ALBUM_PREFIX: &str = "album:";
const PLAYLIST_PREFIX: &str = "playlist:";

/// Metadata key of a track record. Tracks use the bare id.
pub fn track_key(track_id: &str) -> String {
    track_id.to_string()
}

pub fn album_key(album_id: &str) -> String {
    format!("{}{}", ALBUM_PREFIX, album_id)
}

pub fn playlist_key(playlist_id: &str) -> String {
    format!("{}{}", PLAYLIST_PREFIX, playlist_id)
}

/// Typed view over a [`MetadataStore`].
///
/// Index read-modify-write is not atomic here; the owner of the store
/// serializes mutations.
#[derive(Clone)]
pub struct LibraryStore {
    metadata: Arc<dyn MetadataStore>,
}

impl LibraryStore {
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata }
    }

    /// Load the index snapshot.
    ///
    /// # Returns
    /// - The persisted index, or an empty index when none was saved
    ///
    /// # Errors
    /// Returns `Serialization` if the stored snapshot is corrupt.
    pub async fn load_index(&self) -> Result<LibraryIndex> {
        match self.metadata.get(LIBRARY_INDEX_KEY).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => {
                debug!("No library index persisted, starting empty");
                Ok(LibraryIndex::empty())
            }
        }
    }

    /// Overwrite the index snapshot.
    pub async fn save_index(&self, index: &LibraryIndex) -> Result<()> {
        self.put(LIBRARY_INDEX_KEY, index).await
    }

    pub async fn get_track(&self, track_id: &str) -> Result<Option<TrackRecord>> {
        self.get(&track_key(track_id)).await
    }

    pub async fn put_track(&self, record: &TrackRecord) -> Result<()> {
        self.put(&track_key(&record.id), record).await
    }

    pub async fn remove_track(&self, track_id: &str) -> Result<()> {
        Ok(self.metadata.remove(&track_key(track_id)).await?)
    }

    pub async fn get_album(&self, album_id: &str) -> Result<Option<AlbumRecord>> {
        self.get(&album_key(album_id)).await
    }

    pub async fn put_album(&self, record: &AlbumRecord) -> Result<()> {
        self.put(&album_key(&record.id), record).await
    }

    pub async fn remove_album(&self, album_id: &str) -> Result<()> {
        Ok(self.metadata.remove(&album_key(album_id)).await?)
    }

    pub async fn get_playlist(&self, playlist_id: &str) -> Result<Option<PlaylistRecord>> {
        self.get(&playlist_key(playlist_id)).await
    }

    pub async fn put_playlist(&self, record: &PlaylistRecord) -> Result<()> {
        self.put(&playlist_key(&record.id), record).await
    }

    pub async fn remove_playlist(&self, playlist_id: &str) -> Result<()> {
        Ok(self.metadata.remove(&playlist_key(playlist_id)).await?)
    }

    /// Remove every metadata document, index included.
    pub async fn clear(&self) -> Result<()> {
        Ok(self.metadata.clear().await?)
    }

    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(value) = self.metadata.get(key).await? else {
            return Ok(None);
        };

        match serde_json::from_value(value) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(key = %key, error = %e, "Stored record does not decode");
                Err(e.into())
            }
        }
    }

    async fn put<T: Serialize>(&self, key: &str, record: &T) -> Result<()> {
        let value = serde_json::to_value(record)?;
        self.metadata.set(key, value).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LibraryError;
    use bridge_traits::memory::MemoryMetadataStore;

    fn record(id: &str) -> TrackRecord {
        TrackRecord {
            id: id.to_string(),
            name: "Song".to_string(),
            artists: vec![],
            album: None,
            duration_ms: 1000,
            size_bytes: 42,
            downloaded_at: 1_700_000_000_000,
            storage_key: id.to_string(),
        }
    }

    #[test]
    fn test_key_layout() {
        assert_eq!(track_key("abc"), "abc");
        assert_eq!(album_key("abc"), "album:abc");
        assert_eq!(playlist_key("abc"), "playlist:abc");
    }

    #[tokio::test]
    async fn test_load_index_defaults_to_empty() {
        let store = LibraryStore::new(Arc::new(MemoryMetadataStore::new()));
        let index = store.load_index().await.unwrap();
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_index_round_trip() {
        let metadata = Arc::new(MemoryMetadataStore::new());
        let store = LibraryStore::new(metadata.clone());

        let mut index = LibraryIndex::empty();
        index.tracks.insert("t1".into(), record("t1"));
        store.save_index(&index).await.unwrap();

        assert!(metadata.contains_key(LIBRARY_INDEX_KEY));
        assert_eq!(store.load_index().await.unwrap(), index);
    }

    #[tokio::test]
    async fn test_corrupt_index_is_reported() {
        let metadata = Arc::new(MemoryMetadataStore::new());
        metadata
            .set(LIBRARY_INDEX_KEY, serde_json::json!({"tracks": 5}))
            .await
            .unwrap();

        let store = LibraryStore::new(metadata);
        let err = store.load_index().await.unwrap_err();
        assert!(matches!(err, LibraryError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_track_record_lives_under_bare_id() {
        let metadata = Arc::new(MemoryMetadataStore::new());
        let store = LibraryStore::new(metadata.clone());

        store.put_track(&record("t9")).await.unwrap();
        assert!(metadata.contains_key("t9"));
        assert_eq!(store.get_track("t9").await.unwrap(), Some(record("t9")));

        store.remove_track("t9").await.unwrap();
        assert!(store.get_track("t9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let metadata = Arc::new(MemoryMetadataStore::new());
        let store = LibraryStore::new(metadata.clone());

        store.put_track(&record("t1")).await.unwrap();
        store.save_index(&LibraryIndex::empty()).await.unwrap();
        store.clear().await.unwrap();

        assert!(metadata.keys().await.unwrap().is_empty());
    }
}
