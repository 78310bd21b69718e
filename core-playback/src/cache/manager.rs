//! # Content Manager
//!
//! Orchestrates downloads and deletions over the blob and metadata stores.
//!
//! - Downloads are idempotent per track and per collection
//! - Collection downloads fetch their tracks one at a time, in catalog order
//! - A track is written blob first, then record, then index entry; a failure
//!   rolls back what this track wrote
//! - Collection deletion keeps every track another surviving collection
//!   still lists
//!
//! Every download, deletion and clear holds one async mutex from its
//! existence check to its last index write. A delete never observes a
//! half-built collection, and two callers racing on the same track fetch
//! it once.

use crate::cache::config::ContentManagerConfig;
use crate::error::{PlaybackError, Result};
use bridge_traits::{storage::BlobStore, storage::MetadataStore, time::Clock};
use bytes::Bytes;
use core_library::{
    AlbumRecord, CacheSize, CatalogProvider, CatalogTrack, CollectionKind, CollectionRef,
    DanglingReference, LibraryIndex, LibraryStore, PlaylistRecord, TrackFetcher, TrackRecord,
};
use core_runtime::events::{CoreEvent, DownloadEvent, DownloadProgress, EventBus, LibraryEvent};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

/// Outcome of deleting an album or playlist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionDeletion {
    /// Tracks whose blob and record were removed
    pub removed_tracks: Vec<String>,
    /// Tracks kept because another collection still lists them
    pub retained_tracks: Vec<String>,
}

/// Offline content manager.
///
/// Construct once per library and share behind an `Arc`; every method takes
/// `&self`.
pub struct ContentManager {
    config: ContentManagerConfig,
    blobs: Arc<dyn BlobStore>,
    store: LibraryStore,
    catalog: Arc<dyn CatalogProvider>,
    fetcher: Arc<dyn TrackFetcher>,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
    op_lock: Mutex<()>,
}

impl ContentManager {
    /// Create a new content manager.
    ///
    /// # Arguments
    ///
    /// * `config` - Fetch and progress settings
    /// * `blobs` - Store for raw audio bytes
    /// * `metadata` - Store for records and the library index
    /// * `catalog` - Resolves album and playlist track lists
    /// * `fetcher` - Downloads audio bytes for one track
    /// * `clock` - Stamps `downloaded_at`
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::InvalidConfig`] when `config` fails validation.
    pub fn new(
        config: ContentManagerConfig,
        blobs: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
        catalog: Arc<dyn CatalogProvider>,
        fetcher: Arc<dyn TrackFetcher>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate().map_err(PlaybackError::InvalidConfig)?;

        Ok(Self {
            config,
            blobs,
            store: LibraryStore::new(metadata),
            catalog,
            fetcher,
            clock,
            event_bus: None,
            op_lock: Mutex::new(()),
        })
    }

    /// Set event bus for library and progress events.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    // ------------------------------------------------------------------------
    // Downloads
    // ------------------------------------------------------------------------

    /// Download one track, or return the existing record unchanged.
    #[instrument(skip(self, track), fields(track_id = %track.id))]
    pub async fn download_track(&self, track: &CatalogTrack) -> Result<TrackRecord> {
        let _op = self.op_lock.lock().await;

        if let Some(existing) = self.store.get_track(&track.id).await? {
            debug!("Track {} already downloaded", track.id);
            return Ok(existing);
        }

        self.emit_progress(DownloadProgress::started(1, Some(track.name.clone())));

        match self.fetch_and_store(track).await {
            Ok(record) => {
                self.emit_progress(DownloadProgress::complete(1, 1));
                info!(
                    "Downloaded track {} ({} bytes)",
                    record.id, record.size_bytes
                );
                Ok(record)
            }
            Err(e) => {
                error!("Failed to download track {}: {}", track.id, e);
                self.emit_failure(&track.id, &e);
                self.emit_progress(DownloadProgress::complete(1, 0));
                Err(e)
            }
        }
    }

    /// Download an album and all of its tracks.
    ///
    /// Tracks downloaded before a failure stay in the library.
    #[instrument(skip(self))]
    pub async fn download_album(&self, album_id: &str) -> Result<AlbumRecord> {
        let _op = self.op_lock.lock().await;

        if let Some(existing) = self.store.get_album(album_id).await? {
            debug!("Album {} already downloaded", album_id);
            return Ok(existing);
        }

        let album = self.catalog.get_album(album_id).await.map_err(|e| {
            let err = PlaybackError::from(e);
            self.emit_failure(album_id, &err);
            err
        })?;

        let (track_ids, size_bytes) = self.download_batch(album_id, &album.tracks).await?;

        let record = AlbumRecord {
            id: album.id,
            name: album.name,
            artists: album.artists,
            release_date: album.release_date,
            image_url: album.image_url,
            tracks: track_ids,
            size_bytes,
            downloaded_at: self.clock.unix_timestamp_millis(),
        };

        self.store.put_album(&record).await?;
        let mut index = self.store.load_index().await?;
        index.albums.insert(record.id.clone(), record.clone());
        self.store.save_index(&index).await?;

        info!(
            "Downloaded album {} ({} tracks, {} bytes)",
            record.id,
            record.tracks.len(),
            record.size_bytes
        );
        self.emit(CoreEvent::Library(LibraryEvent::AlbumDownloaded {
            album_id: record.id.clone(),
            name: record.name.clone(),
            track_count: record.tracks.len(),
            size_bytes: record.size_bytes,
        }));

        Ok(record)
    }

    /// Download a playlist and all of its tracks.
    ///
    /// Tracks downloaded before a failure stay in the library.
    #[instrument(skip(self))]
    pub async fn download_playlist(&self, playlist_id: &str) -> Result<PlaylistRecord> {
        let _op = self.op_lock.lock().await;

        if let Some(existing) = self.store.get_playlist(playlist_id).await? {
            debug!("Playlist {} already downloaded", playlist_id);
            return Ok(existing);
        }

        let playlist = self.catalog.get_playlist(playlist_id).await.map_err(|e| {
            let err = PlaybackError::from(e);
            self.emit_failure(playlist_id, &err);
            err
        })?;

        let (track_ids, size_bytes) = self
            .download_batch(playlist_id, &playlist.tracks)
            .await?;

        let record = PlaylistRecord {
            id: playlist.id,
            name: playlist.name,
            owner: playlist.owner,
            description: playlist.description,
            image_url: playlist.image_url,
            tracks: track_ids,
            size_bytes,
            downloaded_at: self.clock.unix_timestamp_millis(),
        };

        self.store.put_playlist(&record).await?;
        let mut index = self.store.load_index().await?;
        index.playlists.insert(record.id.clone(), record.clone());
        self.store.save_index(&index).await?;

        info!(
            "Downloaded playlist {} ({} tracks, {} bytes)",
            record.id,
            record.tracks.len(),
            record.size_bytes
        );
        self.emit(CoreEvent::Library(LibraryEvent::PlaylistDownloaded {
            playlist_id: record.id.clone(),
            name: record.name.clone(),
            track_count: record.tracks.len(),
            size_bytes: record.size_bytes,
        }));

        Ok(record)
    }

    /// Download `tracks` sequentially, reporting one progress tick per track.
    ///
    /// Returns the ids in catalog order and the summed size.
    async fn download_batch(
        &self,
        collection_id: &str,
        tracks: &[CatalogTrack],
    ) -> Result<(Vec<String>, u64)> {
        let total = tracks.len();
        self.emit_progress(DownloadProgress::started(
            total,
            tracks.first().map(|t| t.name.clone()),
        ));

        let mut track_ids = Vec::with_capacity(total);
        let mut size_bytes = 0u64;

        for (completed, track) in tracks.iter().enumerate() {
            self.emit_progress(DownloadProgress {
                is_downloading: true,
                total,
                completed,
                current_item_name: Some(track.name.clone()),
            });

            let record = match self.store.get_track(&track.id).await {
                Ok(Some(existing)) => Ok(existing),
                Ok(None) => self.fetch_and_store(track).await,
                Err(e) => Err(e.into()),
            };

            match record {
                Ok(record) => {
                    size_bytes += record.size_bytes;
                    track_ids.push(record.id);
                }
                Err(e) => {
                    error!(
                        "Download of {} stopped at track {} ({}/{}): {}",
                        collection_id, track.id, completed, total, e
                    );
                    self.emit_failure(collection_id, &e);
                    self.emit_progress(DownloadProgress::complete(total, completed));
                    return Err(e);
                }
            }
        }

        self.emit_progress(DownloadProgress::complete(total, total));
        Ok((track_ids, size_bytes))
    }

    /// Fetch, store and index one track that is not yet downloaded.
    ///
    /// Callers hold `op_lock`.
    async fn fetch_and_store(&self, track: &CatalogTrack) -> Result<TrackRecord> {
        let data = tokio::time::timeout(self.config.fetch_timeout, self.fetcher.fetch(track))
            .await
            .map_err(|_| {
                PlaybackError::NetworkFailure(format!(
                    "fetch of track {} timed out after {:?}",
                    track.id, self.config.fetch_timeout
                ))
            })??;

        if data.is_empty() && self.config.reject_empty_payloads {
            return Err(PlaybackError::NetworkFailure(format!(
                "upstream returned no audio for track {}",
                track.id
            )));
        }

        let record = TrackRecord {
            id: track.id.clone(),
            name: track.name.clone(),
            artists: track.artists.clone(),
            album: track.album.clone(),
            duration_ms: track.duration_ms,
            size_bytes: data.len() as u64,
            downloaded_at: self.clock.unix_timestamp_millis(),
            storage_key: track.id.clone(),
        };

        self.blobs.put(&record.storage_key, data).await?;

        if let Err(e) = self.store.put_track(&record).await {
            self.discard_blob(&record.storage_key).await;
            return Err(e.into());
        }

        let indexed = match self.store.load_index().await {
            Ok(mut index) => {
                index.tracks.insert(record.id.clone(), record.clone());
                self.store.save_index(&index).await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = indexed {
            self.discard_blob(&record.storage_key).await;
            if let Err(cleanup) = self.store.remove_track(&record.id).await {
                warn!("Failed to roll back record for {}: {}", record.id, cleanup);
            }
            return Err(e.into());
        }

        self.emit(CoreEvent::Library(LibraryEvent::TrackDownloaded {
            track_id: record.id.clone(),
            name: record.name.clone(),
            size_bytes: record.size_bytes,
        }));

        Ok(record)
    }

    async fn discard_blob(&self, key: &str) {
        if let Err(e) = self.blobs.remove(key).await {
            warn!("Failed to roll back blob {}: {}", key, e);
        }
    }

    // ------------------------------------------------------------------------
    // Deletion
    // ------------------------------------------------------------------------

    /// Delete one track regardless of which collections list it.
    ///
    /// Collections that list the track keep a dangling id; see
    /// [`ContentManager::dangling_references`].
    #[instrument(skip(self))]
    pub async fn delete_track(&self, track_id: &str) -> Result<()> {
        let _op = self.op_lock.lock().await;

        let mut index = self.store.load_index().await?;
        let storage_key = match index.tracks.remove(track_id) {
            Some(record) => {
                self.store.save_index(&index).await?;
                record.storage_key
            }
            None => {
                debug!("Track {} not in index, removing stored data only", track_id);
                track_id.to_string()
            }
        };

        self.blobs.remove(&storage_key).await?;
        self.store.remove_track(track_id).await?;

        info!("Deleted track {}", track_id);
        self.emit(CoreEvent::Library(LibraryEvent::TrackDeleted {
            track_id: track_id.to_string(),
        }));

        Ok(())
    }

    /// Delete an album, keeping tracks still listed by another collection.
    #[instrument(skip(self))]
    pub async fn delete_album(&self, album_id: &str) -> Result<CollectionDeletion> {
        let deletion = self
            .delete_collection(CollectionRef::album(album_id))
            .await?;

        self.emit(CoreEvent::Library(LibraryEvent::AlbumDeleted {
            album_id: album_id.to_string(),
            removed_tracks: deletion.removed_tracks.clone(),
            retained_tracks: deletion.retained_tracks.clone(),
        }));

        Ok(deletion)
    }

    /// Delete a playlist, keeping tracks still listed by another collection.
    #[instrument(skip(self))]
    pub async fn delete_playlist(&self, playlist_id: &str) -> Result<CollectionDeletion> {
        let deletion = self
            .delete_collection(CollectionRef::playlist(playlist_id))
            .await?;

        self.emit(CoreEvent::Library(LibraryEvent::PlaylistDeleted {
            playlist_id: playlist_id.to_string(),
            removed_tracks: deletion.removed_tracks.clone(),
            retained_tracks: deletion.retained_tracks.clone(),
        }));

        Ok(deletion)
    }

    /// Liveness is recomputed against the current index with `collection`
    /// excluded, once per constituent track.
    ///
    /// Each track leaves the persisted index before its bytes go, so a
    /// failure partway leaves at worst an unindexed blob, never an indexed
    /// track without one.
    async fn delete_collection(&self, collection: CollectionRef) -> Result<CollectionDeletion> {
        let _op = self.op_lock.lock().await;

        let mut index = self.store.load_index().await?;
        let track_ids: Vec<String> = match index.collection_tracks(&collection) {
            Some(ids) => {
                let mut seen = BTreeSet::new();
                ids.iter()
                    .filter(|id| seen.insert(id.as_str()))
                    .cloned()
                    .collect()
            }
            None => {
                warn!("{} is not in the library index", collection);
                Vec::new()
            }
        };

        let mut deletion = CollectionDeletion::default();
        for track_id in track_ids {
            if index.is_referenced_elsewhere(&track_id, &collection) {
                debug!("Keeping track {}, still referenced", track_id);
                deletion.retained_tracks.push(track_id);
                continue;
            }

            let storage_key = match index.tracks.remove(&track_id) {
                Some(record) => {
                    self.store.save_index(&index).await?;
                    record.storage_key
                }
                None => track_id.clone(),
            };
            self.blobs.remove(&storage_key).await?;
            self.store.remove_track(&track_id).await?;
            deletion.removed_tracks.push(track_id);
        }

        match collection.kind {
            CollectionKind::Album => {
                index.albums.remove(&collection.id);
                self.store.remove_album(&collection.id).await?;
            }
            CollectionKind::Playlist => {
                index.playlists.remove(&collection.id);
                self.store.remove_playlist(&collection.id).await?;
            }
        }
        self.store.save_index(&index).await?;

        info!(
            "Deleted {} ({} tracks removed, {} retained)",
            collection,
            deletion.removed_tracks.len(),
            deletion.retained_tracks.len()
        );

        Ok(deletion)
    }

    /// Wipe both stores and reset the index. Not reference-checked.
    #[instrument(skip(self))]
    pub async fn clear_all(&self) -> Result<()> {
        let _op = self.op_lock.lock().await;

        self.blobs.clear().await?;
        self.store.clear().await?;
        self.store.save_index(&LibraryIndex::empty()).await?;

        info!("Cleared offline library");
        self.emit(CoreEvent::Library(LibraryEvent::Cleared));
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Current index snapshot.
    pub async fn get_library(&self) -> Result<LibraryIndex> {
        Ok(self.store.load_index().await?)
    }

    /// Byte usage per category. `total` counts each stored track once.
    pub async fn get_cache_size(&self) -> Result<CacheSize> {
        Ok(self.store.load_index().await?.cache_size())
    }

    /// Stored audio for `track_id`, `None` when absent.
    pub async fn get_track_audio(&self, track_id: &str) -> Result<Option<Bytes>> {
        Ok(self.blobs.get(track_id).await?)
    }

    /// Whether a record exists for `track_id`.
    pub async fn is_track_downloaded(&self, track_id: &str) -> Result<bool> {
        Ok(self.store.get_track(track_id).await?.is_some())
    }

    /// Collection entries left behind by direct track deletion.
    pub async fn dangling_references(&self) -> Result<Vec<DanglingReference>> {
        Ok(self.store.load_index().await?.dangling_references())
    }

    /// Indexed tracks whose blob is missing.
    pub async fn missing_blobs(&self) -> Result<Vec<String>> {
        let index = self.store.load_index().await?;
        let mut missing = Vec::new();
        for record in index.tracks.values() {
            if !self.blobs.contains(&record.storage_key).await? {
                missing.push(record.id.clone());
            }
        }
        Ok(missing)
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    fn emit(&self, event: CoreEvent) {
        if let Some(bus) = &self.event_bus {
            // No subscribers is fine.
            let _ = bus.emit(event);
        }
    }

    fn emit_progress(&self, progress: DownloadProgress) {
        if self.config.emit_progress {
            self.emit(CoreEvent::Download(DownloadEvent::Progress(progress)));
        }
    }

    fn emit_failure(&self, item_id: &str, err: &PlaybackError) {
        self.emit(CoreEvent::Download(DownloadEvent::Failed {
            item_id: item_id.to_string(),
            message: err.to_string(),
        }));
    }
}
