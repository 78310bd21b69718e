//! The service context object and its queue driver.

use crate::builder::CoreServiceBuilder;
use crate::error::{Result, ServiceError};
use bytes::Bytes;
use core_library::{
    AlbumRecord, CacheSize, CatalogAlbum, CatalogPlaylist, CatalogProvider, CatalogTrack,
    CollectionRef, LibraryIndex, PlaylistRecord, SearchResults, SearchType,
    TrackRecord, DEFAULT_SEARCH_LIMIT,
};
use core_playback::{
    CollectionDeletion, ContentManager, EqBand, EqBands, EqPreset, PlaybackEngine,
    PlaybackSnapshot, PresetRegistry, Queue, Subscription,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, EventStream};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast::{error::RecvError, Receiver};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

pub(crate) struct Inner {
    pub(crate) event_bus: EventBus,
    pub(crate) catalog: Arc<dyn CatalogProvider>,
    pub(crate) content: ContentManager,
    pub(crate) engine: PlaybackEngine,
    pub(crate) presets: Mutex<PresetRegistry>,
    pub(crate) queue: Mutex<Queue>,
    pub(crate) driver: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    /// Move the queue past `track_id` if it is still the current entry.
    async fn advance_past(&self, track_id: &str) -> Result<()> {
        let next = {
            let mut queue = self.queue.lock();
            if queue.current() != Some(track_id) {
                return Ok(());
            }
            queue.next().map(str::to_string)
        };

        match next {
            Some(next) => {
                debug!("Queue advancing to {}", next);
                self.engine.play_track(&next).await?;
            }
            None => debug!("Queue finished after {}", track_id),
        }
        Ok(())
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.lock().take() {
            driver.abort();
        }
    }
}

/// Listens for end-of-track and missing-track events and advances the queue.
fn spawn_queue_driver(
    inner: Weak<Inner>,
    mut events: Receiver<CoreEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let track_id = match events.recv().await {
                Ok(event) => match event.finished_track() {
                    Some(track_id) => track_id.to_string(),
                    None => continue,
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Queue driver lagged, {} events skipped", skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let Some(inner) = inner.upgrade() else {
                break;
            };
            if let Err(e) = inner.advance_past(&track_id).await {
                warn!("Queue could not advance past {}: {}", track_id, e);
            }
        }
        debug!("Queue driver stopped");
    })
}

/// Primary façade exposed to host applications.
///
/// One `CoreService` owns one library: its content manager, its playback
/// engine, the preset registry and the play queue. Cloning is cheap and
/// every clone drives the same components.
#[derive(Clone)]
pub struct CoreService {
    inner: Arc<Inner>,
}

impl CoreService {
    pub fn builder(config: CoreConfig) -> CoreServiceBuilder {
        CoreServiceBuilder::new(config)
    }

    /// Build a service with every collaborator derived from `config`.
    pub async fn new(config: CoreConfig) -> Result<Self> {
        Self::builder(config).build().await
    }

    pub(crate) fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    pub fn content(&self) -> &ContentManager {
        &self.inner.content
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.inner.engine
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }

    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.inner.event_bus.subscribe())
    }

    /// Download progress and failures only.
    pub fn subscribe_downloads(&self) -> EventStream {
        self.subscribe_events().filter(CoreEvent::is_download)
    }

    /// Start the queue driver unless one is already running.
    pub(crate) fn ensure_queue_driver(&self) {
        let mut driver = self.inner.driver.lock();
        if driver.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        if driver.is_some() {
            debug!("Restarting queue driver");
        }
        *driver = Some(spawn_queue_driver(
            Arc::downgrade(&self.inner),
            self.inner.event_bus.subscribe(),
        ));
    }

    /// Stop the queue driver and release the audio output.
    ///
    /// The service stays usable: the next `play_*` call reopens the output
    /// and restarts the driver.
    pub fn shutdown(&self) {
        if let Some(driver) = self.inner.driver.lock().take() {
            driver.abort();
        }
        self.inner.engine.dispose();
        *self.inner.queue.lock() = Queue::default();
        info!("Core service shut down");
    }

    // ------------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------------

    /// Search the catalog. `limit` defaults to [`DEFAULT_SEARCH_LIMIT`].
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        query: &str,
        types: &[SearchType],
        limit: Option<u32>,
    ) -> Result<SearchResults> {
        let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        Ok(self.inner.catalog.search(query, types, limit).await?)
    }

    pub async fn catalog_track(&self, track_id: &str) -> Result<CatalogTrack> {
        Ok(self.inner.catalog.get_track(track_id).await?)
    }

    pub async fn catalog_album(&self, album_id: &str) -> Result<CatalogAlbum> {
        Ok(self.inner.catalog.get_album(album_id).await?)
    }

    pub async fn catalog_playlist(&self, playlist_id: &str) -> Result<CatalogPlaylist> {
        Ok(self.inner.catalog.get_playlist(playlist_id).await?)
    }

    // ------------------------------------------------------------------------
    // Library
    // ------------------------------------------------------------------------

    /// Download a track by catalog id. Already downloaded tracks are
    /// returned without a catalog lookup.
    #[instrument(skip(self))]
    pub async fn download_track(&self, track_id: &str) -> Result<TrackRecord> {
        let library = self.inner.content.get_library().await?;
        if let Some(existing) = library.tracks.get(track_id) {
            return Ok(existing.clone());
        }
        let track = self.inner.catalog.get_track(track_id).await?;
        Ok(self.inner.content.download_track(&track).await?)
    }

    pub async fn download_album(&self, album_id: &str) -> Result<AlbumRecord> {
        Ok(self.inner.content.download_album(album_id).await?)
    }

    pub async fn download_playlist(&self, playlist_id: &str) -> Result<PlaylistRecord> {
        Ok(self.inner.content.download_playlist(playlist_id).await?)
    }

    /// Delete a track and drop it from the play queue.
    pub async fn delete_track(&self, track_id: &str) -> Result<()> {
        self.inner.content.delete_track(track_id).await?;
        self.inner.queue.lock().remove(track_id);
        Ok(())
    }

    pub async fn delete_album(&self, album_id: &str) -> Result<CollectionDeletion> {
        let deletion = self.inner.content.delete_album(album_id).await?;
        self.forget_removed(&deletion);
        Ok(deletion)
    }

    pub async fn delete_playlist(&self, playlist_id: &str) -> Result<CollectionDeletion> {
        let deletion = self.inner.content.delete_playlist(playlist_id).await?;
        self.forget_removed(&deletion);
        Ok(deletion)
    }

    fn forget_removed(&self, deletion: &CollectionDeletion) {
        let mut queue = self.inner.queue.lock();
        for track_id in &deletion.removed_tracks {
            queue.remove(track_id);
        }
    }

    /// Wipe the library and empty the play queue.
    pub async fn clear_all(&self) -> Result<()> {
        self.inner.content.clear_all().await?;
        *self.inner.queue.lock() = Queue::default();
        Ok(())
    }

    pub async fn get_library(&self) -> Result<LibraryIndex> {
        Ok(self.inner.content.get_library().await?)
    }

    pub async fn get_cache_size(&self) -> Result<CacheSize> {
        Ok(self.inner.content.get_cache_size().await?)
    }

    pub async fn get_track_audio(&self, track_id: &str) -> Result<Option<Bytes>> {
        Ok(self.inner.content.get_track_audio(track_id).await?)
    }

    // ------------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------------

    /// Play one downloaded track. Replaces the queue with that track alone.
    pub async fn play_track(&self, track_id: &str) -> Result<()> {
        self.ensure_queue_driver();
        *self.inner.queue.lock() = Queue::new(vec![track_id.to_string()]);
        Ok(self.inner.engine.play_track(track_id).await?)
    }

    /// Queue a downloaded album or playlist and play its first track.
    ///
    /// Ids whose track has been deleted are left out of the queue.
    ///
    /// # Errors
    ///
    /// `NotDownloaded` when the collection is not in the library or none of
    /// its tracks are stored.
    #[instrument(skip(self, collection), fields(collection = %collection))]
    pub async fn play_collection(&self, collection: CollectionRef) -> Result<()> {
        let index = self.inner.content.get_library().await?;
        let tracks: Vec<String> = index
            .collection_tracks(&collection)
            .ok_or_else(|| ServiceError::NotDownloaded(collection.to_string()))?
            .iter()
            .filter(|id| index.tracks.contains_key(id.as_str()))
            .cloned()
            .collect();

        let Some(first) = tracks.first().cloned() else {
            return Err(ServiceError::NotDownloaded(collection.to_string()));
        };

        info!("Queued {} ({} tracks)", collection, tracks.len());
        self.ensure_queue_driver();
        *self.inner.queue.lock() = Queue::from_collection(collection, tracks);
        Ok(self.inner.engine.play_track(&first).await?)
    }

    pub async fn play_album(&self, album_id: &str) -> Result<()> {
        self.play_collection(CollectionRef::album(album_id)).await
    }

    pub async fn play_playlist(&self, playlist_id: &str) -> Result<()> {
        self.play_collection(CollectionRef::playlist(playlist_id)).await
    }

    /// Skip to the next queued track. Returns its id, `None` at the end.
    pub async fn next_track(&self) -> Result<Option<String>> {
        let next = self.inner.queue.lock().next().map(str::to_string);
        if let Some(track_id) = &next {
            self.inner.engine.play_track(track_id).await?;
        }
        Ok(next)
    }

    /// Go back to the previous queued track. Returns its id, `None` at the start.
    pub async fn previous_track(&self) -> Result<Option<String>> {
        let previous = self.inner.queue.lock().previous().map(str::to_string);
        if let Some(track_id) = &previous {
            self.inner.engine.play_track(track_id).await?;
        }
        Ok(previous)
    }

    pub fn queue(&self) -> Queue {
        self.inner.queue.lock().clone()
    }

    /// The collection the queue was built from, if any.
    pub fn queue_source(&self) -> Option<CollectionRef> {
        self.inner.queue.lock().source().cloned()
    }

    pub fn toggle_play_pause(&self) {
        self.inner.engine.toggle_play_pause();
    }

    pub fn pause(&self) {
        self.inner.engine.pause();
    }

    pub fn resume(&self) {
        self.inner.engine.resume();
    }

    pub fn stop(&self) {
        self.inner.engine.stop();
    }

    pub fn seek(&self, position: Duration) {
        self.inner.engine.seek(position);
    }

    pub fn set_volume(&self, volume: f32) -> f32 {
        self.inner.engine.set_volume(volume)
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.inner.engine.snapshot()
    }

    pub fn frequency_data(&self) -> Vec<u8> {
        self.inner.engine.get_frequency_data()
    }

    /// Register a no-argument listener for playback transitions.
    pub fn subscribe_playback<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.engine.subscribe(listener)
    }

    // ------------------------------------------------------------------------
    // Equalizer
    // ------------------------------------------------------------------------

    pub fn presets(&self) -> Vec<EqPreset> {
        self.inner.presets.lock().presets().to_vec()
    }

    pub fn current_preset(&self) -> Option<EqPreset> {
        self.inner.presets.lock().current().cloned()
    }

    /// Make `preset_id` current and apply its bands.
    pub fn select_preset(&self, preset_id: &str) -> Result<EqBands> {
        let preset = self.inner.presets.lock().select(preset_id)?;
        Ok(self.inner.engine.apply_eq_preset(&preset))
    }

    /// Save the engine's current bands as a named preset.
    pub fn save_preset(&self, name: &str) -> Result<EqPreset> {
        let bands = self.inner.engine.eq_bands();
        Ok(self.inner.presets.lock().save(name, bands)?)
    }

    /// Delete a preset. Deleting the current one applies the default preset.
    pub fn delete_preset(&self, preset_id: &str) -> Result<()> {
        let fallback = self.inner.presets.lock().delete(preset_id)?;
        if let Some(preset) = fallback {
            self.inner.engine.apply_eq_preset(&preset);
        }
        Ok(())
    }

    /// Adjust one band. The result becomes the "custom" preset.
    pub fn set_eq_band(&self, band: EqBand, gain_db: f32) -> EqBands {
        let applied = self.inner.engine.set_eq_band(band, gain_db);
        self.inner
            .presets
            .lock()
            .update_custom_band(band, applied.get(band), applied);
        applied
    }

    pub fn eq_bands(&self) -> EqBands {
        self.inner.engine.eq_bands()
    }
}
