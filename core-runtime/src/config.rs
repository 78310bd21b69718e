//! Core configuration
//!
//! `CoreConfig` carries the host bridges and the playback engine tunables.
//! The builder validates everything up front.
//!
//! Bridges:
//!
//! - `BlobStore` - raw audio payloads (desktop default: files under `data_dir/tracks`)
//! - `MetadataStore` - records and the library index (desktop default: SQLite at `data_dir/metadata.db`)
//! - `HttpClient` - catalog, token refresh and audio fetches (desktop default: reqwest)
//! - `AudioOutput` - optional; without one the engine runs headless
//! - `Clock` - defaults to the system clock
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .data_dir("/home/me/.local/share/offline-music")
//!     .initial_volume(0.6)
//!     .build()?;
//! ```
//!
//! Without the `desktop-shims` feature every store must be injected:
//!
//! ```
//! use core_runtime::config::CoreConfig;
//! use bridge_traits::{MemoryBlobStore, MemoryMetadataStore};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .blob_store(Arc::new(MemoryBlobStore::new()))
//!     .metadata_store(Arc::new(MemoryMetadataStore::new()))
//!     .build()
//!     .unwrap();
//! assert_eq!(config.playback.analyzer_fft_size, 256);
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    AudioOutput, BlobStore, Clock, HttpClient, MetadataStore, SystemClock,
};
use std::path::PathBuf;
use std::sync::Arc;

pub const DEFAULT_CATALOG_BASE_URL: &str = "https://api.spotify.com/v1";

/// Playback engine tunables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSettings {
    /// Linear gain applied when the engine starts, in `[0, 1]`
    pub initial_volume: f32,
    /// Symmetric bound for EQ band gains in dB
    pub eq_gain_limit_db: f32,
    /// Analyzer FFT length; bins = fft_size / 2
    pub analyzer_fft_size: usize,
    /// Analyzer time smoothing in `[0, 1)`
    pub analyzer_smoothing: f32,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            initial_volume: 0.8,
            eq_gain_limit_db: 12.0,
            analyzer_fft_size: 256,
            analyzer_smoothing: 0.8,
        }
    }
}

impl PlaybackSettings {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.initial_volume) {
            return Err(Error::Config(format!(
                "Initial volume must be within [0, 1], got {}",
                self.initial_volume
            )));
        }

        if !(self.eq_gain_limit_db > 0.0 && self.eq_gain_limit_db <= 40.0) {
            return Err(Error::Config(format!(
                "EQ gain limit must be within (0, 40] dB, got {}",
                self.eq_gain_limit_db
            )));
        }

        let fft = self.analyzer_fft_size;
        if !fft.is_power_of_two() || !(32..=32_768).contains(&fft) {
            return Err(Error::Config(format!(
                "Analyzer FFT size must be a power of two in 32..=32768, got {}",
                fft
            )));
        }

        if !(0.0..1.0).contains(&self.analyzer_smoothing) {
            return Err(Error::Config(format!(
                "Analyzer smoothing must be within [0, 1), got {}",
                self.analyzer_smoothing
            )));
        }

        Ok(())
    }
}

/// Core configuration for the offline library.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Root directory for desktop default stores
    pub data_dir: Option<PathBuf>,

    pub blob_store: Arc<dyn BlobStore>,

    /// Resolved lazily through [`CoreConfig::metadata_store`] when not injected
    metadata_store: Option<Arc<dyn MetadataStore>>,

    pub http_client: Option<Arc<dyn HttpClient>>,

    pub audio_output: Option<Arc<dyn AudioOutput>>,

    pub clock: Arc<dyn Clock>,

    /// Per-subscriber event buffer
    pub event_buffer: usize,

    pub catalog_base_url: String,

    pub playback: PlaybackSettings,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("data_dir", &self.data_dir)
            .field("blob_store", &"BlobStore { ... }")
            .field(
                "metadata_store",
                &self
                    .metadata_store
                    .as_ref()
                    .map(|_| "MetadataStore { ... }"),
            )
            .field(
                "http_client",
                &self.http_client.as_ref().map(|_| "HttpClient { ... }"),
            )
            .field(
                "audio_output",
                &self.audio_output.as_ref().map(|_| "AudioOutput { ... }"),
            )
            .field("event_buffer", &self.event_buffer)
            .field("catalog_base_url", &self.catalog_base_url)
            .field("playback", &self.playback)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.event_buffer == 0 {
            return Err(Error::Config(
                "Event buffer must hold at least one event".to_string(),
            ));
        }

        if !(self.catalog_base_url.starts_with("https://")
            || self.catalog_base_url.starts_with("http://"))
        {
            return Err(Error::Config(format!(
                "Catalog base URL must be http(s), got '{}'",
                self.catalog_base_url
            )));
        }

        self.playback.validate()
    }

    /// The injected metadata store, or the desktop default opened under `data_dir`.
    pub async fn metadata_store(&self) -> Result<Arc<dyn MetadataStore>> {
        match &self.metadata_store {
            Some(store) => Ok(Arc::clone(store)),
            None => provide_default_metadata_store(self.data_dir.as_ref()).await,
        }
    }
}

#[cfg(feature = "desktop-shims")]
fn data_dir_missing_error(capability: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: format!(
            "No {} was injected and no data directory is configured for the desktop default. \
             Use .data_dir() or inject an implementation.",
            capability
        ),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn store_missing_error(capability: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: format!(
            "{} implementation is required. \
             Desktop: enable the 'desktop-shims' feature to use the default. \
             Other hosts: inject a platform-native implementation.",
            capability
        ),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_blob_store(data_dir: Option<&PathBuf>) -> Result<Arc<dyn BlobStore>> {
    use bridge_desktop::FileBlobStore;

    let dir = data_dir.ok_or_else(|| data_dir_missing_error("BlobStore"))?;
    let store: Arc<dyn BlobStore> = Arc::new(FileBlobStore::new(dir.join("tracks")));
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_blob_store(_data_dir: Option<&PathBuf>) -> Result<Arc<dyn BlobStore>> {
    Err(store_missing_error("BlobStore"))
}

#[cfg(feature = "desktop-shims")]
async fn provide_default_metadata_store(
    data_dir: Option<&PathBuf>,
) -> Result<Arc<dyn MetadataStore>> {
    use bridge_desktop::SqliteMetadataStore;

    let dir = data_dir.ok_or_else(|| data_dir_missing_error("MetadataStore"))?;
    let store = SqliteMetadataStore::new(dir.join("metadata.db"))
        .await
        .map_err(|source| Error::DefaultBridge {
            capability: "MetadataStore",
            source,
        })?;
    let store: Arc<dyn MetadataStore> = Arc::new(store);
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
async fn provide_default_metadata_store(
    _data_dir: Option<&PathBuf>,
) -> Result<Arc<dyn MetadataStore>> {
    Err(store_missing_error("MetadataStore"))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Option<Arc<dyn HttpClient>>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::new()
        .map_err(|source| Error::DefaultBridge {
        capability: "HttpClient",
        source,
    })?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(Some(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Option<Arc<dyn HttpClient>>> {
    Ok(None)
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    data_dir: Option<PathBuf>,
    blob_store: Option<Arc<dyn BlobStore>>,
    metadata_store: Option<Arc<dyn MetadataStore>>,
    http_client: Option<Arc<dyn HttpClient>>,
    audio_output: Option<Arc<dyn AudioOutput>>,
    clock: Option<Arc<dyn Clock>>,
    event_buffer: Option<usize>,
    catalog_base_url: Option<String>,
    playback: PlaybackSettings,
}

impl CoreConfigBuilder {
    /// Directory for the desktop default stores.
    pub fn data_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    pub fn blob_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.blob_store = Some(store);
        self
    }

    pub fn metadata_store(mut self, store: Arc<dyn MetadataStore>) -> Self {
        self.metadata_store = Some(store);
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn audio_output(mut self, output: Arc<dyn AudioOutput>) -> Self {
        self.audio_output = Some(output);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = Some(capacity);
        self
    }

    pub fn catalog_base_url(mut self, url: impl Into<String>) -> Self {
        self.catalog_base_url = Some(url.into());
        self
    }

    pub fn initial_volume(mut self, volume: f32) -> Self {
        self.playback.initial_volume = volume;
        self
    }

    pub fn eq_gain_limit_db(mut self, limit: f32) -> Self {
        self.playback.eq_gain_limit_db = limit;
        self
    }

    pub fn analyzer_fft_size(mut self, size: usize) -> Self {
        self.playback.analyzer_fft_size = size;
        self
    }

    pub fn analyzer_smoothing(mut self, smoothing: f32) -> Self {
        self.playback.analyzer_smoothing = smoothing;
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when a required store is neither
    ///   injected nor available as a desktop default
    /// - [`Error::Config`] when a tunable is out of range
    pub fn build(self) -> Result<CoreConfig> {
        let blob_store = match self.blob_store {
            Some(store) => store,
            None => provide_default_blob_store(self.data_dir.as_ref())?,
        };

        if self.metadata_store.is_none() && self.data_dir.is_none() {
            #[cfg(feature = "desktop-shims")]
            return Err(data_dir_missing_error("MetadataStore"));
            #[cfg(not(feature = "desktop-shims"))]
            return Err(store_missing_error("MetadataStore"));
        }

        let http_client = match self.http_client {
            Some(client) => Some(client),
            None => provide_default_http_client()?,
        };

        let config = CoreConfig {
            data_dir: self.data_dir,
            blob_store,
            metadata_store: self.metadata_store,
            http_client,
            audio_output: self.audio_output,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            event_buffer: self
                .event_buffer
                .unwrap_or(crate::events::DEFAULT_EVENT_BUFFER_SIZE),
            catalog_base_url: self
                .catalog_base_url
                .unwrap_or_else(|| DEFAULT_CATALOG_BASE_URL.to_string()),
            playback: self.playback,
        };

        config.validate()?;
        Ok(config)
    }
}
