//! Service assembly
//!
//! Turns a validated [`CoreConfig`] plus optional collaborator overrides
//! into a running [`CoreService`].

use crate::error::{Result, ServiceError};
use crate::service::{CoreService, Inner};
use bridge_traits::output::{AudioOutput, OutputFormat};
use core_auth::{StaticTokenProvider, TokenProvider};
use core_library::{CatalogProvider, TrackFetcher};
use core_playback::{
    AudioDecoder, ContentManager, ContentManagerConfig, EngineConfig, NullOutput, PlaybackEngine,
    PresetRegistry, Queue, SymphoniaDecoder,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::EventBus;
use parking_lot::Mutex;
use provider_spotify::{PreviewTrackFetcher, SpotifyConnector};
use std::sync::Arc;
use tracing::{info, warn};

/// Builder for [`CoreService`].
///
/// Every collaborator not injected here is derived from the config: the
/// catalog and fetcher from its `HttpClient`, the output from its
/// `AudioOutput` (headless when absent).
pub struct CoreServiceBuilder {
    config: CoreConfig,
    content: ContentManagerConfig,
    catalog: Option<Arc<dyn CatalogProvider>>,
    fetcher: Option<Arc<dyn TrackFetcher>>,
    tokens: Option<Arc<dyn TokenProvider>>,
    decoder: Option<Arc<dyn AudioDecoder>>,
}

impl CoreServiceBuilder {
    pub(crate) fn new(config: CoreConfig) -> Self {
        Self {
            config,
            content: ContentManagerConfig::default(),
            catalog: None,
            fetcher: None,
            tokens: None,
            decoder: None,
        }
    }

    pub fn content_config(mut self, config: ContentManagerConfig) -> Self {
        self.content = config;
        self
    }

    pub fn catalog(mut self, catalog: Arc<dyn CatalogProvider>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn TrackFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Token source for the default catalog. Defaults to a provider that
    /// reports every call as unauthenticated.
    pub fn token_provider(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn decoder(mut self, decoder: Arc<dyn AudioDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Wire every component and start the queue driver.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `Config` when the core or component configs fail validation
    /// - `CapabilityMissing` when no catalog or fetcher is injected and the
    ///   config carries no `HttpClient`
    pub async fn build(self) -> Result<CoreService> {
        let config = self.config;
        config.validate()?;

        let metadata = config.metadata_store().await?;
        let event_bus = EventBus::new(config.event_buffer);

        let tokens = self
            .tokens
            .unwrap_or_else(|| Arc::new(StaticTokenProvider::unauthenticated()));

        let catalog: Arc<dyn CatalogProvider> = match self.catalog {
            Some(catalog) => catalog,
            None => Arc::new(SpotifyConnector::with_base_url(
                require_http(&config, "catalog")?,
                tokens,
                config.catalog_base_url.clone(),
            )),
        };

        let fetcher: Arc<dyn TrackFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(PreviewTrackFetcher::new(require_http(&config, "fetcher")?)),
        };

        let content = ContentManager::new(
            self.content,
            Arc::clone(&config.blob_store),
            metadata,
            Arc::clone(&catalog),
            fetcher,
            Arc::clone(&config.clock),
        )?
        .with_event_bus(event_bus.clone());

        let decoder = self
            .decoder
            .unwrap_or_else(|| Arc::new(SymphoniaDecoder::new()));
        let output = config.audio_output.clone().unwrap_or_else(default_output);

        let engine = PlaybackEngine::new(
            EngineConfig::from(config.playback),
            Arc::clone(&config.blob_store),
            decoder,
            output,
        )?
        .with_event_bus(event_bus.clone());

        let inner = Arc::new(Inner {
            event_bus,
            catalog,
            content,
            engine,
            presets: Mutex::new(PresetRegistry::new()),
            queue: Mutex::new(Queue::default()),
            driver: Mutex::new(None),
        });

        let service = CoreService::from_inner(inner);
        service.ensure_queue_driver();

        info!(
            "Core service ready (volume {}, EQ limit ±{} dB)",
            config.playback.initial_volume, config.playback.eq_gain_limit_db
        );
        Ok(service)
    }
}

fn require_http(
    config: &CoreConfig,
    purpose: &str,
) -> Result<Arc<dyn bridge_traits::HttpClient>> {
    config
        .http_client
        .clone()
        .ok_or_else(|| ServiceError::CapabilityMissing {
            capability: "HttpClient".to_string(),
            message: format!(
                "No HTTP client configured and no {} injected into the service builder",
                purpose
            ),
        })
}

#[cfg(feature = "cpal-output")]
fn default_output() -> Arc<dyn AudioOutput> {
    match bridge_desktop::CpalOutput::new() {
        Ok(output) => Arc::new(output),
        Err(e) => {
            warn!("Falling back to headless output: {}", e);
            Arc::new(NullOutput::new(OutputFormat::default()))
        }
    }
}

#[cfg(not(feature = "cpal-output"))]
fn default_output() -> Arc<dyn AudioOutput> {
    warn!("No audio output configured, playback runs headless");
    Arc::new(NullOutput::new(OutputFormat::default()))
}
