//! # Playback Engine
//!
//! Loads stored blobs and renders them through a fixed signal chain:
//!
//! ```text
//! source → bass shelf → mid peaking → treble shelf → gain → analyzer → output
//! ```
//!
//! The output pulls frames through a render callback installed on first
//! `play_track`. Transport calls are synchronous and take effect on the
//! next render. Observers register a no-argument callback with
//! [`PlaybackEngine::subscribe`] and pull state through the accessors; they
//! are called on play, pause, stop and end transitions, never for time
//! progress.
//!
//! Only one track is current at a time. Starting a new load supersedes any
//! load still in flight; a superseded load finishes silently.

pub mod analyzer;
pub mod eq;
pub mod state;

use crate::config::EngineConfig;
use crate::decoder::{AudioDecoder, DecodedAudio};
use crate::error::{PlaybackError, Result};
use crate::presets::EqPreset;
use analyzer::Analyzer;
use bridge_traits::output::{AudioOutput, OutputFormat, RenderCallback};
use bridge_traits::storage::BlobStore;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use eq::{EqBand, EqBands, Equalizer};
use parking_lot::Mutex;
use state::{PlaybackSnapshot, TransportState};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

type Listener = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by [`PlaybackEngine::subscribe`].
///
/// Dropping the handle keeps the subscription; call
/// [`Subscription::unsubscribe`] to remove it.
pub struct Subscription {
    id: u64,
    shared: Weak<Shared>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.listeners.lock().remove(&self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Everything the render callback touches.
struct Shared {
    graph: Mutex<Graph>,
    listeners: Mutex<BTreeMap<u64, Listener>>,
    next_listener_id: AtomicU64,
}

impl Shared {
    /// Call every listener with no lock held.
    fn notify(&self) {
        let listeners: Vec<Listener> = self.listeners.lock().values().cloned().collect();
        for listener in listeners {
            listener();
        }
    }

    fn render(&self, out: &mut [f32], channels: u16, sample_rate: u32, bus: Option<&EventBus>) {
        let ended = self.graph.lock().render(out, channels, sample_rate);

        if let Some(track_id) = ended {
            debug!("Track {} reached end of media", track_id);
            if let Some(bus) = bus {
                let _ = bus.emit(CoreEvent::Playback(PlaybackEvent::Ended { track_id }));
            }
            self.notify();
        }
    }
}

/// Mutable engine state. Guarded by one lock so render never observes a
/// half-applied transition.
struct Graph {
    initialized: bool,
    state: TransportState,
    track_id: Option<String>,
    source: Option<DecodedAudio>,
    /// Read head in source frames; fractional while resampling
    position: f64,
    volume: f32,
    eq: Equalizer,
    analyzer: Analyzer,
    last_not_found: Option<String>,
}

impl Graph {
    fn new(config: &EngineConfig) -> Self {
        Self {
            initialized: false,
            state: TransportState::Idle,
            track_id: None,
            source: None,
            position: 0.0,
            volume: config.initial_volume,
            eq: Equalizer::new(config.eq_gain_limit_db),
            analyzer: Analyzer::new(
                config.analyzer_fft_size,
                config.analyzer_smoothing,
                config.analyzer_min_db,
                config.analyzer_max_db,
            ),
            last_not_found: None,
        }
    }

    fn source_frames(&self) -> usize {
        self.source.as_ref().map_or(0, DecodedAudio::frames)
    }

    fn current_time(&self) -> Duration {
        match &self.source {
            Some(source) if source.sample_rate > 0 => {
                Duration::from_secs_f64(self.position / source.sample_rate as f64)
            }
            _ => Duration::ZERO,
        }
    }

    fn duration(&self) -> Duration {
        self.source
            .as_ref()
            .map_or(Duration::ZERO, DecodedAudio::duration)
    }

    fn track_id(&self) -> String {
        self.track_id.clone().unwrap_or_default()
    }

    fn position_ms(&self) -> u64 {
        self.current_time().as_millis() as u64
    }

    fn unload(&mut self) {
        self.state = TransportState::Idle;
        self.track_id = None;
        self.source = None;
        self.position = 0.0;
    }

    fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            state: self.state,
            current_track_id: self.track_id.clone(),
            is_playing: self.state == TransportState::Playing,
            current_time: self.current_time(),
            duration: self.duration(),
            volume: self.volume,
            eq: self.eq.bands(),
        }
    }

    /// Fill `out` with interleaved frames. Returns the track id when the
    /// source ran out during this call.
    fn render(&mut self, out: &mut [f32], channels: u16, sample_rate: u32) -> Option<String> {
        out.fill(0.0);
        let channels = channels as usize;
        if channels == 0 || sample_rate == 0 {
            return None;
        }
        self.eq.prepare(sample_rate, channels);

        let mut ended = false;
        if self.state == TransportState::Playing {
            if let Some(source) = &self.source {
                let frames = source.frames();
                let step = source.sample_rate as f64 / sample_rate as f64;

                if frames > 0 {
                    for frame in out.chunks_exact_mut(channels) {
                        if self.position >= frames as f64 {
                            break;
                        }
                        let index = self.position as usize;
                        let next = (index + 1).min(frames - 1);
                        let frac = (self.position - index as f64) as f32;

                        for (channel, slot) in frame.iter_mut().enumerate() {
                            let a = source.sample(index, channel);
                            let b = source.sample(next, channel);
                            let sample = a + (b - a) * frac;
                            *slot = self.eq.process(sample, channel) * self.volume;
                        }
                        self.position += step;
                    }
                }

                ended = self.position >= frames as f64;
            }
        }

        self.analyzer.push_interleaved(out, channels);

        if ended {
            self.state = TransportState::Ended;
            self.position = self.source_frames() as f64;
            Some(self.track_id())
        } else {
            None
        }
    }
}

/// The audio playback engine.
///
/// Construct one per library and share it behind an `Arc`.
pub struct PlaybackEngine {
    config: EngineConfig,
    blobs: Arc<dyn BlobStore>,
    decoder: Arc<dyn AudioDecoder>,
    output: Arc<dyn AudioOutput>,
    event_bus: Option<EventBus>,
    shared: Arc<Shared>,
    init_lock: Mutex<()>,
    generation: AtomicU64,
}

impl PlaybackEngine {
    /// Create an engine. The output is not opened until the first
    /// `play_track`.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::InvalidConfig`] when `config` fails validation.
    pub fn new(
        config: EngineConfig,
        blobs: Arc<dyn BlobStore>,
        decoder: Arc<dyn AudioDecoder>,
        output: Arc<dyn AudioOutput>,
    ) -> Result<Self> {
        config.validate().map_err(PlaybackError::InvalidConfig)?;

        Ok(Self {
            shared: Arc::new(Shared {
                graph: Mutex::new(Graph::new(&config)),
                listeners: Mutex::new(BTreeMap::new()),
                next_listener_id: AtomicU64::new(0),
            }),
            config,
            blobs,
            decoder,
            output,
            event_bus: None,
            init_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        })
    }

    /// Set event bus for playback events.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Open the output once. Later calls are no-ops until `dispose`.
    fn ensure_initialized(&self) -> Result<()> {
        let _init = self.init_lock.lock();
        if self.shared.graph.lock().initialized {
            return Ok(());
        }

        let format = self.output.format();
        self.output
            .start(self.render_callback(format))
            .map_err(|e| PlaybackError::AudioDeviceUnavailable(e.to_string()))?;

        self.shared.graph.lock().initialized = true;
        info!(
            "Audio graph initialized ({} Hz, {} channels)",
            format.sample_rate, format.channels
        );
        Ok(())
    }

    fn render_callback(&self, format: OutputFormat) -> RenderCallback {
        let shared = Arc::downgrade(&self.shared);
        let bus = self.event_bus.clone();

        Box::new(move |out: &mut [f32]| match shared.upgrade() {
            Some(shared) => shared.render(out, format.channels, format.sample_rate, bus.as_ref()),
            None => out.fill(0.0),
        })
    }

    /// Whether the output has been opened.
    pub fn is_initialized(&self) -> bool {
        self.shared.graph.lock().initialized
    }

    /// Close the output, unload the track and drop every subscriber.
    ///
    /// Volume and EQ survive. The next `play_track` reopens the output.
    pub fn dispose(&self) {
        let _init = self.init_lock.lock();
        self.output.close();

        {
            let mut graph = self.shared.graph.lock();
            self.generation.fetch_add(1, Ordering::SeqCst);
            graph.unload();
            graph.initialized = false;
            graph.eq.reset();
            graph.analyzer.reset();
        }
        self.shared.listeners.lock().clear();

        info!("Playback engine disposed");
    }

    // ------------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------------

    /// Load and start `track_id` from the blob store.
    ///
    /// A no-op when `track_id` is already playing. A missing blob is not an
    /// error: the engine returns to `Idle`, publishes
    /// `PlaybackEvent::TrackNotFound` and notifies subscribers.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::AudioDeviceUnavailable`] when the output cannot open
    /// - storage or decoder failures; the engine is `Idle` afterwards
    #[instrument(skip(self))]
    pub async fn play_track(&self, track_id: &str) -> Result<()> {
        self.ensure_initialized()?;

        let generation = {
            let mut graph = self.shared.graph.lock();
            if graph.state == TransportState::Playing
                && graph.track_id.as_deref() == Some(track_id)
            {
                debug!("Track {} already playing", track_id);
                return Ok(());
            }

            graph.state = TransportState::Loading;
            graph.track_id = Some(track_id.to_string());
            graph.source = None;
            graph.position = 0.0;
            graph.last_not_found = None;
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        let bytes = match self.blobs.get(track_id).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                if self.abandon_load(generation, true) {
                    warn!("No stored audio for track {}", track_id);
                    self.publish(PlaybackEvent::TrackNotFound {
                        track_id: track_id.to_string(),
                    });
                    self.shared.notify();
                }
                return Ok(());
            }
            Err(e) => {
                if self.abandon_load(generation, false) {
                    self.shared.notify();
                }
                return Err(e.into());
            }
        };

        let decoder = Arc::clone(&self.decoder);
        let decoded = tokio::task::spawn_blocking(move || decoder.decode(bytes))
            .await
            .map_err(|e| PlaybackError::DecoderError(format!("decoder task failed: {}", e)))
            .and_then(|result| result);

        let audio = match decoded {
            Ok(audio) => audio,
            Err(e) => {
                warn!("Failed to decode track {}: {}", track_id, e);
                if self.abandon_load(generation, false) {
                    self.shared.notify();
                }
                return Err(e);
            }
        };

        let duration_ms = audio.duration().as_millis() as u64;
        {
            let mut graph = self.shared.graph.lock();
            if self.generation.load(Ordering::SeqCst) != generation {
                debug!("Load of {} superseded", track_id);
                return Ok(());
            }
            graph.source = Some(audio);
            graph.position = 0.0;
            graph.eq.reset();
            graph.state = TransportState::Playing;
        }

        info!("Playing track {} ({} ms)", track_id, duration_ms);
        self.publish(PlaybackEvent::Started {
            track_id: track_id.to_string(),
            duration_ms,
        });
        self.shared.notify();
        Ok(())
    }

    /// Return to `Idle` if `generation` is still the current load.
    fn abandon_load(&self, generation: u64, not_found: bool) -> bool {
        let mut graph = self.shared.graph.lock();
        if self.generation.load(Ordering::SeqCst) != generation {
            return false;
        }
        if not_found {
            graph.last_not_found = graph.track_id.clone();
        }
        graph.unload();
        true
    }

    /// Playing ↔ Paused. From `Ended`, restarts the track from 0.
    pub fn toggle_play_pause(&self) {
        let state = self.shared.graph.lock().state;
        match state {
            TransportState::Playing => self.pause(),
            TransportState::Paused | TransportState::Ended => self.resume(),
            TransportState::Idle | TransportState::Loading => {
                debug!("Toggle ignored while {}", state)
            }
        }
    }

    pub fn pause(&self) {
        let event = {
            let mut graph = self.shared.graph.lock();
            if graph.state != TransportState::Playing {
                return;
            }
            graph.state = TransportState::Paused;
            PlaybackEvent::Paused {
                track_id: graph.track_id(),
                position_ms: graph.position_ms(),
            }
        };
        self.publish(event);
        self.shared.notify();
    }

    /// Resume from `Paused`, or replay from 0 after `Ended`.
    pub fn resume(&self) {
        let event = {
            let mut graph = self.shared.graph.lock();
            match graph.state {
                TransportState::Paused => {
                    graph.state = TransportState::Playing;
                    PlaybackEvent::Resumed {
                        track_id: graph.track_id(),
                        position_ms: graph.position_ms(),
                    }
                }
                TransportState::Ended => {
                    graph.position = 0.0;
                    graph.eq.reset();
                    graph.state = TransportState::Playing;
                    PlaybackEvent::Started {
                        track_id: graph.track_id(),
                        duration_ms: graph.duration().as_millis() as u64,
                    }
                }
                _ => return,
            }
        };
        self.publish(event);
        self.shared.notify();
    }

    /// Pause and rewind to 0.
    pub fn stop(&self) {
        let event = {
            let mut graph = self.shared.graph.lock();
            if !graph.state.has_source() {
                return;
            }
            graph.state = TransportState::Paused;
            graph.position = 0.0;
            graph.eq.reset();
            PlaybackEvent::Stopped {
                track_id: graph.track_id(),
            }
        };
        self.publish(event);
        self.shared.notify();
    }

    /// Move the read head, clamped to the track length.
    ///
    /// Never resumes playback. Seeking before the end of an ended track
    /// moves it to `Paused`.
    pub fn seek(&self, position: Duration) {
        let left_ended = {
            let mut graph = self.shared.graph.lock();
            if !graph.state.has_source() {
                return;
            }
            let frames = graph.source_frames() as f64;
            let sample_rate = graph.source.as_ref().map_or(0, |s| s.sample_rate) as f64;
            let target = (position.as_secs_f64() * sample_rate).min(frames);
            graph.position = target;

            if graph.state == TransportState::Ended && target < frames {
                graph.state = TransportState::Paused;
                true
            } else {
                false
            }
        };

        if left_ended {
            self.shared.notify();
        }
    }

    // ------------------------------------------------------------------------
    // Gain and EQ
    // ------------------------------------------------------------------------

    /// Set linear volume, clamped to `[0, 1]`. Returns the applied value.
    pub fn set_volume(&self, volume: f32) -> f32 {
        let volume = if volume.is_nan() {
            0.0
        } else {
            volume.clamp(0.0, 1.0)
        };
        self.shared.graph.lock().volume = volume;
        self.publish(PlaybackEvent::VolumeChanged { volume });
        volume
    }

    /// Set all three bands, each clamped to the configured limit.
    pub fn set_eq_bands(&self, bass_db: f32, mid_db: f32, treble_db: f32) -> EqBands {
        self.apply_bands(EqBands::new(bass_db, mid_db, treble_db))
    }

    /// Set one band, leaving the others as they are.
    pub fn set_eq_band(&self, band: EqBand, gain_db: f32) -> EqBands {
        let bands = self.eq_bands().with(band, gain_db);
        self.apply_bands(bands)
    }

    pub fn apply_eq_preset(&self, preset: &EqPreset) -> EqBands {
        debug!("Applying EQ preset {}", preset.id);
        self.apply_bands(preset.bands)
    }

    fn apply_bands(&self, bands: EqBands) -> EqBands {
        let applied = self.shared.graph.lock().eq.set_bands(bands);
        self.publish(PlaybackEvent::EqChanged {
            bass_db: applied.bass_db,
            mid_db: applied.mid_db,
            treble_db: applied.treble_db,
        });
        applied
    }

    // ------------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------------

    /// Pull `out.len() / channels` interleaved frames through the chain.
    ///
    /// Outputs call this through the installed callback; hosts driving their
    /// own audio clock may call it directly.
    pub fn render(&self, out: &mut [f32], channels: u16, sample_rate: u32) {
        self.shared
            .render(out, channels, sample_rate, self.event_bus.as_ref());
    }

    /// Byte-scaled spectrum of the most recent output, one value per bin.
    /// All zeros before the engine is initialized.
    pub fn get_frequency_data(&self) -> Vec<u8> {
        let mut graph = self.shared.graph.lock();
        if !graph.initialized {
            return vec![0; self.config.frequency_bin_count()];
        }
        graph.analyzer.frequency_data()
    }

    // ------------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------------

    /// Register `listener` for play, pause, stop and end transitions.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.shared.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.shared.listeners.lock().insert(id, Arc::new(listener));
        Subscription {
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.listeners.lock().len()
    }

    pub fn state(&self) -> TransportState {
        self.shared.graph.lock().state
    }

    pub fn is_playing(&self) -> bool {
        self.state() == TransportState::Playing
    }

    pub fn current_track_id(&self) -> Option<String> {
        self.shared.graph.lock().track_id.clone()
    }

    pub fn current_time(&self) -> Duration {
        self.shared.graph.lock().current_time()
    }

    pub fn duration(&self) -> Duration {
        self.shared.graph.lock().duration()
    }

    pub fn volume(&self) -> f32 {
        self.shared.graph.lock().volume
    }

    pub fn eq_bands(&self) -> EqBands {
        self.shared.graph.lock().eq.bands()
    }

    /// Track id of the most recent load that found no stored audio.
    /// Cleared by the next `play_track`.
    pub fn last_not_found(&self) -> Option<String> {
        self.shared.graph.lock().last_not_found.clone()
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.shared.graph.lock().snapshot()
    }

    fn publish(&self, event: PlaybackEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Playback(event));
        }
    }
}
