//! # Offline Content & Playback Module
//!
//! Provides the offline content store and the audio playback engine.
//!
//! ## Overview
//!
//! This module handles:
//! - Downloading tracks, albums and playlists into the offline library
//! - Reference-checked deletion of shared tracks
//! - Audio decoding using symphonia (optional, feature-gated)
//! - A pull-based render chain with a three-band EQ, gain and analyzer
//! - EQ presets and the play queue used for collection playback

pub mod cache;
pub mod config;
pub mod decoder;
pub mod engine;
pub mod error;
pub mod output;
pub mod presets;
pub mod queue;

pub use cache::{CollectionDeletion, ContentManager, ContentManagerConfig};
pub use config::EngineConfig;
pub use decoder::{AudioDecoder, DecodedAudio};
#[cfg(feature = "core-decoder")]
pub use decoder::{FormatDetector, SymphoniaDecoder};
pub use engine::eq::{EqBand, EqBands};
pub use engine::state::{PlaybackSnapshot, TransportState};
pub use engine::{PlaybackEngine, Subscription};
pub use error::{PlaybackError, Result};
pub use output::{ManualOutput, NullOutput};
pub use presets::{EqPreset, PresetError, PresetRegistry};
pub use queue::Queue;
