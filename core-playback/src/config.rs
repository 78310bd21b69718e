//! # Engine Configuration
//!
//! Tunables for the playback engine's gain stage, equalizer and analyzer.

use core_runtime::config::PlaybackSettings;
use serde::{Deserialize, Serialize};

/// Playback engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Linear volume applied when the engine is created.
    ///
    /// Default: 0.8.
    #[serde(default = "default_initial_volume")]
    pub initial_volume: f32,

    /// EQ band gains are clamped to `±eq_gain_limit_db`.
    ///
    /// Default: 12 dB.
    #[serde(default = "default_eq_gain_limit_db")]
    pub eq_gain_limit_db: f32,

    /// Analyzer FFT length. `get_frequency_data` returns half as many bins.
    ///
    /// Default: 256.
    #[serde(default = "default_analyzer_fft_size")]
    pub analyzer_fft_size: usize,

    /// Weight of the previous analyzer frame, in `[0, 1)`.
    ///
    /// Default: 0.8.
    #[serde(default = "default_analyzer_smoothing")]
    pub analyzer_smoothing: f32,

    /// Magnitude mapped to byte 0.
    ///
    /// Default: -100 dB.
    #[serde(default = "default_analyzer_min_db")]
    pub analyzer_min_db: f32,

    /// Magnitude mapped to byte 255.
    ///
    /// Default: -30 dB.
    #[serde(default = "default_analyzer_max_db")]
    pub analyzer_max_db: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_volume: default_initial_volume(),
            eq_gain_limit_db: default_eq_gain_limit_db(),
            analyzer_fft_size: default_analyzer_fft_size(),
            analyzer_smoothing: default_analyzer_smoothing(),
            analyzer_min_db: default_analyzer_min_db(),
            analyzer_max_db: default_analyzer_max_db(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial_volume(mut self, volume: f32) -> Self {
        self.initial_volume = volume;
        self
    }

    pub fn with_eq_gain_limit_db(mut self, limit: f32) -> Self {
        self.eq_gain_limit_db = limit;
        self
    }

    pub fn with_analyzer_fft_size(mut self, size: usize) -> Self {
        self.analyzer_fft_size = size;
        self
    }

    pub fn with_analyzer_smoothing(mut self, smoothing: f32) -> Self {
        self.analyzer_smoothing = smoothing;
        self
    }

    pub fn with_analyzer_db_range(mut self, min_db: f32, max_db: f32) -> Self {
        self.analyzer_min_db = min_db;
        self.analyzer_max_db = max_db;
        self
    }

    /// Number of bins returned by the analyzer.
    pub fn frequency_bin_count(&self) -> usize {
        self.analyzer_fft_size / 2
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.initial_volume) {
            return Err(format!(
                "initial_volume must be within [0, 1], got {}",
                self.initial_volume
            ));
        }

        if !(self.eq_gain_limit_db > 0.0) {
            return Err("eq_gain_limit_db must be positive".to_string());
        }

        let fft = self.analyzer_fft_size;
        if !fft.is_power_of_two() || !(32..=32_768).contains(&fft) {
            return Err(format!(
                "analyzer_fft_size must be a power of two in 32..=32768, got {}",
                fft
            ));
        }

        if !(0.0..1.0).contains(&self.analyzer_smoothing) {
            return Err("analyzer_smoothing must be within [0, 1)".to_string());
        }

        if self.analyzer_min_db >= self.analyzer_max_db {
            return Err("analyzer_min_db must be below analyzer_max_db".to_string());
        }

        Ok(())
    }
}

impl From<PlaybackSettings> for EngineConfig {
    fn from(settings: PlaybackSettings) -> Self {
        Self {
            initial_volume: settings.initial_volume,
            eq_gain_limit_db: settings.eq_gain_limit_db,
            analyzer_fft_size: settings.analyzer_fft_size,
            analyzer_smoothing: settings.analyzer_smoothing,
            ..Self::default()
        }
    }
}

fn default_initial_volume() -> f32 {
    0.8
}

fn default_eq_gain_limit_db() -> f32 {
    12.0
}

fn default_analyzer_fft_size() -> usize {
    256
}

fn default_analyzer_smoothing() -> f32 {
    0.8
}

fn default_analyzer_min_db() -> f32 {
    -100.0
}

fn default_analyzer_max_db() -> f32 {
    -30.0
}
