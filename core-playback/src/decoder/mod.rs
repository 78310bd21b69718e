//! # Audio Decoder Module
//!
//! Turns a stored blob into PCM the engine can render.
//!
//! Blobs are short and already local, so they are decoded whole into memory
//! rather than streamed. The engine owns the decoded buffer for the lifetime
//! of the loaded track.
//!
//! ## Supported Formats
//!
//! With the `core-decoder` feature the [`SymphoniaDecoder`] handles every
//! container and codec symphonia's `all` bundle enables: MP3, AAC/M4A, FLAC,
//! Vorbis, ALAC and WAV.
//!
//! ```text
//! Bytes → MediaSourceStream → FormatReader → Decoder → DecodedAudio
//! ```

#[cfg(feature = "core-decoder")]
mod format_detector;
#[cfg(feature = "core-decoder")]
mod symphonia;

#[cfg(feature = "core-decoder")]
pub use self::format_detector::FormatDetector;
#[cfg(feature = "core-decoder")]
pub use self::symphonia::SymphoniaDecoder;

use crate::error::Result;
use bytes::Bytes;
use std::time::Duration;

/// Interleaved `f32` PCM for one whole track.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Interleaved samples in `[-1, 1]`
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples,
            channels,
            sample_rate,
        }
    }

    /// Number of sample frames.
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
        }
    }

    /// Sample of `channel` at `frame`, folding extra output channels onto the
    /// last source channel.
    pub(crate) fn sample(&self, frame: usize, channel: usize) -> f32 {
        let channels = self.channels as usize;
        if channels == 0 {
            return 0.0;
        }
        let channel = channel.min(channels - 1);
        self.samples
            .get(frame * channels + channel)
            .copied()
            .unwrap_or(0.0)
    }
}

/// Decodes a complete encoded payload.
///
/// Runs on a blocking thread; implementations may take as long as decoding
/// the whole file takes.
pub trait AudioDecoder: Send + Sync {
    fn decode(&self, data: Bytes) -> Result<DecodedAudio>;
}
