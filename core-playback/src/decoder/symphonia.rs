//! Symphonia-backed decoder for stored blobs.

use super::format_detector::FormatDetector;
use super::{AudioDecoder, DecodedAudio};
use crate::error::{PlaybackError, Result};
use bytes::Bytes;
use std::io::Cursor;
use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use tracing::{debug, error, info, instrument, warn};

const DEFAULT_MAX_CONSECUTIVE_ERRORS: usize = 10;

/// Decodes a whole in-memory payload with symphonia.
///
/// Corrupt packets are skipped; decoding gives up after
/// `max_consecutive_errors` bad packets in a row.
#[derive(Debug, Clone)]
pub struct SymphoniaDecoder {
    max_consecutive_errors: usize,
}

impl Default for SymphoniaDecoder {
    fn default() -> Self {
        Self {
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
        }
    }
}

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_consecutive_errors(mut self, max: usize) -> Self {
        self.max_consecutive_errors = max.max(1);
        self
    }
}

impl AudioDecoder for SymphoniaDecoder {
    #[instrument(skip(self, data), fields(bytes = data.len()))]
    fn decode(&self, data: Bytes) -> Result<DecodedAudio> {
        if data.is_empty() {
            return Err(PlaybackError::InvalidFormat("empty payload".to_string()));
        }

        let hint = FormatDetector::hint_from_bytes(&data);
        let mss = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| {
                error!("Format probe failed: {}", e);
                PlaybackError::InvalidFormat(format!("Failed to probe format: {}", e))
            })?;
        let mut reader = probed.format;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| PlaybackError::InvalidFormat("No audio track found".to_string()))?;

        let track_id = track.id;
        let codec_name = FormatDetector::codec_name(track.codec_params.codec);
        let mut sample_rate = track.codec_params.sample_rate;
        // Some containers only report channels after the first packet.
        let mut channels = track.codec_params.channels.map(|c| c.count() as u16);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| {
                PlaybackError::UnsupportedCodec(format!("{}: {}", codec_name, e))
            })?;
        debug!("Decoding {} stream", codec_name);

        let mut samples: Vec<f32> = Vec::new();
        let mut buffer: Option<(SampleBuffer<f32>, SignalSpec, usize)> = None;
        let mut consecutive_errors = 0;

        loop {
            let packet = match reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => {
                    return Err(PlaybackError::DecoderError(
                        "Track list changed mid-stream".to_string(),
                    ));
                }
                Err(e) => {
                    return Err(PlaybackError::DecoderError(format!(
                        "Failed to read packet: {}",
                        e
                    )));
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    consecutive_errors = 0;

                    let spec = *decoded.spec();
                    let capacity = decoded.capacity();
                    channels = Some(spec.channels.count() as u16);
                    sample_rate = Some(spec.rate);

                    let reusable = matches!(
                        &buffer,
                        Some((_, s, c)) if *s == spec && *c >= capacity
                    );
                    if !reusable {
                        buffer = Some((SampleBuffer::new(capacity as u64, spec), spec, capacity));
                    }

                    if let Some((buf, _, _)) = buffer.as_mut() {
                        buf.copy_interleaved_ref(decoded);
                        samples.extend_from_slice(buf.samples());
                    }
                }
                Err(err @ (SymphoniaError::DecodeError(_) | SymphoniaError::IoError(_)))
                    if consecutive_errors + 1 < self.max_consecutive_errors =>
                {
                    consecutive_errors += 1;
                    warn!(
                        "Skipping corrupt packet ({}/{}): {}",
                        consecutive_errors, self.max_consecutive_errors, err
                    );
                }
                Err(e) => {
                    error!("Decoding gave up: {}", e);
                    return Err(PlaybackError::DecoderError(format!(
                        "Failed to decode packet: {}",
                        e
                    )));
                }
            }
        }

        let channels = channels
            .filter(|c| *c > 0)
            .ok_or_else(|| PlaybackError::InvalidFormat("Missing channel layout".to_string()))?;
        let sample_rate = sample_rate
            .filter(|r| *r > 0)
            .ok_or_else(|| PlaybackError::InvalidFormat("Missing sample rate".to_string()))?;

        if samples.is_empty() {
            return Err(PlaybackError::InvalidFormat(
                "Stream contains no audio frames".to_string(),
            ));
        }

        let audio = DecodedAudio::new(samples, channels, sample_rate);
        info!(
            "Decoded {} frames ({}Hz, {} channels, {:?})",
            audio.frames(),
            sample_rate,
            channels,
            audio.duration()
        );
        Ok(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav(sample_rate: u32, channels: u16, samples: &[i16]) -> Bytes {
        let data_len = (samples.len() * 2) as u32;
        let mut out = Vec::with_capacity(44 + data_len as usize);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVEfmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * channels as u32 * 2).to_le_bytes());
        out.extend_from_slice(&(channels * 2).to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for s in samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        Bytes::from(out)
    }

    #[test]
    fn test_decode_wav_from_memory() {
        let samples: Vec<i16> = (0..8_000).map(|i| ((i % 100) * 300) as i16).collect();
        let audio = SymphoniaDecoder::new()
            .decode(wav(8_000, 2, &samples))
            .unwrap();

        assert_eq!(audio.channels, 2);
        assert_eq!(audio.sample_rate, 8_000);
        assert_eq!(audio.frames(), 4_000);
        assert!(audio.samples.iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn test_garbage_is_invalid_format() {
        let err = SymphoniaDecoder::new()
            .decode(Bytes::from_static(b"definitely not audio"))
            .unwrap_err();
        assert!(matches!(err, PlaybackError::InvalidFormat(_)));
    }

    #[test]
    fn test_empty_payload_rejected() {
        let err = SymphoniaDecoder::new().decode(Bytes::new()).unwrap_err();
        assert!(matches!(err, PlaybackError::InvalidFormat(_)));
    }
}
