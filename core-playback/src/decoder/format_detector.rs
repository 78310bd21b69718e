//! # Format Detection
//!
//! Probe hints from leading magic bytes. Blobs carry no file name or MIME
//! type, so the header is the only hint available.

use symphonia::core::codecs::{self, CodecType};
use symphonia::core::probe::Hint;
use tracing::debug;

pub struct FormatDetector;

impl FormatDetector {
    /// Container extension recognised from the first bytes of `data`.
    pub fn sniff_extension(data: &[u8]) -> Option<&'static str> {
        let extension = match data {
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'A', b'V', b'E', ..] => "wav",
            [b'f', b'L', b'a', b'C', ..] => "flac",
            [b'O', b'g', b'g', b'S', ..] => "ogg",
            [b'I', b'D', b'3', ..] => "mp3",
            [_, _, _, _, b'f', b't', b'y', b'p', ..] => "m4a",
            [0xFF, second, ..] if second & 0xF6 == 0xF0 => "aac",
            [0xFF, second, ..] if second & 0xE0 == 0xE0 => "mp3",
            _ => return None,
        };
        Some(extension)
    }

    /// Probe hint for `data`. Empty when nothing is recognised; the probe
    /// then tries every registered reader.
    pub fn hint_from_bytes(data: &[u8]) -> Hint {
        let mut hint = Hint::new();

        match Self::sniff_extension(data) {
            Some(extension) => {
                debug!("Setting probe hint extension: {}", extension);
                hint.with_extension(extension);
            }
            None => debug!("No recognised header, probe will auto-detect"),
        }

        hint
    }

    /// Short codec name for logs and error messages.
    pub fn codec_name(codec_type: CodecType) -> &'static str {
        match codec_type {
            codecs::CODEC_TYPE_MP3 => "mp3",
            codecs::CODEC_TYPE_AAC => "aac",
            codecs::CODEC_TYPE_FLAC => "flac",
            codecs::CODEC_TYPE_VORBIS => "vorbis",
            codecs::CODEC_TYPE_OPUS => "opus",
            codecs::CODEC_TYPE_ALAC => "alac",
            codecs::CODEC_TYPE_PCM_S16LE
            | codecs::CODEC_TYPE_PCM_S16BE
            | codecs::CODEC_TYPE_PCM_S24LE
            | codecs::CODEC_TYPE_PCM_S24BE
            | codecs::CODEC_TYPE_PCM_S32LE
            | codecs::CODEC_TYPE_PCM_S32BE
            | codecs::CODEC_TYPE_PCM_F32LE
            | codecs::CODEC_TYPE_PCM_F32BE
            | codecs::CODEC_TYPE_PCM_F64LE
            | codecs::CODEC_TYPE_PCM_F64BE
            | codecs::CODEC_TYPE_PCM_U8 => "pcm",
            _ => "unknown",
        }
    }
}
