//! # Playback Error Types
//!
//! Error taxonomy shared by the content manager and the playback engine.

use core_library::error::{CatalogError, LibraryError};
use thiserror::Error;

/// Errors that can occur during content and playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Content Errors
    // ========================================================================
    /// The referenced remote id does not exist upstream.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Upstream fetch failed. The caller may retry.
    #[error("Network failure: {0}")]
    NetworkFailure(String),

    /// The host ran out of storage. No eviction is attempted.
    #[error("Storage full: {0}")]
    StorageFull(String),

    /// The token collaborator could not supply a valid token.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Stored state contradicts itself, e.g. an indexed track without a blob.
    /// Repair by re-downloading or dropping the reference.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Host storage failed for a reason other than space.
    #[error("Storage error: {0}")]
    Storage(String),

    // ========================================================================
    // Format/Codec Errors
    // ========================================================================
    /// Audio format is not recognized or cannot be parsed.
    #[error("Unsupported or invalid audio format: {0}")]
    InvalidFormat(String),

    /// Codec is not supported by the decoder.
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// Decoder encountered an internal error.
    #[error("Decoder error: {0}")]
    DecoderError(String),

    // ========================================================================
    // Platform Errors
    // ========================================================================
    /// Platform audio device is unavailable.
    #[error("Audio device unavailable: {0}")]
    AudioDeviceUnavailable(String),

    /// A component was configured with out-of-range values.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PlaybackError {
    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::NetworkFailure(_) | PlaybackError::AudioDeviceUnavailable(_)
        )
    }

    /// Returns `true` if this error came from host storage.
    pub fn is_storage_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::StorageFull(_) | PlaybackError::Storage(_)
        )
    }

    /// Returns `true` if this error is related to audio format/codec issues.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::InvalidFormat(_)
                | PlaybackError::UnsupportedCodec(_)
                | PlaybackError::DecoderError(_)
        )
    }
}

impl From<LibraryError> for PlaybackError {
    fn from(err: LibraryError) -> Self {
        match err {
            LibraryError::StorageFull(msg) => PlaybackError::StorageFull(msg),
            LibraryError::Storage(e) => PlaybackError::Storage(e.to_string()),
            LibraryError::Serialization(e) => {
                PlaybackError::InvariantViolation(format!("corrupt library record: {}", e))
            }
            LibraryError::InvariantViolation(msg) => PlaybackError::InvariantViolation(msg),
        }
    }
}

impl From<CatalogError> for PlaybackError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(msg) => PlaybackError::NotFound(msg),
            CatalogError::Network(msg) => PlaybackError::NetworkFailure(msg),
            CatalogError::Unauthenticated(msg) => PlaybackError::Unauthenticated(msg),
            CatalogError::StorageFull(msg) => PlaybackError::StorageFull(msg),
            CatalogError::InvalidResponse(msg) => {
                PlaybackError::NetworkFailure(format!("invalid upstream response: {}", msg))
            }
        }
    }
}

impl From<bridge_traits::BridgeError> for PlaybackError {
    fn from(err: bridge_traits::BridgeError) -> Self {
        if err.is_storage_full() {
            PlaybackError::StorageFull(err.to_string())
        } else {
            PlaybackError::Storage(err.to_string())
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::BridgeError;

    #[test]
    fn test_catalog_errors_map_to_taxonomy() {
        assert!(matches!(
            PlaybackError::from(CatalogError::NotFound("album x".into())),
            PlaybackError::NotFound(_)
        ));
        assert!(matches!(
            PlaybackError::from(CatalogError::Unauthenticated("expired".into())),
            PlaybackError::Unauthenticated(_)
        ));
        let err = PlaybackError::from(CatalogError::Network("reset".into()));
        assert!(err.is_transient());
    }

    #[test]
    fn test_storage_full_survives_library_layer() {
        let lib: LibraryError = BridgeError::StorageFull("quota".into()).into();
        let err = PlaybackError::from(lib);
        assert!(matches!(err, PlaybackError::StorageFull(_)));
        assert!(err.is_storage_error());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_corrupt_record_is_invariant_violation() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err = PlaybackError::from(LibraryError::Serialization(json_err));
        assert!(matches!(err, PlaybackError::InvariantViolation(_)));
    }
}
