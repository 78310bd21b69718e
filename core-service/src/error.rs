use core_auth::AuthError;
use core_library::{CatalogError, LibraryError};
use core_playback::{PlaybackError, PresetError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    /// The album or playlist has no downloaded tracks to play.
    #[error("Not downloaded: {0}")]
    NotDownloaded(String),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("Preset error: {0}")]
    Preset(#[from] PresetError),
}

impl From<core_runtime::Error> for ServiceError {
    fn from(err: core_runtime::Error) -> Self {
        match err {
            core_runtime::Error::Config(msg) => ServiceError::Config(msg),
            core_runtime::Error::CapabilityMissing {
                capability,
                message,
            } => ServiceError::CapabilityMissing {
                capability,
                message,
            },
            e @ core_runtime::Error::DefaultBridge { .. } => {
                ServiceError::InitializationFailed(e.to_string())
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_errors_keep_their_kind() {
        let err: ServiceError = core_runtime::Error::CapabilityMissing {
            capability: "HttpClient".into(),
            message: "inject one".into(),
        }
        .into();
        assert!(matches!(err, ServiceError::CapabilityMissing { .. }));

        let err: ServiceError = core_runtime::Error::Config("bad".into()).into();
        assert_eq!(err.to_string(), "Configuration error: bad");

        let err: ServiceError = core_runtime::Error::DefaultBridge {
            capability: "MetadataStore",
            source: bridge_traits::BridgeError::DatabaseError("locked".into()),
        }
        .into();
        match err {
            ServiceError::InitializationFailed(msg) => {
                assert!(msg.contains("MetadataStore"));
                assert!(msg.contains("locked"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_playback_errors_wrap() {
        let err: ServiceError = PlaybackError::StorageFull("disk".into()).into();
        assert!(matches!(
            err,
            ServiceError::Playback(PlaybackError::StorageFull(_))
        ));
    }
}
