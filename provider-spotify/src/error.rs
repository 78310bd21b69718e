//! Error types for the catalog provider

use core_auth::AuthError;
use core_library::CatalogError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpotifyError {
    /// The API answered 404 for the resource
    #[error("Not found: {0}")]
    NotFound(String),

    /// Token missing, expired or rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Rate limit exceeded, retry after {retry_after_seconds} seconds")]
    RateLimited { retry_after_seconds: u64 },

    #[error("API error (status {status_code}): {message}")]
    Api { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Http(String),

    #[error("Failed to parse API response: {0}")]
    Parse(String),

    /// The track exposes no downloadable audio
    #[error("Track {0} has no preview audio")]
    NoPreview(String),

    #[error("Storage full: {0}")]
    StorageFull(String),
}

pub type Result<T> = std::result::Result<T, SpotifyError>;

impl From<AuthError> for SpotifyError {
    fn from(error: AuthError) -> Self {
        SpotifyError::Unauthorized(error.to_string())
    }
}

impl From<bridge_traits::error::BridgeError> for SpotifyError {
    fn from(error: bridge_traits::error::BridgeError) -> Self {
        if error.is_storage_full() {
            SpotifyError::StorageFull(error.to_string())
        } else {
            SpotifyError::Http(error.to_string())
        }
    }
}

impl From<SpotifyError> for CatalogError {
    fn from(error: SpotifyError) -> Self {
        match error {
            SpotifyError::NotFound(msg) => CatalogError::NotFound(msg),
            SpotifyError::NoPreview(id) => {
                CatalogError::NotFound(format!("Track {} has no preview audio", id))
            }
            SpotifyError::Unauthorized(msg) => CatalogError::Unauthenticated(msg),
            SpotifyError::StorageFull(msg) => CatalogError::StorageFull(msg),
            SpotifyError::Parse(msg) => CatalogError::InvalidResponse(msg),
            e @ (SpotifyError::RateLimited { .. }
            | SpotifyError::Api { .. }
            | SpotifyError::Http(_)) => CatalogError::Network(e.to_string()),
        }
    }
}
