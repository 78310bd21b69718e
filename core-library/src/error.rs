use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Storage error: {0}")]
    Storage(BridgeError),

    #[error("Storage full: {0}")]
    StorageFull(String),

    #[error("Corrupt record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Library invariant violated: {0}")]
    InvariantViolation(String),
}

impl From<BridgeError> for LibraryError {
    fn from(err: BridgeError) -> Self {
        if err.is_storage_full() {
            LibraryError::StorageFull(err.to_string())
        } else {
            LibraryError::Storage(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;

/// Failures reported by catalog and upstream audio collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Network failure: {0}")]
    Network(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Storage full: {0}")]
    StorageFull(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;
