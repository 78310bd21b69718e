use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Storage quota exceeded: {0}")]
    StorageFull(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether the failure was caused by the host running out of space.
    pub fn is_storage_full(&self) -> bool {
        match self {
            BridgeError::StorageFull(_) => true,
            BridgeError::Io(e) => e.kind() == std::io::ErrorKind::StorageFull,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
