use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Not authenticated: {0}")]
    Unauthenticated(String),

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("OAuth state mismatch")]
    StateMismatch,

    #[error("Invalid OAuth configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Token storage error: {0}")]
    Storage(String),
}

impl AuthError {
    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::Http(_))
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
