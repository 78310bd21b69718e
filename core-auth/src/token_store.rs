//! Token persistence
//!
//! The current token is kept as one JSON document in the host metadata
//! store. Token values are never logged.

use std::sync::Arc;

use bridge_traits::storage::MetadataStore;
use tracing::{debug, warn};

use crate::error::{AuthError, Result};
use crate::types::Token;

/// Metadata key of the persisted token
pub const TOKEN_KEY: &str = "spotify_token";

#[derive(Clone)]
pub struct TokenStore {
    metadata: Arc<dyn MetadataStore>,
}

impl TokenStore {
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata }
    }

    pub async fn save(&self, token: &Token) -> Result<()> {
        let value = serde_json::to_value(token)
            .map_err(|e| AuthError::InvalidToken(format!("Failed to encode token: {}", e)))?;
        self.metadata
            .set(TOKEN_KEY, value)
            .await
            .map_err(|e| AuthError::Storage(format!("Failed to persist token: {}", e)))?;
        debug!("Persisted token");
        Ok(())
    }

    /// Load the persisted token. A document that does not decode is treated
    /// as absent.
    pub async fn load(&self) -> Result<Option<Token>> {
        let value = self
            .metadata
            .get(TOKEN_KEY)
            .await
            .map_err(|e| AuthError::Storage(format!("Failed to read token: {}", e)))?;

        Ok(value.and_then(|v| match serde_json::from_value(v) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable persisted token");
                None
            }
        }))
    }

    pub async fn delete(&self) -> Result<()> {
        self.metadata
            .remove(TOKEN_KEY)
            .await
            .map_err(|e| AuthError::Storage(format!("Failed to delete token: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::memory::MemoryMetadataStore;

    #[tokio::test]
    async fn test_save_load_delete() {
        let store = TokenStore::new(Arc::new(MemoryMetadataStore::new()));
        assert!(store.load().await.unwrap().is_none());

        let token = Token::new("a", Some("r".into()), 0, 3600);
        store.save(&token).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(token));

        store.delete().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_garbage_document_reads_as_absent() {
        let metadata = Arc::new(MemoryMetadataStore::new());
        metadata
            .set(TOKEN_KEY, serde_json::json!("not a token"))
            .await
            .unwrap();

        let store = TokenStore::new(metadata);
        assert!(store.load().await.unwrap().is_none());
    }
}
