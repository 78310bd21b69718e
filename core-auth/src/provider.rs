//! Bearer token supply for catalog and download calls
//!
//! Callers ask a [`TokenProvider`] for a usable access token on every
//! request. Expiry is handled inside the provider; callers only see
//! `Unauthenticated` when no valid token can be produced.

use std::sync::Arc;

use async_trait::async_trait;
use bridge_traits::time::Clock;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{AuthError, Result};
use crate::oauth::OAuthClient;
use crate::pkce::PkceSession;
use crate::token_store::TokenStore;
use crate::types::Token;

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return an access token valid for at least the expiry buffer.
    ///
    /// # Errors
    ///
    /// `Unauthenticated` when no token exists or it cannot be refreshed.
    async fn access_token(&self) -> Result<String>;
}

/// Fixed token, for tests and hosts that manage tokens themselves.
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: Option<String>,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// Provider that always fails with `Unauthenticated`.
    pub fn unauthenticated() -> Self {
        Self { token: None }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String> {
        self.token
            .clone()
            .ok_or_else(|| AuthError::Unauthenticated("Not authenticated".to_string()))
    }
}

/// Holds the signed-in token and refreshes it before it expires.
///
/// Concurrent callers share one refresh: the token slot is locked for the
/// duration of the check-and-refresh.
pub struct RefreshingTokenProvider {
    oauth: OAuthClient,
    clock: Arc<dyn Clock>,
    token: Mutex<Option<Token>>,
    store: Option<TokenStore>,
    event_bus: Option<EventBus>,
}

impl RefreshingTokenProvider {
    pub fn new(oauth: OAuthClient, clock: Arc<dyn Clock>) -> Self {
        Self {
            oauth,
            clock,
            token: Mutex::new(None),
            store: None,
            event_bus: None,
        }
    }

    /// Persist tokens through `store` and restore from it on [`restore`](Self::restore).
    pub fn with_store(mut self, store: TokenStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn oauth(&self) -> &OAuthClient {
        &self.oauth
    }

    /// Load a previously persisted token. Returns whether one was found.
    pub async fn restore(&self) -> Result<bool> {
        let Some(store) = &self.store else {
            return Ok(false);
        };

        let restored = store.load().await?;
        let found = restored.is_some();
        *self.token.lock().await = restored;
        debug!(found, "Restored persisted token");
        Ok(found)
    }

    /// Replace the current token.
    pub async fn set_token(&self, token: Token) -> Result<()> {
        if let Some(store) = &self.store {
            store.save(&token).await?;
        }
        *self.token.lock().await = Some(token);
        Ok(())
    }

    /// Finish a sign-in started with [`OAuthClient::begin_authorization`].
    #[instrument(skip_all)]
    pub async fn complete_sign_in(
        &self,
        code: &str,
        state: &str,
        session: &PkceSession,
    ) -> Result<()> {
        let token = self.oauth.exchange_code(code, state, session).await?;
        self.set_token(token).await?;
        info!("Signed in");
        Ok(())
    }

    #[instrument(skip_all)]
    pub async fn sign_out(&self) -> Result<()> {
        self.token.lock().await.take();
        if let Some(store) = &self.store {
            store.delete().await?;
        }
        self.emit(AuthEvent::SignedOut);
        info!("Signed out");
        Ok(())
    }

    /// Whether a token exists and has not passed its expiry.
    pub async fn is_authenticated(&self) -> bool {
        let now = self.clock.unix_timestamp_millis();
        self.token
            .lock()
            .await
            .as_ref()
            .is_some_and(|t| t.is_valid_at(now))
    }

    fn emit(&self, event: AuthEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Auth(event));
        }
    }

    async fn drop_token(&self, slot: &mut Option<Token>) {
        slot.take();
        if let Some(store) = &self.store {
            if let Err(e) = store.delete().await {
                warn!(error = %e, "Failed to delete persisted token");
            }
        }
    }
}

#[async_trait]
impl TokenProvider for RefreshingTokenProvider {
    #[instrument(skip(self))]
    async fn access_token(&self) -> Result<String> {
        let mut slot = self.token.lock().await;
        let now = self.clock.unix_timestamp_millis();

        let current = match slot.as_ref() {
            Some(token) => token.clone(),
            None => return Err(AuthError::Unauthenticated("Not authenticated".to_string())),
        };

        if !current.is_expired(now) {
            return Ok(current.access_token);
        }

        let Some(refresh_token) = current.refresh_token.as_deref() else {
            warn!("Token expired with no refresh token");
            self.drop_token(&mut slot).await;
            return Err(AuthError::Unauthenticated(
                "Token expired and refresh failed".to_string(),
            ));
        };

        debug!("Token expiring, refreshing");
        match self.oauth.refresh(refresh_token).await {
            Ok(fresh) => {
                if let Some(store) = &self.store {
                    store.save(&fresh).await?;
                }
                self.emit(AuthEvent::TokenRefreshed {
                    expires_at: fresh.expires_at,
                });
                let access = fresh.access_token.clone();
                *slot = Some(fresh);
                Ok(access)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, signing out");
                self.drop_token(&mut slot).await;
                self.emit(AuthEvent::AuthError {
                    message: format!("Token refresh failed: {}", e),
                    recoverable: false,
                });
                Err(AuthError::Unauthenticated(
                    "Token expired and refresh failed".to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OAuthConfig;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
    use bridge_traits::memory::MemoryMetadataStore;
    use bridge_traits::time::ManualClock;
    use mockall::mock;

    mock! {
        Http {}

        #[async_trait::async_trait]
        impl HttpClient for Http {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse::new(status, body.to_string())
    }

    fn provider(http: MockHttp, clock: Arc<ManualClock>) -> RefreshingTokenProvider {
        let oauth = OAuthClient::new(
            OAuthConfig::spotify("client", "http://localhost/cb"),
            Arc::new(http),
            clock.clone(),
        );
        RefreshingTokenProvider::new(oauth, clock)
    }

    #[tokio::test]
    async fn test_static_provider() {
        assert_eq!(StaticTokenProvider::new("t").access_token().await.unwrap(), "t");
        assert!(matches!(
            StaticTokenProvider::unauthenticated().access_token().await,
            Err(AuthError::Unauthenticated(_))
        ));
    }

    #[tokio::test]
    async fn test_no_token_is_unauthenticated() {
        let clock = Arc::new(ManualClock::from_millis(0));
        let provider = provider(MockHttp::new(), clock);

        let err = provider.access_token().await.unwrap_err();
        assert_eq!(err, AuthError::Unauthenticated("Not authenticated".into()));
    }

    #[tokio::test]
    async fn test_fresh_token_returned_without_refresh() {
        let clock = Arc::new(ManualClock::from_millis(0));
        let mut http = MockHttp::new();
        http.expect_execute().never();

        let provider = provider(http, clock);
        provider
            .set_token(Token::new("live", Some("r".into()), 0, 3600))
            .await
            .unwrap();

        assert_eq!(provider.access_token().await.unwrap(), "live");
        assert!(provider.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_refresh_inside_buffer_emits_event() {
        let clock = Arc::new(ManualClock::from_millis(0));
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(response(200, r#"{"access_token":"fresh","expires_in":3600}"#)));

        let bus = EventBus::new(8);
        let mut events = bus.subscribe();
        let store = TokenStore::new(Arc::new(MemoryMetadataStore::new()));
        let provider = provider(http, clock.clone())
            .with_event_bus(bus)
            .with_store(store.clone());

        provider
            .set_token(Token::new("stale", Some("r".into()), 0, 3600))
            .await
            .unwrap();
        // 30 seconds before expiry, inside the 60 second buffer
        clock.advance(chrono::Duration::seconds(3570));

        assert_eq!(provider.access_token().await.unwrap(), "fresh");

        let persisted = store.load().await.unwrap().unwrap();
        assert_eq!(persisted.access_token, "fresh");
        assert_eq!(persisted.refresh_token.as_deref(), Some("r"));
        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Auth(AuthEvent::TokenRefreshed { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_refresh_clears_token() {
        let clock = Arc::new(ManualClock::from_millis(0));
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(response(400, r#"{"error":"invalid_grant"}"#)));

        let store = TokenStore::new(Arc::new(MemoryMetadataStore::new()));
        let provider = provider(http, clock.clone()).with_store(store.clone());
        provider
            .set_token(Token::new("old", Some("r".into()), 0, 10))
            .await
            .unwrap();
        clock.advance(chrono::Duration::seconds(20));

        let err = provider.access_token().await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated(_)));
        assert!(store.load().await.unwrap().is_none());

        // Slot stays empty; no second refresh attempt
        let err = provider.access_token().await.unwrap_err();
        assert_eq!(err, AuthError::Unauthenticated("Not authenticated".into()));
    }

    #[tokio::test]
    async fn test_restore_and_sign_out() {
        let clock = Arc::new(ManualClock::from_millis(0));
        let metadata = Arc::new(MemoryMetadataStore::new());
        let store = TokenStore::new(metadata);
        store
            .save(&Token::new("saved", None, 0, 3600))
            .await
            .unwrap();

        let provider = provider(MockHttp::new(), clock).with_store(store.clone());
        assert!(provider.restore().await.unwrap());
        assert_eq!(provider.access_token().await.unwrap(), "saved");

        provider.sign_out().await.unwrap();
        assert!(!provider.is_authenticated().await);
        assert!(store.load().await.unwrap().is_none());
    }
}
