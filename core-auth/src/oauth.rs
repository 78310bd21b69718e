//! OAuth 2.0 authorization code flow with PKCE
//!
//! Exchanges authorization codes and refresh tokens at the token endpoint.
//! Token values, codes and verifiers are never logged.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::time::Clock;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::error::{AuthError, Result};
use crate::pkce::{authorization_url, PkceSession};
use crate::types::{OAuthConfig, Token, TokenResponse};

const MAX_REFRESH_ATTEMPTS: u32 = 3;

/// Talks to the authorization server for one client registration.
pub struct OAuthClient {
    config: OAuthConfig,
    http_client: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
}

impl OAuthClient {
    pub fn new(config: OAuthConfig, http_client: Arc<dyn HttpClient>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            http_client,
            clock,
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Start a sign-in: returns the URL to visit and the session to keep
    /// until the callback arrives.
    pub fn begin_authorization(&self) -> Result<(String, PkceSession)> {
        let session = PkceSession::new();
        let url = authorization_url(&self.config, &session)?;
        debug!("Built authorization URL");
        Ok((url, session))
    }

    /// Exchange the callback's `code` for a token.
    ///
    /// # Errors
    ///
    /// - `StateMismatch` when `state` differs from the session's state
    /// - `Http` on transport failure
    /// - `Unauthenticated` when the endpoint rejects the code
    #[instrument(skip(self, code, state, session))]
    pub async fn exchange_code(
        &self,
        code: &str,
        state: &str,
        session: &PkceSession,
    ) -> Result<Token> {
        if state.is_empty() || state != session.state() {
            warn!("OAuth state mismatch on callback");
            return Err(AuthError::StateMismatch);
        }

        let mut params = HashMap::new();
        params.insert("client_id", self.config.client_id.as_str());
        params.insert("grant_type", "authorization_code");
        params.insert("code", code);
        params.insert("redirect_uri", self.config.redirect_uri.as_str());
        params.insert("code_verifier", session.verifier());
        if let Some(secret) = self.config.client_secret.as_deref() {
            params.insert("client_secret", secret);
        }

        let response = self
            .http_client
            .execute(self.token_request(&params)?)
            .await
            .map_err(|e| AuthError::Http(e.to_string()))?;

        if !response.is_success() {
            let body = error_body(&response);
            warn!(status = response.status, error = %body, "Code exchange rejected");
            return Err(AuthError::Unauthenticated(format!(
                "Token endpoint returned {}: {}",
                response.status, body
            )));
        }

        let parsed: TokenResponse = response
            .json()
            .map_err(|e| AuthError::InvalidToken(format!("Failed to parse token response: {}", e)))?;

        info!(expires_in = parsed.expires_in, "Exchanged authorization code");
        Ok(parsed.into_token(self.clock.unix_timestamp_millis(), None))
    }

    /// Obtain a fresh access token. The old refresh token is kept when the
    /// response omits a new one.
    ///
    /// Client errors fail immediately; server errors are retried with
    /// exponential backoff up to three attempts.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<Token> {
        let mut params = HashMap::new();
        params.insert("client_id", self.config.client_id.as_str());
        params.insert("grant_type", "refresh_token");
        params.insert("refresh_token", refresh_token);
        if let Some(secret) = self.config.client_secret.as_deref() {
            params.insert("client_secret", secret);
        }

        let mut attempts = 0;
        loop {
            attempts += 1;

            let response = self
                .http_client
                .execute(self.token_request(&params)?)
                .await
                .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

            if response.is_success() {
                let parsed: TokenResponse = response.json().map_err(|e| {
                    AuthError::InvalidToken(format!("Failed to parse token response: {}", e))
                })?;

                info!(expires_in = parsed.expires_in, "Refreshed access token");
                return Ok(parsed.into_token(self.clock.unix_timestamp_millis(), Some(refresh_token)));
            }

            let status = response.status;
            if response.is_client_error() {
                let body = error_body(&response);
                warn!(status, error = %body, "Token refresh rejected");
                return Err(AuthError::RefreshFailed(format!(
                    "Token endpoint returned {}: {}",
                    status, body
                )));
            }

            if attempts >= MAX_REFRESH_ATTEMPTS {
                return Err(AuthError::RefreshFailed(format!(
                    "Token refresh failed after {} attempts, last status {}",
                    attempts, status
                )));
            }

            let delay = Duration::from_millis(100 * 2u64.pow(attempts - 1));
            warn!(
                status,
                attempts,
                delay_ms = delay.as_millis() as u64,
                "Token refresh failed, retrying"
            );
            sleep(delay).await;
        }
    }

    fn token_request(&self, params: &HashMap<&str, &str>) -> Result<HttpRequest> {
        HttpRequest::post_form(self.config.token_url.clone(), params)
            .map_err(|e| AuthError::InvalidConfig(format!("Failed to encode token request: {}", e)))
    }
}

fn error_body(response: &HttpResponse) -> String {
    response
        .text()
        .unwrap_or_else(|_| "Unable to read error response".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::HttpMethod;
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

    fn client(http: MockHttp) -> OAuthClient {
        OAuthClient::new(
            OAuthConfig::spotify("client-1", "http://localhost/callback"),
            Arc::new(http),
            Arc::new(ManualClock::from_millis(1_000)),
        )
    }

    #[tokio::test]
    async fn test_exchange_code_rejects_state_mismatch() {
        let mut http = MockHttp::new();
        http.expect_execute().never();

        let session = PkceSession::from_parts("verifier", "expected");
        let err = client(http)
            .exchange_code("code", "other", &session)
            .await
            .unwrap_err();

        assert_eq!(err, AuthError::StateMismatch);
    }

    #[tokio::test]
    async fn test_exchange_code_posts_verifier() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|req| {
                let body = req.body_text().unwrap_or_default();
                req.method == HttpMethod::Post
                    && body.contains("grant_type=authorization_code")
                    && body.contains("code_verifier=verifier")
            })
            .times(1)
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"access_token":"acc","refresh_token":"ref","expires_in":3600}"#,
                ))
            });

        let session = PkceSession::from_parts("verifier", "s1");
        let token = client(http).exchange_code("code", "s1", &session).await.unwrap();

        assert_eq!(token.access_token, "acc");
        assert_eq!(token.refresh_token.as_deref(), Some("ref"));
        assert_eq!(token.expires_at, 1_000 + 3_600_000);
    }

    #[tokio::test]
    async fn test_refresh_keeps_old_refresh_token() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(response(200, r#"{"access_token":"new","expires_in":60}"#)));

        let token = client(http).refresh("old-refresh").await.unwrap();
        assert_eq!(token.access_token, "new");
        assert_eq!(token.refresh_token.as_deref(), Some("old-refresh"));
    }

    #[tokio::test]
    async fn test_refresh_client_error_is_not_retried() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(response(400, r#"{"error":"invalid_grant"}"#)));

        let err = client(http).refresh("revoked").await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshFailed(_)));
    }

    #[tokio::test]
    async fn test_refresh_retries_server_errors() {
        let mut http = MockHttp::new();
        let mut seq = mockall::Sequence::new();
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response(503, "unavailable")));
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response(200, r#"{"access_token":"ok"}"#)));

        let token = client(http).refresh("r").await.unwrap();
        assert_eq!(token.access_token, "ok");
    }

    #[test]
    fn test_begin_authorization_embeds_state() {
        let http = MockHttp::new();
        let (url, session) = client(http).begin_authorization().unwrap();
        assert!(url.contains(&format!("state={}", session.state())));
    }
}
