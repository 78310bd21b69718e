use chrono::Duration;
use core_runtime::logging::redact_if_sensitive;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Authorization endpoint of the streaming service
pub const SPOTIFY_AUTH_ENDPOINT: &str = "https://accounts.spotify.com/authorize";
/// Token endpoint of the streaming service
pub const SPOTIFY_TOKEN_ENDPOINT: &str = "https://accounts.spotify.com/api/token";

/// Scopes requested by default.
pub const DEFAULT_SCOPES: &[&str] = &[
    "user-read-private",
    "user-read-email",
    "user-library-read",
    "playlist-read-private",
    "playlist-read-collaborative",
    "streaming",
    "user-read-playback-state",
    "user-modify-playback-state",
    "user-read-currently-playing",
    "user-read-recently-played",
];

/// A token counts as expired this long before `expires_at`.
pub const EXPIRY_BUFFER: Duration = Duration::seconds(60);

/// OAuth bearer token with its absolute expiry.
///
/// `Debug` never prints the secret values.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Unix epoch milliseconds
    pub expires_at: i64,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl Token {
    /// Create a token that expires `expires_in_secs` after `now_millis`.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        now_millis: i64,
        expires_in_secs: i64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: now_millis + expires_in_secs * 1000,
            token_type: default_token_type(),
            scope: None,
        }
    }

    /// Whether the token is past `expires_at` minus [`EXPIRY_BUFFER`].
    pub fn is_expired(&self, now_millis: i64) -> bool {
        self.is_expired_with_buffer(now_millis, EXPIRY_BUFFER)
    }

    pub fn is_expired_with_buffer(&self, now_millis: i64, buffer: Duration) -> bool {
        now_millis >= self.expires_at - buffer.num_milliseconds()
    }

    /// Whether the token can still be sent, ignoring the refresh buffer.
    pub fn is_valid_at(&self, now_millis: i64) -> bool {
        now_millis < self.expires_at
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field(
                "access_token",
                &redact_if_sensitive("access_token", &self.access_token),
            )
            .field(
                "refresh_token",
                &self
                    .refresh_token
                    .as_deref()
                    .map(|t| redact_if_sensitive("refresh_token", t)),
            )
            .field("expires_at", &self.expires_at)
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .finish()
    }
}

/// OAuth client registration.
#[derive(Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    /// Public PKCE clients have no secret
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub auth_url: String,
    pub token_url: String,
}

impl OAuthConfig {
    /// Configuration for the streaming service's accounts endpoints.
    pub fn spotify(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: redirect_uri.into(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            auth_url: SPOTIFY_AUTH_ENDPOINT.to_string(),
            token_url: SPOTIFY_TOKEN_ENDPOINT.to_string(),
        }
    }
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self
                    .client_secret
                    .as_deref()
                    .map(|s| redact_if_sensitive("client_secret", s)),
            )
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .finish()
    }
}

/// JSON body of a token endpoint response.
#[derive(Deserialize, Serialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field(
                "access_token",
                &redact_if_sensitive("access_token", &self.access_token),
            )
            .field(
                "refresh_token",
                &self
                    .refresh_token
                    .as_deref()
                    .map(|t| redact_if_sensitive("refresh_token", t)),
            )
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

fn default_expires_in() -> i64 {
    3600
}

impl TokenResponse {
    /// Convert to a [`Token`], keeping `previous_refresh` when the response
    /// omits a refresh token.
    pub fn into_token(self, now_millis: i64, previous_refresh: Option<&str>) -> Token {
        Token {
            access_token: self.access_token,
            refresh_token: self
                .refresh_token
                .or_else(|| previous_refresh.map(str::to_string)),
            expires_at: now_millis + self.expires_in * 1000,
            token_type: self.token_type.unwrap_or_else(default_token_type),
            scope: self.scope,
        }
    }
}
