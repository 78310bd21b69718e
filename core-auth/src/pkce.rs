//! PKCE helpers (RFC 7636)
//!
//! Verifiers and states are drawn from `[A-Za-z0-9]`. The challenge uses the
//! S256 method: BASE64URL(SHA256(verifier)) without padding.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::{AuthError, Result};
use crate::types::OAuthConfig;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

pub const CODE_VERIFIER_LEN: usize = 64;
pub const STATE_LEN: usize = 16;

/// Random alphanumeric string of `len` characters.
pub fn generate_random_string(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

pub fn generate_code_verifier() -> String {
    generate_random_string(CODE_VERIFIER_LEN)
}

pub fn generate_state() -> String {
    generate_random_string(STATE_LEN)
}

pub fn code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Verifier and state kept by the host between redirect and callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceSession {
    verifier: String,
    state: String,
}

impl PkceSession {
    pub fn new() -> Self {
        Self {
            verifier: generate_code_verifier(),
            state: generate_state(),
        }
    }

    /// Rebuild a session from values the host persisted.
    pub fn from_parts(verifier: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            verifier: verifier.into(),
            state: state.into(),
        }
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn challenge(&self) -> String {
        code_challenge(&self.verifier)
    }
}

impl Default for PkceSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the URL the user visits to grant access.
pub fn authorization_url(config: &OAuthConfig, session: &PkceSession) -> Result<String> {
    let mut url = Url::parse(&config.auth_url)
        .map_err(|e| AuthError::InvalidConfig(format!("Invalid auth URL: {}", e)))?;

    url.query_pairs_mut()
        .append_pair("client_id", &config.client_id)
        .append_pair("response_type", "code")
        .append_pair("redirect_uri", &config.redirect_uri)
        .append_pair("code_challenge_method", "S256")
        .append_pair("code_challenge", &session.challenge())
        .append_pair("state", session.state())
        .append_pair("scope", &config.scopes.join(" "));

    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verifier_shape() {
        let verifier = generate_code_verifier();
        assert_eq!(verifier.len(), 64);
        assert!(verifier.chars().all(|c| c.is_ascii_alphanumeric()));

        let state = generate_state();
        assert_eq!(state.len(), 16);
        assert_ne!(generate_state(), state);
    }

    #[test]
    fn test_known_challenge() {
        // RFC 7636 appendix B
        assert_eq!(
            code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_authorization_url_parameters() {
        let config = OAuthConfig::spotify("client-1", "http://localhost:8080/callback");
        let session = PkceSession::from_parts("v".repeat(64), "state123");

        let url = authorization_url(&config, &session).unwrap();
        let parsed = Url::parse(&url).unwrap();
        let pairs: std::collections::HashMap<_, _> = parsed.query_pairs().into_owned().collect();

        assert_eq!(pairs["client_id"], "client-1");
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["code_challenge_method"], "S256");
        assert_eq!(pairs["code_challenge"], session.challenge());
        assert_eq!(pairs["state"], "state123");
        assert!(pairs["scope"].contains("playlist-read-private"));
    }

    #[test]
    fn test_authorization_url_rejects_bad_endpoint() {
        let mut config = OAuthConfig::spotify("c", "r");
        config.auth_url = "not a url".to_string();

        let err = authorization_url(&config, &PkceSession::new()).unwrap_err();
        assert!(matches!(err, AuthError::InvalidConfig(_)));
    }
}
