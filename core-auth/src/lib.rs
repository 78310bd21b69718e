//! # Authentication
//!
//! OAuth 2.0 authorization code flow with PKCE against the streaming
//! service's accounts endpoints, plus the [`TokenProvider`] seam that
//! catalog and download code use to obtain bearer tokens.
//!
//! - [`pkce`]: verifier, state and challenge generation, authorization URL
//! - [`oauth`]: code exchange and refresh at the token endpoint
//! - [`provider`]: `StaticTokenProvider` and `RefreshingTokenProvider`
//! - [`token_store`]: persistence of the current token

pub mod error;
pub mod oauth;
pub mod pkce;
pub mod provider;
pub mod token_store;
pub mod types;

pub use error::{AuthError, Result};
pub use oauth::OAuthClient;
pub use pkce::{
    authorization_url, code_challenge, generate_code_verifier, generate_state, PkceSession,
};
pub use provider::{RefreshingTokenProvider, StaticTokenProvider, TokenProvider};
pub use token_store::TokenStore;
pub use types::{OAuthConfig, Token, EXPIRY_BUFFER};
