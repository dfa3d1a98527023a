//! Authorization server core: client authentication and grant verification
//! for the OAuth 2.0 token endpoint and the CIBA backchannel endpoint.
//!
//! The crate is transport-agnostic. An HTTP layer decodes the request body
//! and TLS peer certificate, builds a request context, and hands it to
//! [`oauth::TokenService`] or [`oauth::BackchannelService`]; persistence is
//! behind the [`storage`] traits and token minting behind
//! [`oauth::TokenIssuer`].
//!
//! Supported client authentication methods: `client_secret_basic`,
//! `client_secret_post`, `client_secret_jwt`, `private_key_jwt`,
//! `tls_client_auth`, and `self_signed_tls_client_auth`. Supported grants:
//! authorization code with PKCE, CIBA, refresh token, client credentials,
//! and resource-owner password.

pub mod config;
pub mod error;
pub mod oauth;
pub mod storage;
pub mod types;
pub mod x509;

pub use config::ServerConfig;
pub use error::AuthError;

/// Result alias used throughout the crate.
pub type AuthResult<T> = Result<T, AuthError>;
