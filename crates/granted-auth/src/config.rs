//! Server configuration.
//!
//! [`ServerConfig`] carries the issuer identity and the policy knobs the
//! authenticators and grant verifiers consult. It is built once by the
//! composition root and shared read-only across requests.
//!
//! # Example (TOML)
//!
//! ```toml
//! issuer = "https://idp.example"
//! token_endpoint = "https://idp.example/token"
//! supported_auth_methods = ["client_secret_basic", "private_key_jwt"]
//! supported_grant_types = ["authorization_code", "refresh_token"]
//! ```

use serde::{Deserialize, Serialize};

use crate::types::{GrantType, TokenEndpointAuthMethod};

/// Authorization server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Issuer URL (the `iss` this server asserts, and an accepted assertion
    /// audience).
    pub issuer: String,

    /// Token endpoint URL (accepted assertion audience).
    pub token_endpoint: String,

    /// Client authentication methods this server supports.
    pub supported_auth_methods: Vec<TokenEndpointAuthMethod>,

    /// Grant types this server supports.
    pub supported_grant_types: Vec<GrantType>,

    /// Client assertion validation settings.
    pub assertion: AssertionConfig,

    /// FAPI policy settings.
    pub fapi: FapiConfig,

    /// CIBA issuance settings.
    pub ciba: CibaConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:8080".to_string(),
            token_endpoint: "http://localhost:8080/token".to_string(),
            supported_auth_methods: TokenEndpointAuthMethod::all().to_vec(),
            supported_grant_types: vec![
                GrantType::AuthorizationCode,
                GrantType::RefreshToken,
                GrantType::ClientCredentials,
                GrantType::Ciba,
            ],
            assertion: AssertionConfig::default(),
            fapi: FapiConfig::default(),
            ciba: CibaConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Returns `true` if `method` is a supported client authentication method.
    #[must_use]
    pub fn supports_auth_method(&self, method: TokenEndpointAuthMethod) -> bool {
        self.supported_auth_methods.contains(&method)
    }

    /// Returns `true` if `grant_type` is a supported grant type.
    #[must_use]
    pub fn supports_grant_type(&self, grant_type: GrantType) -> bool {
        self.supported_grant_types.contains(&grant_type)
    }

    /// Sets the issuer URL.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Sets the token endpoint URL.
    #[must_use]
    pub fn with_token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.token_endpoint = endpoint.into();
        self
    }

    /// Replaces the supported authentication methods.
    #[must_use]
    pub fn with_auth_methods(mut self, methods: Vec<TokenEndpointAuthMethod>) -> Self {
        self.supported_auth_methods = methods;
        self
    }

    /// Replaces the supported grant types.
    #[must_use]
    pub fn with_grant_types(mut self, grant_types: Vec<GrantType>) -> Self {
        self.supported_grant_types = grant_types;
        self
    }
}

/// Client assertion validation settings (client_secret_jwt / private_key_jwt).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssertionConfig {
    /// Maximum accepted assertion lifetime in seconds.
    /// Assertions with `exp` further out than this are rejected.
    pub max_lifetime_seconds: i64,
}

impl Default for AssertionConfig {
    fn default() -> Self {
        Self {
            // 5 minutes per RFC 7523 guidance
            max_lifetime_seconds: 300,
        }
    }
}

/// FAPI policy settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FapiConfig {
    /// Whether the server mandates sender-constrained (mTLS-bound) tokens
    /// for FAPI-Advance and FAPI-CIBA profiles. Effective only when the
    /// client registration also requires them.
    pub require_sender_constrained_tokens: bool,
}

impl Default for FapiConfig {
    fn default() -> Self {
        Self {
            require_sender_constrained_tokens: true,
        }
    }
}

/// CIBA issuance settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CibaConfig {
    /// Default auth_req_id lifetime in seconds, used when the request
    /// carries no `requested_expiry`.
    pub expires_in_seconds: i64,

    /// Minimum polling interval in seconds, returned with the auth_req_id.
    pub interval_seconds: i64,

    /// Upper bound accepted for `requested_expiry`.
    pub max_expires_in_seconds: i64,
}

impl Default for CibaConfig {
    fn default() -> Self {
        Self {
            expires_in_seconds: 300,
            interval_seconds: 5,
            max_expires_in_seconds: 1200,
        }
    }
}
