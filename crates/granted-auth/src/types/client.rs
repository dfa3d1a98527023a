//! OAuth 2.0 client registration types.
//!
//! The [`Client`] struct is the resolved registration record that verifiers
//! read. It is loaded by a [`ClientStorage`](crate::storage::ClientStorage)
//! implementation and never mutated by this crate.

use jsonwebtoken::jwk::JwkSet;
use serde::{Deserialize, Serialize};

// =============================================================================
// Grant Type
// =============================================================================

/// OAuth 2.0 / OIDC grant types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Authorization Code flow (RFC 6749 Section 4.1, with PKCE per RFC 7636).
    AuthorizationCode,
    /// Refresh Token flow (RFC 6749 Section 6).
    RefreshToken,
    /// Client Credentials flow (RFC 6749 Section 4.4).
    ClientCredentials,
    /// Resource Owner Password Credentials flow (RFC 6749 Section 4.3).
    /// Legacy; only for trusted first-party applications.
    Password,
    /// Client-Initiated Backchannel Authentication (CIBA Core).
    Ciba,
}

impl GrantType {
    /// Returns the OAuth 2.0 `grant_type` parameter value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
            Self::ClientCredentials => "client_credentials",
            Self::Password => "password",
            Self::Ciba => "urn:openid:params:grant-type:ciba",
        }
    }

    /// Parses a `grant_type` parameter value.
    ///
    /// Returns `None` for grant types this server does not know about;
    /// the caller maps that to `unsupported_grant_type`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "authorization_code" => Some(Self::AuthorizationCode),
            "refresh_token" => Some(Self::RefreshToken),
            "client_credentials" => Some(Self::ClientCredentials),
            "password" => Some(Self::Password),
            "urn:openid:params:grant-type:ciba" => Some(Self::Ciba),
            _ => None,
        }
    }
}

impl std::fmt::Display for GrantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Token Endpoint Authentication Method
// =============================================================================

/// Token endpoint client authentication methods.
///
/// The closed set from OpenID Connect Core Section 9 plus the mutual-TLS
/// methods from RFC 8705. The declared method selects the authenticator in
/// the [`ClientAuthenticatorRegistry`](crate::oauth::client_auth::ClientAuthenticatorRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEndpointAuthMethod {
    /// Client secret via HTTP Basic Auth.
    ClientSecretBasic,
    /// Client secret in request body parameters.
    ClientSecretPost,
    /// JWT assertion signed with HMAC over the client secret (RFC 7523).
    ClientSecretJwt,
    /// JWT assertion signed with the client's registered private key (RFC 7523).
    PrivateKeyJwt,
    /// PKI mutual-TLS: certificate subject DN or SAN matches the registered
    /// binding (RFC 8705 Section 2.1).
    TlsClientAuth,
    /// Self-signed certificate mutual-TLS: accepted on presence, bound via
    /// thumbprint downstream (RFC 8705 Section 2.2).
    SelfSignedTlsClientAuth,
}

impl TokenEndpointAuthMethod {
    /// Returns the registered metadata value for the auth method.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientSecretBasic => "client_secret_basic",
            Self::ClientSecretPost => "client_secret_post",
            Self::ClientSecretJwt => "client_secret_jwt",
            Self::PrivateKeyJwt => "private_key_jwt",
            Self::TlsClientAuth => "tls_client_auth",
            Self::SelfSignedTlsClientAuth => "self_signed_tls_client_auth",
        }
    }

    /// All methods, in registry construction order.
    #[must_use]
    pub fn all() -> [Self; 6] {
        [
            Self::ClientSecretBasic,
            Self::ClientSecretPost,
            Self::ClientSecretJwt,
            Self::PrivateKeyJwt,
            Self::TlsClientAuth,
            Self::SelfSignedTlsClientAuth,
        ]
    }
}

impl std::fmt::Display for TokenEndpointAuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// CIBA Delivery Mode
// =============================================================================

/// CIBA token delivery modes (CIBA Core Section 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CibaDeliveryMode {
    /// Client polls the token endpoint with the auth_req_id.
    Poll,
    /// Client polls after receiving a ping notification.
    Ping,
    /// Tokens are pushed to the client notification endpoint. Push clients
    /// must not redeem the auth_req_id at the token endpoint.
    Push,
}

impl CibaDeliveryMode {
    /// Returns the registered metadata value for the delivery mode.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Poll => "poll",
            Self::Ping => "ping",
            Self::Push => "push",
        }
    }
}

impl std::fmt::Display for CibaDeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// mTLS Binding
// =============================================================================

/// Registered certificate binding for `tls_client_auth` (RFC 8705).
///
/// Exactly one value is registered per client; the presented certificate's
/// subject DN or the SAN entry of the matching kind must equal it exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MtlsBinding {
    /// Expected subject distinguished name (`tls_client_auth_subject_dn`).
    SubjectDn(String),
    /// Expected SAN dNSName entry (`tls_client_auth_san_dns`).
    SanDns(String),
    /// Expected SAN uniformResourceIdentifier entry (`tls_client_auth_san_uri`).
    SanUri(String),
    /// Expected SAN iPAddress entry (`tls_client_auth_san_ip`).
    SanIp(String),
    /// Expected SAN rfc822Name entry (`tls_client_auth_san_email`).
    SanEmail(String),
}

// =============================================================================
// Client
// =============================================================================

/// OAuth 2.0 client registration.
///
/// Represents a client record with credentials and per-client policy. The
/// registered `auth_method` must equal the method declared by the request
/// for authentication to succeed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    /// Unique client identifier used in OAuth flows.
    pub client_id: String,

    /// Client secret (for the `client_secret_*` methods).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Human-readable display name.
    pub name: String,

    /// Registered token endpoint authentication method.
    pub auth_method: TokenEndpointAuthMethod,

    /// OAuth 2.0 grant types this client is allowed to use.
    pub grant_types: Vec<GrantType>,

    /// Allowed redirect URIs for the authorization code flow.
    #[serde(default)]
    pub redirect_uris: Vec<String>,

    /// OAuth scopes this client is allowed to request.
    /// Empty list means all scopes are allowed.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Whether this client is currently active and can be used.
    pub active: bool,

    /// Registered public keys for `private_key_jwt` assertion verification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks: Option<JwkSet>,

    /// Registered certificate binding for `tls_client_auth`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtls_binding: Option<MtlsBinding>,

    /// CIBA token delivery mode. `None` when the client never uses CIBA.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ciba_delivery_mode: Option<CibaDeliveryMode>,

    /// Whether tokens issued to this client must be bound to its mTLS
    /// certificate. Effective only when the server also mandates it for
    /// the active profile.
    #[serde(default)]
    pub require_sender_constrained_tokens: bool,
}

impl Client {
    /// Returns `true` if `grant_type` is among the registered grant types.
    #[must_use]
    pub fn is_grant_type_allowed(&self, grant_type: GrantType) -> bool {
        self.grant_types.contains(&grant_type)
    }

    /// Returns `true` if `uri` is among the registered redirect URIs.
    ///
    /// Comparison is byte-exact; no normalization.
    #[must_use]
    pub fn is_redirect_uri_allowed(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|u| u == uri)
    }

    /// Returns `true` if `scope` is allowed for this client.
    ///
    /// An empty registered scope list allows every scope.
    #[must_use]
    pub fn is_scope_allowed(&self, scope: &str) -> bool {
        self.scopes.is_empty() || self.scopes.iter().any(|s| s == scope)
    }
}
