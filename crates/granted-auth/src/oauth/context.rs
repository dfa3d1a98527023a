//! Request contexts for the token and backchannel endpoints.
//!
//! A context is a read-only view built once per request: the decoded wire
//! parameters, the Basic authorization credentials (if any), the peer
//! certificate the TLS layer presented (if any), the resolved server
//! configuration, and the resolved client registration. Verifiers and
//! authenticators only ever read it.
//!
//! The client authentication method the request declares is derived once at
//! construction from the shape of the presented credentials; the two
//! mutual-TLS methods present identical material, so a certificate-only
//! request resolves to the client's registered mutual-TLS variant.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

use crate::AuthResult;
use crate::config::ServerConfig;
use crate::error::AuthError;
use crate::oauth::client_auth::assertion;
use crate::storage::ClientStorage;
use crate::types::{Client, TokenEndpointAuthMethod};
use crate::x509::ClientCertificate;

// =============================================================================
// Wire structs
// =============================================================================

/// Token endpoint request parameters (RFC 6749 Section 4, CIBA Core
/// Section 10.1).
///
/// All fields are optional at the wire level; each grant verifier demands
/// the parameters it needs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    /// OAuth 2.0 grant type.
    pub grant_type: String,

    /// Authorization code (authorization_code grant).
    pub code: Option<String>,

    /// Redirect URI, repeated from the authorization request.
    pub redirect_uri: Option<String>,

    /// PKCE code verifier.
    pub code_verifier: Option<String>,

    /// Refresh token (refresh_token grant).
    pub refresh_token: Option<String>,

    /// CIBA authentication request identifier.
    pub auth_req_id: Option<String>,

    /// Requested scope (client_credentials / password grants).
    pub scope: Option<String>,

    /// Resource owner username (password grant).
    pub username: Option<String>,

    /// Resource owner password (password grant).
    pub password: Option<String>,

    /// Client identifier (body parameter).
    pub client_id: Option<String>,

    /// Client secret (client_secret_post).
    pub client_secret: Option<String>,

    /// Client assertion JWT (client_secret_jwt / private_key_jwt).
    pub client_assertion: Option<String>,

    /// Client assertion type; must be the RFC 7523 JWT bearer URN when a
    /// client assertion is sent.
    pub client_assertion_type: Option<String>,
}

/// Backchannel authentication endpoint request parameters (CIBA Core
/// Section 7.1).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackchannelRequest {
    /// Requested scope.
    pub scope: Option<String>,

    /// Hint identifying the end-user.
    pub login_hint: Option<String>,

    /// Token carrying the end-user hint.
    pub login_hint_token: Option<String>,

    /// Previously issued ID token identifying the end-user.
    pub id_token_hint: Option<String>,

    /// Message displayed on both consumption and authentication devices.
    pub binding_message: Option<String>,

    /// Requested auth_req_id lifetime in seconds.
    pub requested_expiry: Option<i64>,

    /// Client identifier (body parameter).
    pub client_id: Option<String>,

    /// Client secret (client_secret_post).
    pub client_secret: Option<String>,

    /// Client assertion JWT (client_secret_jwt / private_key_jwt).
    pub client_assertion: Option<String>,

    /// Client assertion type.
    pub client_assertion_type: Option<String>,
}

// =============================================================================
// Shared context behavior
// =============================================================================

/// Read access to the credential material and resolved configuration a
/// client authenticator needs. Implemented by both endpoint contexts so the
/// same authenticator registry serves the token and backchannel endpoints.
pub trait RequestContext: Send + Sync {
    /// Resolved server configuration.
    fn config(&self) -> &ServerConfig;

    /// Resolved client registration, `None` when the requested client id is
    /// unknown.
    fn client(&self) -> Option<&Client>;

    /// Client id the request claims (Basic username, assertion issuer, or
    /// body parameter, in that order).
    fn client_id(&self) -> Option<&str>;

    /// Authentication method derived from the presented credentials.
    fn declared_auth_method(&self) -> Option<TokenEndpointAuthMethod>;

    /// Basic authorization credentials, when the header was present.
    fn basic_auth(&self) -> Option<(&str, &str)>;

    /// Client secret sent as a body parameter.
    fn body_client_secret(&self) -> Option<&str>;

    /// Client assertion JWT, when present.
    fn client_assertion(&self) -> Option<&str>;

    /// Client assertion type parameter, when present.
    fn client_assertion_type(&self) -> Option<&str>;

    /// Peer certificate from the mTLS connection, when present.
    fn certificate(&self) -> Option<&ClientCertificate>;
}

/// Parses an HTTP Basic authorization header value into (id, secret).
///
/// # Errors
///
/// Returns `InvalidClient` if the header is not a well-formed Basic
/// credential.
pub fn parse_basic_auth(header: &str) -> AuthResult<(String, String)> {
    let encoded = header
        .strip_prefix("Basic ")
        .ok_or_else(|| AuthError::invalid_client("Authorization header is not Basic"))?;
    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|_| AuthError::invalid_client("Malformed Basic authorization header"))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|_| AuthError::invalid_client("Malformed Basic authorization header"))?;
    let (id, secret) = decoded
        .split_once(':')
        .ok_or_else(|| AuthError::invalid_client("Malformed Basic authorization header"))?;
    Ok((id.to_string(), secret.to_string()))
}

struct CredentialMaterial {
    basic_auth: Option<(String, String)>,
    certificate: Option<ClientCertificate>,
    declared_method: Option<TokenEndpointAuthMethod>,
    client_id: Option<String>,
}

/// Derives the declared method and claimed client id from the credential
/// material. Precedence: Basic header, client assertion, body secret,
/// certificate.
fn detect_credentials(
    authorization_header: Option<&str>,
    certificate: Option<ClientCertificate>,
    body_client_id: Option<&str>,
    body_client_secret: Option<&str>,
    client_assertion: Option<&str>,
    registered_method: impl Fn(&str) -> Option<TokenEndpointAuthMethod>,
) -> AuthResult<CredentialMaterial> {
    let basic_auth = authorization_header.map(parse_basic_auth).transpose()?;

    let (declared_method, client_id) = if let Some((id, _)) = &basic_auth {
        (
            Some(TokenEndpointAuthMethod::ClientSecretBasic),
            Some(id.clone()),
        )
    } else if let Some(jwt) = client_assertion {
        let alg = assertion::extract_algorithm(jwt)?;
        let method = if assertion::is_hmac_algorithm(alg) {
            TokenEndpointAuthMethod::ClientSecretJwt
        } else {
            TokenEndpointAuthMethod::PrivateKeyJwt
        };
        (Some(method), Some(assertion::extract_issuer_unverified(jwt)?))
    } else if body_client_secret.is_some() {
        (
            Some(TokenEndpointAuthMethod::ClientSecretPost),
            body_client_id.map(ToString::to_string),
        )
    } else if certificate.is_some() {
        // Both mTLS methods present the same material; resolve against the
        // client's registration, defaulting to the PKI variant so that a
        // client registered for a non-mTLS method fails the method check.
        let id = body_client_id.map(ToString::to_string);
        let method = id
            .as_deref()
            .and_then(&registered_method)
            .filter(|m| {
                matches!(
                    m,
                    TokenEndpointAuthMethod::TlsClientAuth
                        | TokenEndpointAuthMethod::SelfSignedTlsClientAuth
                )
            })
            .unwrap_or(TokenEndpointAuthMethod::TlsClientAuth);
        (Some(method), id)
    } else {
        (None, body_client_id.map(ToString::to_string))
    };

    Ok(CredentialMaterial {
        basic_auth,
        certificate,
        declared_method,
        client_id,
    })
}

// =============================================================================
// Token request context
// =============================================================================

/// Immutable view over one token endpoint request.
pub struct TokenRequestContext {
    request: TokenRequest,
    material: CredentialMaterial,
    config: Arc<ServerConfig>,
    client: Option<Client>,
}

impl TokenRequestContext {
    /// Builds a context from already-resolved parts. The client registration
    /// lookup has been done by the caller.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClient` if the authorization header or client
    /// assertion is malformed.
    pub fn new(
        request: TokenRequest,
        authorization_header: Option<&str>,
        certificate: Option<ClientCertificate>,
        config: Arc<ServerConfig>,
        client: Option<Client>,
    ) -> AuthResult<Self> {
        let material = detect_credentials(
            authorization_header,
            certificate,
            request.client_id.as_deref(),
            request.client_secret.as_deref(),
            request.client_assertion.as_deref(),
            |id| {
                client
                    .as_ref()
                    .filter(|c| c.client_id == id)
                    .map(|c| c.auth_method)
            },
        )?;
        Ok(Self {
            request,
            material,
            config,
            client,
        })
    }

    /// Builds a context, resolving the client registration from storage.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClient` on malformed credentials and `Storage` when
    /// the lookup fails.
    pub async fn resolve(
        request: TokenRequest,
        authorization_header: Option<&str>,
        certificate: Option<ClientCertificate>,
        config: Arc<ServerConfig>,
        clients: &dyn ClientStorage,
    ) -> AuthResult<Self> {
        let client =
            resolve_client(authorization_header, request.client_id.as_deref(), request.client_assertion.as_deref(), clients).await?;
        Self::new(request, authorization_header, certificate, config, client)
    }

    /// The decoded token request parameters.
    #[must_use]
    pub fn request(&self) -> &TokenRequest {
        &self.request
    }
}

impl RequestContext for TokenRequestContext {
    fn config(&self) -> &ServerConfig {
        &self.config
    }

    fn client(&self) -> Option<&Client> {
        self.client.as_ref()
    }

    fn client_id(&self) -> Option<&str> {
        self.material.client_id.as_deref()
    }

    fn declared_auth_method(&self) -> Option<TokenEndpointAuthMethod> {
        self.material.declared_method
    }

    fn basic_auth(&self) -> Option<(&str, &str)> {
        self.material
            .basic_auth
            .as_ref()
            .map(|(id, secret)| (id.as_str(), secret.as_str()))
    }

    fn body_client_secret(&self) -> Option<&str> {
        self.request.client_secret.as_deref()
    }

    fn client_assertion(&self) -> Option<&str> {
        self.request.client_assertion.as_deref()
    }

    fn client_assertion_type(&self) -> Option<&str> {
        self.request.client_assertion_type.as_deref()
    }

    fn certificate(&self) -> Option<&ClientCertificate> {
        self.material.certificate.as_ref()
    }
}

// =============================================================================
// Backchannel request context
// =============================================================================

/// Immutable view over one backchannel authentication endpoint request.
pub struct BackchannelRequestContext {
    request: BackchannelRequest,
    material: CredentialMaterial,
    config: Arc<ServerConfig>,
    client: Option<Client>,
}

impl BackchannelRequestContext {
    /// Builds a context from already-resolved parts.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClient` if the authorization header or client
    /// assertion is malformed.
    pub fn new(
        request: BackchannelRequest,
        authorization_header: Option<&str>,
        certificate: Option<ClientCertificate>,
        config: Arc<ServerConfig>,
        client: Option<Client>,
    ) -> AuthResult<Self> {
        let material = detect_credentials(
            authorization_header,
            certificate,
            request.client_id.as_deref(),
            request.client_secret.as_deref(),
            request.client_assertion.as_deref(),
            |id| {
                client
                    .as_ref()
                    .filter(|c| c.client_id == id)
                    .map(|c| c.auth_method)
            },
        )?;
        Ok(Self {
            request,
            material,
            config,
            client,
        })
    }

    /// Builds a context, resolving the client registration from storage.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClient` on malformed credentials and `Storage` when
    /// the lookup fails.
    pub async fn resolve(
        request: BackchannelRequest,
        authorization_header: Option<&str>,
        certificate: Option<ClientCertificate>,
        config: Arc<ServerConfig>,
        clients: &dyn ClientStorage,
    ) -> AuthResult<Self> {
        let client =
            resolve_client(authorization_header, request.client_id.as_deref(), request.client_assertion.as_deref(), clients).await?;
        Self::new(request, authorization_header, certificate, config, client)
    }

    /// The decoded backchannel request parameters.
    #[must_use]
    pub fn request(&self) -> &BackchannelRequest {
        &self.request
    }
}

impl RequestContext for BackchannelRequestContext {
    fn config(&self) -> &ServerConfig {
        &self.config
    }

    fn client(&self) -> Option<&Client> {
        self.client.as_ref()
    }

    fn client_id(&self) -> Option<&str> {
        self.material.client_id.as_deref()
    }

    fn declared_auth_method(&self) -> Option<TokenEndpointAuthMethod> {
        self.material.declared_method
    }

    fn basic_auth(&self) -> Option<(&str, &str)> {
        self.material
            .basic_auth
            .as_ref()
            .map(|(id, secret)| (id.as_str(), secret.as_str()))
    }

    fn body_client_secret(&self) -> Option<&str> {
        self.request.client_secret.as_deref()
    }

    fn client_assertion(&self) -> Option<&str> {
        self.request.client_assertion.as_deref()
    }

    fn client_assertion_type(&self) -> Option<&str> {
        self.request.client_assertion_type.as_deref()
    }

    fn certificate(&self) -> Option<&ClientCertificate> {
        self.material.certificate.as_ref()
    }
}

async fn resolve_client(
    authorization_header: Option<&str>,
    body_client_id: Option<&str>,
    client_assertion: Option<&str>,
    clients: &dyn ClientStorage,
) -> AuthResult<Option<Client>> {
    let claimed = if let Some(header) = authorization_header {
        Some(parse_basic_auth(header)?.0)
    } else if let Some(jwt) = client_assertion {
        Some(assertion::extract_issuer_unverified(jwt)?)
    } else {
        body_client_id.map(ToString::to_string)
    };

    match claimed {
        Some(id) => clients.find_by_client_id(&id).await,
        None => Ok(None),
    }
}
