//! Client authentication at the token and backchannel endpoints.
//!
//! The [`ClientAuthenticatorRegistry`] maps the declared authentication
//! method to an authenticator and runs the checks shared by every method:
//! the client must exist, be active, and be registered for the declared
//! method, and the server must support it. The per-method authenticators
//! then verify the actual credential material:
//!
//! - [`BasicSecretAuthenticator`] / [`PostSecretAuthenticator`] compare the
//!   registered client secret
//! - [`ClientSecretJwtAuthenticator`] / [`PrivateKeyJwtAuthenticator`]
//!   verify an RFC 7523 client assertion (HMAC over the secret, or the
//!   registered JWKS) plus the shared claim validation
//! - [`TlsClientAuthenticator`] / [`SelfSignedTlsAuthenticator`] check the
//!   peer certificate per RFC 8705
//!
//! On success exactly one [`ClientCredentials`] is constructed; it is read
//! downstream (for example to bind sender-constrained tokens) and never
//! mutated.

pub mod assertion;
pub mod mtls;
pub mod secret;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::context::RequestContext;
use crate::storage::JtiStorage;
use crate::types::{Client, TokenEndpointAuthMethod};
use crate::x509::ClientCertificate;

pub use assertion::{
    ClientAssertionClaims, ClientSecretJwtAuthenticator, PrivateKeyJwtAuthenticator,
    JWT_BEARER_ASSERTION_TYPE,
};
pub use mtls::{SelfSignedTlsAuthenticator, TlsClientAuthenticator};
pub use secret::{BasicSecretAuthenticator, PostSecretAuthenticator};

// =============================================================================
// Client credentials
// =============================================================================

/// Verified output of client authentication.
///
/// Constructed exactly once per successful authentication and read
/// downstream; never mutated.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    /// Authenticated client id.
    pub client_id: String,

    /// Method the client authenticated with.
    pub auth_method: TokenEndpointAuthMethod,

    /// The verified client secret (secret-based methods).
    pub secret: Option<String>,

    /// Claims of the verified client assertion (JWT-based methods).
    pub assertion_claims: Option<ClientAssertionClaims>,

    /// The peer certificate the client authenticated with (mTLS methods).
    pub certificate: Option<ClientCertificate>,
}

impl ClientCredentials {
    /// Creates credentials carrying only the identity and method.
    #[must_use]
    pub fn new(client_id: impl Into<String>, auth_method: TokenEndpointAuthMethod) -> Self {
        Self {
            client_id: client_id.into(),
            auth_method,
            secret: None,
            assertion_claims: None,
            certificate: None,
        }
    }

    /// Attaches the verified secret.
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Attaches the verified assertion claims.
    #[must_use]
    pub fn with_assertion_claims(mut self, claims: ClientAssertionClaims) -> Self {
        self.assertion_claims = Some(claims);
        self
    }

    /// Attaches the peer certificate.
    #[must_use]
    pub fn with_certificate(mut self, certificate: ClientCertificate) -> Self {
        self.certificate = Some(certificate);
        self
    }

    /// SHA-256 thumbprint of the certificate, for sender-constrained token
    /// binding (`x5t#S256`).
    #[must_use]
    pub fn certificate_thumbprint(&self) -> Option<&str> {
        self.certificate.as_ref().map(|c| c.thumbprint_sha256.as_str())
    }
}

// =============================================================================
// Authenticator trait and registry
// =============================================================================

/// One token endpoint authentication method.
///
/// The registry has already verified that the client exists, is active, and
/// is registered for this method; implementations verify the credential
/// material itself.
#[async_trait]
pub trait ClientAuthenticator: Send + Sync {
    /// The method this authenticator implements.
    fn method(&self) -> TokenEndpointAuthMethod;

    /// Verifies the request's credential material against the registration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClient` when verification fails.
    async fn authenticate(
        &self,
        ctx: &dyn RequestContext,
        client: &Client,
    ) -> AuthResult<ClientCredentials>;
}

/// Declared method → authenticator dispatch.
///
/// Built once at startup and injected; a pure lookup with no I/O of its
/// own. [`ClientAuthenticatorRegistry::with_defaults`] registers all six
/// built-in authenticators.
pub struct ClientAuthenticatorRegistry {
    authenticators: HashMap<TokenEndpointAuthMethod, Arc<dyn ClientAuthenticator>>,
}

impl ClientAuthenticatorRegistry {
    /// An empty registry; every method is unsupported until registered.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            authenticators: HashMap::new(),
        }
    }

    /// Registry with the six built-in authenticators.
    #[must_use]
    pub fn with_defaults(jti_storage: Arc<dyn JtiStorage>) -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(BasicSecretAuthenticator));
        registry.register(Arc::new(PostSecretAuthenticator));
        registry.register(Arc::new(ClientSecretJwtAuthenticator::new(
            jti_storage.clone(),
        )));
        registry.register(Arc::new(PrivateKeyJwtAuthenticator::new(jti_storage)));
        registry.register(Arc::new(TlsClientAuthenticator));
        registry.register(Arc::new(SelfSignedTlsAuthenticator));
        registry
    }

    /// Registers or replaces the authenticator for its method.
    pub fn register(&mut self, authenticator: Arc<dyn ClientAuthenticator>) {
        self.authenticators
            .insert(authenticator.method(), authenticator);
    }

    /// Authenticates the request, producing verified [`ClientCredentials`].
    ///
    /// # Errors
    ///
    /// - `Configuration` when the declared method has no registered
    ///   authenticator or is not in the server's supported list (server
    ///   misconfiguration, 500-class)
    /// - `InvalidClient` when no credentials were presented, the client is
    ///   unknown or inactive, the declared method is not the client's
    ///   registered method, or the credential material fails verification
    pub async fn authenticate(&self, ctx: &dyn RequestContext) -> AuthResult<ClientCredentials> {
        let declared = ctx
            .declared_auth_method()
            .ok_or_else(|| AuthError::invalid_client("No client credentials presented"))?;

        if !ctx.config().supports_auth_method(declared) {
            return Err(AuthError::configuration(format!(
                "Unsupported client authentication type: {declared}"
            )));
        }
        let authenticator = self.authenticators.get(&declared).ok_or_else(|| {
            AuthError::configuration(format!(
                "Unsupported client authentication type: {declared}"
            ))
        })?;

        let client = ctx
            .client()
            .ok_or_else(|| AuthError::invalid_client("Client authentication failed"))?;
        if !client.active {
            return Err(AuthError::invalid_client("Client authentication failed"));
        }
        if client.auth_method != declared {
            return Err(AuthError::invalid_client(format!(
                "Client is not registered for {declared}"
            )));
        }

        tracing::debug!(client_id = %client.client_id, method = %declared, "authenticating client");
        authenticator.authenticate(ctx, client).await
    }
}
