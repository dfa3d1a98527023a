//! Token and backchannel endpoint orchestration.
//!
//! [`TokenService`] is the composition root for a token exchange: it
//! authenticates the client, dispatches to the grant verifier for the
//! requested grant type, performs the one-time delete of redeemed codes and
//! CIBA grants, and delegates minting to the injected [`TokenIssuer`].
//! [`BackchannelService`] is the matching intake for CIBA: it validates a
//! backchannel authentication request and creates the pending grant the
//! user interaction side later resolves.
//!
//! Find-then-delete atomicity for one-time grants is the storage
//! implementor's contract: `delete_*` must let exactly one concurrent
//! caller observe `true`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::AuthResult;
use crate::config::ServerConfig;
use crate::error::AuthError;
use crate::oauth::client_auth::{ClientAuthenticatorRegistry, ClientCredentials};
use crate::oauth::context::{
    BackchannelRequest, BackchannelRequestContext, TokenRequest, TokenRequestContext,
};
use crate::oauth::grant::authorization_code::CODE_INVALID;
use crate::oauth::grant::ciba::AUTH_REQ_ID_INVALID;
use crate::oauth::grant::{
    AuthorizationCodeGrantVerifier, CibaGrantVerifier, ClientCredentialsGrantVerifier,
    RefreshTokenVerifier, ResourceOwnerPasswordGrantVerifier, check_grant_allowed,
    validate_requested_scope,
};
use crate::oauth::profile::{CibaProfile, ProfileRegistry};
use crate::storage::{
    AuthorizationGrantStorage, CibaGrantStorage, ClientStorage, JtiStorage, RefreshTokenStorage,
    UserStorage,
};
use crate::types::{
    BackchannelAuthRequest, CibaGrant, CibaStatus, GrantType, RefreshTokenRecord,
};
use crate::x509::ClientCertificate;

// =============================================================================
// Issuance seam
// =============================================================================

/// A grant that passed verification, with everything minting needs.
#[derive(Debug, Clone)]
pub enum VerifiedGrant {
    /// Redeemed authorization code.
    AuthorizationCode {
        /// Authenticated end-user subject.
        subject: String,
        /// Granted scopes (space-separated).
        scope: String,
        /// OpenID Connect nonce from the authorization request.
        nonce: Option<String>,
    },
    /// Redeemed CIBA grant.
    Ciba {
        /// Authenticated end-user subject.
        subject: String,
        /// Granted scopes.
        scope: String,
    },
    /// Verified refresh token.
    RefreshToken {
        /// End-user subject, absent for client-only tokens.
        subject: Option<String>,
        /// Granted scopes.
        scope: String,
    },
    /// Client-credentials grant; the client is the resource owner.
    ClientCredentials {
        /// Requested scopes.
        scope: String,
    },
    /// Resource-owner-password grant.
    Password {
        /// Authenticated end-user subject.
        subject: String,
        /// Requested scopes.
        scope: String,
    },
}

/// Token endpoint success response (RFC 6749 Section 5.1).
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    /// The issued access token.
    pub access_token: String,

    /// Token type, `Bearer` unless sender-constrained.
    pub token_type: String,

    /// Access token lifetime in seconds.
    pub expires_in: i64,

    /// Refresh token, when one was issued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// OpenID Connect ID token, when one was issued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// Granted scopes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Mints tokens for a verified grant. Token construction (JWT or opaque,
/// signing, sender-constrained binding via the credential thumbprint) is
/// outside this crate.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Issues tokens for the verified grant.
    ///
    /// # Errors
    ///
    /// Returns an error if minting fails.
    async fn issue(
        &self,
        grant: &VerifiedGrant,
        credentials: &ClientCredentials,
    ) -> AuthResult<TokenResponse>;
}

// =============================================================================
// Token service
// =============================================================================

/// Token endpoint orchestrator.
pub struct TokenService {
    config: Arc<ServerConfig>,
    clients: Arc<dyn ClientStorage>,
    grants: Arc<dyn AuthorizationGrantStorage>,
    ciba_grants: Arc<dyn CibaGrantStorage>,
    refresh_tokens: Arc<dyn RefreshTokenStorage>,
    authenticators: Arc<ClientAuthenticatorRegistry>,
    code_verifier: AuthorizationCodeGrantVerifier,
    ciba_verifier: CibaGrantVerifier,
    refresh_verifier: RefreshTokenVerifier,
    client_credentials_verifier: ClientCredentialsGrantVerifier,
    password_verifier: ResourceOwnerPasswordGrantVerifier,
    issuer: Arc<dyn TokenIssuer>,
}

impl TokenService {
    /// Creates the service with the default authenticator and profile
    /// registries.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        config: Arc<ServerConfig>,
        clients: Arc<dyn ClientStorage>,
        grants: Arc<dyn AuthorizationGrantStorage>,
        ciba_grants: Arc<dyn CibaGrantStorage>,
        refresh_tokens: Arc<dyn RefreshTokenStorage>,
        users: Arc<dyn UserStorage>,
        jti_storage: Arc<dyn JtiStorage>,
        issuer: Arc<dyn TokenIssuer>,
    ) -> Self {
        let authenticators = Arc::new(ClientAuthenticatorRegistry::with_defaults(jti_storage));
        let profiles = Arc::new(ProfileRegistry::default());
        Self {
            config,
            clients,
            grants,
            ciba_grants,
            refresh_tokens,
            authenticators,
            code_verifier: AuthorizationCodeGrantVerifier::new(profiles.clone()),
            ciba_verifier: CibaGrantVerifier::new(profiles),
            refresh_verifier: RefreshTokenVerifier,
            client_credentials_verifier: ClientCredentialsGrantVerifier,
            password_verifier: ResourceOwnerPasswordGrantVerifier::new(users),
            issuer,
        }
    }

    /// Replaces the authenticator registry.
    #[must_use]
    pub fn with_authenticators(mut self, authenticators: Arc<ClientAuthenticatorRegistry>) -> Self {
        self.authenticators = authenticators;
        self
    }

    /// Replaces the profile overlay registry.
    #[must_use]
    pub fn with_profiles(mut self, profiles: Arc<ProfileRegistry>) -> Self {
        self.code_verifier = AuthorizationCodeGrantVerifier::new(profiles.clone());
        self.ciba_verifier = CibaGrantVerifier::new(profiles);
        self
    }

    /// The authenticator registry, shared with the backchannel service.
    #[must_use]
    pub fn authenticators(&self) -> Arc<ClientAuthenticatorRegistry> {
        self.authenticators.clone()
    }

    /// Builds the per-request context, resolving the client registration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClient` on malformed credentials and `Storage` when
    /// the lookup fails.
    pub async fn build_context(
        &self,
        request: TokenRequest,
        authorization_header: Option<&str>,
        certificate: Option<ClientCertificate>,
    ) -> AuthResult<TokenRequestContext> {
        TokenRequestContext::resolve(
            request,
            authorization_header,
            certificate,
            self.config.clone(),
            &*self.clients,
        )
        .await
    }

    /// Handles one token exchange: authenticate, verify the grant, redeem
    /// one-time state, mint.
    ///
    /// # Errors
    ///
    /// Fails with the RFC-coded error of the first violated check.
    pub async fn token(&self, ctx: &TokenRequestContext) -> AuthResult<TokenResponse> {
        // 1. Authenticate the client
        let credentials = self.authenticators.authenticate(ctx).await?;

        // 2. Dispatch on the grant type
        let grant_type = GrantType::parse(&ctx.request().grant_type)
            .ok_or_else(|| AuthError::unsupported_grant_type(&ctx.request().grant_type))?;

        tracing::debug!(client_id = %credentials.client_id, grant_type = %grant_type, "token exchange");

        // 3. Verify and redeem
        let verified = match grant_type {
            GrantType::AuthorizationCode => {
                self.exchange_authorization_code(ctx, &credentials).await?
            }
            GrantType::Ciba => self.exchange_ciba(ctx, &credentials).await?,
            GrantType::RefreshToken => self.exchange_refresh_token(ctx, &credentials).await?,
            GrantType::ClientCredentials => {
                self.client_credentials_verifier.verify(ctx, &credentials)?;
                VerifiedGrant::ClientCredentials {
                    scope: ctx.request().scope.clone().unwrap_or_default(),
                }
            }
            GrantType::Password => {
                let subject = self.password_verifier.verify(ctx, &credentials).await?;
                VerifiedGrant::Password {
                    subject,
                    scope: ctx.request().scope.clone().unwrap_or_default(),
                }
            }
        };

        // 4. Mint
        self.issuer.issue(&verified, &credentials).await
    }

    async fn exchange_authorization_code(
        &self,
        ctx: &TokenRequestContext,
        credentials: &ClientCredentials,
    ) -> AuthResult<VerifiedGrant> {
        let code = ctx
            .request()
            .code
            .as_deref()
            .ok_or_else(|| AuthError::invalid_request("code is required"))?;

        // An expired code is indistinguishable from a missing one.
        let grant = self
            .grants
            .find_grant_by_code(code)
            .await?
            .filter(|g| !g.is_expired());
        let request = match &grant {
            Some(g) => self.grants.find_request(g.authorization_request_id).await?,
            None => None,
        };

        self.code_verifier
            .verify(ctx, request.as_ref(), grant.as_ref(), credentials)?;

        // One-time use: exactly one concurrent redemption observes the
        // delete succeeding.
        if !self.grants.delete_grant_by_code(code).await? {
            return Err(AuthError::invalid_grant(CODE_INVALID));
        }

        let (request, grant) = request
            .zip(grant)
            .ok_or_else(|| AuthError::internal("Verified grant state missing"))?;
        Ok(VerifiedGrant::AuthorizationCode {
            subject: grant.subject,
            scope: request.scope,
            nonce: request.nonce,
        })
    }

    async fn exchange_ciba(
        &self,
        ctx: &TokenRequestContext,
        credentials: &ClientCredentials,
    ) -> AuthResult<VerifiedGrant> {
        let auth_req_id = ctx
            .request()
            .auth_req_id
            .as_deref()
            .ok_or_else(|| AuthError::invalid_request("auth_req_id is required"))?;

        let grant = self.ciba_grants.find_grant(auth_req_id).await?;
        let request = match &grant {
            Some(g) => self.ciba_grants.find_request(g.backchannel_request_id).await?,
            None => None,
        };

        self.ciba_verifier
            .verify(ctx, request.as_ref(), grant.as_ref(), credentials)?;

        if !self.ciba_grants.delete_grant(auth_req_id).await? {
            return Err(AuthError::invalid_grant(AUTH_REQ_ID_INVALID));
        }

        let (request, grant) = request
            .zip(grant)
            .ok_or_else(|| AuthError::internal("Verified grant state missing"))?;
        let subject = grant
            .subject
            .ok_or_else(|| AuthError::internal("Granted CIBA grant is missing a subject"))?;
        Ok(VerifiedGrant::Ciba {
            subject,
            scope: request.scope,
        })
    }

    async fn exchange_refresh_token(
        &self,
        ctx: &TokenRequestContext,
        credentials: &ClientCredentials,
    ) -> AuthResult<VerifiedGrant> {
        let token = ctx
            .request()
            .refresh_token
            .as_deref()
            .ok_or_else(|| AuthError::invalid_request("refresh_token is required"))?;

        let record = self
            .refresh_tokens
            .find_by_hash(&RefreshTokenRecord::hash_token(token))
            .await?;
        self.refresh_verifier.verify(ctx, record.as_ref(), credentials)?;

        let record = record.ok_or_else(|| AuthError::internal("Verified grant state missing"))?;
        Ok(VerifiedGrant::RefreshToken {
            subject: record.subject,
            scope: record.scope,
        })
    }
}

// =============================================================================
// Backchannel service
// =============================================================================

/// Backchannel authentication endpoint success response (CIBA Core
/// Section 7.3).
#[derive(Debug, Clone, Serialize)]
pub struct BackchannelAuthResponse {
    /// Identifier the client polls the token endpoint with.
    pub auth_req_id: String,

    /// auth_req_id lifetime in seconds.
    pub expires_in: i64,

    /// Minimum polling interval in seconds.
    pub interval: i64,
}

/// Backchannel authentication intake: validates the request and creates the
/// pending grant the user interaction side later resolves through
/// [`CibaGrantStorage::update_status`].
pub struct BackchannelService {
    config: Arc<ServerConfig>,
    clients: Arc<dyn ClientStorage>,
    ciba_grants: Arc<dyn CibaGrantStorage>,
    authenticators: Arc<ClientAuthenticatorRegistry>,
}

impl BackchannelService {
    /// Creates the service. The authenticator registry is shared with the
    /// token service.
    #[must_use]
    pub fn new(
        config: Arc<ServerConfig>,
        clients: Arc<dyn ClientStorage>,
        ciba_grants: Arc<dyn CibaGrantStorage>,
        authenticators: Arc<ClientAuthenticatorRegistry>,
    ) -> Self {
        Self {
            config,
            clients,
            ciba_grants,
            authenticators,
        }
    }

    /// Builds the per-request context, resolving the client registration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClient` on malformed credentials and `Storage` when
    /// the lookup fails.
    pub async fn build_context(
        &self,
        request: BackchannelRequest,
        authorization_header: Option<&str>,
        certificate: Option<ClientCertificate>,
    ) -> AuthResult<BackchannelRequestContext> {
        BackchannelRequestContext::resolve(
            request,
            authorization_header,
            certificate,
            self.config.clone(),
            &*self.clients,
        )
        .await
    }

    /// Accepts a backchannel authentication request, creating a pending
    /// grant keyed by a fresh auth_req_id.
    ///
    /// # Errors
    ///
    /// Fails with the RFC-coded error of the first violated check.
    pub async fn accept(
        &self,
        ctx: &BackchannelRequestContext,
    ) -> AuthResult<BackchannelAuthResponse> {
        use crate::oauth::context::RequestContext as _;

        // 1. Authenticate the client
        let credentials = self.authenticators.authenticate(ctx).await?;
        let client = ctx
            .client()
            .ok_or_else(|| AuthError::internal("Client registration missing from request context"))?;

        // 2. Server and client must allow the CIBA grant
        check_grant_allowed(&self.config, client, GrantType::Ciba)?;

        // 3. Exactly one end-user hint
        let request = ctx.request();
        let hints = [
            request.login_hint.as_deref(),
            request.login_hint_token.as_deref(),
            request.id_token_hint.as_deref(),
        ];
        if hints.iter().flatten().count() != 1 {
            return Err(AuthError::invalid_request(
                "Exactly one of login_hint, login_hint_token, id_token_hint is required",
            ));
        }
        let login_hint = request.login_hint.as_deref().ok_or_else(|| {
            AuthError::invalid_request("Only login_hint is supported by this server")
        })?;

        // 4. Scope
        validate_requested_scope(request.scope.as_deref(), client)?;
        let scope = request.scope.clone().unwrap_or_default();

        // 5. Expiry, clamped to the configured maximum
        let expires_in = match request.requested_expiry {
            Some(seconds) if seconds <= 0 => {
                return Err(AuthError::invalid_request(
                    "requested_expiry must be positive",
                ));
            }
            Some(seconds) => seconds.min(self.config.ciba.max_expires_in_seconds),
            None => self.config.ciba.expires_in_seconds,
        };

        // 6. Server-selected profile, never client input
        let profile = if self.config.fapi.require_sender_constrained_tokens
            && client.require_sender_constrained_tokens
        {
            CibaProfile::FapiCiba
        } else {
            CibaProfile::Ciba
        };

        let now = OffsetDateTime::now_utc();
        let backchannel_request = BackchannelAuthRequest {
            id: Uuid::new_v4(),
            client_id: credentials.client_id.clone(),
            scope,
            login_hint: login_hint.to_string(),
            binding_message: request.binding_message.clone(),
            profile,
            created_at: now,
        };
        let grant = CibaGrant {
            auth_req_id: CibaGrant::generate_auth_req_id(),
            backchannel_request_id: backchannel_request.id,
            client_id: credentials.client_id.clone(),
            subject: None,
            status: CibaStatus::Pending,
            expires_at: now + Duration::seconds(expires_in),
        };

        self.ciba_grants.create_request(&backchannel_request).await?;
        self.ciba_grants.create_grant(&grant).await?;

        tracing::debug!(
            client_id = %credentials.client_id,
            profile = %profile,
            "backchannel authentication request accepted"
        );

        Ok(BackchannelAuthResponse {
            auth_req_id: grant.auth_req_id,
            expires_in,
            interval: self.config.ciba.interval_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::profile::AuthorizationProfile;
    use crate::types::{AuthorizationCodeGrant, AuthorizationRequest, Client, TokenEndpointAuthMethod};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as B64;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MockClientStorage {
        clients: HashMap<String, Client>,
    }

    #[async_trait]
    impl ClientStorage for MockClientStorage {
        async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>> {
            Ok(self.clients.get(client_id).cloned())
        }
    }

    #[derive(Default)]
    struct MockGrantStorage {
        requests: Mutex<HashMap<Uuid, AuthorizationRequest>>,
        grants: Mutex<HashMap<String, AuthorizationCodeGrant>>,
    }

    #[async_trait]
    impl AuthorizationGrantStorage for MockGrantStorage {
        async fn create_request(&self, request: &AuthorizationRequest) -> AuthResult<()> {
            self.requests
                .lock()
                .unwrap()
                .insert(request.id, request.clone());
            Ok(())
        }

        async fn create_grant(&self, grant: &AuthorizationCodeGrant) -> AuthResult<()> {
            self.grants
                .lock()
                .unwrap()
                .insert(grant.code.clone(), grant.clone());
            Ok(())
        }

        async fn find_request(&self, id: Uuid) -> AuthResult<Option<AuthorizationRequest>> {
            Ok(self.requests.lock().unwrap().get(&id).cloned())
        }

        async fn find_grant_by_code(
            &self,
            code: &str,
        ) -> AuthResult<Option<AuthorizationCodeGrant>> {
            Ok(self.grants.lock().unwrap().get(code).cloned())
        }

        async fn delete_grant_by_code(&self, code: &str) -> AuthResult<bool> {
            Ok(self.grants.lock().unwrap().remove(code).is_some())
        }
    }

    #[derive(Default)]
    struct MockCibaStorage {
        requests: Mutex<HashMap<Uuid, BackchannelAuthRequest>>,
        grants: Mutex<HashMap<String, CibaGrant>>,
    }

    #[async_trait]
    impl CibaGrantStorage for MockCibaStorage {
        async fn create_request(&self, request: &BackchannelAuthRequest) -> AuthResult<()> {
            self.requests
                .lock()
                .unwrap()
                .insert(request.id, request.clone());
            Ok(())
        }

        async fn create_grant(&self, grant: &CibaGrant) -> AuthResult<()> {
            self.grants
                .lock()
                .unwrap()
                .insert(grant.auth_req_id.clone(), grant.clone());
            Ok(())
        }

        async fn find_request(&self, id: Uuid) -> AuthResult<Option<BackchannelAuthRequest>> {
            Ok(self.requests.lock().unwrap().get(&id).cloned())
        }

        async fn find_grant(&self, auth_req_id: &str) -> AuthResult<Option<CibaGrant>> {
            Ok(self.grants.lock().unwrap().get(auth_req_id).cloned())
        }

        async fn update_status(
            &self,
            auth_req_id: &str,
            status: CibaStatus,
            subject: Option<String>,
        ) -> AuthResult<()> {
            let mut grants = self.grants.lock().unwrap();
            let grant = grants
                .get_mut(auth_req_id)
                .ok_or_else(|| AuthError::storage("No such CIBA grant"))?;
            grant.status = status;
            grant.subject = subject;
            Ok(())
        }

        async fn delete_grant(&self, auth_req_id: &str) -> AuthResult<bool> {
            Ok(self.grants.lock().unwrap().remove(auth_req_id).is_some())
        }
    }

    #[derive(Default)]
    struct MockRefreshStorage {
        records: Mutex<HashMap<String, RefreshTokenRecord>>,
    }

    #[async_trait]
    impl RefreshTokenStorage for MockRefreshStorage {
        async fn register(&self, record: &RefreshTokenRecord) -> AuthResult<()> {
            self.records
                .lock()
                .unwrap()
                .insert(record.token_hash.clone(), record.clone());
            Ok(())
        }

        async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<RefreshTokenRecord>> {
            Ok(self.records.lock().unwrap().get(token_hash).cloned())
        }

        async fn delete_by_hash(&self, token_hash: &str) -> AuthResult<bool> {
            Ok(self.records.lock().unwrap().remove(token_hash).is_some())
        }
    }

    struct MockUserStorage;

    #[async_trait]
    impl UserStorage for MockUserStorage {
        async fn verify_password(
            &self,
            username: &str,
            password: &str,
        ) -> AuthResult<Option<String>> {
            Ok((username == "alice" && password == "correct-horse")
                .then(|| "user-alice".to_string()))
        }
    }

    struct MockJtiStorage;

    #[async_trait]
    impl JtiStorage for MockJtiStorage {
        async fn mark_used(&self, _jti: &str, _expires_at: OffsetDateTime) -> AuthResult<bool> {
            Ok(true)
        }
    }

    struct MockIssuer;

    #[async_trait]
    impl TokenIssuer for MockIssuer {
        async fn issue(
            &self,
            grant: &VerifiedGrant,
            _credentials: &ClientCredentials,
        ) -> AuthResult<TokenResponse> {
            let scope = match grant {
                VerifiedGrant::AuthorizationCode { scope, .. }
                | VerifiedGrant::Ciba { scope, .. }
                | VerifiedGrant::RefreshToken { scope, .. }
                | VerifiedGrant::ClientCredentials { scope }
                | VerifiedGrant::Password { scope, .. } => scope.clone(),
            };
            Ok(TokenResponse {
                access_token: "at-1".to_string(),
                token_type: "Bearer".to_string(),
                expires_in: 3600,
                refresh_token: None,
                id_token: None,
                scope: Some(scope),
            })
        }
    }

    fn test_client() -> Client {
        Client {
            client_id: "app-1".to_string(),
            client_secret: Some("s3cret".to_string()),
            name: "App One".to_string(),
            auth_method: TokenEndpointAuthMethod::ClientSecretBasic,
            grant_types: vec![
                GrantType::AuthorizationCode,
                GrantType::RefreshToken,
                GrantType::ClientCredentials,
                GrantType::Ciba,
            ],
            redirect_uris: vec!["https://a.example/cb".to_string()],
            scopes: vec![],
            active: true,
            jwks: None,
            mtls_binding: None,
            ciba_delivery_mode: Some(crate::types::CibaDeliveryMode::Poll),
            require_sender_constrained_tokens: false,
        }
    }

    struct Fixture {
        service: TokenService,
        grants: Arc<MockGrantStorage>,
        ciba_grants: Arc<MockCibaStorage>,
        refresh_tokens: Arc<MockRefreshStorage>,
    }

    fn fixture() -> Fixture {
        let grants = Arc::new(MockGrantStorage::default());
        let ciba_grants = Arc::new(MockCibaStorage::default());
        let refresh_tokens = Arc::new(MockRefreshStorage::default());
        let clients = Arc::new(MockClientStorage {
            clients: HashMap::from([("app-1".to_string(), test_client())]),
        });
        let service = TokenService::new(
            Arc::new(ServerConfig::default()),
            clients,
            grants.clone(),
            ciba_grants.clone(),
            refresh_tokens.clone(),
            Arc::new(MockUserStorage),
            Arc::new(MockJtiStorage),
            Arc::new(MockIssuer),
        );
        Fixture {
            service,
            grants,
            ciba_grants,
            refresh_tokens,
        }
    }

    fn basic_header() -> String {
        format!("Basic {}", B64.encode("app-1:s3cret"))
    }

    async fn seed_code(grants: &MockGrantStorage) -> String {
        let request = AuthorizationRequest {
            id: Uuid::new_v4(),
            client_id: "app-1".to_string(),
            redirect_uri: None,
            scope: "openid".to_string(),
            code_challenge: None,
            code_challenge_method: None,
            nonce: Some("n-1".to_string()),
            profile: AuthorizationProfile::Oidc,
            created_at: OffsetDateTime::now_utc(),
        };
        let grant = AuthorizationCodeGrant {
            code: AuthorizationCodeGrant::generate_code(),
            authorization_request_id: request.id,
            client_id: "app-1".to_string(),
            subject: "user-1".to_string(),
            expires_at: OffsetDateTime::now_utc() + Duration::minutes(5),
        };
        grants.create_request(&request).await.unwrap();
        grants.create_grant(&grant).await.unwrap();
        grant.code
    }

    async fn token_ctx(service: &TokenService, request: TokenRequest) -> TokenRequestContext {
        service
            .build_context(request, Some(&basic_header()), None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_authorization_code_exchange_is_one_time_use() {
        let f = fixture();
        let code = seed_code(&f.grants).await;
        let request = TokenRequest {
            grant_type: "authorization_code".to_string(),
            code: Some(code),
            ..Default::default()
        };

        let ctx = token_ctx(&f.service, request.clone()).await;
        let response = f.service.token(&ctx).await.unwrap();
        assert_eq!(response.access_token, "at-1");
        assert_eq!(response.scope.as_deref(), Some("openid"));

        // Second redemption observes the grant deleted.
        let ctx = token_ctx(&f.service, request).await;
        let err = f.service.token(&ctx).await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_grant");
    }

    #[tokio::test]
    async fn test_unknown_grant_type() {
        let f = fixture();
        let ctx = token_ctx(
            &f.service,
            TokenRequest {
                grant_type: "implicit".to_string(),
                ..Default::default()
            },
        )
        .await;
        let err = f.service.token(&ctx).await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "unsupported_grant_type");
    }

    #[tokio::test]
    async fn test_ciba_polling_lifecycle() {
        let f = fixture();
        let backchannel = BackchannelService::new(
            Arc::new(ServerConfig::default()),
            Arc::new(MockClientStorage {
                clients: HashMap::from([("app-1".to_string(), test_client())]),
            }),
            f.ciba_grants.clone(),
            f.service.authenticators(),
        );

        let bc_ctx = backchannel
            .build_context(
                BackchannelRequest {
                    scope: Some("payments".to_string()),
                    login_hint: Some("user-1".to_string()),
                    ..Default::default()
                },
                Some(&basic_header()),
                None,
            )
            .await
            .unwrap();
        let accepted = backchannel.accept(&bc_ctx).await.unwrap();
        assert_eq!(accepted.expires_in, 300);
        assert_eq!(accepted.interval, 5);

        let poll_request = TokenRequest {
            grant_type: GrantType::Ciba.as_str().to_string(),
            auth_req_id: Some(accepted.auth_req_id.clone()),
            ..Default::default()
        };

        // Still pending.
        let ctx = token_ctx(&f.service, poll_request.clone()).await;
        let err = f.service.token(&ctx).await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "authorization_pending");

        // User approves; the next poll succeeds and consumes the grant.
        f.ciba_grants
            .update_status(
                &accepted.auth_req_id,
                CibaStatus::Granted,
                Some("user-1".to_string()),
            )
            .await
            .unwrap();
        let ctx = token_ctx(&f.service, poll_request.clone()).await;
        let response = f.service.token(&ctx).await.unwrap();
        assert_eq!(response.scope.as_deref(), Some("payments"));

        let ctx = token_ctx(&f.service, poll_request).await;
        let err = f.service.token(&ctx).await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_grant");
    }

    #[tokio::test]
    async fn test_backchannel_requires_exactly_one_hint() {
        let f = fixture();
        let backchannel = BackchannelService::new(
            Arc::new(ServerConfig::default()),
            Arc::new(MockClientStorage {
                clients: HashMap::from([("app-1".to_string(), test_client())]),
            }),
            f.ciba_grants.clone(),
            f.service.authenticators(),
        );

        for request in [
            BackchannelRequest {
                scope: Some("payments".to_string()),
                ..Default::default()
            },
            BackchannelRequest {
                scope: Some("payments".to_string()),
                login_hint: Some("user-1".to_string()),
                id_token_hint: Some("an-id-token".to_string()),
                ..Default::default()
            },
        ] {
            let ctx = backchannel
                .build_context(request, Some(&basic_header()), None)
                .await
                .unwrap();
            let err = backchannel.accept(&ctx).await.unwrap_err();
            assert_eq!(err.oauth_error_code(), "invalid_request");
        }
    }

    #[tokio::test]
    async fn test_refresh_token_exchange() {
        let f = fixture();
        let record = RefreshTokenRecord {
            id: Uuid::new_v4(),
            token_hash: RefreshTokenRecord::hash_token("rt-1"),
            client_id: "app-1".to_string(),
            subject: Some("user-1".to_string()),
            scope: "openid".to_string(),
            expires_at: OffsetDateTime::now_utc() + Duration::days(30),
        };
        f.refresh_tokens.register(&record).await.unwrap();

        let ctx = token_ctx(
            &f.service,
            TokenRequest {
                grant_type: "refresh_token".to_string(),
                refresh_token: Some("rt-1".to_string()),
                ..Default::default()
            },
        )
        .await;
        let response = f.service.token(&ctx).await.unwrap();
        assert_eq!(response.scope.as_deref(), Some("openid"));

        let ctx = token_ctx(
            &f.service,
            TokenRequest {
                grant_type: "refresh_token".to_string(),
                refresh_token: Some("unknown".to_string()),
                ..Default::default()
            },
        )
        .await;
        let err = f.service.token(&ctx).await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_grant");
    }

    #[tokio::test]
    async fn test_client_credentials_exchange() {
        let f = fixture();
        let ctx = token_ctx(
            &f.service,
            TokenRequest {
                grant_type: "client_credentials".to_string(),
                scope: Some("reports".to_string()),
                ..Default::default()
            },
        )
        .await;
        let response = f.service.token(&ctx).await.unwrap();
        assert_eq!(response.scope.as_deref(), Some("reports"));
    }
}
