//! Authorization-code grant verification (RFC 6749 Section 4.1.3).

use std::sync::Arc;

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::client_auth::ClientCredentials;
use crate::oauth::context::{RequestContext, TokenRequestContext};
use crate::oauth::grant::{check_grant_allowed, context_client};
use crate::oauth::pkce;
use crate::oauth::profile::ProfileRegistry;
use crate::types::{AuthorizationCodeGrant, AuthorizationRequest, GrantType};

/// One identical message for every code lookup failure, so a caller cannot
/// distinguish a missing code from a missing request or a foreign client.
pub(crate) const CODE_INVALID: &str = "The authorization code is invalid";

/// Verifies an authorization-code exchange.
pub struct AuthorizationCodeGrantVerifier {
    profiles: Arc<ProfileRegistry>,
}

impl AuthorizationCodeGrantVerifier {
    /// Creates the verifier with its profile overlay registry.
    #[must_use]
    pub fn new(profiles: Arc<ProfileRegistry>) -> Self {
        Self { profiles }
    }

    /// Runs the fail-fast verification sequence. The grant and its
    /// authorization request are passed as the orchestrator found them;
    /// `None` means not found.
    ///
    /// # Errors
    ///
    /// Fails with the RFC error for the first violated check.
    pub fn verify(
        &self,
        ctx: &TokenRequestContext,
        request: Option<&AuthorizationRequest>,
        grant: Option<&AuthorizationCodeGrant>,
        credentials: &ClientCredentials,
    ) -> AuthResult<()> {
        let client = context_client(ctx)?;

        // 1-2. Server supports the grant type, client is registered for it
        check_grant_allowed(ctx.config(), client, GrantType::AuthorizationCode)?;

        // 3. Code exists, its request exists, and it was granted to the
        //    requesting client
        let (Some(request), Some(grant)) = (request, grant) else {
            return Err(AuthError::invalid_grant(CODE_INVALID));
        };
        if grant.client_id != credentials.client_id {
            tracing::debug!(client_id = %credentials.client_id, "code was granted to another client");
            return Err(AuthError::invalid_grant(CODE_INVALID));
        }

        // 4. If the authorization request carried a redirect_uri, the token
        //    request must repeat it byte-identically
        if let Some(stored) = request.redirect_uri.as_deref() {
            if ctx.request().redirect_uri.as_deref() != Some(stored) {
                return Err(AuthError::invalid_grant(
                    "redirect_uri does not match the authorization request",
                ));
            }
        }

        // 5. Profile overlay for the stored profile, then PKCE
        let overlay = self.profiles.authorization_verifier(request.profile)?;
        overlay.verify(ctx, request, credentials)?;
        pkce::verify(ctx, request)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::oauth::context::TokenRequest;
    use crate::oauth::profile::AuthorizationProfile;
    use crate::types::{Client, TokenEndpointAuthMethod};
    use time::{Duration, OffsetDateTime};
    use uuid::Uuid;

    fn test_client() -> Client {
        Client {
            client_id: "app-1".to_string(),
            client_secret: Some("s3cret".to_string()),
            name: "App One".to_string(),
            auth_method: TokenEndpointAuthMethod::ClientSecretBasic,
            grant_types: vec![GrantType::AuthorizationCode],
            redirect_uris: vec!["https://a.example/cb".to_string()],
            scopes: vec![],
            active: true,
            jwks: None,
            mtls_binding: None,
            ciba_delivery_mode: None,
            require_sender_constrained_tokens: false,
        }
    }

    fn ctx(request: TokenRequest, config: ServerConfig) -> TokenRequestContext {
        TokenRequestContext::new(
            request,
            None,
            None,
            Arc::new(config),
            Some(test_client()),
        )
        .unwrap()
    }

    fn stored_request(redirect_uri: Option<&str>) -> AuthorizationRequest {
        AuthorizationRequest {
            id: Uuid::new_v4(),
            client_id: "app-1".to_string(),
            redirect_uri: redirect_uri.map(ToString::to_string),
            scope: "openid".to_string(),
            code_challenge: None,
            code_challenge_method: None,
            nonce: Some("n-0S6_WzA2Mj".to_string()),
            profile: AuthorizationProfile::OAuth2,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn stored_grant(request: &AuthorizationRequest, client_id: &str) -> AuthorizationCodeGrant {
        AuthorizationCodeGrant {
            code: AuthorizationCodeGrant::generate_code(),
            authorization_request_id: request.id,
            client_id: client_id.to_string(),
            subject: "user-1".to_string(),
            expires_at: OffsetDateTime::now_utc() + Duration::minutes(5),
        }
    }

    fn credentials() -> ClientCredentials {
        ClientCredentials::new("app-1", TokenEndpointAuthMethod::ClientSecretBasic)
    }

    fn verifier() -> AuthorizationCodeGrantVerifier {
        AuthorizationCodeGrantVerifier::new(Arc::new(ProfileRegistry::default()))
    }

    fn token_request(redirect_uri: Option<&str>) -> TokenRequest {
        TokenRequest {
            grant_type: "authorization_code".to_string(),
            code: Some("a-code".to_string()),
            redirect_uri: redirect_uri.map(ToString::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_happy_path() {
        let request = stored_request(Some("https://a.example/cb"));
        let grant = stored_grant(&request, "app-1");
        let ctx = ctx(
            token_request(Some("https://a.example/cb")),
            ServerConfig::default(),
        );

        assert!(
            verifier()
                .verify(&ctx, Some(&request), Some(&grant), &credentials())
                .is_ok()
        );
    }

    #[test]
    fn test_server_must_support_grant_type() {
        let request = stored_request(None);
        let grant = stored_grant(&request, "app-1");
        let config = ServerConfig::default().with_grant_types(vec![GrantType::ClientCredentials]);
        let ctx = ctx(token_request(None), config);

        let err = verifier()
            .verify(&ctx, Some(&request), Some(&grant), &credentials())
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "unsupported_grant_type");
    }

    #[test]
    fn test_client_must_be_registered_for_grant_type() {
        let request = stored_request(None);
        let grant = stored_grant(&request, "app-1");
        let mut client = test_client();
        client.grant_types = vec![GrantType::ClientCredentials];
        let ctx = TokenRequestContext::new(
            token_request(None),
            None,
            None,
            Arc::new(ServerConfig::default()),
            Some(client),
        )
        .unwrap();

        let err = verifier()
            .verify(&ctx, Some(&request), Some(&grant), &credentials())
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "unauthorized_client");
    }

    #[test]
    fn test_missing_pieces_fail_with_identical_message() {
        let request = stored_request(None);
        let grant = stored_grant(&request, "app-1");
        let foreign = stored_grant(&request, "other-app");
        let ctx = ctx(token_request(None), ServerConfig::default());
        let v = verifier();

        let missing_grant = v
            .verify(&ctx, Some(&request), None, &credentials())
            .unwrap_err();
        let missing_request = v
            .verify(&ctx, None, Some(&grant), &credentials())
            .unwrap_err();
        let foreign_client = v
            .verify(&ctx, Some(&request), Some(&foreign), &credentials())
            .unwrap_err();

        assert_eq!(missing_grant.to_string(), missing_request.to_string());
        assert_eq!(missing_grant.to_string(), foreign_client.to_string());
        assert_eq!(missing_grant.oauth_error_code(), "invalid_grant");
    }

    #[test]
    fn test_redirect_uri_must_match_byte_identically() {
        let request = stored_request(Some("https://a.example/cb"));
        let grant = stored_grant(&request, "app-1");
        let v = verifier();

        // Trailing slash is a different URI.
        let ctx = ctx(
            token_request(Some("https://a.example/cb/")),
            ServerConfig::default(),
        );
        let err = v
            .verify(&ctx, Some(&request), Some(&grant), &credentials())
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_grant");

        // Missing entirely is also a mismatch.
        let ctx = ctx_without_redirect();
        let err = v
            .verify(&ctx, Some(&request), Some(&grant), &credentials())
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_grant");
    }

    fn ctx_without_redirect() -> TokenRequestContext {
        ctx(token_request(None), ServerConfig::default())
    }

    #[test]
    fn test_no_stored_redirect_uri_skips_the_check() {
        let request = stored_request(None);
        let grant = stored_grant(&request, "app-1");
        let ctx = ctx(
            token_request(Some("https://anything.example")),
            ServerConfig::default(),
        );
        assert!(
            verifier()
                .verify(&ctx, Some(&request), Some(&grant), &credentials())
                .is_ok()
        );
    }

    #[test]
    fn test_pkce_runs_after_overlay() {
        let mut request = stored_request(None);
        request.code_challenge =
            Some("E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM".to_string());
        request.code_challenge_method = Some("S256".to_string());
        let grant = stored_grant(&request, "app-1");

        let mut token_req = token_request(None);
        token_req.code_verifier =
            Some("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".to_string());
        let with_verifier = ctx(token_req, ServerConfig::default());
        assert!(
            verifier()
                .verify(&with_verifier, Some(&request), Some(&grant), &credentials())
                .is_ok()
        );

        // Missing verifier fails even for a confidential client.
        let without_verifier = ctx(token_request(None), ServerConfig::default());
        let err = verifier()
            .verify(&without_verifier, Some(&request), Some(&grant), &credentials())
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_grant");
    }

    #[test]
    fn test_fapi_profile_overlay_is_applied() {
        let mut request = stored_request(None);
        request.profile = AuthorizationProfile::FapiBaseline;
        let grant = stored_grant(&request, "app-1");
        let ctx = ctx(token_request(None), ServerConfig::default());

        // No PKCE stored: the FAPI overlay rejects the exchange.
        let err = verifier()
            .verify(&ctx, Some(&request), Some(&grant), &credentials())
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_grant");
    }
}
