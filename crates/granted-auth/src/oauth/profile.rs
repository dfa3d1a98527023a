//! Verification profile overlays.
//!
//! A profile is selected by the server from granted scopes and
//! configuration when the authorization or backchannel request is accepted,
//! stored with the request, and never taken from client input (downgrade
//! prevention). At token time the grant verifier looks up the overlay for
//! the stored profile and runs its additional checks.
//!
//! Overlays are strategy objects in a [`ProfileRegistry`] built once at
//! startup; stricter profiles (FAPI) register alongside the base ones
//! without the grant verifiers depending on them. The composition root may
//! register replacements through [`ProfileRegistry::register_authorization`]
//! and [`ProfileRegistry::register_ciba`].

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::AuthResult;
use crate::config::ServerConfig;
use crate::error::AuthError;
use crate::oauth::client_auth::ClientCredentials;
use crate::oauth::context::{RequestContext, TokenRequestContext};
use crate::types::{AuthorizationRequest, BackchannelAuthRequest, CibaGrant, Client};

// =============================================================================
// Profile enums
// =============================================================================

/// Verification profiles for the authorization code flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthorizationProfile {
    /// Plain OAuth 2.0, no additional checks.
    #[serde(rename = "oauth2")]
    OAuth2,
    /// OpenID Connect.
    #[serde(rename = "oidc")]
    Oidc,
    /// FAPI 1.0 Baseline.
    #[serde(rename = "fapi_baseline")]
    FapiBaseline,
    /// FAPI 1.0 Advanced.
    #[serde(rename = "fapi_advance")]
    FapiAdvance,
}

impl AuthorizationProfile {
    /// Returns the profile name used in configuration and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OAuth2 => "oauth2",
            Self::Oidc => "oidc",
            Self::FapiBaseline => "fapi_baseline",
            Self::FapiAdvance => "fapi_advance",
        }
    }
}

impl std::fmt::Display for AuthorizationProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Verification profiles for the CIBA flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CibaProfile {
    /// CIBA Core, no additional checks.
    #[serde(rename = "ciba")]
    Ciba,
    /// FAPI-CIBA: sender-constrained tokens mandatory.
    #[serde(rename = "fapi_ciba")]
    FapiCiba,
}

impl CibaProfile {
    /// Returns the profile name used in configuration and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ciba => "ciba",
            Self::FapiCiba => "fapi_ciba",
        }
    }
}

impl std::fmt::Display for CibaProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Overlay traits
// =============================================================================

/// Additional checks an authorization profile layers over the base
/// authorization-code verification. Pure validation, no I/O.
pub trait AuthorizationProfileVerifier: Send + Sync {
    /// Runs the profile's checks against the token request and the stored
    /// authorization request.
    ///
    /// # Errors
    ///
    /// Returns a grant-class error when a profile requirement is violated.
    fn verify(
        &self,
        ctx: &TokenRequestContext,
        request: &AuthorizationRequest,
        credentials: &ClientCredentials,
    ) -> AuthResult<()>;
}

/// Additional checks a CIBA profile layers over the base CIBA grant
/// verification. Pure validation, no I/O.
pub trait CibaProfileVerifier: Send + Sync {
    /// Runs the profile's checks against the token request and the stored
    /// backchannel request and grant.
    ///
    /// # Errors
    ///
    /// Returns a grant-class error when a profile requirement is violated.
    fn verify(
        &self,
        ctx: &TokenRequestContext,
        request: &BackchannelAuthRequest,
        grant: &CibaGrant,
        credentials: &ClientCredentials,
    ) -> AuthResult<()>;
}

/// Sender-constrained tokens are mandated when both the server policy and
/// the client registration require them.
fn sender_constrained_required(config: &ServerConfig, client: Option<&Client>) -> bool {
    config.fapi.require_sender_constrained_tokens
        && client.is_some_and(|c| c.require_sender_constrained_tokens)
}

fn require_certificate(credentials: &ClientCredentials) -> AuthResult<()> {
    if credentials.certificate.is_none() {
        return Err(AuthError::invalid_request(
            "A client certificate is required for sender-constrained tokens",
        ));
    }
    Ok(())
}

// =============================================================================
// Authorization overlays
// =============================================================================

/// Plain OAuth 2.0: the base verification is sufficient.
pub struct OAuth2Profile;

impl AuthorizationProfileVerifier for OAuth2Profile {
    fn verify(
        &self,
        _ctx: &TokenRequestContext,
        _request: &AuthorizationRequest,
        _credentials: &ClientCredentials,
    ) -> AuthResult<()> {
        Ok(())
    }
}

/// OpenID Connect: a nonce must have been carried when the openid scope
/// was granted.
pub struct OidcProfile;

impl AuthorizationProfileVerifier for OidcProfile {
    fn verify(
        &self,
        _ctx: &TokenRequestContext,
        request: &AuthorizationRequest,
        _credentials: &ClientCredentials,
    ) -> AuthResult<()> {
        let openid = request.scope.split_whitespace().any(|s| s == "openid");
        if openid && request.nonce.is_none() {
            return Err(AuthError::invalid_grant(
                "The authorization request is missing a nonce",
            ));
        }
        Ok(())
    }
}

/// FAPI 1.0 Baseline: PKCE is mandatory and the method must be S256.
pub struct FapiBaselineProfile;

impl FapiBaselineProfile {
    fn check_pkce(request: &AuthorizationRequest) -> AuthResult<()> {
        if request.code_challenge.is_none() {
            return Err(AuthError::invalid_grant(
                "FAPI requires PKCE on the authorization request",
            ));
        }
        if request.code_challenge_method.as_deref() != Some("S256") {
            return Err(AuthError::invalid_grant(
                "FAPI requires the S256 code challenge method",
            ));
        }
        Ok(())
    }
}

impl AuthorizationProfileVerifier for FapiBaselineProfile {
    fn verify(
        &self,
        _ctx: &TokenRequestContext,
        request: &AuthorizationRequest,
        _credentials: &ClientCredentials,
    ) -> AuthResult<()> {
        Self::check_pkce(request)
    }
}

/// FAPI 1.0 Advanced: baseline checks plus sender-constrained tokens.
pub struct FapiAdvanceProfile;

impl AuthorizationProfileVerifier for FapiAdvanceProfile {
    fn verify(
        &self,
        ctx: &TokenRequestContext,
        request: &AuthorizationRequest,
        credentials: &ClientCredentials,
    ) -> AuthResult<()> {
        FapiBaselineProfile::check_pkce(request)?;
        if sender_constrained_required(ctx.config(), ctx.client()) {
            require_certificate(credentials)?;
        }
        Ok(())
    }
}

// =============================================================================
// CIBA overlays
// =============================================================================

/// CIBA Core: the base state machine is sufficient.
pub struct CibaCoreProfile;

impl CibaProfileVerifier for CibaCoreProfile {
    fn verify(
        &self,
        _ctx: &TokenRequestContext,
        _request: &BackchannelAuthRequest,
        _grant: &CibaGrant,
        _credentials: &ClientCredentials,
    ) -> AuthResult<()> {
        Ok(())
    }
}

/// FAPI-CIBA: sender-constrained tokens are mandatory when server and
/// client both require them.
pub struct FapiCibaProfile;

impl CibaProfileVerifier for FapiCibaProfile {
    fn verify(
        &self,
        ctx: &TokenRequestContext,
        _request: &BackchannelAuthRequest,
        _grant: &CibaGrant,
        credentials: &ClientCredentials,
    ) -> AuthResult<()> {
        if sender_constrained_required(ctx.config(), ctx.client()) {
            require_certificate(credentials)?;
        }
        Ok(())
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Profile → overlay verifier lookup, built once and injected.
pub struct ProfileRegistry {
    authorization: HashMap<AuthorizationProfile, Arc<dyn AuthorizationProfileVerifier>>,
    ciba: HashMap<CibaProfile, Arc<dyn CibaProfileVerifier>>,
}

impl ProfileRegistry {
    /// An empty registry; every lookup fails until overlays are registered.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            authorization: HashMap::new(),
            ciba: HashMap::new(),
        }
    }

    /// Registers or replaces the overlay for an authorization profile.
    pub fn register_authorization(
        &mut self,
        profile: AuthorizationProfile,
        verifier: Arc<dyn AuthorizationProfileVerifier>,
    ) {
        self.authorization.insert(profile, verifier);
    }

    /// Registers or replaces the overlay for a CIBA profile.
    pub fn register_ciba(&mut self, profile: CibaProfile, verifier: Arc<dyn CibaProfileVerifier>) {
        self.ciba.insert(profile, verifier);
    }

    /// Looks up the overlay for a stored authorization profile.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for an unregistered profile: the profile was
    /// assigned by the server, so a miss is a server fault, never a
    /// client-facing OAuth error.
    pub fn authorization_verifier(
        &self,
        profile: AuthorizationProfile,
    ) -> AuthResult<&Arc<dyn AuthorizationProfileVerifier>> {
        self.authorization.get(&profile).ok_or_else(|| {
            tracing::warn!(%profile, "no overlay registered for authorization profile");
            AuthError::configuration(format!(
                "No verifier registered for authorization profile: {profile}"
            ))
        })
    }

    /// Looks up the overlay for a stored CIBA profile.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for an unregistered profile.
    pub fn ciba_verifier(&self, profile: CibaProfile) -> AuthResult<&Arc<dyn CibaProfileVerifier>> {
        self.ciba.get(&profile).ok_or_else(|| {
            tracing::warn!(%profile, "no overlay registered for CIBA profile");
            AuthError::configuration(format!(
                "No verifier registered for CIBA profile: {profile}"
            ))
        })
    }
}

impl Default for ProfileRegistry {
    /// Registry with the built-in overlays for every known profile.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register_authorization(AuthorizationProfile::OAuth2, Arc::new(OAuth2Profile));
        registry.register_authorization(AuthorizationProfile::Oidc, Arc::new(OidcProfile));
        registry.register_authorization(
            AuthorizationProfile::FapiBaseline,
            Arc::new(FapiBaselineProfile),
        );
        registry.register_authorization(
            AuthorizationProfile::FapiAdvance,
            Arc::new(FapiAdvanceProfile),
        );
        registry.register_ciba(CibaProfile::Ciba, Arc::new(CibaCoreProfile));
        registry.register_ciba(CibaProfile::FapiCiba, Arc::new(FapiCibaProfile));
        registry
    }
}
