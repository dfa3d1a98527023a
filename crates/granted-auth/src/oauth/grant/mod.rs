//! Grant verification.
//!
//! One verifier per grant type, each a fail-fast sequence of checks over
//! the token request context, the authenticated client credentials, and the
//! persisted grant state the orchestrator looked up. Verifiers are pure
//! validation: they never write, and the one-time delete of a redeemed
//! grant happens in the orchestrator after verification passes.

pub mod authorization_code;
pub mod ciba;
pub mod client_credentials;
pub mod password;
pub mod refresh_token;

pub use authorization_code::AuthorizationCodeGrantVerifier;
pub use ciba::CibaGrantVerifier;
pub use client_credentials::ClientCredentialsGrantVerifier;
pub use password::ResourceOwnerPasswordGrantVerifier;
pub use refresh_token::RefreshTokenVerifier;

use crate::AuthResult;
use crate::config::ServerConfig;
use crate::error::AuthError;
use crate::oauth::context::{RequestContext, TokenRequestContext};
use crate::types::{Client, GrantType};

/// Server must support the grant type and the client must be registered
/// for it.
pub(crate) fn check_grant_allowed(
    config: &ServerConfig,
    client: &Client,
    grant_type: GrantType,
) -> AuthResult<()> {
    if !config.supports_grant_type(grant_type) {
        return Err(AuthError::unsupported_grant_type(grant_type.as_str()));
    }
    if !client.is_grant_type_allowed(grant_type) {
        return Err(AuthError::unauthorized_client(format!(
            "Client is not authorized for grant type: {grant_type}"
        )));
    }
    Ok(())
}

/// The resolved client registration. Authentication has already run, so a
/// missing client is an internal invariant violation, not a client error.
pub(crate) fn context_client(ctx: &TokenRequestContext) -> AuthResult<&Client> {
    ctx.client()
        .ok_or_else(|| AuthError::internal("Client registration missing from request context"))
}

/// Requested scope must be non-empty and every scope allowed for the
/// client (client_credentials and password grants).
pub(crate) fn validate_requested_scope(scope: Option<&str>, client: &Client) -> AuthResult<()> {
    let scope = scope
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AuthError::invalid_scope("scope is required"))?;
    for item in scope.split_whitespace() {
        if !client.is_scope_allowed(item) {
            return Err(AuthError::invalid_scope(format!(
                "Scope is not allowed for this client: {item}"
            )));
        }
    }
    Ok(())
}
