//! Client-credentials grant verification (RFC 6749 Section 4.4).

use crate::AuthResult;
use crate::oauth::client_auth::ClientCredentials;
use crate::oauth::context::{RequestContext, TokenRequestContext};
use crate::oauth::grant::{check_grant_allowed, context_client, validate_requested_scope};
use crate::types::GrantType;

/// Verifies a client-credentials exchange. The authenticated client is the
/// resource owner, so the remaining check is the requested scope.
pub struct ClientCredentialsGrantVerifier;

impl ClientCredentialsGrantVerifier {
    /// Runs the fail-fast verification sequence.
    ///
    /// # Errors
    ///
    /// Fails `invalid_scope` for an empty or non-allowed scope set.
    pub fn verify(
        &self,
        ctx: &TokenRequestContext,
        _credentials: &ClientCredentials,
    ) -> AuthResult<()> {
        let client = context_client(ctx)?;
        check_grant_allowed(ctx.config(), client, GrantType::ClientCredentials)?;
        validate_requested_scope(ctx.request().scope.as_deref(), client)?;
        Ok(())
    }
}
