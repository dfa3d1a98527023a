//! Refresh-token grant verification (RFC 6749 Section 6).

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::client_auth::ClientCredentials;
use crate::oauth::context::{RequestContext, TokenRequestContext};
use crate::oauth::grant::{check_grant_allowed, context_client};
use crate::types::{GrantType, RefreshTokenRecord};

/// One identical message for unknown tokens and tokens issued to another
/// client.
pub(crate) const REFRESH_TOKEN_INVALID: &str = "The refresh token is invalid";

/// Verifies a refresh-token exchange.
pub struct RefreshTokenVerifier;

impl RefreshTokenVerifier {
    /// Runs the fail-fast verification sequence. `None` means the presented
    /// token hash matched no record.
    ///
    /// # Errors
    ///
    /// Fails `invalid_grant` for unknown, foreign, or expired tokens.
    pub fn verify(
        &self,
        ctx: &TokenRequestContext,
        record: Option<&RefreshTokenRecord>,
        credentials: &ClientCredentials,
    ) -> AuthResult<()> {
        let client = context_client(ctx)?;
        check_grant_allowed(ctx.config(), client, GrantType::RefreshToken)?;

        let Some(record) = record else {
            return Err(AuthError::invalid_grant(REFRESH_TOKEN_INVALID));
        };
        if record.client_id != credentials.client_id {
            tracing::debug!(client_id = %credentials.client_id, "refresh token belongs to another client");
            return Err(AuthError::invalid_grant(REFRESH_TOKEN_INVALID));
        }
        if record.is_expired() {
            return Err(AuthError::invalid_grant("The refresh token has expired"));
        }
        Ok(())
    }
}
