//! Resource-owner-password grant verification (RFC 6749 Section 4.3).
//!
//! Legacy grant, disabled in the default server configuration. An unknown
//! username and a wrong password produce one identical error so the
//! endpoint cannot be used to enumerate users.

use std::sync::Arc;

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::client_auth::ClientCredentials;
use crate::oauth::context::{RequestContext, TokenRequestContext};
use crate::oauth::grant::{check_grant_allowed, context_client, validate_requested_scope};
use crate::storage::UserStorage;
use crate::types::GrantType;

/// Verifies a resource-owner-password exchange.
pub struct ResourceOwnerPasswordGrantVerifier {
    users: Arc<dyn UserStorage>,
}

impl ResourceOwnerPasswordGrantVerifier {
    /// Creates the verifier with its credential store.
    #[must_use]
    pub fn new(users: Arc<dyn UserStorage>) -> Self {
        Self { users }
    }

    /// Runs the fail-fast verification sequence and resolves the end-user.
    ///
    /// Returns the authenticated subject identifier.
    ///
    /// # Errors
    ///
    /// Fails `invalid_scope` for an empty or non-allowed scope set,
    /// `invalid_request` for missing credentials, and one identical
    /// `invalid_grant` for unknown users and wrong passwords.
    pub async fn verify(
        &self,
        ctx: &TokenRequestContext,
        _credentials: &ClientCredentials,
    ) -> AuthResult<String> {
        let client = context_client(ctx)?;
        check_grant_allowed(ctx.config(), client, GrantType::Password)?;
        validate_requested_scope(ctx.request().scope.as_deref(), client)?;

        let request = ctx.request();
        let (Some(username), Some(password)) =
            (request.username.as_deref(), request.password.as_deref())
        else {
            return Err(AuthError::invalid_request(
                "username and password are required",
            ));
        };

        self.users
            .verify_password(username, password)
            .await?
            .ok_or_else(|| AuthError::invalid_grant("Invalid resource owner credentials"))
    }
}
