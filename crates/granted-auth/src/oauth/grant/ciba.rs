//! CIBA grant verification (CIBA Core Section 10).
//!
//! A state machine over {pending, granted, denied} crossed with expiry.
//! Ordering is part of the wire contract: expiry precedes the
//! pending/denied checks, so a grant that timed out while undecided
//! reports `expired_token` and the client stops polling.

use std::sync::Arc;

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::client_auth::ClientCredentials;
use crate::oauth::context::{RequestContext, TokenRequestContext};
use crate::oauth::grant::{check_grant_allowed, context_client};
use crate::oauth::profile::ProfileRegistry;
use crate::types::{BackchannelAuthRequest, CibaDeliveryMode, CibaGrant, CibaStatus, GrantType};

/// One identical message for every auth_req_id lookup failure.
pub(crate) const AUTH_REQ_ID_INVALID: &str = "The auth_req_id is invalid";

/// Verifies a CIBA token exchange.
pub struct CibaGrantVerifier {
    profiles: Arc<ProfileRegistry>,
}

impl CibaGrantVerifier {
    /// Creates the verifier with its profile overlay registry.
    #[must_use]
    pub fn new(profiles: Arc<ProfileRegistry>) -> Self {
        Self { profiles }
    }

    /// Runs the fail-fast verification sequence. The grant and its
    /// backchannel request are passed as the orchestrator found them;
    /// `None` means not found.
    ///
    /// # Errors
    ///
    /// Fails with the RFC error for the first violated check.
    pub fn verify(
        &self,
        ctx: &TokenRequestContext,
        request: Option<&BackchannelAuthRequest>,
        grant: Option<&CibaGrant>,
        credentials: &ClientCredentials,
    ) -> AuthResult<()> {
        let client = context_client(ctx)?;
        check_grant_allowed(ctx.config(), client, GrantType::Ciba)?;

        // 1. Grant exists and was issued to the requesting client
        let (Some(request), Some(grant)) = (request, grant) else {
            return Err(AuthError::invalid_grant(AUTH_REQ_ID_INVALID));
        };
        if grant.client_id != credentials.client_id {
            tracing::debug!(client_id = %credentials.client_id, "auth_req_id belongs to another client");
            return Err(AuthError::invalid_grant(AUTH_REQ_ID_INVALID));
        }

        // 2. Push clients receive tokens via notification, not polling
        if client.ciba_delivery_mode == Some(CibaDeliveryMode::Push) {
            return Err(AuthError::unauthorized_client(
                "Push delivery clients must not poll the token endpoint",
            ));
        }

        // 3. Expiry precedes the pending/denied checks
        if grant.is_expired() {
            return Err(AuthError::expired_token("The auth_req_id has expired"));
        }

        // 4. Profile overlay (FAPI-CIBA adds the sender-constrained check)
        let overlay = self.profiles.ciba_verifier(request.profile)?;
        overlay.verify(ctx, request, grant, credentials)?;

        // 5-6. User decision
        match grant.status {
            CibaStatus::Pending => Err(AuthError::AuthorizationPending),
            CibaStatus::Denied => Err(AuthError::access_denied(
                "The end-user denied the authorization request",
            )),
            CibaStatus::Granted => Ok(()),
        }
    }
}
