//! Authorization-code grant records.
//!
//! Two persisted records back the authorization code flow: the
//! [`AuthorizationRequest`] captured at authorize-time, and the
//! [`AuthorizationCodeGrant`] issued once the user approved it. Both are
//! created by the front-channel side (external to this crate), read here
//! during code exchange, and deleted on successful redemption.
//!
//! # Security
//!
//! - Authorization codes are cryptographically random (256 bits)
//! - Codes are single-use: redeemed-then-deleted; a second presentation
//!   observes the record gone and fails `invalid_grant`
//! - The PKCE challenge and method are stored here and govern token-time
//!   recomputation (the token request can never downgrade the method)

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::oauth::profile::AuthorizationProfile;

/// Persisted authorization request.
///
/// Snapshot of the front-channel authorization request the code was issued
/// for. The token endpoint replays its `redirect_uri` and PKCE parameters
/// against the token request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRequest {
    /// Unique request identifier.
    pub id: Uuid,

    /// Client that initiated the request.
    pub client_id: String,

    /// Redirect URI from the authorization request, when one was sent.
    /// If present, the token request must repeat it byte-identically.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    /// Granted scopes (space-separated).
    pub scope: String,

    /// PKCE code challenge, when the request carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,

    /// PKCE challenge method stored with the original request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<String>,

    /// OpenID Connect nonce, when the request carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Verification profile selected by the server from granted scopes and
    /// configuration. Never taken from client input.
    pub profile: AuthorizationProfile,

    /// Timestamp when the request was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Persisted authorization code grant.
///
/// Links a one-time code to the authorization request it redeems and the
/// client it was granted to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationCodeGrant {
    /// Authorization code (one-time use), 256-bit random, base64url.
    pub code: String,

    /// Identifier of the authorization request this code redeems.
    pub authorization_request_id: Uuid,

    /// Client the code was granted to.
    pub client_id: String,

    /// Authenticated end-user subject.
    pub subject: String,

    /// Timestamp when the code expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl AuthorizationCodeGrant {
    /// Generates a new cryptographically secure authorization code.
    ///
    /// 256 bits of random data, base64url-encoded without padding
    /// (43 characters).
    #[must_use]
    pub fn generate_code() -> String {
        let mut bytes = [0u8; 32];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Returns `true` if the code has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn test_generate_code_length_and_charset() {
        let code = AuthorizationCodeGrant::generate_code();
        assert_eq!(code.len(), 43);
        assert!(
            code.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_generate_code_uniqueness() {
        assert_ne!(
            AuthorizationCodeGrant::generate_code(),
            AuthorizationCodeGrant::generate_code()
        );
    }

    #[test]
    fn test_expiry() {
        let grant = AuthorizationCodeGrant {
            code: AuthorizationCodeGrant::generate_code(),
            authorization_request_id: Uuid::new_v4(),
            client_id: "app-1".to_string(),
            subject: "user-1".to_string(),
            expires_at: OffsetDateTime::now_utc() - Duration::seconds(1),
        };
        assert!(grant.is_expired());
    }
}
