//! CIBA (Client-Initiated Backchannel Authentication) records.
//!
//! A [`BackchannelAuthRequest`] is created when the backchannel endpoint
//! accepts a request; the matching [`CibaGrant`] tracks the decoupled user
//! interaction as a tri-state plus expiry. The polling token endpoint reads
//! the grant and deletes it on successful redemption.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::oauth::profile::CibaProfile;

/// User interaction state of a CIBA grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CibaStatus {
    /// The user has not yet approved or denied the request.
    Pending,
    /// The user approved the request; tokens may be issued.
    Granted,
    /// The user denied the request.
    Denied,
}

impl CibaStatus {
    /// Returns the status as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Granted => "granted",
            Self::Denied => "denied",
        }
    }
}

impl std::fmt::Display for CibaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted backchannel authentication request.
///
/// Snapshot of the accepted backchannel request the auth_req_id was issued
/// for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackchannelAuthRequest {
    /// Unique request identifier.
    pub id: Uuid,

    /// Client that initiated the request.
    pub client_id: String,

    /// Requested scopes (space-separated).
    pub scope: String,

    /// Login hint the request carried (login_hint or id_token_hint subject).
    pub login_hint: String,

    /// Human-readable binding message shown on both devices, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binding_message: Option<String>,

    /// Verification profile selected by the server. Never client input.
    pub profile: CibaProfile,

    /// Timestamp when the request was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Persisted CIBA grant keyed by auth_req_id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CibaGrant {
    /// The auth_req_id the client polls with (one-time use once granted).
    pub auth_req_id: String,

    /// Identifier of the backchannel authentication request.
    pub backchannel_request_id: Uuid,

    /// Client the grant belongs to.
    pub client_id: String,

    /// Authenticated end-user subject, set when the user decides.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// User interaction state.
    pub status: CibaStatus,

    /// Timestamp when the auth_req_id expires (`expires_in` at issuance).
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl CibaGrant {
    /// Generates a new cryptographically secure auth_req_id.
    ///
    /// 256 bits of random data, base64url-encoded without padding.
    #[must_use]
    pub fn generate_auth_req_id() -> String {
        let mut bytes = [0u8; 32];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Returns `true` if the auth_req_id has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() > self.expires_at
    }
}
