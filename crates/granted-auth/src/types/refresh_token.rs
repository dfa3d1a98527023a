//! Refresh token record.
//!
//! # Security
//!
//! The token itself is never stored. Only a SHA-256 hash is persisted,
//! similar to password storage: hash the incoming token, look up by hash,
//! then validate ownership and expiration.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

/// Refresh token stored by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRecord {
    /// Unique identifier for this record.
    pub id: Uuid,

    /// SHA-256 hash of the actual token value, base64url-encoded.
    pub token_hash: String,

    /// Client the token was issued to.
    pub client_id: String,

    /// End-user subject (None for client-credentials tokens).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Granted scopes (space-separated).
    pub scope: String,

    /// Timestamp when the token expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl RefreshTokenRecord {
    /// Hashes a plaintext refresh token for lookup.
    #[must_use]
    pub fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }

    /// Returns `true` if the token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() > self.expires_at
    }
}
