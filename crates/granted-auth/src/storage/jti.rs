//! JTI replay-prevention storage trait.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;

/// Tracks used JWT IDs to prevent client assertion replay (RFC 7523).
///
/// Entries only need to live until the assertion's `exp`; implementations
/// may evict them afterwards.
#[async_trait]
pub trait JtiStorage: Send + Sync {
    /// Marks a JTI as used.
    ///
    /// Returns `true` if the JTI was new, `false` if it was already present
    /// (a replay).
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn mark_used(&self, jti: &str, expires_at: OffsetDateTime) -> AuthResult<bool>;
}
