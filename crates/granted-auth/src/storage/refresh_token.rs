//! Refresh token storage trait.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::RefreshTokenRecord;

/// Storage for refresh token records.
///
/// Lookups are by token hash; the plaintext token never reaches storage.
#[async_trait]
pub trait RefreshTokenStorage: Send + Sync {
    /// Persists a refresh token record.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn register(&self, record: &RefreshTokenRecord) -> AuthResult<()>;

    /// Finds a record by the SHA-256 hash of the presented token.
    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<RefreshTokenRecord>>;

    /// Deletes a record by token hash (rotation / revocation).
    ///
    /// Returns `true` if a record was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete_by_hash(&self, token_hash: &str) -> AuthResult<bool>;
}
