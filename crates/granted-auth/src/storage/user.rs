//! Resource-owner credential storage trait.

use async_trait::async_trait;

use crate::AuthResult;

/// Verifies resource-owner credentials for the password grant.
///
/// Implementations must not distinguish between an unknown username and a
/// wrong password: both return `None`.
#[async_trait]
pub trait UserStorage: Send + Sync {
    /// Checks a username/password pair.
    ///
    /// Returns the subject identifier on success, `None` otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn verify_password(&self, username: &str, password: &str)
    -> AuthResult<Option<String>>;
}
