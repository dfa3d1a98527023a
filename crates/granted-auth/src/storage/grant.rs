//! Authorization-code grant storage trait.

use async_trait::async_trait;
use uuid::Uuid;

use crate::AuthResult;
use crate::types::{AuthorizationCodeGrant, AuthorizationRequest};

/// Storage for authorization requests and the codes that redeem them.
///
/// Records are created by the front-channel side; the token endpoint reads
/// them and deletes the grant on successful redemption.
#[async_trait]
pub trait AuthorizationGrantStorage: Send + Sync {
    /// Persists an authorization request.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn create_request(&self, request: &AuthorizationRequest) -> AuthResult<()>;

    /// Persists an authorization code grant.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn create_grant(&self, grant: &AuthorizationCodeGrant) -> AuthResult<()>;

    /// Finds an authorization request by its identifier.
    async fn find_request(&self, id: Uuid) -> AuthResult<Option<AuthorizationRequest>>;

    /// Finds a code grant by the authorization code.
    async fn find_grant_by_code(&self, code: &str) -> AuthResult<Option<AuthorizationCodeGrant>>;

    /// Deletes a code grant on redemption.
    ///
    /// Returns `true` if a record was removed. Implementations must make
    /// concurrent double-redemption impossible: exactly one caller observes
    /// `true` for a given code.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete_grant_by_code(&self, code: &str) -> AuthResult<bool>;
}
