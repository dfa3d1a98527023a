//! CIBA grant storage trait.

use async_trait::async_trait;
use uuid::Uuid;

use crate::AuthResult;
use crate::types::{BackchannelAuthRequest, CibaGrant, CibaStatus};

/// Storage for backchannel authentication requests and CIBA grants.
///
/// The interaction side (user approval on the authentication device) updates
/// the grant status; the polling token endpoint reads it and deletes it on
/// successful redemption.
#[async_trait]
pub trait CibaGrantStorage: Send + Sync {
    /// Persists a backchannel authentication request.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn create_request(&self, request: &BackchannelAuthRequest) -> AuthResult<()>;

    /// Persists a CIBA grant.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn create_grant(&self, grant: &CibaGrant) -> AuthResult<()>;

    /// Finds a backchannel authentication request by its identifier.
    async fn find_request(&self, id: Uuid) -> AuthResult<Option<BackchannelAuthRequest>>;

    /// Finds a CIBA grant by auth_req_id.
    async fn find_grant(&self, auth_req_id: &str) -> AuthResult<Option<CibaGrant>>;

    /// Records the user's decision on a pending grant.
    ///
    /// # Errors
    ///
    /// Returns an error if the grant does not exist or the storage
    /// operation fails.
    async fn update_status(
        &self,
        auth_req_id: &str,
        status: CibaStatus,
        subject: Option<String>,
    ) -> AuthResult<()>;

    /// Deletes a CIBA grant on redemption.
    ///
    /// Returns `true` if a record was removed. Implementations must make
    /// concurrent double-redemption impossible: exactly one caller observes
    /// `true` for a given auth_req_id.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete_grant(&self, auth_req_id: &str) -> AuthResult<bool>;
}
