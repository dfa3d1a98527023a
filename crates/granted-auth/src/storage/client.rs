//! Client registration storage trait.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::Client;

/// Read access to OAuth 2.0 client registrations.
///
/// This core only reads registrations; management CRUD is an external
/// control-plane concern.
#[async_trait]
pub trait ClientStorage: Send + Sync {
    /// Finds a client by its OAuth client_id.
    ///
    /// Returns `None` if the client does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>>;
}
