//! In-memory storage backends for the `granted-auth` storage traits.
//!
//! Intended for tests and single-process deployments. All backends are
//! `tokio::sync::RwLock`-guarded maps; the one-time-use deletes take the
//! write lock, so exactly one concurrent redemption of a code or CIBA grant
//! observes the record being removed.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use granted_auth::oauth::TokenService;
//! use granted_memory::{
//!     MemoryClientStorage, MemoryGrantStorage, MemoryCibaStorage,
//!     MemoryRefreshTokenStorage, MemoryUserStorage, MemoryJtiStorage,
//! };
//!
//! let clients = Arc::new(MemoryClientStorage::new());
//! clients.register(client).await;
//! let service = TokenService::new(config, clients, /* ... */);
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use granted_auth::AuthResult;
use granted_auth::error::AuthError;
use granted_auth::storage::{
    AuthorizationGrantStorage, CibaGrantStorage, ClientStorage, JtiStorage, RefreshTokenStorage,
    UserStorage,
};
use granted_auth::types::{
    AuthorizationCodeGrant, AuthorizationRequest, BackchannelAuthRequest, CibaGrant, CibaStatus,
    Client, RefreshTokenRecord,
};

// =============================================================================
// Clients
// =============================================================================

/// In-memory client registration store.
#[derive(Debug, Default)]
pub struct MemoryClientStorage {
    clients: RwLock<HashMap<String, Client>>,
}

impl MemoryClientStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a client, replacing any existing registration with the
    /// same client_id.
    pub async fn register(&self, client: Client) {
        self.clients
            .write()
            .await
            .insert(client.client_id.clone(), client);
    }
}

#[async_trait]
impl ClientStorage for MemoryClientStorage {
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>> {
        Ok(self.clients.read().await.get(client_id).cloned())
    }
}

// =============================================================================
// Authorization-code grants
// =============================================================================

/// In-memory store for authorization requests and code grants.
#[derive(Debug, Default)]
pub struct MemoryGrantStorage {
    requests: RwLock<HashMap<Uuid, AuthorizationRequest>>,
    grants: RwLock<HashMap<String, AuthorizationCodeGrant>>,
}

impl MemoryGrantStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthorizationGrantStorage for MemoryGrantStorage {
    async fn create_request(&self, request: &AuthorizationRequest) -> AuthResult<()> {
        self.requests
            .write()
            .await
            .insert(request.id, request.clone());
        Ok(())
    }

    async fn create_grant(&self, grant: &AuthorizationCodeGrant) -> AuthResult<()> {
        self.grants
            .write()
            .await
            .insert(grant.code.clone(), grant.clone());
        Ok(())
    }

    async fn find_request(&self, id: Uuid) -> AuthResult<Option<AuthorizationRequest>> {
        Ok(self.requests.read().await.get(&id).cloned())
    }

    async fn find_grant_by_code(&self, code: &str) -> AuthResult<Option<AuthorizationCodeGrant>> {
        Ok(self.grants.read().await.get(code).cloned())
    }

    async fn delete_grant_by_code(&self, code: &str) -> AuthResult<bool> {
        // Single write-locked remove: one concurrent caller wins.
        Ok(self.grants.write().await.remove(code).is_some())
    }
}

// =============================================================================
// CIBA grants
// =============================================================================

/// In-memory store for backchannel authentication requests and CIBA grants.
#[derive(Debug, Default)]
pub struct MemoryCibaStorage {
    requests: RwLock<HashMap<Uuid, BackchannelAuthRequest>>,
    grants: RwLock<HashMap<String, CibaGrant>>,
}

impl MemoryCibaStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CibaGrantStorage for MemoryCibaStorage {
    async fn create_request(&self, request: &BackchannelAuthRequest) -> AuthResult<()> {
        self.requests
            .write()
            .await
            .insert(request.id, request.clone());
        Ok(())
    }

    async fn create_grant(&self, grant: &CibaGrant) -> AuthResult<()> {
        self.grants
            .write()
            .await
            .insert(grant.auth_req_id.clone(), grant.clone());
        Ok(())
    }

    async fn find_request(&self, id: Uuid) -> AuthResult<Option<BackchannelAuthRequest>> {
        Ok(self.requests.read().await.get(&id).cloned())
    }

    async fn find_grant(&self, auth_req_id: &str) -> AuthResult<Option<CibaGrant>> {
        Ok(self.grants.read().await.get(auth_req_id).cloned())
    }

    async fn update_status(
        &self,
        auth_req_id: &str,
        status: CibaStatus,
        subject: Option<String>,
    ) -> AuthResult<()> {
        let mut grants = self.grants.write().await;
        let grant = grants.get_mut(auth_req_id).ok_or_else(|| {
            AuthError::storage(format!("No CIBA grant for auth_req_id: {auth_req_id}"))
        })?;
        grant.status = status;
        grant.subject = subject;
        Ok(())
    }

    async fn delete_grant(&self, auth_req_id: &str) -> AuthResult<bool> {
        Ok(self.grants.write().await.remove(auth_req_id).is_some())
    }
}

// =============================================================================
// Refresh tokens
// =============================================================================

/// In-memory refresh token record store, keyed by token hash.
#[derive(Debug, Default)]
pub struct MemoryRefreshTokenStorage {
    records: RwLock<HashMap<String, RefreshTokenRecord>>,
}

impl MemoryRefreshTokenStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefreshTokenStorage for MemoryRefreshTokenStorage {
    async fn register(&self, record: &RefreshTokenRecord) -> AuthResult<()> {
        self.records
            .write()
            .await
            .insert(record.token_hash.clone(), record.clone());
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<RefreshTokenRecord>> {
        Ok(self.records.read().await.get(token_hash).cloned())
    }

    async fn delete_by_hash(&self, token_hash: &str) -> AuthResult<bool> {
        Ok(self.records.write().await.remove(token_hash).is_some())
    }
}

// =============================================================================
// JTI replay prevention
// =============================================================================

/// In-memory used-JTI set for client assertion replay prevention.
///
/// Expired entries are evicted lazily on each insert.
#[derive(Debug, Default)]
pub struct MemoryJtiStorage {
    used: RwLock<HashMap<String, OffsetDateTime>>,
}

impl MemoryJtiStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JtiStorage for MemoryJtiStorage {
    async fn mark_used(&self, jti: &str, expires_at: OffsetDateTime) -> AuthResult<bool> {
        let mut used = self.used.write().await;
        let now = OffsetDateTime::now_utc();
        used.retain(|_, exp| *exp > now);
        Ok(used.insert(jti.to_string(), expires_at).is_none())
    }
}

// =============================================================================
// Resource owners
// =============================================================================

/// In-memory resource-owner credential store.
///
/// Passwords are stored as SHA-256 digests. Unknown usernames and wrong
/// passwords both resolve to `None`, as the trait requires.
#[derive(Debug, Default)]
pub struct MemoryUserStorage {
    users: RwLock<HashMap<String, UserRecord>>,
}

#[derive(Debug, Clone)]
struct UserRecord {
    password_hash: [u8; 32],
    subject: String,
}

fn hash_password(password: &str) -> [u8; 32] {
    Sha256::digest(password.as_bytes()).into()
}

impl MemoryUserStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a resource owner.
    pub async fn add_user(
        &self,
        username: impl Into<String>,
        password: &str,
        subject: impl Into<String>,
    ) {
        self.users.write().await.insert(
            username.into(),
            UserRecord {
                password_hash: hash_password(password),
                subject: subject.into(),
            },
        );
    }
}

#[async_trait]
impl UserStorage for MemoryUserStorage {
    async fn verify_password(
        &self,
        username: &str,
        password: &str,
    ) -> AuthResult<Option<String>> {
        let users = self.users.read().await;
        Ok(users
            .get(username)
            .filter(|record| record.password_hash == hash_password(password))
            .map(|record| record.subject.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[tokio::test]
    async fn test_code_grant_delete_is_one_shot() {
        let storage = MemoryGrantStorage::new();
        let grant = AuthorizationCodeGrant {
            code: "code-1".to_string(),
            authorization_request_id: Uuid::new_v4(),
            client_id: "app-1".to_string(),
            subject: "user-1".to_string(),
            expires_at: OffsetDateTime::now_utc() + Duration::minutes(5),
        };
        storage.create_grant(&grant).await.unwrap();

        assert!(storage.find_grant_by_code("code-1").await.unwrap().is_some());
        assert!(storage.delete_grant_by_code("code-1").await.unwrap());
        assert!(!storage.delete_grant_by_code("code-1").await.unwrap());
        assert!(storage.find_grant_by_code("code-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ciba_status_update() {
        let storage = MemoryCibaStorage::new();
        let grant = CibaGrant {
            auth_req_id: "req-1".to_string(),
            backchannel_request_id: Uuid::new_v4(),
            client_id: "app-1".to_string(),
            subject: None,
            status: CibaStatus::Pending,
            expires_at: OffsetDateTime::now_utc() + Duration::minutes(5),
        };
        storage.create_grant(&grant).await.unwrap();

        storage
            .update_status("req-1", CibaStatus::Granted, Some("user-1".to_string()))
            .await
            .unwrap();
        let stored = storage.find_grant("req-1").await.unwrap().unwrap();
        assert_eq!(stored.status, CibaStatus::Granted);
        assert_eq!(stored.subject.as_deref(), Some("user-1"));

        assert!(storage.update_status("missing", CibaStatus::Denied, None).await.is_err());
    }

    #[tokio::test]
    async fn test_jti_replay_is_detected() {
        let storage = MemoryJtiStorage::new();
        let exp = OffsetDateTime::now_utc() + Duration::minutes(5);
        assert!(storage.mark_used("jti-1", exp).await.unwrap());
        assert!(!storage.mark_used("jti-1", exp).await.unwrap());
        assert!(storage.mark_used("jti-2", exp).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_jti_is_evicted() {
        let storage = MemoryJtiStorage::new();
        let past = OffsetDateTime::now_utc() - Duration::seconds(1);
        assert!(storage.mark_used("jti-1", past).await.unwrap());
        // The expired entry no longer counts as a replay.
        let future = OffsetDateTime::now_utc() + Duration::minutes(5);
        assert!(storage.mark_used("jti-1", future).await.unwrap());
    }

    #[tokio::test]
    async fn test_user_verification_does_not_distinguish_failures() {
        let storage = MemoryUserStorage::new();
        storage.add_user("alice", "correct-horse", "user-alice").await;

        assert_eq!(
            storage.verify_password("alice", "correct-horse").await.unwrap(),
            Some("user-alice".to_string())
        );
        assert_eq!(storage.verify_password("alice", "wrong").await.unwrap(), None);
        assert_eq!(storage.verify_password("bob", "wrong").await.unwrap(), None);
    }
}
