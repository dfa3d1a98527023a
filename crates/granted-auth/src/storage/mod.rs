//! Storage traits for authorization-server data.
//!
//! This crate only defines the contracts; implementations live in separate
//! crates (e.g. `granted-memory`). Every read returns
//! `AuthResult<Option<T>>`: `None` is the ordinary "not found" branch, and
//! `Err` is reserved for infrastructure failure.
//!
//! # One-time use
//!
//! Authorization codes and CIBA grants are redeemed find-then-delete. The
//! `delete_*` operations return whether a record was actually removed, and
//! implementations must make concurrent double-redemption impossible
//! (a transactional or uniquely-keyed delete). This crate calls the
//! operations in order; it does not implement the locking.

pub mod ciba;
pub mod client;
pub mod grant;
pub mod jti;
pub mod refresh_token;
pub mod user;

pub use ciba::CibaGrantStorage;
pub use client::ClientStorage;
pub use grant::AuthorizationGrantStorage;
pub use jti::JtiStorage;
pub use refresh_token::RefreshTokenStorage;
pub use user::UserStorage;
