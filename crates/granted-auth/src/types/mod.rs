//! Domain types: client registrations and persisted grant records.

pub mod ciba;
pub mod client;
pub mod grant;
pub mod refresh_token;

pub use ciba::{BackchannelAuthRequest, CibaGrant, CibaStatus};
pub use client::{Client, CibaDeliveryMode, GrantType, MtlsBinding, TokenEndpointAuthMethod};
pub use grant::{AuthorizationCodeGrant, AuthorizationRequest};
pub use refresh_token::RefreshTokenRecord;
