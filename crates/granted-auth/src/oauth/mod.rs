//! OAuth 2.0 / OpenID Connect token endpoint machinery.
//!
//! Layering, outermost first:
//!
//! - [`service`] — the orchestrators ([`service::TokenService`],
//!   [`service::BackchannelService`]) that run a request end to end
//! - [`client_auth`] — the six client authentication methods behind one
//!   [`client_auth::ClientAuthenticatorRegistry`]
//! - [`grant`] — one verifier per grant type
//! - [`profile`] — per-profile verification overlays (OIDC, FAPI, CIBA)
//! - [`pkce`] — proof-key verification shared by the code grant
//! - [`context`] — the read-only per-request views everything above consumes

pub mod client_auth;
pub mod context;
pub mod grant;
pub mod pkce;
pub mod profile;
pub mod service;

pub use client_auth::{ClientAuthenticator, ClientAuthenticatorRegistry, ClientCredentials};
pub use context::{
    BackchannelRequest, BackchannelRequestContext, RequestContext, TokenRequest,
    TokenRequestContext,
};
pub use profile::{AuthorizationProfile, CibaProfile, ProfileRegistry};
pub use service::{
    BackchannelAuthResponse, BackchannelService, TokenIssuer, TokenResponse, TokenService,
    VerifiedGrant,
};
