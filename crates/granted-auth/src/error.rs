//! Authorization-server error types.
//!
//! Every failure a verifier or authenticator can produce is a variant of
//! [`AuthError`]. The variant determines the OAuth 2.0 wire error code
//! (RFC 6749 Section 5.2, CIBA Core Section 11) and the HTTP status class;
//! the message becomes the `error_description`.
//!
//! Descriptions are intentionally specific for debugging, but the codes stay
//! coarse: grant lookups never reveal whether a code, request, or client
//! record was the missing piece.

use std::fmt;

/// Errors that can occur during client authentication and grant verification.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Client authentication failed (bad secret, bad signature, certificate
    /// mismatch, or missing credential). Maps to `invalid_client` / 401.
    #[error("Invalid client: {message}")]
    InvalidClient {
        /// Description of why authentication failed.
        message: String,
    },

    /// The presented grant (code, auth_req_id, refresh token) is invalid,
    /// expired, revoked, or was issued to another client.
    #[error("Invalid grant: {message}")]
    InvalidGrant {
        /// Description of why the grant is invalid.
        message: String,
    },

    /// The request is missing a required parameter or is otherwise malformed.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of why the request is invalid.
        message: String,
    },

    /// The requested scope is empty, unknown, or not allowed for the client.
    #[error("Invalid scope: {message}")]
    InvalidScope {
        /// Description of why the scope is invalid.
        message: String,
    },

    /// The authenticated client is not authorized to use this grant type
    /// or delivery mode.
    #[error("Unauthorized client: {message}")]
    UnauthorizedClient {
        /// Description of why the client is not authorized.
        message: String,
    },

    /// The grant type is not supported by this server.
    #[error("Unsupported grant type: {grant_type}")]
    UnsupportedGrantType {
        /// The unsupported grant type.
        grant_type: String,
    },

    /// The CIBA auth_req_id has expired (CIBA Core Section 11).
    #[error("Expired token: {message}")]
    ExpiredToken {
        /// Description of the expiry.
        message: String,
    },

    /// The CIBA authorization is still pending user interaction.
    #[error("Authorization pending")]
    AuthorizationPending,

    /// The end-user denied the CIBA authorization request.
    #[error("Access denied: {message}")]
    AccessDenied {
        /// Description of the denial.
        message: String,
    },

    /// An error occurred while reading or writing auth data.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The server configuration is inconsistent (unknown authenticator,
    /// unknown profile). Server fault, never a client-facing OAuth error.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `InvalidClient` error.
    #[must_use]
    pub fn invalid_client(message: impl Into<String>) -> Self {
        Self::InvalidClient {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidGrant` error.
    #[must_use]
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidScope` error.
    #[must_use]
    pub fn invalid_scope(message: impl Into<String>) -> Self {
        Self::InvalidScope {
            message: message.into(),
        }
    }

    /// Creates a new `UnauthorizedClient` error.
    #[must_use]
    pub fn unauthorized_client(message: impl Into<String>) -> Self {
        Self::UnauthorizedClient {
            message: message.into(),
        }
    }

    /// Creates a new `UnsupportedGrantType` error.
    #[must_use]
    pub fn unsupported_grant_type(grant_type: impl Into<String>) -> Self {
        Self::UnsupportedGrantType {
            grant_type: grant_type.into(),
        }
    }

    /// Creates a new `ExpiredToken` error.
    #[must_use]
    pub fn expired_token(message: impl Into<String>) -> Self {
        Self::ExpiredToken {
            message: message.into(),
        }
    }

    /// Creates a new `AccessDenied` error.
    #[must_use]
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is the client's fault (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidClient { .. }
                | Self::InvalidGrant { .. }
                | Self::InvalidRequest { .. }
                | Self::InvalidScope { .. }
                | Self::UnauthorizedClient { .. }
                | Self::UnsupportedGrantType { .. }
                | Self::ExpiredToken { .. }
                | Self::AuthorizationPending
                | Self::AccessDenied { .. }
        )
    }

    /// Returns `true` if this error is a server fault (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. }
        )
    }

    /// Returns `true` if this is a client authentication failure.
    #[must_use]
    pub fn is_authentication_error(&self) -> bool {
        matches!(self, Self::InvalidClient { .. })
    }

    /// Returns the error category for logging and monitoring.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidClient { .. } => ErrorCategory::Authentication,
            Self::InvalidGrant { .. }
            | Self::ExpiredToken { .. }
            | Self::AuthorizationPending
            | Self::AccessDenied { .. } => ErrorCategory::Grant,
            Self::InvalidRequest { .. } | Self::UnsupportedGrantType { .. } => {
                ErrorCategory::Validation
            }
            Self::InvalidScope { .. } | Self::UnauthorizedClient { .. } => {
                ErrorCategory::Authorization
            }
            Self::Storage { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the OAuth 2.0 / CIBA wire error code for this error.
    ///
    /// These strings are part of the wire contract and must match RFC 6749
    /// Section 5.2 and CIBA Core Section 11 exactly.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::InvalidClient { .. } => "invalid_client",
            Self::InvalidGrant { .. } => "invalid_grant",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::InvalidScope { .. } => "invalid_scope",
            Self::UnauthorizedClient { .. } => "unauthorized_client",
            Self::UnsupportedGrantType { .. } => "unsupported_grant_type",
            Self::ExpiredToken { .. } => "expired_token",
            Self::AuthorizationPending => "authorization_pending",
            Self::AccessDenied { .. } => "access_denied",
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. } => {
                "server_error"
            }
        }
    }

    /// Returns the HTTP status code this error maps to.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidClient { .. } => 401,
            Self::InvalidGrant { .. }
            | Self::InvalidRequest { .. }
            | Self::InvalidScope { .. }
            | Self::UnauthorizedClient { .. }
            | Self::UnsupportedGrantType { .. }
            | Self::ExpiredToken { .. }
            | Self::AuthorizationPending
            | Self::AccessDenied { .. } => 400,
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. } => 500,
        }
    }
}

/// Categories of errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Client authentication failures.
    Authentication,
    /// Grant verification failures.
    Grant,
    /// Authorization (scope / grant-type allowance) failures.
    Authorization,
    /// Request validation failures.
    Validation,
    /// Infrastructure/storage failures.
    Infrastructure,
    /// Server configuration failures.
    Configuration,
    /// Internal server errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::Grant => write!(f, "grant"),
            Self::Authorization => write!(f, "authorization"),
            Self::Validation => write!(f, "validation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
