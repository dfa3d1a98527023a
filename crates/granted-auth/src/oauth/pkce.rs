//! PKCE verification (RFC 7636).
//!
//! The challenge and method stored with the original authorization request
//! govern token-time recomputation. The method is never taken from the token
//! request, so a client cannot downgrade S256 to plain.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::context::TokenRequestContext;
use crate::types::AuthorizationRequest;

/// PKCE code challenge methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkceChallengeMethod {
    /// The challenge is the verifier unchanged. Discouraged; kept for
    /// RFC 7636 completeness.
    Plain,
    /// challenge = BASE64URL(SHA256(verifier)).
    S256,
}

impl PkceChallengeMethod {
    /// Parses the stored `code_challenge_method` value. An absent method
    /// defaults to `plain` per RFC 7636 Section 4.3.
    fn from_stored(value: Option<&str>) -> AuthResult<Self> {
        match value {
            None | Some("plain") => Ok(Self::Plain),
            Some("S256") => Ok(Self::S256),
            Some(other) => Err(AuthError::invalid_grant(format!(
                "Unsupported code_challenge_method: {other}"
            ))),
        }
    }
}

/// Verifies the token request's `code_verifier` against the challenge
/// stored with the authorization request.
///
/// No-op when the original request carried no challenge. Runs whenever a
/// challenge was stored, regardless of client confidentiality.
///
/// # Errors
///
/// Returns `InvalidGrant` when the verifier is missing, malformed, or does
/// not recompute to the stored challenge.
pub fn verify(ctx: &TokenRequestContext, request: &AuthorizationRequest) -> AuthResult<()> {
    let Some(challenge) = request.code_challenge.as_deref() else {
        return Ok(());
    };

    let verifier = ctx
        .request()
        .code_verifier
        .as_deref()
        .ok_or_else(|| AuthError::invalid_grant("code_verifier is required"))?;
    check_verifier_syntax(verifier)?;

    let method = PkceChallengeMethod::from_stored(request.code_challenge_method.as_deref())?;
    let computed = compute_challenge(verifier, method);
    if computed != challenge {
        tracing::debug!(client_id = %request.client_id, "PKCE verification failed");
        return Err(AuthError::invalid_grant("code_verifier does not match"));
    }
    Ok(())
}

/// Recomputes the challenge for a verifier under the given method.
#[must_use]
pub fn compute_challenge(verifier: &str, method: PkceChallengeMethod) -> String {
    match method {
        PkceChallengeMethod::Plain => verifier.to_string(),
        PkceChallengeMethod::S256 => {
            let mut hasher = Sha256::new();
            hasher.update(verifier.as_bytes());
            URL_SAFE_NO_PAD.encode(hasher.finalize())
        }
    }
}

/// RFC 7636 Section 4.1: 43-128 characters from the unreserved set.
fn check_verifier_syntax(verifier: &str) -> AuthResult<()> {
    if verifier.len() < 43 || verifier.len() > 128 {
        return Err(AuthError::invalid_grant(
            "code_verifier must be 43-128 characters",
        ));
    }
    let valid = verifier
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~'));
    if !valid {
        return Err(AuthError::invalid_grant(
            "code_verifier contains invalid characters",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::oauth::context::TokenRequest;
    use crate::oauth::profile::AuthorizationProfile;
    use std::sync::Arc;
    use time::OffsetDateTime;
    use uuid::Uuid;

    // RFC 7636 Appendix B test vector.
    const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    const CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

    fn ctx_with_verifier(verifier: Option<&str>) -> TokenRequestContext {
        TokenRequestContext::new(
            TokenRequest {
                grant_type: "authorization_code".to_string(),
                code_verifier: verifier.map(ToString::to_string),
                ..Default::default()
            },
            None,
            None,
            Arc::new(ServerConfig::default()),
            None,
        )
        .unwrap()
    }

    fn stored_request(
        challenge: Option<&str>,
        method: Option<&str>,
    ) -> AuthorizationRequest {
        AuthorizationRequest {
            id: Uuid::new_v4(),
            client_id: "app-1".to_string(),
            redirect_uri: None,
            scope: "openid".to_string(),
            code_challenge: challenge.map(ToString::to_string),
            code_challenge_method: method.map(ToString::to_string),
            nonce: None,
            profile: AuthorizationProfile::OAuth2,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn test_rfc7636_appendix_b_vector() {
        assert_eq!(
            compute_challenge(VERIFIER, PkceChallengeMethod::S256),
            CHALLENGE
        );
    }

    #[test]
    fn test_s256_round_trip() {
        let ctx = ctx_with_verifier(Some(VERIFIER));
        let request = stored_request(Some(CHALLENGE), Some("S256"));
        assert!(verify(&ctx, &request).is_ok());
    }

    #[test]
    fn test_s256_mismatch() {
        let wrong = format!("{}x", &VERIFIER[..42]);
        let ctx = ctx_with_verifier(Some(&wrong));
        let request = stored_request(Some(CHALLENGE), Some("S256"));
        let err = verify(&ctx, &request).unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_grant");
    }

    #[test]
    fn test_plain_round_trip() {
        let ctx = ctx_with_verifier(Some(VERIFIER));
        let request = stored_request(Some(VERIFIER), Some("plain"));
        assert!(verify(&ctx, &request).is_ok());

        // Absent method defaults to plain.
        let request = stored_request(Some(VERIFIER), None);
        assert!(verify(&ctx, &request).is_ok());
    }

    #[test]
    fn test_no_stored_challenge_is_noop() {
        let ctx = ctx_with_verifier(None);
        let request = stored_request(None, None);
        assert!(verify(&ctx, &request).is_ok());
    }

    #[test]
    fn test_missing_verifier_fails() {
        let ctx = ctx_with_verifier(None);
        let request = stored_request(Some(CHALLENGE), Some("S256"));
        let err = verify(&ctx, &request).unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_grant");
    }

    #[test]
    fn test_method_comes_from_stored_request() {
        // Challenge was stored as S256; a verifier that equals the stored
        // challenge string must not pass as if the method were plain.
        let ctx = ctx_with_verifier(Some(CHALLENGE));
        let request = stored_request(Some(CHALLENGE), Some("S256"));
        assert!(verify(&ctx, &request).is_err());
    }

    #[test]
    fn test_verifier_syntax() {
        let ctx = ctx_with_verifier(Some("too-short"));
        let request = stored_request(Some(CHALLENGE), Some("S256"));
        assert!(verify(&ctx, &request).is_err());

        let ctx = ctx_with_verifier(Some(&format!("{VERIFIER}!")));
        assert!(verify(&ctx, &request).is_err());
    }
}
