//! Secret-based client authentication (client_secret_basic / post).

use async_trait::async_trait;
use subtle::ConstantTimeEq;

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::client_auth::{ClientAuthenticator, ClientCredentials};
use crate::oauth::context::RequestContext;
use crate::types::{Client, TokenEndpointAuthMethod};

fn check_secret(client: &Client, presented: &str) -> AuthResult<()> {
    // Missing registered secret and a wrong secret fail identically.
    let registered = client
        .client_secret
        .as_deref()
        .ok_or_else(|| AuthError::invalid_client("Invalid client credentials"))?;
    // Constant-time comparison so the check does not leak the position of
    // the first differing byte.
    if !bool::from(registered.as_bytes().ct_eq(presented.as_bytes())) {
        tracing::debug!(client_id = %client.client_id, "client secret mismatch");
        return Err(AuthError::invalid_client("Invalid client credentials"));
    }
    Ok(())
}

/// client_secret_basic: the secret arrives in the Basic authorization
/// header.
pub struct BasicSecretAuthenticator;

#[async_trait]
impl ClientAuthenticator for BasicSecretAuthenticator {
    fn method(&self) -> TokenEndpointAuthMethod {
        TokenEndpointAuthMethod::ClientSecretBasic
    }

    async fn authenticate(
        &self,
        ctx: &dyn RequestContext,
        client: &Client,
    ) -> AuthResult<ClientCredentials> {
        let (id, secret) = ctx
            .basic_auth()
            .ok_or_else(|| AuthError::invalid_client("Missing Basic authorization header"))?;
        if id != client.client_id {
            return Err(AuthError::invalid_client("Invalid client credentials"));
        }
        check_secret(client, secret)?;

        Ok(
            ClientCredentials::new(&client.client_id, TokenEndpointAuthMethod::ClientSecretBasic)
                .with_secret(secret),
        )
    }
}

/// client_secret_post: the secret arrives as a body parameter.
pub struct PostSecretAuthenticator;

#[async_trait]
impl ClientAuthenticator for PostSecretAuthenticator {
    fn method(&self) -> TokenEndpointAuthMethod {
        TokenEndpointAuthMethod::ClientSecretPost
    }

    async fn authenticate(
        &self,
        ctx: &dyn RequestContext,
        client: &Client,
    ) -> AuthResult<ClientCredentials> {
        let secret = ctx
            .body_client_secret()
            .ok_or_else(|| AuthError::invalid_client("Missing client_secret parameter"))?;
        check_secret(client, secret)?;

        Ok(
            ClientCredentials::new(&client.client_id, TokenEndpointAuthMethod::ClientSecretPost)
                .with_secret(secret),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::oauth::context::{TokenRequest, TokenRequestContext};
    use crate::types::GrantType;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as B64;
    use std::sync::Arc;

    fn test_client(method: TokenEndpointAuthMethod) -> Client {
        Client {
            client_id: "app-1".to_string(),
            client_secret: Some("s3cret".to_string()),
            name: "App One".to_string(),
            auth_method: method,
            grant_types: vec![GrantType::ClientCredentials],
            redirect_uris: vec![],
            scopes: vec![],
            active: true,
            jwks: None,
            mtls_binding: None,
            ciba_delivery_mode: None,
            require_sender_constrained_tokens: false,
        }
    }

    fn basic_ctx(secret: &str) -> TokenRequestContext {
        let header = format!("Basic {}", B64.encode(format!("app-1:{secret}")));
        TokenRequestContext::new(
            TokenRequest {
                grant_type: "client_credentials".to_string(),
                ..Default::default()
            },
            Some(&header),
            None,
            Arc::new(ServerConfig::default()),
            Some(test_client(TokenEndpointAuthMethod::ClientSecretBasic)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_basic_success() {
        let ctx = basic_ctx("s3cret");
        let client = test_client(TokenEndpointAuthMethod::ClientSecretBasic);
        let credentials = BasicSecretAuthenticator
            .authenticate(&ctx, &client)
            .await
            .unwrap();
        assert_eq!(credentials.client_id, "app-1");
        assert_eq!(credentials.secret.as_deref(), Some("s3cret"));
        assert!(credentials.certificate.is_none());
    }

    #[tokio::test]
    async fn test_basic_wrong_secret() {
        let ctx = basic_ctx("wrong");
        let client = test_client(TokenEndpointAuthMethod::ClientSecretBasic);
        let err = BasicSecretAuthenticator
            .authenticate(&ctx, &client)
            .await
            .unwrap_err();
        assert!(err.is_authentication_error());
    }

    #[tokio::test]
    async fn test_basic_rejects_same_length_mismatch() {
        // ct_eq short-circuits only on length, so a same-length wrong
        // secret exercises the full byte-by-byte comparison.
        let ctx = basic_ctx("s3creX");
        let client = test_client(TokenEndpointAuthMethod::ClientSecretBasic);
        let err = BasicSecretAuthenticator
            .authenticate(&ctx, &client)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid client: Invalid client credentials");
    }

    #[tokio::test]
    async fn test_basic_no_registered_secret_fails_identically() {
        let ctx = basic_ctx("s3cret");
        let mut client = test_client(TokenEndpointAuthMethod::ClientSecretBasic);
        client.client_secret = None;
        let err = BasicSecretAuthenticator
            .authenticate(&ctx, &client)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid client: Invalid client credentials");
    }

    #[tokio::test]
    async fn test_post_success_and_mismatch() {
        let client = test_client(TokenEndpointAuthMethod::ClientSecretPost);
        let ctx = |secret: &str| {
            TokenRequestContext::new(
                TokenRequest {
                    grant_type: "client_credentials".to_string(),
                    client_id: Some("app-1".to_string()),
                    client_secret: Some(secret.to_string()),
                    ..Default::default()
                },
                None,
                None,
                Arc::new(ServerConfig::default()),
                Some(client.clone()),
            )
            .unwrap()
        };

        let credentials = PostSecretAuthenticator
            .authenticate(&ctx("s3cret"), &client)
            .await
            .unwrap();
        assert_eq!(
            credentials.auth_method,
            TokenEndpointAuthMethod::ClientSecretPost
        );

        let err = PostSecretAuthenticator
            .authenticate(&ctx("wrong"), &client)
            .await
            .unwrap_err();
        assert!(err.is_authentication_error());
    }
}
