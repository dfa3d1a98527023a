//! Mutual-TLS client authentication (RFC 8705).
//!
//! tls_client_auth matches the peer certificate's subject DN or a SAN entry
//! against the single value registered for the client. The self-signed
//! variant accepts on certificate presence; the binding happens downstream
//! when tokens are constrained to the certificate thumbprint. Either way a
//! missing certificate fails authentication.

use async_trait::async_trait;

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::client_auth::{ClientAuthenticator, ClientCredentials};
use crate::oauth::context::RequestContext;
use crate::types::{Client, TokenEndpointAuthMethod};
use crate::x509::ClientCertificate;

fn require_certificate(ctx: &dyn RequestContext) -> AuthResult<&ClientCertificate> {
    ctx.certificate()
        .ok_or_else(|| AuthError::invalid_client("No client certificate presented"))
}

/// tls_client_auth: PKI mutual TLS with a registered subject DN or SAN
/// binding.
pub struct TlsClientAuthenticator;

#[async_trait]
impl ClientAuthenticator for TlsClientAuthenticator {
    fn method(&self) -> TokenEndpointAuthMethod {
        TokenEndpointAuthMethod::TlsClientAuth
    }

    async fn authenticate(
        &self,
        ctx: &dyn RequestContext,
        client: &Client,
    ) -> AuthResult<ClientCredentials> {
        let certificate = require_certificate(ctx)?;

        let binding = client.mtls_binding.as_ref().ok_or_else(|| {
            tracing::warn!(client_id = %client.client_id, "tls_client_auth client has no registered binding");
            AuthError::configuration("Client has no registered certificate binding")
        })?;

        if !certificate.matches_binding(binding) {
            tracing::debug!(client_id = %client.client_id, "certificate does not match the registered binding");
            return Err(AuthError::invalid_client(
                "Client certificate does not match the registered binding",
            ));
        }

        Ok(
            ClientCredentials::new(&client.client_id, TokenEndpointAuthMethod::TlsClientAuth)
                .with_certificate(certificate.clone()),
        )
    }
}

/// self_signed_tls_client_auth: accepted on certificate presence; tokens
/// are bound to the certificate thumbprint downstream.
pub struct SelfSignedTlsAuthenticator;

#[async_trait]
impl ClientAuthenticator for SelfSignedTlsAuthenticator {
    fn method(&self) -> TokenEndpointAuthMethod {
        TokenEndpointAuthMethod::SelfSignedTlsClientAuth
    }

    async fn authenticate(
        &self,
        ctx: &dyn RequestContext,
        client: &Client,
    ) -> AuthResult<ClientCredentials> {
        let certificate = require_certificate(ctx)?;
        Ok(ClientCredentials::new(
            &client.client_id,
            TokenEndpointAuthMethod::SelfSignedTlsClientAuth,
        )
        .with_certificate(certificate.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::oauth::context::{TokenRequest, TokenRequestContext};
    use crate::types::{GrantType, MtlsBinding};
    use crate::x509::TEST_CERT_PEM;
    use std::sync::Arc;

    fn mtls_client(
        method: TokenEndpointAuthMethod,
        binding: Option<MtlsBinding>,
    ) -> Client {
        Client {
            client_id: "app-1".to_string(),
            client_secret: None,
            name: "App One".to_string(),
            auth_method: method,
            grant_types: vec![GrantType::ClientCredentials],
            redirect_uris: vec![],
            scopes: vec![],
            active: true,
            jwks: None,
            mtls_binding: binding,
            ciba_delivery_mode: None,
            require_sender_constrained_tokens: true,
        }
    }

    fn ctx(certificate: Option<ClientCertificate>, client: Client) -> TokenRequestContext {
        TokenRequestContext::new(
            TokenRequest {
                grant_type: "client_credentials".to_string(),
                client_id: Some("app-1".to_string()),
                ..Default::default()
            },
            None,
            certificate,
            Arc::new(ServerConfig::default()),
            Some(client),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_tls_client_auth_san_dns_match() {
        let client = mtls_client(
            TokenEndpointAuthMethod::TlsClientAuth,
            Some(MtlsBinding::SanDns("api.client.example".to_string())),
        );
        let cert = ClientCertificate::from_pem(TEST_CERT_PEM).unwrap();
        let ctx = ctx(Some(cert), client.clone());

        let credentials = TlsClientAuthenticator
            .authenticate(&ctx, &client)
            .await
            .unwrap();
        // Successful mTLS auth carries a non-empty certificate binding.
        assert!(credentials.certificate.is_some());
        assert_eq!(credentials.certificate_thumbprint().unwrap().len(), 43);
    }

    #[tokio::test]
    async fn test_tls_client_auth_binding_mismatch() {
        let client = mtls_client(
            TokenEndpointAuthMethod::TlsClientAuth,
            Some(MtlsBinding::SanDns("other.example".to_string())),
        );
        let cert = ClientCertificate::from_pem(TEST_CERT_PEM).unwrap();
        let ctx = ctx(Some(cert), client.clone());

        let err = TlsClientAuthenticator
            .authenticate(&ctx, &client)
            .await
            .unwrap_err();
        assert!(err.is_authentication_error());
    }

    #[tokio::test]
    async fn test_tls_client_auth_missing_certificate() {
        let client = mtls_client(
            TokenEndpointAuthMethod::TlsClientAuth,
            Some(MtlsBinding::SanDns("api.client.example".to_string())),
        );
        let ctx = ctx(None, client.clone());

        let err = TlsClientAuthenticator
            .authenticate(&ctx, &client)
            .await
            .unwrap_err();
        assert!(err.is_authentication_error());
    }

    #[tokio::test]
    async fn test_tls_client_auth_without_binding_is_misconfiguration() {
        let client = mtls_client(TokenEndpointAuthMethod::TlsClientAuth, None);
        let cert = ClientCertificate::from_pem(TEST_CERT_PEM).unwrap();
        let ctx = ctx(Some(cert), client.clone());

        let err = TlsClientAuthenticator
            .authenticate(&ctx, &client)
            .await
            .unwrap_err();
        assert!(err.is_server_error());
    }

    #[tokio::test]
    async fn test_self_signed_accepts_on_presence() {
        let client = mtls_client(TokenEndpointAuthMethod::SelfSignedTlsClientAuth, None);
        let cert = ClientCertificate::from_pem(TEST_CERT_PEM).unwrap();
        let ctx = ctx(Some(cert), client.clone());

        let credentials = SelfSignedTlsAuthenticator
            .authenticate(&ctx, &client)
            .await
            .unwrap();
        assert!(credentials.certificate.is_some());
    }

    #[tokio::test]
    async fn test_self_signed_missing_certificate_fails() {
        let client = mtls_client(TokenEndpointAuthMethod::SelfSignedTlsClientAuth, None);
        let ctx = ctx(None, client.clone());

        let err = SelfSignedTlsAuthenticator
            .authenticate(&ctx, &client)
            .await
            .unwrap_err();
        assert!(err.is_authentication_error());
    }
}
