//! Client certificate parsing for mutual-TLS authentication.
//!
//! [`ClientCertificate`] is the parsed view of the certificate the TLS layer
//! presented: subject DN, the SAN entries relevant to RFC 8705 matching
//! (dNSName, uniformResourceIdentifier, iPAddress, rfc822Name), and the
//! SHA-256 thumbprint used for sender-constrained token binding.
//!
//! Parsing is delegated to `x509-parser`; this module only extracts and
//! compares fields.

use std::net::{Ipv4Addr, Ipv6Addr};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};
use x509_parser::prelude::*;

use crate::AuthResult;
use crate::error::AuthError;
use crate::types::MtlsBinding;

/// Parsed client certificate presented on the mTLS connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCertificate {
    /// Subject distinguished name, RDNs in certificate order.
    pub subject_dn: String,

    /// SAN dNSName entries.
    pub san_dns: Vec<String>,

    /// SAN uniformResourceIdentifier entries.
    pub san_uri: Vec<String>,

    /// SAN iPAddress entries, formatted as IPv4 dotted quad or IPv6.
    pub san_ip: Vec<String>,

    /// SAN rfc822Name entries.
    pub san_email: Vec<String>,

    /// SHA-256 thumbprint of the DER encoding, base64url without padding
    /// (the `x5t#S256` confirmation value from RFC 8705).
    pub thumbprint_sha256: String,
}

impl ClientCertificate {
    /// Parses a PEM-encoded certificate.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClient` if the PEM or the certificate cannot be
    /// parsed. Malformed credential material is the client's fault.
    pub fn from_pem(pem: &str) -> AuthResult<Self> {
        let (_, parsed) = parse_x509_pem(pem.as_bytes())
            .map_err(|_| AuthError::invalid_client("Malformed client certificate PEM"))?;
        Self::from_der(&parsed.contents)
    }

    /// Parses a DER-encoded certificate.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClient` if the certificate cannot be parsed.
    pub fn from_der(der: &[u8]) -> AuthResult<Self> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|_| AuthError::invalid_client("Malformed client certificate"))?;

        let subject_dn = cert.subject().to_string();

        let mut san_dns = Vec::new();
        let mut san_uri = Vec::new();
        let mut san_ip = Vec::new();
        let mut san_email = Vec::new();

        if let Ok(Some(san)) = cert.subject_alternative_name() {
            for name in &san.value.general_names {
                match name {
                    GeneralName::DNSName(dns) => san_dns.push((*dns).to_string()),
                    GeneralName::URI(uri) => san_uri.push((*uri).to_string()),
                    GeneralName::RFC822Name(email) => san_email.push((*email).to_string()),
                    GeneralName::IPAddress(bytes) => {
                        if let Some(ip) = format_ip(bytes) {
                            san_ip.push(ip);
                        }
                    }
                    _ => {}
                }
            }
        }

        let mut hasher = Sha256::new();
        hasher.update(der);
        let thumbprint_sha256 = URL_SAFE_NO_PAD.encode(hasher.finalize());

        Ok(Self {
            subject_dn,
            san_dns,
            san_uri,
            san_ip,
            san_email,
            thumbprint_sha256,
        })
    }

    /// Returns `true` if the certificate satisfies the registered binding.
    ///
    /// Comparison is an exact string match against the subject DN or the SAN
    /// entries of the registered kind (RFC 8705 Section 2.1.2).
    #[must_use]
    pub fn matches_binding(&self, binding: &MtlsBinding) -> bool {
        match binding {
            MtlsBinding::SubjectDn(dn) => &self.subject_dn == dn,
            MtlsBinding::SanDns(dns) => self.san_dns.iter().any(|v| v == dns),
            MtlsBinding::SanUri(uri) => self.san_uri.iter().any(|v| v == uri),
            MtlsBinding::SanIp(ip) => self.san_ip.iter().any(|v| v == ip),
            MtlsBinding::SanEmail(email) => self.san_email.iter().any(|v| v == email),
        }
    }

    /// Returns the hex form of the thumbprint, for logging.
    #[must_use]
    pub fn thumbprint_hex(&self) -> String {
        URL_SAFE_NO_PAD
            .decode(&self.thumbprint_sha256)
            .map(hex::encode)
            .unwrap_or_default()
    }
}

fn format_ip(bytes: &[u8]) -> Option<String> {
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = bytes.try_into().ok()?;
            Some(Ipv4Addr::from(octets).to_string())
        }
        16 => {
            let octets: [u8; 16] = bytes.try_into().ok()?;
            Some(Ipv6Addr::from(octets).to_string())
        }
        _ => None,
    }
}

/// Self-signed test certificate with
/// subject C=US, O=Client Example, CN=api.client.example and SANs
/// DNS:api.client.example, URI:https://client.example/app,
/// IP:192.0.2.10, email:ops@client.example.
#[cfg(test)]
pub(crate) const TEST_CERT_PEM: &str = "-----BEGIN CERTIFICATE-----
MIIDwDCCAqigAwIBAgIUF/Sb4T6tlnsT3Jq6vY0YXlxX2JswDQYJKoZIhvcNAQEL
BQAwQzELMAkGA1UEBhMCVVMxFzAVBgNVBAoMDkNsaWVudCBFeGFtcGxlMRswGQYD
VQQDDBJhcGkuY2xpZW50LmV4YW1wbGUwIBcNMjYwODIzMTgyNDE2WhgPMjEyNjA3
MzAxODI0MTZaMEMxCzAJBgNVBAYTAlVTMRcwFQYDVQQKDA5DbGllbnQgRXhhbXBs
ZTEbMBkGA1UEAwwSYXBpLmNsaWVudC5leGFtcGxlMIIBIjANBgkqhkiG9w0BAQEF
AAOCAQ8AMIIBCgKCAQEA1iERXvCv3seHdiEaESO30OgMH0kq3eIlA7v2gi9zu/bk
Fg+1ftZHDfylos3cdlEj5+A+gSlx6nzg3DM1Wvg3/0emAhru6Ng+PsQ7vMLB4iAz
Pg0uUt/nzj5q1G4JNguHOsG8yEFbGxfRbBbVV7s2QRlffvPBp+iDGZdjNk7FI8pZ
pGYEpJviQyRlzil1UaheJWWs3RToQKwCPDTLo80ZWZlU1WXlHF7QD2/Skq+7qx2g
d01eOXxp+MnOIHBn4GOIC24WTDeKD7LXfZS9r6Xn9UzG9OXxrbEgxATNLmlHwxQ+
Mg7kMPDmvEqZLdJOOYM+OZlZqT3jIHyXwZwvmSfDkwIDAQABo4GpMIGmMB0GA1Ud
DgQWBBQcGEBRyJq3OmCdr5LuKu3dTqiMcTAfBgNVHSMEGDAWgBQcGEBRyJq3OmCd
r5LuKu3dTqiMcTAPBgNVHRMBAf8EBTADAQH/MFMGA1UdEQRMMEqCEmFwaS5jbGll
bnQuZXhhbXBsZYYaaHR0cHM6Ly9jbGllbnQuZXhhbXBsZS9hcHCHBMAAAgqBEm9w
c0BjbGllbnQuZXhhbXBsZTANBgkqhkiG9w0BAQsFAAOCAQEAHt3zSIviJhLMKcde
G2RxuNxeJeiRy9E43zdhkTRD8joaFYhsIR0dn64r0JmmQpcuhgxSNQHgwq/k9LOO
GCK0XRhhIg+OpJj6mJP44UufwXSap3Y3gpVpLrPxPHdI6m1Mb9SjF5yypV95Fi1Q
ggRni/E4qZ8W6dAZZqvz47EXGESfn0R4m/AjxMPjl4GU41qN9pWc9HJyAQzxRcNW
2RTGGcDk/aGyuYnMyJhbEspzGInvUMN9srjBnDdousE56hkkOjpM7vC3T1UpmV9u
Q6RUElebyaVgP0jdTYjQiL25ft9gda/+AS2z07NECneQmoM1xNiSpQpesxhTv8jt
o7ebNQ==
-----END CERTIFICATE-----";
