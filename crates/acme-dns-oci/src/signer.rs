//! OCI HTTP request signing
//!
//! Implements OCI's flavour of draft-cavage HTTP signatures: `rsa-sha256`
//! over `date (request-target) host`, plus `content-length content-type
//! x-content-sha256` when a body is sent.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use sha2::{Digest, Sha256};
use ureq::http::Uri;

use crate::dns_provider::DnsError;

/// Content type of every request body sent to OCI
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Signs requests with one key id / private key pair
#[derive(Clone)]
pub struct RequestSigner {
    key_id: String,
    signing_key: SigningKey<Sha256>,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl RequestSigner {
    pub fn new(key_id: impl Into<String>, private_key: RsaPrivateKey) -> Self {
        Self {
            key_id: key_id.into(),
            signing_key: SigningKey::<Sha256>::new(private_key),
        }
    }

    /// Build a signer from a PEM private key (PKCS#8 or PKCS#1)
    pub fn from_pem(key_id: impl Into<String>, pem: &str) -> Result<Self, DnsError> {
        Ok(Self::new(key_id, parse_private_key(pem)?))
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Compute the headers that authenticate a request
    ///
    /// Returns `(name, value)` pairs to attach, including `authorization`.
    pub fn sign(
        &self,
        method: &str,
        url: &str,
        body: Option<&[u8]>,
    ) -> Result<Vec<(String, String)>, DnsError> {
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        self.sign_at(method, url, body, &date)
    }

    pub(crate) fn sign_at(
        &self,
        method: &str,
        url: &str,
        body: Option<&[u8]>,
        date: &str,
    ) -> Result<Vec<(String, String)>, DnsError> {
        let uri: Uri = url
            .parse()
            .map_err(|e| DnsError::InvalidRequest(format!("invalid URL {}: {}", url, e)))?;
        let host = host_header(&uri)
            .ok_or_else(|| DnsError::InvalidRequest(format!("URL has no host: {}", url)))?;
        let target = format!(
            "{} {}",
            method.to_ascii_lowercase(),
            uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/")
        );

        let mut headers = vec![
            ("date".to_string(), date.to_string()),
            ("(request-target)".to_string(), target),
            ("host".to_string(), host),
        ];
        if let Some(body) = body {
            headers.push(("content-length".to_string(), body.len().to_string()));
            headers.push(("content-type".to_string(), JSON_CONTENT_TYPE.to_string()));
            headers.push((
                "x-content-sha256".to_string(),
                STANDARD.encode(Sha256::digest(body)),
            ));
        }

        let signature = self.signing_key.sign(signing_string(&headers).as_bytes());
        let header_names = headers
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let authorization = format!(
            "Signature version=\"1\",keyId=\"{}\",algorithm=\"rsa-sha256\",headers=\"{}\",signature=\"{}\"",
            self.key_id,
            header_names,
            STANDARD.encode(signature.to_bytes())
        );

        let mut signed: Vec<(String, String)> = headers
            .into_iter()
            .filter(|(name, _)| name != "(request-target)")
            .collect();
        signed.push(("authorization".to_string(), authorization));
        Ok(signed)
    }
}

/// The exact text covered by the signature
pub fn signing_string(headers: &[(String, String)]) -> String {
    headers
        .iter()
        .map(|(name, value)| format!("{}: {}", name, value))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse an unencrypted RSA private key in PKCS#8 or PKCS#1 PEM form
pub fn parse_private_key(pem: &str) -> Result<RsaPrivateKey, DnsError> {
    if pem.contains("ENCRYPTED") {
        return Err(DnsError::Credentials(
            "encrypted private keys are not supported; provide an unencrypted key".to_string(),
        ));
    }
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|e| DnsError::Credentials(format!("invalid RSA private key: {}", e)))
}

fn host_header(uri: &Uri) -> Option<String> {
    let host = uri.host()?;
    let default_port = match uri.scheme_str() {
        Some("http") => Some(80),
        Some("https") => Some(443),
        _ => None,
    };
    match uri.port_u16() {
        Some(port) if Some(port) != default_port => Some(format!("{}:{}", host, port)),
        _ => Some(host.to_string()),
    }
}
